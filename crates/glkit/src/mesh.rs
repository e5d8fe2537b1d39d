//! Indexed meshes with their material textures.

use std::rc::Rc;

use glkit_core::{AsBytes, BufferTarget, Context, GlApi};
use tracing::debug;

use crate::buffer::Buffer;
use crate::error::LayoutError;
use crate::layout::Layout;
use crate::shader::ProgramInUse;
use crate::texture::Texture;
use crate::vertex_array::VertexArray;

/// One vertex of a [`Mesh`], laid out as [`Layout::PosNormalTex`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

// SAFETY: repr(C), eight f32 fields, no padding.
unsafe impl AsBytes for Vertex {}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coords,
        }
    }
}

/// How a material texture is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
}

impl TextureKind {
    /// Sampler prefix inside the `material` uniform struct.
    pub fn sampler_prefix(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "texture_diffuse",
            TextureKind::Specular => "texture_specular",
        }
    }
}

/// A texture shared between meshes, tagged with its role.
#[derive(Debug, Clone)]
pub struct MeshTexture {
    pub texture: Rc<Texture>,
    pub kind: TextureKind,
}

/// Vertex and index data in an owned vertex array, plus material textures.
#[derive(Debug)]
pub struct Mesh {
    vertex_array: VertexArray,
    textures: Vec<MeshTexture>,
    index_count: usize,
}

impl Mesh {
    pub fn new(
        ctx: &Context,
        vertices: &[Vertex],
        indices: &[u32],
        textures: Vec<MeshTexture>,
    ) -> Result<Self, LayoutError> {
        let vertex_array = VertexArray::with_buffers(
            ctx,
            Buffer::from_slice(ctx, BufferTarget::Array, vertices),
            Some(Buffer::index(ctx, indices)),
            Layout::PosNormalTex,
        )?;
        debug!(
            vertex_array = vertex_array.handle(),
            vertices = vertices.len(),
            indices = indices.len(),
            textures = textures.len(),
            "created mesh"
        );
        Ok(Self {
            vertex_array,
            textures,
            index_count: indices.len(),
        })
    }

    pub fn vertex_array(&self) -> &VertexArray {
        &self.vertex_array
    }

    pub fn textures(&self) -> &[MeshTexture] {
        &self.textures
    }

    pub fn index_count(&self) -> usize {
        self.index_count
    }

    /// Sampler uniform for each texture, in unit order:
    /// `material.texture_diffuse1`, `material.texture_specular1`,
    /// `material.texture_diffuse2`, ...
    pub fn sampler_names(&self) -> Vec<String> {
        let mut diffuse = 0;
        let mut specular = 0;
        self.textures
            .iter()
            .map(|t| {
                let n = match t.kind {
                    TextureKind::Diffuse => {
                        diffuse += 1;
                        diffuse
                    }
                    TextureKind::Specular => {
                        specular += 1;
                        specular
                    }
                };
                format!("material.{}{}", t.kind.sampler_prefix(), n)
            })
            .collect()
    }

    /// Bind each texture to its own unit, point its sampler there and draw
    /// the indexed triangles. Unit 0 is active again afterwards.
    pub fn draw(&self, program: &ProgramInUse<'_>) {
        for (unit, (texture, name)) in self.textures.iter().zip(self.sampler_names()).enumerate() {
            texture
                .texture
                .activate_sampler(program, &name, unit as u32);
        }
        self.vertex_array.draw_elements(self.index_count);
        program.context().active_texture(0);
    }
}
