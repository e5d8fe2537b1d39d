//! Owning wrappers over OpenGL buffers, vertex arrays, textures,
//! framebuffers and shader programs.
//!
//! Every wrapper holds a [`Context`] and deletes its GL object on drop.
//! `bind()` methods return guards that put the previous binding back when
//! they go out of scope, so configuration code never leaks state into the
//! caller's bindings.
//!
//! ```no_run
//! use glkit::{Buffer, Layout, VertexArray};
//! use glkit_core::{Context, DriverGl};
//! use std::rc::Rc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx: Context = Rc::new(DriverGl::from_current_context()?);
//! let quad = VertexArray::with_buffers(
//!     &ctx,
//!     Buffer::vertex(&ctx, &[0.0; 20]),
//!     Some(Buffer::index(&ctx, &[0, 1, 3, 1, 2, 3])),
//!     Layout::PosTex,
//! )?;
//! quad.draw()?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod error;
pub mod frame;
pub mod framebuffer;
pub mod layout;
pub mod mesh;
pub mod renderbuffer;
pub mod shader;
pub mod target;
pub mod texture;
pub mod vertex_array;

pub use buffer::Buffer;
pub use error::{FramebufferError, LayoutError, ShaderError, TextureError};
pub use framebuffer::{Attached, Framebuffer, FramebufferBinding};
pub use layout::{Attribute, Layout, Semantic};
pub use mesh::{Mesh, MeshTexture, TextureKind, Vertex};
pub use renderbuffer::Renderbuffer;
pub use shader::{ProgramInUse, ShaderProgram};
pub use target::{RenderTarget, RenderTargetConfig};
pub use texture::{Texture, TextureParams};
pub use vertex_array::VertexArray;

pub use glkit_core::Context;

#[cfg(test)]
pub(crate) mod testing {
    use std::rc::Rc;

    use glkit_core::{Context, HeadlessGl};

    use crate::shader::ShaderProgram;

    pub const VERTEX: &str = r#"
        #version 330 core
        layout (location = 0) in vec3 aPos;
        layout (location = 1) in vec2 aTexCoords;
        uniform mat4 model;
        out vec2 TexCoords;
        void main() {
            TexCoords = aTexCoords;
            gl_Position = model * vec4(aPos, 1.0);
        }
    "#;

    pub const FRAGMENT: &str = r#"
        #version 330 core
        struct Material {
            sampler2D texture_diffuse1;
            sampler2D texture_specular1;
        };
        in vec2 TexCoords;
        out vec4 FragColor;
        uniform Material material;
        uniform sampler2D screenTexture;
        uniform vec3 lightColor;
        uniform float mixValue;
        uniform bool flag;
        void main() {
            FragColor = texture(material.texture_diffuse1, TexCoords) * mixValue;
        }
    "#;

    /// A fresh headless context, returned both concretely (for inspection)
    /// and as the trait object the wrappers take.
    pub fn headless() -> (Rc<HeadlessGl>, Context) {
        let gl = Rc::new(HeadlessGl::new());
        let ctx: Context = gl.clone();
        (gl, ctx)
    }

    pub fn program(ctx: &Context) -> ShaderProgram {
        ShaderProgram::from_sources(ctx, VERTEX, FRAGMENT).expect("test program links")
    }
}
