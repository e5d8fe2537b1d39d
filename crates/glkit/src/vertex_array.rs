//! Vertex array objects.

use glkit_core::{
    state::bind_point, BindingGuard, BindingPoint, BufferTarget, Context, GlApi, Handle,
    Primitive,
};
use tracing::{debug, trace, warn};

use crate::buffer::Buffer;
use crate::error::LayoutError;
use crate::layout::Layout;

/// A vertex array and the buffers it sources from.
///
/// The array owns its linked buffers, so they live exactly as long as the
/// array does. Configuration happens in two steps, mirroring GL:
/// [`link_buffer`](Self::link_buffer) for each buffer, then
/// [`declare_layout`](Self::declare_layout) to point the attribute slots
/// into the vertex buffer.
pub struct VertexArray {
    ctx: Context,
    handle: Handle,
    layout: Option<Layout>,
    vertex_buffer: Option<Buffer>,
    index_buffer: Option<Buffer>,
}

impl VertexArray {
    pub fn new(ctx: &Context) -> Self {
        let handle = ctx.gen_vertex_array();
        debug!(handle, "created vertex array");
        Self {
            ctx: ctx.clone(),
            handle,
            layout: None,
            vertex_buffer: None,
            index_buffer: None,
        }
    }

    /// Convenience for the usual sequence: link `vertices` (and `indices`),
    /// then declare `layout`.
    pub fn with_buffers(
        ctx: &Context,
        vertices: Buffer,
        indices: Option<Buffer>,
        layout: Layout,
    ) -> Result<Self, LayoutError> {
        let mut vao = Self::new(ctx);
        vao.link_buffer(vertices);
        if let Some(indices) = indices {
            vao.link_buffer(indices);
        }
        vao.declare_layout(layout)?;
        Ok(vao)
    }

    /// Take ownership of `buffer` in the role given by its target.
    ///
    /// An index buffer is recorded into the array's state immediately. A
    /// vertex buffer is sourced by [`declare_layout`](Self::declare_layout),
    /// which must be called again after linking one: a new vertex buffer
    /// clears the declared layout, so [`draw`](Self::draw) fails until it is
    /// redeclared. Linking replaces any buffer previously linked in the same
    /// role.
    pub fn link_buffer(&mut self, buffer: Buffer) {
        trace!(
            vertex_array = self.handle,
            buffer = buffer.handle(),
            target = ?buffer.target(),
            "link buffer"
        );
        match buffer.target() {
            BufferTarget::Array => {
                // The old slots still point at the buffer being replaced.
                self.layout = None;
                self.vertex_buffer = Some(buffer);
            }
            BufferTarget::ElementArray => {
                let _vao = self.bind();
                // Not guarded: the element binding is the array's own state
                // and must outlive this call.
                bind_point(self.ctx.as_ref(), BindingPoint::ElementArrayBuffer, buffer.handle());
                self.index_buffer = Some(buffer);
            }
        }
    }

    /// Point the attribute slots of `layout` into the linked vertex buffer
    /// and enable them.
    pub fn declare_layout(&mut self, layout: Layout) -> Result<(), LayoutError> {
        let vertices = self
            .vertex_buffer
            .as_ref()
            .ok_or(LayoutError::MissingVertexBuffer)?;
        let stride = layout.stride_bytes();
        if vertices.size() % stride != 0 {
            warn!(
                vertex_array = self.handle,
                size = vertices.size(),
                stride,
                "vertex buffer size is not a whole number of vertices"
            );
        }

        let _vao = self.bind();
        let _vbo = vertices.bind();
        for attribute in layout.attributes() {
            self.ctx.vertex_attrib_pointer(
                attribute.slot,
                attribute.components,
                stride as i32,
                attribute.offset_bytes(),
            );
            self.ctx.enable_vertex_attrib_array(attribute.slot);
        }
        debug!(vertex_array = self.handle, ?layout, "declared layout");
        self.layout = Some(layout);
        Ok(())
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn layout(&self) -> Option<Layout> {
        self.layout
    }

    pub fn vertex_buffer(&self) -> Option<&Buffer> {
        self.vertex_buffer.as_ref()
    }

    pub fn index_buffer(&self) -> Option<&Buffer> {
        self.index_buffer.as_ref()
    }

    /// Whole vertices in the linked vertex buffer under the declared layout.
    pub fn vertex_count(&self) -> usize {
        match (&self.vertex_buffer, self.layout) {
            (Some(vertices), Some(layout)) => vertices.size() / layout.stride_bytes(),
            _ => 0,
        }
    }

    pub fn index_count(&self) -> usize {
        self.index_buffer
            .as_ref()
            .map_or(0, |indices| indices.size() / std::mem::size_of::<u32>())
    }

    pub fn bind(&self) -> BindingGuard {
        BindingGuard::bind(&self.ctx, BindingPoint::VertexArray, self.handle)
    }

    /// Draw every linked vertex as triangles: indexed when an index buffer
    /// is linked, sequential otherwise. The current program is used as is.
    pub fn draw(&self) -> Result<(), LayoutError> {
        if self.layout.is_none() {
            return Err(LayoutError::MissingLayout);
        }
        if self.index_buffer.is_some() {
            self.draw_elements(self.index_count());
        } else {
            self.draw_arrays(self.vertex_count());
        }
        Ok(())
    }

    pub fn draw_arrays(&self, count: usize) {
        let _vao = self.bind();
        self.ctx.draw_arrays(Primitive::Triangles, 0, count as i32);
    }

    pub fn draw_elements(&self, count: usize) {
        let _vao = self.bind();
        self.ctx.draw_elements(Primitive::Triangles, count as i32);
    }

    /// Delete the GL object and its buffers now rather than at end of scope.
    pub fn release(self) {}
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        self.ctx.delete_vertex_array(self.handle);
        debug!(handle = self.handle, "deleted vertex array");
    }
}

impl std::fmt::Debug for VertexArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexArray")
            .field("handle", &self.handle)
            .field("layout", &self.layout)
            .field("vertex_buffer", &self.vertex_buffer)
            .field("index_buffer", &self.index_buffer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{headless, program};
    use glkit_core::DEFAULT_HANDLE;

    // Quad from the textured-rectangle demo: position + texcoord.
    const QUAD: [f32; 20] = [
        0.5, 0.5, 0.0, 1.0, 1.0, //
        0.5, -0.5, 0.0, 1.0, 0.0, //
        -0.5, -0.5, 0.0, 0.0, 0.0, //
        -0.5, 0.5, 0.0, 0.0, 1.0,
    ];
    const QUAD_INDICES: [u32; 6] = [0, 1, 3, 1, 2, 3];

    #[test]
    fn pos_tex_layout_sets_two_slots() {
        let (gl, ctx) = headless();
        let vao = VertexArray::with_buffers(
            &ctx,
            Buffer::vertex(&ctx, &QUAD),
            Some(Buffer::index(&ctx, &QUAD_INDICES)),
            Layout::PosTex,
        )
        .expect("layout");

        assert_eq!(gl.attribute_slots(vao.handle()), vec![0, 1]);
        let position = gl.attribute(vao.handle(), 0).expect("slot 0");
        assert_eq!((position.components, position.stride, position.offset), (3, 20, 0));
        let tex = gl.attribute(vao.handle(), 1).expect("slot 1");
        assert_eq!((tex.components, tex.stride, tex.offset), (2, 20, 12));
        assert!(tex.enabled);
        assert_eq!(vao.vertex_count(), 4);
        assert_eq!(vao.index_count(), 6);
    }

    #[test]
    fn pos_normal_tex_layout_sets_three_slots() {
        let (gl, ctx) = headless();
        let vertices = [0.0f32; 8 * 3];
        let vao = VertexArray::with_buffers(
            &ctx,
            Buffer::vertex(&ctx, &vertices),
            None,
            Layout::PosNormalTex,
        )
        .expect("layout");

        let normal = gl.attribute(vao.handle(), 1).expect("slot 1");
        assert_eq!((normal.components, normal.stride, normal.offset), (3, 32, 12));
        let tex = gl.attribute(vao.handle(), 2).expect("slot 2");
        assert_eq!((tex.components, tex.stride, tex.offset), (2, 32, 24));
        assert_eq!(
            tex.buffer,
            vao.vertex_buffer().map(Buffer::handle).unwrap_or_default()
        );
        assert_eq!(vao.vertex_count(), 3);
    }

    #[test]
    fn layout_requires_a_vertex_buffer() {
        let (_gl, ctx) = headless();
        let mut vao = VertexArray::new(&ctx);
        assert_eq!(
            vao.declare_layout(Layout::PosTex),
            Err(LayoutError::MissingVertexBuffer)
        );
    }

    #[test]
    fn index_buffer_is_captured_by_the_array() {
        let (gl, ctx) = headless();
        let mut vao = VertexArray::new(&ctx);
        vao.link_buffer(Buffer::index(&ctx, &QUAD_INDICES));
        let ebo = vao.index_buffer().map(Buffer::handle).unwrap_or_default();

        assert_eq!(gl.get_binding(BindingPoint::VertexArray), DEFAULT_HANDLE);
        assert_eq!(gl.get_binding(BindingPoint::ElementArrayBuffer), DEFAULT_HANDLE);
        assert_eq!(gl.element_buffer(vao.handle()), Some(ebo));
    }

    #[test]
    fn configuration_restores_global_bindings() {
        let (gl, ctx) = headless();
        let _vao = VertexArray::with_buffers(
            &ctx,
            Buffer::vertex(&ctx, &QUAD),
            Some(Buffer::index(&ctx, &QUAD_INDICES)),
            Layout::PosTex,
        )
        .expect("layout");
        assert_eq!(gl.get_binding(BindingPoint::ArrayBuffer), DEFAULT_HANDLE);
        assert_eq!(gl.get_binding(BindingPoint::VertexArray), DEFAULT_HANDLE);
    }

    #[test]
    fn draw_picks_indexed_path() {
        let (gl, ctx) = headless();
        let shader = program(&ctx);
        let vao = VertexArray::with_buffers(
            &ctx,
            Buffer::vertex(&ctx, &QUAD),
            Some(Buffer::index(&ctx, &QUAD_INDICES)),
            Layout::PosTex,
        )
        .expect("layout");

        let _in_use = shader.use_program();
        vao.draw().expect("draw");

        let calls = gl.draw_calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].indexed);
        assert_eq!(calls[0].count, 6);
        assert_eq!(calls[0].vertex_array, vao.handle());
        assert_eq!(gl.get_binding(BindingPoint::VertexArray), DEFAULT_HANDLE);
    }

    #[test]
    fn draw_without_layout_is_rejected() {
        let (_gl, ctx) = headless();
        let vao = VertexArray::new(&ctx);
        assert_eq!(vao.draw(), Err(LayoutError::MissingLayout));
    }

    #[test]
    fn relinking_vertices_requires_a_new_layout() {
        let (gl, ctx) = headless();
        let mut vao = VertexArray::with_buffers(
            &ctx,
            Buffer::vertex(&ctx, &QUAD),
            None,
            Layout::PosTex,
        )
        .expect("layout");
        let old = vao.vertex_buffer().map(Buffer::handle).unwrap_or_default();

        vao.link_buffer(Buffer::vertex(&ctx, &[0.0f32; 40]));
        assert!(!gl.exists(old));
        assert_eq!(vao.layout(), None);
        assert_eq!(vao.vertex_count(), 0);
        assert_eq!(vao.draw(), Err(LayoutError::MissingLayout));
        assert!(gl.draw_calls().is_empty());

        vao.declare_layout(Layout::PosTex).expect("layout");
        let new = vao.vertex_buffer().map(Buffer::handle).unwrap_or_default();
        let position = gl.attribute(vao.handle(), 0).expect("slot 0");
        assert_eq!(position.buffer, new);
        assert_eq!(vao.vertex_count(), 8);
    }

    #[test]
    fn bind_then_unbind_restores_default() {
        let (gl, ctx) = headless();
        let vao = VertexArray::new(&ctx);
        let bound = vao.bind();
        assert_eq!(gl.get_binding(BindingPoint::VertexArray), vao.handle());
        bound.unbind();
        assert_eq!(gl.get_binding(BindingPoint::VertexArray), DEFAULT_HANDLE);
    }

    #[test]
    fn dropping_the_array_deletes_its_buffers() {
        let (gl, ctx) = headless();
        let vao = VertexArray::with_buffers(
            &ctx,
            Buffer::vertex(&ctx, &QUAD),
            Some(Buffer::index(&ctx, &QUAD_INDICES)),
            Layout::PosTex,
        )
        .expect("layout");
        assert_eq!(gl.live_objects(), 3);
        vao.release();
        assert_eq!(gl.live_objects(), 0);
    }
}
