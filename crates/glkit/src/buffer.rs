//! Vertex and index buffer objects.

use glkit_core::{
    slice_as_bytes, AsBytes, BindingGuard, BufferTarget, Context, GlApi, Handle,
};
use tracing::debug;

/// A GPU buffer holding static vertex or index data.
///
/// Storage is allocated and filled once at construction; there is no update
/// path. The GL object is deleted when the buffer is dropped.
pub struct Buffer {
    ctx: Context,
    handle: Handle,
    size: usize,
    target: BufferTarget,
}

impl Buffer {
    /// Upload `bytes` into a new buffer for `target`.
    ///
    /// The upload binds through a guard, so the caller's binding at
    /// `target` (and any vertex array's element binding) is left unchanged.
    pub fn new(ctx: &Context, target: BufferTarget, bytes: &[u8]) -> Self {
        let handle = ctx.gen_buffer();
        {
            let _bound = BindingGuard::bind(ctx, target.binding_point(), handle);
            ctx.buffer_data(target, bytes);
        }
        debug!(handle, size = bytes.len(), ?target, "created buffer");
        Self {
            ctx: ctx.clone(),
            handle,
            size: bytes.len(),
            target,
        }
    }

    /// Upload a slice of plain values.
    pub fn from_slice<T: AsBytes>(ctx: &Context, target: BufferTarget, items: &[T]) -> Self {
        Self::new(ctx, target, slice_as_bytes(items))
    }

    /// Interleaved float vertex data.
    pub fn vertex(ctx: &Context, vertices: &[f32]) -> Self {
        Self::from_slice(ctx, BufferTarget::Array, vertices)
    }

    /// `u32` triangle indices.
    pub fn index(ctx: &Context, indices: &[u32]) -> Self {
        Self::from_slice(ctx, BufferTarget::ElementArray, indices)
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Bytes uploaded at construction.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// Make this the current buffer of its target until the guard drops.
    ///
    /// Binding an index buffer edits the bound vertex array; use
    /// [`crate::VertexArray::link_buffer`] to attach one permanently.
    pub fn bind(&self) -> BindingGuard {
        BindingGuard::bind(&self.ctx, self.target.binding_point(), self.handle)
    }

    /// Size as reported by GL.
    pub fn query_size(&self) -> usize {
        let _bound = self.bind();
        self.ctx.buffer_size(self.target)
    }

    /// Copy the buffer's contents back from GL.
    pub fn read_back(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.size];
        let _bound = self.bind();
        self.ctx.get_buffer_sub_data(self.target, 0, &mut out);
        out
    }

    /// Delete the GL object now rather than at end of scope.
    pub fn release(self) {}
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.ctx.delete_buffer(self.handle);
        debug!(handle = self.handle, target = ?self.target, "deleted buffer");
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.handle)
            .field("size", &self.size)
            .field("target", &self.target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::headless;
    use glkit_core::{BindingPoint, DEFAULT_HANDLE};

    #[test]
    fn reported_size_matches_upload() {
        let (_gl, ctx) = headless();
        let data: Vec<f32> = (0..15).map(|i| i as f32 * 0.5).collect();
        let buffer = Buffer::vertex(&ctx, &data);

        assert_eq!(buffer.size(), 60);
        assert_eq!(buffer.query_size(), 60);
    }

    #[test]
    fn contents_read_back_unmodified() {
        let (_gl, ctx) = headless();
        let indices = [0u32, 1, 3, 1, 2, 3];
        let buffer = Buffer::index(&ctx, &indices);

        assert_eq!(buffer.read_back(), slice_as_bytes(&indices));
    }

    #[test]
    fn bind_then_unbind_restores_default() {
        let (gl, ctx) = headless();
        let buffer = Buffer::vertex(&ctx, &[0.0, 1.0, 2.0]);

        let bound = buffer.bind();
        assert_eq!(gl.get_binding(BindingPoint::ArrayBuffer), buffer.handle());
        bound.unbind();
        assert_eq!(gl.get_binding(BindingPoint::ArrayBuffer), DEFAULT_HANDLE);
    }

    #[test]
    fn construction_leaves_bindings_alone() {
        let (gl, ctx) = headless();
        let first = Buffer::vertex(&ctx, &[1.0]);
        let _bound = first.bind();
        let _second = Buffer::vertex(&ctx, &[2.0]);
        assert_eq!(gl.get_binding(BindingPoint::ArrayBuffer), first.handle());
    }

    #[test]
    fn drop_deletes_the_object() {
        let (gl, ctx) = headless();
        let buffer = Buffer::vertex(&ctx, &[1.0, 2.0]);
        let handle = buffer.handle();
        assert!(gl.exists(handle));
        buffer.release();
        assert!(!gl.exists(handle));
        assert_eq!(gl.live_objects(), 0);
    }
}
