//! Save, restore and reset the binding-point state of a context.

use tracing::{trace, warn};

use crate::api::{Context, GlApi};
use crate::types::*;

/// Point `point` at `handle`.
pub fn bind_point(gl: &dyn GlApi, point: BindingPoint, handle: Handle) {
    match point {
        BindingPoint::ArrayBuffer => gl.bind_buffer(BufferTarget::Array, handle),
        BindingPoint::ElementArrayBuffer => gl.bind_buffer(BufferTarget::ElementArray, handle),
        BindingPoint::VertexArray => gl.bind_vertex_array(handle),
        BindingPoint::Texture2d => gl.bind_texture_2d(handle),
        BindingPoint::Framebuffer => gl.bind_framebuffer(handle),
        BindingPoint::Renderbuffer => gl.bind_renderbuffer(handle),
        BindingPoint::Program => gl.use_program(handle),
    }
}

/// Scoped occupancy of one binding point.
///
/// Binds on construction and puts the previous occupant back when dropped
/// or when [`unbind`](BindingGuard::unbind) is called. Guards on the same
/// point must be released in reverse order of creation, which lexical
/// scoping gives for free.
///
/// A [`BindingPoint::Texture2d`] guard remembers the texture unit it bound
/// on and restores there, leaving the unit active at release time active.
#[must_use = "dropping the guard immediately restores the previous binding"]
pub struct BindingGuard {
    gl: Context,
    point: BindingPoint,
    handle: Handle,
    previous: Handle,
    /// Texture unit the binding was made on, for `Texture2d` guards.
    unit: Option<u32>,
    released: bool,
}

impl BindingGuard {
    pub fn bind(gl: &Context, point: BindingPoint, handle: Handle) -> Self {
        let previous = gl.get_binding(point);
        let unit = (point == BindingPoint::Texture2d).then(|| gl.active_texture_unit());
        bind_point(gl.as_ref(), point, handle);
        trace!(?point, handle, previous, ?unit, "bind");
        Self {
            gl: gl.clone(),
            point,
            handle,
            previous,
            unit,
            released: false,
        }
    }

    pub fn point(&self) -> BindingPoint {
        self.point
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Occupant that will be restored on release.
    pub fn previous(&self) -> Handle {
        self.previous
    }

    /// The context this guard binds on.
    pub fn context(&self) -> &Context {
        &self.gl
    }

    /// Release now instead of at end of scope.
    pub fn unbind(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.unit {
            Some(unit) => {
                let active = self.gl.active_texture_unit();
                if active != unit {
                    self.gl.active_texture(unit);
                }
                bind_point(self.gl.as_ref(), self.point, self.previous);
                if active != unit {
                    self.gl.active_texture(active);
                }
            }
            None => bind_point(self.gl.as_ref(), self.point, self.previous),
        }
        trace!(point = ?self.point, handle = self.handle, restored = self.previous, "unbind");
    }
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for BindingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingGuard")
            .field("point", &self.point)
            .field("handle", &self.handle)
            .field("previous", &self.previous)
            .field("unit", &self.unit)
            .finish()
    }
}

/// Snapshot of every binding the wrappers touch, plus active texture unit
/// and viewport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedBindings {
    array_buffer: Handle,
    vertex_array: Handle,
    active_texture: u32,
    texture_2d: Handle,
    framebuffer: Handle,
    renderbuffer: Handle,
    program: Handle,
    viewport: [i32; 4],
}

impl SavedBindings {
    pub fn save(gl: &dyn GlApi) -> Self {
        Self {
            array_buffer: gl.get_binding(BindingPoint::ArrayBuffer),
            vertex_array: gl.get_binding(BindingPoint::VertexArray),
            active_texture: gl.active_texture_unit(),
            texture_2d: gl.get_binding(BindingPoint::Texture2d),
            framebuffer: gl.get_binding(BindingPoint::Framebuffer),
            renderbuffer: gl.get_binding(BindingPoint::Renderbuffer),
            program: gl.get_binding(BindingPoint::Program),
            viewport: gl.get_viewport(),
        }
    }

    pub fn restore(&self, gl: &dyn GlApi) {
        gl.bind_buffer(BufferTarget::Array, self.array_buffer);
        gl.bind_framebuffer(self.framebuffer);
        gl.bind_renderbuffer(self.renderbuffer);
        gl.active_texture(self.active_texture);
        gl.bind_texture_2d(self.texture_2d);
        gl.bind_vertex_array(self.vertex_array);
        gl.use_program(self.program);
        let [x, y, w, h] = self.viewport;
        gl.viewport(x, y, w, h);
    }

    /// Whether every saved binding sits at its default.
    pub fn is_default(&self) -> bool {
        [
            self.array_buffer,
            self.vertex_array,
            self.texture_2d,
            self.framebuffer,
            self.renderbuffer,
            self.program,
        ]
        .iter()
        .all(|&h| h == DEFAULT_HANDLE)
            && self.active_texture == 0
    }
}

/// Reset every binding point back to its default: no program, no textures
/// on any unit, no buffers or vertex array, the screen framebuffer.
pub fn reset_bindings(gl: &dyn GlApi) {
    gl.use_program(DEFAULT_HANDLE);

    for unit in 0..gl.max_texture_units() {
        gl.active_texture(unit);
        gl.bind_texture_2d(DEFAULT_HANDLE);
    }
    gl.active_texture(0);

    // Unbind the vertex array first so the element binding cleared below is
    // the default array's and not some live mesh's.
    gl.bind_vertex_array(DEFAULT_HANDLE);
    gl.bind_buffer(BufferTarget::Array, DEFAULT_HANDLE);
    gl.bind_buffer(BufferTarget::ElementArray, DEFAULT_HANDLE);
    gl.bind_renderbuffer(DEFAULT_HANDLE);
    gl.bind_framebuffer(DEFAULT_HANDLE);
}

/// Drain the error queue, returning what was pending.
pub fn clear_errors(gl: &dyn GlApi) -> Vec<u32> {
    let mut errors = Vec::new();
    loop {
        let code = gl.get_error();
        if code == gl::NO_ERROR {
            break;
        }
        errors.push(code);
        // A lost context reports errors forever.
        if errors.len() >= 64 {
            break;
        }
    }
    if !errors.is_empty() {
        warn!(?errors, "discarded pending GL errors");
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessGl;
    use std::rc::Rc;

    fn context() -> (Rc<HeadlessGl>, Context) {
        let gl = Rc::new(HeadlessGl::new());
        let ctx: Context = gl.clone();
        (gl, ctx)
    }

    #[test]
    fn guard_restores_previous_occupant() {
        let (gl, ctx) = context();
        let outer = gl.gen_framebuffer();
        let inner = gl.gen_framebuffer();

        let a = BindingGuard::bind(&ctx, BindingPoint::Framebuffer, outer);
        {
            let b = BindingGuard::bind(&ctx, BindingPoint::Framebuffer, inner);
            assert_eq!(b.previous(), outer);
            assert_eq!(gl.get_binding(BindingPoint::Framebuffer), inner);
        }
        assert_eq!(gl.get_binding(BindingPoint::Framebuffer), outer);
        a.unbind();
        assert_eq!(gl.get_binding(BindingPoint::Framebuffer), DEFAULT_HANDLE);
    }

    #[test]
    fn texture_guard_restores_on_its_own_unit() {
        let (gl, ctx) = context();
        let first = gl.gen_texture();
        let second = gl.gen_texture();

        let guard = BindingGuard::bind(&ctx, BindingPoint::Texture2d, first);
        gl.active_texture(2);
        gl.bind_texture_2d(second);
        guard.unbind();

        assert_eq!(gl.texture_on_unit(0), DEFAULT_HANDLE);
        assert_eq!(gl.texture_on_unit(2), second);
        assert_eq!(gl.active_texture_unit(), 2);
    }

    #[test]
    fn reset_returns_everything_to_default() {
        let (gl, ctx) = context();
        let vao = gl.gen_vertex_array();
        let vbo = gl.gen_buffer();
        let tex = gl.gen_texture();
        let fbo = gl.gen_framebuffer();
        gl.bind_vertex_array(vao);
        gl.bind_buffer(BufferTarget::Array, vbo);
        gl.active_texture(5);
        gl.bind_texture_2d(tex);
        gl.bind_framebuffer(fbo);

        assert!(!SavedBindings::save(ctx.as_ref()).is_default());
        reset_bindings(ctx.as_ref());
        assert!(SavedBindings::save(ctx.as_ref()).is_default());
        assert_eq!(gl.texture_on_unit(5), DEFAULT_HANDLE);
    }

    #[test]
    fn saved_bindings_round_trip() {
        let (gl, ctx) = context();
        let vbo = gl.gen_buffer();
        let rbo = gl.gen_renderbuffer();
        gl.bind_buffer(BufferTarget::Array, vbo);
        gl.bind_renderbuffer(rbo);
        gl.viewport(0, 0, 800, 600);

        let saved = SavedBindings::save(ctx.as_ref());
        reset_bindings(ctx.as_ref());
        gl.viewport(0, 0, 1, 1);
        saved.restore(ctx.as_ref());

        assert_eq!(SavedBindings::save(ctx.as_ref()), saved);
    }

    #[test]
    fn clear_errors_drains_queue() {
        let (gl, ctx) = context();
        gl.bind_vertex_array(999);
        gl.bind_framebuffer(999);
        assert_eq!(
            clear_errors(ctx.as_ref()),
            vec![gl::INVALID_OPERATION, gl::INVALID_OPERATION]
        );
        assert!(clear_errors(ctx.as_ref()).is_empty());
    }
}
