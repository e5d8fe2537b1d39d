//! Per-frame context helpers.

use glkit_core::{ClearMask, Context};

/// Clear the bound framebuffer's `mask` buffers, colour to `color`.
pub fn clear(ctx: &Context, color: [f32; 4], mask: ClearMask) {
    ctx.clear_color(color);
    ctx.clear(mask);
}

/// Map normalized device coordinates to the whole `width` x `height`
/// surface.
pub fn set_viewport(ctx: &Context, width: u32, height: u32) {
    ctx.viewport(0, 0, width as i32, height as i32);
}

/// Viewport of the bound surface as `(x, y, width, height)`.
pub fn viewport(ctx: &Context) -> [i32; 4] {
    ctx.get_viewport()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::Framebuffer;
    use crate::testing::headless;

    #[test]
    fn clear_targets_the_bound_framebuffer() {
        let (gl, ctx) = headless();
        let mut fbo = Framebuffer::new(&ctx);
        {
            let _bound = fbo.bind();
            clear(&ctx, [0.1, 0.1, 0.1, 1.0], ClearMask::COLOR | ClearMask::DEPTH);
        }
        clear(&ctx, [1.0; 4], ClearMask::COLOR);

        let clears = gl.clears();
        assert_eq!(clears.len(), 2);
        assert_eq!(clears[0].0, fbo.handle());
        assert!(clears[0].1.contains(ClearMask::DEPTH));
        assert_eq!(clears[1].0, 0);
        assert_eq!(gl.last_clear_color(), [1.0; 4]);
    }

    #[test]
    fn viewport_covers_the_surface() {
        let (_gl, ctx) = headless();
        set_viewport(&ctx, 800, 600);
        assert_eq!(viewport(&ctx), [0, 0, 800, 600]);
    }
}
