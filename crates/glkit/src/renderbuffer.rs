//! Renderbuffer objects, used as depth/stencil targets.

use glkit_core::{
    Attachment, BindingGuard, BindingPoint, Context, GlApi, Handle, RenderbufferFormat,
};
use tracing::debug;

use crate::error::FramebufferError;
use crate::framebuffer::FramebufferBinding;

pub struct Renderbuffer {
    ctx: Context,
    handle: Handle,
    width: u32,
    height: u32,
    format: RenderbufferFormat,
}

impl Renderbuffer {
    pub fn new(
        ctx: &Context,
        width: u32,
        height: u32,
        format: RenderbufferFormat,
    ) -> Result<Self, FramebufferError> {
        if width == 0 || height == 0 {
            return Err(FramebufferError::InvalidDimensions { width, height });
        }
        let handle = ctx.gen_renderbuffer();
        {
            let _bound = BindingGuard::bind(ctx, BindingPoint::Renderbuffer, handle);
            ctx.renderbuffer_storage(format, width, height);
        }
        debug!(handle, width, height, ?format, "created renderbuffer");
        Ok(Self {
            ctx: ctx.clone(),
            handle,
            width,
            height,
            format,
        })
    }

    /// Combined 24-bit depth and 8-bit stencil.
    pub fn depth_stencil(ctx: &Context, width: u32, height: u32) -> Result<Self, FramebufferError> {
        Self::new(ctx, width, height, RenderbufferFormat::Depth24Stencil8)
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> RenderbufferFormat {
        self.format
    }

    pub fn bind(&self) -> BindingGuard {
        BindingGuard::bind(&self.ctx, BindingPoint::Renderbuffer, self.handle)
    }

    /// Attach to the bound framebuffer at `attachment`.
    pub fn attach(&self, framebuffer: &mut FramebufferBinding<'_>, attachment: Attachment) {
        framebuffer.attach_renderbuffer(attachment, self);
    }

    /// Delete the GL object now rather than at end of scope.
    pub fn release(self) {}
}

impl Drop for Renderbuffer {
    fn drop(&mut self) {
        self.ctx.delete_renderbuffer(self.handle);
        debug!(handle = self.handle, "deleted renderbuffer");
    }
}

impl std::fmt::Debug for Renderbuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderbuffer")
            .field("handle", &self.handle)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::headless;
    use glkit_core::DEFAULT_HANDLE;

    #[test]
    fn bind_then_unbind_restores_default() {
        let (gl, ctx) = headless();
        let rbo = Renderbuffer::depth_stencil(&ctx, 800, 600).expect("renderbuffer");
        assert_eq!(gl.get_binding(BindingPoint::Renderbuffer), DEFAULT_HANDLE);

        let bound = rbo.bind();
        assert_eq!(gl.get_binding(BindingPoint::Renderbuffer), rbo.handle());
        bound.unbind();
        assert_eq!(gl.get_binding(BindingPoint::Renderbuffer), DEFAULT_HANDLE);
    }

    #[test]
    fn zero_size_is_rejected() {
        let (gl, ctx) = headless();
        assert!(Renderbuffer::depth_stencil(&ctx, 0, 600).is_err());
        assert_eq!(gl.live_objects(), 0);
    }
}
