//! Framebuffer objects.
//!
//! A framebuffer only refers to its attachments. The textures and
//! renderbuffers attached to it are owned elsewhere and must stay alive
//! while the framebuffer renders into them; [`crate::RenderTarget`] bundles
//! the three so this holds by construction.

use std::collections::BTreeMap;

use glkit_core::{
    Attachment, BindingGuard, BindingPoint, Context, FramebufferStatus, GlApi, Handle,
    DEFAULT_HANDLE,
};
use tracing::{debug, trace, warn};

use crate::error::FramebufferError;
use crate::renderbuffer::Renderbuffer;
use crate::texture::Texture;

/// What sits at one attachment point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attached {
    Texture(Handle),
    Renderbuffer(Handle),
}

pub struct Framebuffer {
    ctx: Context,
    handle: Handle,
    attachments: BTreeMap<Attachment, Attached>,
}

impl Framebuffer {
    pub fn new(ctx: &Context) -> Self {
        let handle = ctx.gen_framebuffer();
        debug!(handle, "created framebuffer");
        Self {
            ctx: ctx.clone(),
            handle,
            attachments: BTreeMap::new(),
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn attachment(&self, attachment: Attachment) -> Option<Attached> {
        self.attachments.get(&attachment).copied()
    }

    pub fn attachments(&self) -> impl Iterator<Item = (Attachment, Attached)> + '_ {
        self.attachments.iter().map(|(&k, &v)| (k, v))
    }

    /// Make this the draw target until the returned binding drops. The
    /// binding is also how attachments are made.
    pub fn bind(&mut self) -> FramebufferBinding<'_> {
        trace!(handle = self.handle, "bind framebuffer");
        let guard = BindingGuard::bind(&self.ctx, BindingPoint::Framebuffer, self.handle);
        FramebufferBinding {
            framebuffer: self,
            guard,
        }
    }

    /// Bind briefly and check completeness.
    pub fn check_complete(&mut self) -> Result<(), FramebufferError> {
        self.bind().check_complete()
    }

    /// Delete the GL object now rather than at end of scope.
    pub fn release(self) {}
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.ctx.delete_framebuffer(self.handle);
        debug!(handle = self.handle, "deleted framebuffer");
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("handle", &self.handle)
            .field("attachments", &self.attachments)
            .finish()
    }
}

/// A framebuffer while it is the current draw target.
#[must_use = "dropping the binding immediately restores the previous framebuffer"]
pub struct FramebufferBinding<'a> {
    framebuffer: &'a mut Framebuffer,
    guard: BindingGuard,
}

impl FramebufferBinding<'_> {
    pub fn handle(&self) -> Handle {
        self.framebuffer.handle
    }

    pub fn attach_texture(&mut self, attachment: Attachment, texture: &Texture) {
        self.framebuffer
            .ctx
            .framebuffer_texture_2d(attachment, texture.handle());
        self.record(attachment, Attached::Texture(texture.handle()));
    }

    pub fn attach_renderbuffer(&mut self, attachment: Attachment, renderbuffer: &Renderbuffer) {
        self.framebuffer
            .ctx
            .framebuffer_renderbuffer(attachment, renderbuffer.handle());
        self.record(attachment, Attached::Renderbuffer(renderbuffer.handle()));
    }

    /// Remove whatever sits at `attachment`.
    pub fn detach(&mut self, attachment: Attachment) {
        let ctx = &self.framebuffer.ctx;
        match self.framebuffer.attachments.remove(&attachment) {
            Some(Attached::Texture(_)) => ctx.framebuffer_texture_2d(attachment, DEFAULT_HANDLE),
            Some(Attached::Renderbuffer(_)) => {
                ctx.framebuffer_renderbuffer(attachment, DEFAULT_HANDLE)
            }
            None => {}
        }
    }

    fn record(&mut self, attachment: Attachment, attached: Attached) {
        debug!(
            framebuffer = self.framebuffer.handle,
            ?attachment,
            ?attached,
            "attached"
        );
        self.framebuffer.attachments.insert(attachment, attached);
    }

    pub fn status(&self) -> FramebufferStatus {
        self.framebuffer.ctx.check_framebuffer_status()
    }

    /// `Ok` when the framebuffer can be rendered to. Incompleteness is
    /// logged and returned; the binding stays usable either way.
    pub fn check_complete(&self) -> Result<(), FramebufferError> {
        let status = self.status();
        if status.is_complete() {
            return Ok(());
        }
        warn!(framebuffer = self.handle(), ?status, "framebuffer is not complete");
        Err(FramebufferError::Incomplete(status))
    }

    /// Restore the previous framebuffer now.
    pub fn unbind(self) {
        self.guard.unbind();
    }
}

impl std::fmt::Debug for FramebufferBinding<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramebufferBinding")
            .field("framebuffer", &self.framebuffer.handle)
            .field("previous", &self.guard.previous())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::headless;
    use glkit_core::PixelFormat;

    #[test]
    fn colour_and_depth_stencil_is_complete() {
        let (_gl, ctx) = headless();
        let colour = Texture::render_target(&ctx, 800, 600, PixelFormat::Rgb).expect("texture");
        let depth = Renderbuffer::depth_stencil(&ctx, 800, 600).expect("renderbuffer");
        let mut fbo = Framebuffer::new(&ctx);

        let mut bound = fbo.bind();
        colour.attach_to(&mut bound, Attachment::Color(0));
        depth.attach(&mut bound, Attachment::DepthStencil);
        assert_eq!(bound.status(), FramebufferStatus::Complete);
        assert!(bound.check_complete().is_ok());
        bound.unbind();

        assert_eq!(
            fbo.attachment(Attachment::Color(0)),
            Some(Attached::Texture(colour.handle()))
        );
    }

    #[test]
    fn missing_colour_attachment_is_incomplete() {
        let (_gl, ctx) = headless();
        let depth = Renderbuffer::depth_stencil(&ctx, 800, 600).expect("renderbuffer");
        let mut fbo = Framebuffer::new(&ctx);
        {
            let mut bound = fbo.bind();
            depth.attach(&mut bound, Attachment::DepthStencil);
        }

        let err = fbo.check_complete().unwrap_err();
        assert!(matches!(err, FramebufferError::Incomplete(status) if !status.is_complete()));
    }

    #[test]
    fn detaching_colour_makes_it_incomplete() {
        let (_gl, ctx) = headless();
        let colour = Texture::render_target(&ctx, 64, 64, PixelFormat::Rgba).expect("texture");
        let depth = Renderbuffer::depth_stencil(&ctx, 64, 64).expect("renderbuffer");
        let mut fbo = Framebuffer::new(&ctx);

        let mut bound = fbo.bind();
        bound.attach_texture(Attachment::Color(0), &colour);
        bound.attach_renderbuffer(Attachment::DepthStencil, &depth);
        assert!(bound.check_complete().is_ok());

        bound.detach(Attachment::Color(0));
        assert!(bound.check_complete().is_err());
        drop(bound);
        assert_eq!(fbo.attachment(Attachment::Color(0)), None);
    }

    #[test]
    fn empty_framebuffer_is_incomplete() {
        let (_gl, ctx) = headless();
        let mut fbo = Framebuffer::new(&ctx);
        assert!(matches!(
            fbo.check_complete(),
            Err(FramebufferError::Incomplete(FramebufferStatus::MissingAttachment))
        ));
    }

    #[test]
    fn bind_then_unbind_restores_screen() {
        let (gl, ctx) = headless();
        let mut fbo = Framebuffer::new(&ctx);
        let handle = fbo.handle();

        let bound = fbo.bind();
        assert_eq!(gl.get_binding(BindingPoint::Framebuffer), handle);
        bound.unbind();
        assert_eq!(gl.get_binding(BindingPoint::Framebuffer), DEFAULT_HANDLE);
    }
}
