//! Offscreen colour + depth/stencil render target.

use glkit_core::{Attachment, Context, PixelFormat, RenderbufferFormat};
use tracing::info;

use crate::error::FramebufferError;
use crate::framebuffer::{Framebuffer, FramebufferBinding};
use crate::renderbuffer::Renderbuffer;
use crate::texture::Texture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetConfig {
    pub width: u32,
    pub height: u32,
    pub color_format: PixelFormat,
    /// `None` renders without depth or stencil testing storage.
    pub depth_stencil: Option<RenderbufferFormat>,
}

impl Default for RenderTargetConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            color_format: PixelFormat::Rgb,
            depth_stencil: Some(RenderbufferFormat::Depth24Stencil8),
        }
    }
}

impl RenderTargetConfig {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }
}

/// Attachment point a renderbuffer of `format` goes to.
fn attachment_for(format: RenderbufferFormat) -> Attachment {
    match format {
        RenderbufferFormat::Depth24Stencil8 => Attachment::DepthStencil,
        RenderbufferFormat::DepthComponent24 => Attachment::Depth,
        RenderbufferFormat::StencilIndex8 => Attachment::Stencil,
        RenderbufferFormat::Rgba8 => Attachment::Color(1),
    }
}

/// A framebuffer with an empty colour texture at colour attachment 0 and an
/// optional depth/stencil renderbuffer, checked complete at construction.
///
/// Render into it through [`bind`](Self::bind), then sample
/// [`color`](Self::color) in a later pass.
pub struct RenderTarget {
    // Declared first so it is deleted before its attachments.
    framebuffer: Framebuffer,
    color: Texture,
    depth_stencil: Option<Renderbuffer>,
    config: RenderTargetConfig,
    ctx: Context,
}

impl RenderTarget {
    pub fn new(ctx: &Context, config: RenderTargetConfig) -> Result<Self, FramebufferError> {
        let color = Texture::render_target(ctx, config.width, config.height, config.color_format)?;
        let depth_stencil = config
            .depth_stencil
            .map(|format| Renderbuffer::new(ctx, config.width, config.height, format))
            .transpose()?;

        let mut framebuffer = Framebuffer::new(ctx);
        {
            let mut bound = framebuffer.bind();
            color.attach_to(&mut bound, Attachment::Color(0));
            if let Some(renderbuffer) = &depth_stencil {
                renderbuffer.attach(&mut bound, attachment_for(renderbuffer.format()));
            }
            bound.check_complete()?;
        }

        info!(
            framebuffer = framebuffer.handle(),
            width = config.width,
            height = config.height,
            "render target ready"
        );
        Ok(Self {
            framebuffer,
            color,
            depth_stencil,
            config,
            ctx: ctx.clone(),
        })
    }

    pub fn config(&self) -> &RenderTargetConfig {
        &self.config
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// The texture the target renders into.
    pub fn color(&self) -> &Texture {
        &self.color
    }

    pub fn depth_stencil(&self) -> Option<&Renderbuffer> {
        self.depth_stencil.as_ref()
    }

    /// Make the target current for drawing until the binding drops.
    pub fn bind(&mut self) -> FramebufferBinding<'_> {
        self.framebuffer.bind()
    }

    /// Reallocate every attachment at the new size. On error the target is
    /// left as it was.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), FramebufferError> {
        if (width, height) == self.size() {
            return Ok(());
        }
        let config = RenderTargetConfig {
            width,
            height,
            ..self.config
        };
        *self = Self::new(&self.ctx, config)?;
        Ok(())
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("framebuffer", &self.framebuffer)
            .field("color", &self.color)
            .field("depth_stencil", &self.depth_stencil)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::Attached;
    use crate::testing::headless;
    use glkit_core::{BindingPoint, GlApi, DEFAULT_HANDLE};

    #[test]
    fn default_target_is_complete() {
        let (gl, ctx) = headless();
        let mut target = RenderTarget::new(&ctx, RenderTargetConfig::default()).expect("target");
        assert_eq!(target.color().size(), (800, 600));
        assert_eq!(
            target.framebuffer().attachment(Attachment::DepthStencil),
            target.depth_stencil().map(|rb| Attached::Renderbuffer(rb.handle()))
        );
        assert_eq!(gl.get_binding(BindingPoint::Framebuffer), DEFAULT_HANDLE);

        let bound = target.bind();
        assert!(bound.check_complete().is_ok());
        assert_eq!(gl.get_binding(BindingPoint::Framebuffer), bound.handle());
    }

    #[test]
    fn colour_only_target_is_complete() {
        let (_gl, ctx) = headless();
        let config = RenderTargetConfig {
            depth_stencil: None,
            ..RenderTargetConfig::with_size(64, 64)
        };
        let target = RenderTarget::new(&ctx, config).expect("target");
        assert!(target.depth_stencil().is_none());
    }

    #[test]
    fn zero_size_reports_colour_error() {
        let (gl, ctx) = headless();
        let err = RenderTarget::new(&ctx, RenderTargetConfig::with_size(0, 0)).unwrap_err();
        assert!(matches!(err, FramebufferError::ColorAttachment(_)));
        assert_eq!(gl.live_objects(), 0);
    }

    #[test]
    fn resize_replaces_every_object() {
        let (gl, ctx) = headless();
        let mut target = RenderTarget::new(&ctx, RenderTargetConfig::default()).expect("target");
        let old_color = target.color().handle();

        target.resize(1024, 768).expect("resize");
        assert_eq!(target.size(), (1024, 768));
        assert_eq!(target.color().query_size(), (1024, 768));
        assert!(!gl.exists(old_color));
        assert_eq!(gl.live_objects(), 3);
    }

    #[test]
    fn debug_output_names_the_attachments() {
        let (_gl, ctx) = headless();
        let target =
            RenderTarget::new(&ctx, RenderTargetConfig::with_size(16, 16)).expect("target");
        let printed = format!("{target:?}");
        assert!(printed.starts_with("RenderTarget"));
        assert!(printed.contains("depth_stencil"));
    }

    #[test]
    fn failed_resize_keeps_the_old_target() {
        let (_gl, ctx) = headless();
        let mut target = RenderTarget::new(&ctx, RenderTargetConfig::default()).expect("target");
        assert!(target.resize(0, 768).is_err());
        assert_eq!(target.size(), (800, 600));
    }
}
