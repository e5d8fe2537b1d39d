//! 2D textures: decoded image assets and empty render targets.

use std::path::{Path, PathBuf};

use glkit_core::{
    Attachment, BindingGuard, BindingPoint, Context, Filter, GlApi, Handle, PixelFormat,
    TexParameter, Wrap,
};
use image::DynamicImage;
use tracing::{debug, trace, warn};

use crate::error::TextureError;
use crate::framebuffer::FramebufferBinding;
use crate::shader::ProgramInUse;

/// Sampling and upload options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureParams {
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    /// Flip decoded images so the first row is the bottom one, as GL
    /// texture coordinates expect.
    pub flip_vertically: bool,
    pub generate_mipmaps: bool,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            wrap_s: Wrap::Repeat,
            wrap_t: Wrap::Repeat,
            min_filter: Filter::LinearMipmapLinear,
            mag_filter: Filter::Linear,
            flip_vertically: true,
            generate_mipmaps: true,
        }
    }
}

impl TextureParams {
    /// Linear, clamped, single level.
    pub fn render_target() -> Self {
        Self {
            wrap_s: Wrap::ClampToEdge,
            wrap_t: Wrap::ClampToEdge,
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            flip_vertically: false,
            generate_mipmaps: false,
        }
    }

    fn parameters(&self) -> [TexParameter; 4] {
        [
            TexParameter::WrapS(self.wrap_s),
            TexParameter::WrapT(self.wrap_t),
            TexParameter::MinFilter(self.min_filter),
            TexParameter::MagFilter(self.mag_filter),
        ]
    }
}

/// A 2D texture and the storage it was allocated with.
pub struct Texture {
    ctx: Context,
    handle: Handle,
    width: u32,
    height: u32,
    format: PixelFormat,
    params: TextureParams,
    source: Option<PathBuf>,
}

impl Texture {
    /// Decode the image at `path` and upload it.
    ///
    /// Nothing is allocated on the GL side when decoding fails.
    pub fn from_file(
        ctx: &Context,
        path: impl AsRef<Path>,
        params: TextureParams,
    ) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|source| {
            warn!(path = %path.display(), error = %source, "failed to load texture");
            TextureError::Decode {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let mut texture = Self::from_image(ctx, image, params)?;
        texture.source = Some(path.to_path_buf());
        Ok(texture)
    }

    /// Upload an already decoded image.
    ///
    /// The pixel format follows the channel count: 1 is `Red`, 2 is `Rg`,
    /// 3 is `Rgb`, anything else is converted to `Rgba`. Wider channel types
    /// are narrowed to 8 bits.
    pub fn from_image(
        ctx: &Context,
        image: DynamicImage,
        params: TextureParams,
    ) -> Result<Self, TextureError> {
        let image = if params.flip_vertically {
            image.flipv()
        } else {
            image
        };
        let (width, height) = (image.width(), image.height());
        let format =
            PixelFormat::from_channels(image.color().channel_count()).unwrap_or(PixelFormat::Rgba);
        let pixels = match format {
            PixelFormat::Red => image.into_luma8().into_raw(),
            PixelFormat::Rg => image.into_luma_alpha8().into_raw(),
            PixelFormat::Rgb => image.into_rgb8().into_raw(),
            PixelFormat::Rgba => image.into_rgba8().into_raw(),
        };
        Self::from_pixels(ctx, width, height, format, &pixels, params)
    }

    /// Upload tightly packed 8-bit rows, first row at the bottom.
    pub fn from_pixels(
        ctx: &Context,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: &[u8],
        params: TextureParams,
    ) -> Result<Self, TextureError> {
        check_dimensions(width, height)?;
        let expected = format.byte_len(width, height);
        if pixels.len() != expected {
            return Err(TextureError::DataSize {
                format,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self::allocate(ctx, width, height, format, Some(pixels), params))
    }

    /// Allocate storage with no content, for use as a colour attachment.
    pub fn render_target(
        ctx: &Context,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self, TextureError> {
        check_dimensions(width, height)?;
        Ok(Self::allocate(
            ctx,
            width,
            height,
            format,
            None,
            TextureParams::render_target(),
        ))
    }

    fn allocate(
        ctx: &Context,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Option<&[u8]>,
        params: TextureParams,
    ) -> Self {
        let handle = ctx.gen_texture();
        {
            let _bound = BindingGuard::bind(ctx, BindingPoint::Texture2d, handle);
            for parameter in params.parameters() {
                ctx.tex_parameter(parameter);
            }
            ctx.tex_image_2d(format, width, height, pixels);
            if params.generate_mipmaps && pixels.is_some() {
                ctx.generate_mipmap();
            }
        }
        debug!(
            handle,
            width,
            height,
            ?format,
            empty = pixels.is_none(),
            "created texture"
        );
        Self {
            ctx: ctx.clone(),
            handle,
            width,
            height,
            format,
            params,
            source: None,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn params(&self) -> &TextureParams {
        &self.params
    }

    /// File the texture was decoded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Bind on the active texture unit until the guard drops.
    pub fn bind(&self) -> BindingGuard {
        BindingGuard::bind(&self.ctx, BindingPoint::Texture2d, self.handle)
    }

    /// Bind to texture unit `unit` and leave it there for the next draw.
    ///
    /// The active unit is left at `unit`.
    pub fn activate(&self, unit: u32) {
        trace!(handle = self.handle, unit, "activate texture");
        self.ctx.active_texture(unit);
        self.ctx.bind_texture_2d(self.handle);
    }

    /// [`activate`](Self::activate), then point sampler `name` of the
    /// current program at `unit`.
    pub fn activate_sampler(&self, program: &ProgramInUse<'_>, name: &str, unit: u32) {
        self.activate(unit);
        program.set_int(name, unit as i32);
    }

    /// Make this texture the render target at `attachment` of the bound
    /// framebuffer.
    pub fn attach_to(&self, framebuffer: &mut FramebufferBinding<'_>, attachment: Attachment) {
        framebuffer.attach_texture(attachment, self);
    }

    /// Level 0 size as reported by GL.
    pub fn query_size(&self) -> (u32, u32) {
        let _bound = self.bind();
        self.ctx.texture_size(0)
    }

    /// Read level 0 back in the texture's own format.
    pub fn read_pixels(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.format.byte_len(self.width, self.height)];
        let _bound = self.bind();
        self.ctx.get_tex_image(self.format, &mut out);
        out
    }

    /// Delete the GL object now rather than at end of scope.
    pub fn release(self) {}
}

fn check_dimensions(width: u32, height: u32) -> Result<(), TextureError> {
    if width == 0 || height == 0 || width > i32::MAX as u32 || height > i32::MAX as u32 {
        return Err(TextureError::InvalidDimensions { width, height });
    }
    Ok(())
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.ctx.delete_texture(self.handle);
        debug!(handle = self.handle, "deleted texture");
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.handle)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{headless, program};
    use glkit_core::headless::UniformValue;
    use glkit_core::DEFAULT_HANDLE;
    use image::{Rgba, RgbaImage};

    const PIXELS: [[u8; 4]; 4] = [
        [255, 0, 0, 255],
        [0, 255, 0, 255],
        [0, 0, 255, 255],
        [255, 255, 255, 128],
    ];

    fn write_png(dir: &tempfile::TempDir) -> PathBuf {
        let mut img = RgbaImage::new(2, 2);
        for (i, pixel) in PIXELS.iter().enumerate() {
            img.put_pixel(i as u32 % 2, i as u32 / 2, Rgba(*pixel));
        }
        let path = dir.path().join("checker.png");
        img.save(&path).expect("write png");
        path
    }

    #[test]
    fn png_round_trips_through_upload() {
        let (gl, ctx) = headless();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_png(&dir);
        let params = TextureParams {
            flip_vertically: false,
            ..TextureParams::default()
        };

        let texture = Texture::from_file(&ctx, &path, params).expect("decode");
        assert_eq!(texture.format(), PixelFormat::Rgba);
        assert_eq!(texture.query_size(), (2, 2));
        assert_eq!(texture.read_pixels(), PIXELS.concat());
        assert_eq!(texture.source(), Some(path.as_path()));

        let info = gl.texture_info(texture.handle()).expect("texture info");
        assert!(info.mipmapped);
        assert!(info
            .parameters
            .contains(&TexParameter::MinFilter(Filter::LinearMipmapLinear)));
        assert_eq!(gl.get_binding(BindingPoint::Texture2d), DEFAULT_HANDLE);
    }

    #[test]
    fn flip_reverses_rows() {
        let (_gl, ctx) = headless();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_png(&dir);

        let texture = Texture::from_file(&ctx, &path, TextureParams::default()).expect("decode");
        let expected = [PIXELS[2], PIXELS[3], PIXELS[0], PIXELS[1]].concat();
        assert_eq!(texture.read_pixels(), expected);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let (gl, ctx) = headless();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.png");

        let err = Texture::from_file(&ctx, &path, TextureParams::default()).unwrap_err();
        match err {
            TextureError::Decode { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(gl.live_objects(), 0);
    }

    #[test]
    fn format_follows_channel_count() {
        let (_gl, ctx) = headless();
        let params = TextureParams {
            generate_mipmaps: false,
            ..TextureParams::default()
        };
        let gray = DynamicImage::ImageLuma8(image::GrayImage::new(4, 4));
        let rgb = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        let rgb16 = DynamicImage::ImageRgb16(image::ImageBuffer::new(4, 4));

        assert_eq!(
            Texture::from_image(&ctx, gray, params).expect("gray").format(),
            PixelFormat::Red
        );
        assert_eq!(
            Texture::from_image(&ctx, rgb, params).expect("rgb").format(),
            PixelFormat::Rgb
        );
        let wide = Texture::from_image(&ctx, rgb16, params).expect("rgb16");
        assert_eq!(wide.format(), PixelFormat::Rgb);
        assert_eq!(wide.read_pixels().len(), 4 * 4 * 3);
    }

    #[test]
    fn pixel_data_size_is_checked() {
        let (_gl, ctx) = headless();
        let err = Texture::from_pixels(
            &ctx,
            2,
            2,
            PixelFormat::Rgb,
            &[0; 10],
            TextureParams::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TextureError::DataSize {
                expected: 12,
                actual: 10,
                ..
            }
        ));
    }

    #[test]
    fn render_target_has_storage_but_no_content() {
        let (gl, ctx) = headless();
        let texture = Texture::render_target(&ctx, 800, 600, PixelFormat::Rgb).expect("target");
        let info = gl.texture_info(texture.handle()).expect("texture info");
        assert_eq!((info.width, info.height), (800, 600));
        assert!(!info.has_content);
        assert!(!info.mipmapped);
        assert!(Texture::render_target(&ctx, 0, 600, PixelFormat::Rgb).is_err());
    }

    #[test]
    fn activate_sampler_binds_unit_and_sets_uniform() {
        let (gl, ctx) = headless();
        let shader = program(&ctx);
        let texture = Texture::render_target(&ctx, 4, 4, PixelFormat::Rgba).expect("target");

        let in_use = shader.use_program();
        texture.activate_sampler(&in_use, "screenTexture", 3);
        assert_eq!(gl.texture_on_unit(3), texture.handle());
        assert_eq!(
            gl.uniform(shader.handle(), "screenTexture"),
            Some(UniformValue::Int(3))
        );
    }

    #[test]
    fn bind_then_unbind_restores_default() {
        let (gl, ctx) = headless();
        let texture = Texture::render_target(&ctx, 4, 4, PixelFormat::Rgba).expect("target");
        let bound = texture.bind();
        assert_eq!(gl.get_binding(BindingPoint::Texture2d), texture.handle());
        bound.unbind();
        assert_eq!(gl.get_binding(BindingPoint::Texture2d), DEFAULT_HANDLE);
    }

    #[test]
    fn guard_survives_activation_on_another_unit() {
        let (gl, ctx) = headless();
        let first = Texture::render_target(&ctx, 4, 4, PixelFormat::Rgba).expect("target");
        let second = Texture::render_target(&ctx, 4, 4, PixelFormat::Rgba).expect("target");

        let bound = first.bind();
        second.activate(2);
        bound.unbind();

        assert_eq!(gl.texture_on_unit(0), DEFAULT_HANDLE);
        assert_eq!(gl.texture_on_unit(2), second.handle());
        assert_eq!(gl.active_texture_unit(), 2);
    }
}
