//! Typed stand-ins for the GL enums the wrapper layer passes around.
//!
//! Each enum converts to its raw `GLenum` with `gl_enum()`. Conversions only
//! read constants, so they work without a loaded context.

use gl::types::{GLbitfield, GLenum, GLint, GLuint};

/// Opaque GPU object name.
pub type Handle = GLuint;

/// The name every binding point falls back to: "nothing bound", or the
/// screen for framebuffers.
pub const DEFAULT_HANDLE: Handle = 0;

/// Buffer binding targets used by the wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex data (`GL_ARRAY_BUFFER`).
    Array,
    /// Index data (`GL_ELEMENT_ARRAY_BUFFER`).
    ElementArray,
}

impl BufferTarget {
    pub fn gl_enum(self) -> GLenum {
        match self {
            BufferTarget::Array => gl::ARRAY_BUFFER,
            BufferTarget::ElementArray => gl::ELEMENT_ARRAY_BUFFER,
        }
    }

    /// The binding point this target occupies.
    pub fn binding_point(self) -> BindingPoint {
        match self {
            BufferTarget::Array => BindingPoint::ArrayBuffer,
            BufferTarget::ElementArray => BindingPoint::ElementArrayBuffer,
        }
    }
}

/// Global "currently bound X" slots of the GL state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingPoint {
    ArrayBuffer,
    /// Stored inside the bound vertex array, not globally.
    ElementArrayBuffer,
    VertexArray,
    /// 2D texture binding of the active texture unit.
    Texture2d,
    Framebuffer,
    Renderbuffer,
    Program,
}

impl BindingPoint {
    /// The `glGetIntegerv` name that reports this slot's occupant.
    pub fn query_enum(self) -> GLenum {
        match self {
            BindingPoint::ArrayBuffer => gl::ARRAY_BUFFER_BINDING,
            BindingPoint::ElementArrayBuffer => gl::ELEMENT_ARRAY_BUFFER_BINDING,
            BindingPoint::VertexArray => gl::VERTEX_ARRAY_BINDING,
            BindingPoint::Texture2d => gl::TEXTURE_BINDING_2D,
            BindingPoint::Framebuffer => gl::FRAMEBUFFER_BINDING,
            BindingPoint::Renderbuffer => gl::RENDERBUFFER_BINDING,
            BindingPoint::Program => gl::CURRENT_PROGRAM,
        }
    }
}

/// Named slot on a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attachment {
    Color(u32),
    Depth,
    Stencil,
    DepthStencil,
}

impl Attachment {
    pub fn gl_enum(self) -> GLenum {
        match self {
            Attachment::Color(index) => gl::COLOR_ATTACHMENT0 + index,
            Attachment::Depth => gl::DEPTH_ATTACHMENT,
            Attachment::Stencil => gl::STENCIL_ATTACHMENT,
            Attachment::DepthStencil => gl::DEPTH_STENCIL_ATTACHMENT,
        }
    }

    pub fn is_color(self) -> bool {
        matches!(self, Attachment::Color(_))
    }
}

/// Uncompressed 8-bit-per-channel texture formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Red,
    Rg,
    Rgb,
    Rgba,
}

impl PixelFormat {
    /// Pick the upload format for a decoded image's channel count.
    pub fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(PixelFormat::Red),
            2 => Some(PixelFormat::Rg),
            3 => Some(PixelFormat::Rgb),
            4 => Some(PixelFormat::Rgba),
            _ => None,
        }
    }

    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Red => 1,
            PixelFormat::Rg => 2,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }

    /// Client-side pixel layout passed as `format` to `glTexImage2D`.
    pub fn gl_format(self) -> GLenum {
        match self {
            PixelFormat::Red => gl::RED,
            PixelFormat::Rg => gl::RG,
            PixelFormat::Rgb => gl::RGB,
            PixelFormat::Rgba => gl::RGBA,
        }
    }

    /// Sized storage format passed as `internalformat`.
    pub fn gl_internal_format(self) -> GLint {
        (match self {
            PixelFormat::Red => gl::R8,
            PixelFormat::Rg => gl::RG8,
            PixelFormat::Rgb => gl::RGB8,
            PixelFormat::Rgba => gl::RGBA8,
        }) as GLint
    }

    /// Bytes needed for a tightly packed `width` x `height` image.
    pub fn byte_len(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.channels()
    }
}

/// Renderbuffer storage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderbufferFormat {
    Depth24Stencil8,
    DepthComponent24,
    StencilIndex8,
    Rgba8,
}

impl RenderbufferFormat {
    pub fn gl_enum(self) -> GLenum {
        match self {
            RenderbufferFormat::Depth24Stencil8 => gl::DEPTH24_STENCIL8,
            RenderbufferFormat::DepthComponent24 => gl::DEPTH_COMPONENT24,
            RenderbufferFormat::StencilIndex8 => gl::STENCIL_INDEX8,
            RenderbufferFormat::Rgba8 => gl::RGBA8,
        }
    }

    /// Whether storage of this format may sit at `attachment`.
    pub fn fits(self, attachment: Attachment) -> bool {
        match (self, attachment) {
            (RenderbufferFormat::Rgba8, Attachment::Color(_)) => true,
            (RenderbufferFormat::Depth24Stencil8, Attachment::DepthStencil)
            | (RenderbufferFormat::Depth24Stencil8, Attachment::Depth)
            | (RenderbufferFormat::Depth24Stencil8, Attachment::Stencil) => true,
            (RenderbufferFormat::DepthComponent24, Attachment::Depth) => true,
            (RenderbufferFormat::StencilIndex8, Attachment::Stencil) => true,
            _ => false,
        }
    }
}

/// Texture coordinate wrapping mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wrap {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

impl Wrap {
    pub fn gl_enum(self) -> GLenum {
        match self {
            Wrap::Repeat => gl::REPEAT,
            Wrap::MirroredRepeat => gl::MIRRORED_REPEAT,
            Wrap::ClampToEdge => gl::CLAMP_TO_EDGE,
            Wrap::ClampToBorder => gl::CLAMP_TO_BORDER,
        }
    }
}

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl Filter {
    pub fn gl_enum(self) -> GLenum {
        match self {
            Filter::Nearest => gl::NEAREST,
            Filter::Linear => gl::LINEAR,
            Filter::NearestMipmapNearest => gl::NEAREST_MIPMAP_NEAREST,
            Filter::LinearMipmapNearest => gl::LINEAR_MIPMAP_NEAREST,
            Filter::NearestMipmapLinear => gl::NEAREST_MIPMAP_LINEAR,
            Filter::LinearMipmapLinear => gl::LINEAR_MIPMAP_LINEAR,
        }
    }

    /// Mipmap filters are only valid for minification.
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, Filter::Nearest | Filter::Linear)
    }
}

/// A single `glTexParameteri` call on the bound 2D texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexParameter {
    WrapS(Wrap),
    WrapT(Wrap),
    MinFilter(Filter),
    MagFilter(Filter),
}

impl TexParameter {
    /// `(pname, param)` pair for `glTexParameteri`.
    pub fn gl_pair(self) -> (GLenum, GLint) {
        match self {
            TexParameter::WrapS(w) => (gl::TEXTURE_WRAP_S, w.gl_enum() as GLint),
            TexParameter::WrapT(w) => (gl::TEXTURE_WRAP_T, w.gl_enum() as GLint),
            TexParameter::MinFilter(f) => (gl::TEXTURE_MIN_FILTER, f.gl_enum() as GLint),
            TexParameter::MagFilter(f) => (gl::TEXTURE_MAG_FILTER, f.gl_enum() as GLint),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn gl_enum(self) -> GLenum {
        match self {
            ShaderStage::Vertex => gl::VERTEX_SHADER,
            ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Result of `glCheckFramebufferStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    Complete,
    Undefined,
    IncompleteAttachment,
    MissingAttachment,
    IncompleteDrawBuffer,
    IncompleteReadBuffer,
    Unsupported,
    IncompleteMultisample,
    Other(GLenum),
}

impl FramebufferStatus {
    pub fn from_gl(status: GLenum) -> Self {
        match status {
            gl::FRAMEBUFFER_COMPLETE => FramebufferStatus::Complete,
            gl::FRAMEBUFFER_UNDEFINED => FramebufferStatus::Undefined,
            gl::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => FramebufferStatus::IncompleteAttachment,
            gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => FramebufferStatus::MissingAttachment,
            gl::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => FramebufferStatus::IncompleteDrawBuffer,
            gl::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => FramebufferStatus::IncompleteReadBuffer,
            gl::FRAMEBUFFER_UNSUPPORTED => FramebufferStatus::Unsupported,
            gl::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => FramebufferStatus::IncompleteMultisample,
            other => FramebufferStatus::Other(other),
        }
    }

    pub fn is_complete(self) -> bool {
        self == FramebufferStatus::Complete
    }
}

/// Buffers cleared by [`crate::GlApi::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClearMask(GLbitfield);

impl ClearMask {
    pub const COLOR: ClearMask = ClearMask(gl::COLOR_BUFFER_BIT);
    pub const DEPTH: ClearMask = ClearMask(gl::DEPTH_BUFFER_BIT);
    pub const STENCIL: ClearMask = ClearMask(gl::STENCIL_BUFFER_BIT);

    pub fn bits(self) -> GLbitfield {
        self.0
    }

    pub fn contains(self, other: ClearMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ClearMask {
    type Output = ClearMask;

    fn bitor(self, rhs: ClearMask) -> ClearMask {
        ClearMask(self.0 | rhs.0)
    }
}

/// Primitive assembly mode for non-indexed and indexed draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    Lines,
}

impl Primitive {
    pub fn gl_enum(self) -> GLenum {
        match self {
            Primitive::Triangles => gl::TRIANGLES,
            Primitive::Lines => gl::LINES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_count_selects_format() {
        assert_eq!(PixelFormat::from_channels(1), Some(PixelFormat::Red));
        assert_eq!(PixelFormat::from_channels(3), Some(PixelFormat::Rgb));
        assert_eq!(PixelFormat::from_channels(4), Some(PixelFormat::Rgba));
        assert_eq!(PixelFormat::from_channels(5), None);
        assert_eq!(PixelFormat::Rgb.byte_len(3, 2), 18);
    }

    #[test]
    fn color_attachments_are_offset_from_zero() {
        assert_eq!(Attachment::Color(0).gl_enum(), gl::COLOR_ATTACHMENT0);
        assert_eq!(Attachment::Color(2).gl_enum(), gl::COLOR_ATTACHMENT2);
        assert!(!Attachment::DepthStencil.is_color());
    }

    #[test]
    fn depth_stencil_storage_fits_depth_slots_only() {
        let f = RenderbufferFormat::Depth24Stencil8;
        assert!(f.fits(Attachment::DepthStencil));
        assert!(f.fits(Attachment::Depth));
        assert!(!f.fits(Attachment::Color(0)));
        assert!(!RenderbufferFormat::Rgba8.fits(Attachment::Depth));
    }

    #[test]
    fn framebuffer_status_round_trips_known_codes() {
        assert!(FramebufferStatus::from_gl(gl::FRAMEBUFFER_COMPLETE).is_complete());
        assert_eq!(
            FramebufferStatus::from_gl(gl::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT),
            FramebufferStatus::MissingAttachment
        );
        assert_eq!(FramebufferStatus::from_gl(0x1234), FramebufferStatus::Other(0x1234));
    }

    #[test]
    fn clear_mask_combines_bits() {
        let mask = ClearMask::COLOR | ClearMask::DEPTH;
        assert!(mask.contains(ClearMask::COLOR));
        assert!(mask.contains(ClearMask::DEPTH));
        assert!(!mask.contains(ClearMask::STENCIL));
    }
}
