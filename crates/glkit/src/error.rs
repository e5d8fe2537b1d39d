//! Error types returned at the construction boundaries of the wrappers.

use std::path::PathBuf;

use glkit_core::{FramebufferStatus, PixelFormat, ShaderStage};
use thiserror::Error;

/// Failure to produce a usable texture.
#[derive(Debug, Error)]
pub enum TextureError {
    /// The image file could not be opened or decoded.
    #[error("failed to decode image '{}': {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("texture dimensions {width}x{height} are invalid")]
    InvalidDimensions { width: u32, height: u32 },
    /// Pixel data does not cover `width * height * channels` bytes.
    #[error("{format:?} pixel data is {actual} bytes, expected {expected}")]
    DataSize {
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
}

/// Failure to build a shader program.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("{stage} shader failed to compile: {log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("shader program failed to link: {log}")]
    Link { log: String },
}

/// Failure to produce a renderable framebuffer.
#[derive(Debug, Error)]
pub enum FramebufferError {
    #[error("framebuffer is not complete: {0:?}")]
    Incomplete(FramebufferStatus),
    #[error("failed to allocate color attachment: {0}")]
    ColorAttachment(#[from] TextureError),
    #[error("renderbuffer dimensions {width}x{height} are invalid")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Misuse of a vertex array's buffer/layout sequence.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("a layout was declared before any vertex buffer was linked")]
    MissingVertexBuffer,
    #[error("vertex array has no layout; declare one before drawing")]
    MissingLayout,
}
