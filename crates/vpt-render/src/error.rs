//! Rendering error types.

use thiserror::Error;
use vpt_core::VptError;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Texture creation failed.
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),

    /// A texture format the operation cannot handle.
    #[error("unsupported texture format: {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),

    /// Readback buffer mapping failed.
    #[error("GPU buffer mapping failed")]
    BufferMapFailed,

    /// Pixel data did not match the image size.
    #[error("invalid image data")]
    InvalidImageData,

    /// Image encoding error.
    #[error("image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    /// File output error.
    #[error("failed to write file: {0}")]
    IoError(#[from] std::io::Error),

    /// Renderer state or parameter error.
    #[error(transparent)]
    Core(#[from] VptError),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
