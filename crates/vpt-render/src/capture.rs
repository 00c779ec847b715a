//! Offscreen output targets and image readback.

use std::path::Path;

use image::{ImageBuffer, Rgba};
use vpt_core::Release;

use crate::error::{RenderError, RenderResult};
use crate::gpu::GpuContext;
use crate::texture::GpuTexture;

/// Format of [`CaptureTarget`] and of every readback.
pub const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn aligned_bytes_per_row(width: u32) -> u32 {
    let unaligned = width * 4; // RGBA8
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

/// An RGBA8 texture renderers can present into and that can be read back.
#[derive(Debug)]
pub struct CaptureTarget {
    texture: GpuTexture,
}

impl CaptureTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> RenderResult<Self> {
        let texture = GpuTexture::new_2d(
            device,
            "Capture Target",
            width,
            height,
            CAPTURE_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        )?;
        Ok(Self { texture })
    }

    pub fn view(&self) -> &wgpu::TextureView {
        self.texture.view()
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    /// Reads the texture back as tightly packed RGBA8 rows.
    pub fn read_pixels(&self, gpu: &GpuContext) -> RenderResult<Vec<u8>> {
        read_rgba8(gpu, self.texture.texture())
    }

    /// Reads the texture back and writes it as PNG or JPEG.
    pub fn save(&self, gpu: &GpuContext, path: impl AsRef<Path>) -> RenderResult<()> {
        let pixels = self.read_pixels(gpu)?;
        save_image(path, &pixels, self.width(), self.height())
    }
}

impl Release for CaptureTarget {
    fn release(self) {
        self.texture.release();
    }
}

/// Copies an RGBA8 texture into host memory, blocking until the GPU is done.
pub fn read_rgba8(gpu: &GpuContext, texture: &wgpu::Texture) -> RenderResult<Vec<u8>> {
    if !matches!(
        texture.format(),
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb
    ) {
        return Err(RenderError::UnsupportedFormat(texture.format()));
    }

    let (width, height) = (texture.width(), texture.height());
    let bytes_per_row = aligned_bytes_per_row(width);
    let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("capture readback buffer"),
        size: u64::from(bytes_per_row) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("capture copy encoder"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let buffer_slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    gpu.wait_idle();
    rx.recv()
        .map_err(|_| RenderError::BufferMapFailed)?
        .map_err(|_| RenderError::BufferMapFailed)?;

    // Copy data, removing row padding
    let data = buffer_slice.get_mapped_range();
    let row_bytes = (width * 4) as usize;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height {
        let start = (row * bytes_per_row) as usize;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    drop(data);
    buffer.unmap();
    buffer.destroy();

    Ok(pixels)
}

/// Saves RGBA8 pixel data; the format follows the extension (png, jpg, jpeg).
pub fn save_image(path: impl AsRef<Path>, data: &[u8], width: u32, height: u32) -> RenderResult<()> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(width, height, data.to_vec()).ok_or(RenderError::InvalidImageData)?;

    match extension.as_str() {
        "png" => img.save_with_format(path, image::ImageFormat::Png)?,
        "jpg" | "jpeg" => {
            let rgb_img = image::DynamicImage::ImageRgba8(img).to_rgb8();
            rgb_img.save_with_format(path, image::ImageFormat::Jpeg)?;
        }
        _ => {
            return Err(RenderError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("unsupported image format: {extension}"),
            )))
        }
    }
    log::info!("saved {width}x{height} capture to {}", path.display());
    Ok(())
}

/// Encodes RGBA8 pixel data as PNG in memory.
pub fn encode_png(data: &[u8], width: u32, height: u32) -> RenderResult<Vec<u8>> {
    let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(width, height, data.to_vec()).ok_or(RenderError::InvalidImageData)?;
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_row_alignment() {
        assert_eq!(aligned_bytes_per_row(1), 256);
        assert_eq!(aligned_bytes_per_row(64), 256);
        assert_eq!(aligned_bytes_per_row(65), 512);
    }

    proptest! {
        #[test]
        fn prop_row_alignment_covers_row(width in 1u32..8192) {
            let aligned = aligned_bytes_per_row(width);
            prop_assert!(aligned >= width * 4);
            prop_assert_eq!(aligned % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);
            prop_assert!(aligned - width * 4 < wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        }
    }

    #[test]
    fn test_encode_png_signature() {
        let png = encode_png(&[255; 2 * 2 * 4], 2, 2).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn test_encode_rejects_short_data() {
        assert!(matches!(
            encode_png(&[0; 7], 2, 2),
            Err(RenderError::InvalidImageData)
        ));
    }

    #[test]
    fn test_save_rejects_unknown_extension() {
        let dir = std::env::temp_dir().join("vpt-capture-test.bmpx");
        assert!(save_image(&dir, &[0; 4], 1, 1).is_err());
    }
}
