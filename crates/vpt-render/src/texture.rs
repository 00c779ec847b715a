//! Owned textures with explicit release.

use vpt_core::{Dimensions, Release};

use crate::error::{RenderError, RenderResult};

/// A texture together with its default view.
#[derive(Debug)]
pub struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl GpuTexture {
    /// Creates a 2D texture, checking the size against the device limits.
    pub fn new_2d(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> RenderResult<Self> {
        let max = device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderError::TextureCreationFailed(format!(
                "{label}: {width}x{height} outside 1..={max}"
            )));
        }
        Ok(Self::create(
            device,
            label,
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            wgpu::TextureDimension::D2,
            format,
            usage,
        ))
    }

    /// Creates a 3D texture, checking the size against the device limits.
    pub fn new_3d(
        device: &wgpu::Device,
        label: &str,
        dimensions: Dimensions,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> RenderResult<Self> {
        dimensions.validate()?;
        let max = device.limits().max_texture_dimension_3d;
        if dimensions.to_array().iter().any(|&d| d > max) {
            return Err(RenderError::TextureCreationFailed(format!(
                "{label}: {dimensions} exceeds {max}"
            )));
        }
        Ok(Self::create(
            device,
            label,
            wgpu::Extent3d {
                width: dimensions.width,
                height: dimensions.height,
                depth_or_array_layers: dimensions.depth,
            },
            wgpu::TextureDimension::D3,
            format,
            usage,
        ))
    }

    fn create(
        device: &wgpu::Device,
        label: &str,
        size: wgpu::Extent3d,
        dimension: wgpu::TextureDimension,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    /// Uploads tightly packed texel data covering the whole texture.
    pub fn write(&self, queue: &wgpu::Queue, data: &[u8]) -> RenderResult<()> {
        let size = self.texture.size();
        let texel = self
            .texture
            .format()
            .block_copy_size(None)
            .ok_or(RenderError::UnsupportedFormat(self.texture.format()))?;
        let expected = size.width as usize
            * size.height as usize
            * size.depth_or_array_layers as usize
            * texel as usize;
        if data.len() != expected {
            return Err(vpt_core::VptError::SizeMismatch {
                expected,
                actual: data.len(),
            }
            .into());
        }

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width * texel),
                rows_per_image: Some(size.height),
            },
            size,
        );
        Ok(())
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }
}

impl Release for GpuTexture {
    fn release(self) {
        self.texture.destroy();
    }
}
