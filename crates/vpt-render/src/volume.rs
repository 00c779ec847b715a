//! Density volumes sampled by the renderers.

use std::sync::OnceLock;

use vpt_core::{Dimensions, Release, VptError};

use crate::error::RenderResult;
use crate::gpu::GpuContext;
use crate::texture::GpuTexture;

/// A 3D scalar field bound as a filterable `texture_3d<f32>`.
///
/// Sources may become ready after they are handed to a renderer; until
/// [`VolumeSource::view`] returns a view the renderer skips its frames.
pub trait VolumeSource: Send + Sync {
    fn dimensions(&self) -> Dimensions;

    /// The sampled view, or `None` while the data is still loading.
    fn view(&self) -> Option<&wgpu::TextureView>;

    fn is_ready(&self) -> bool {
        self.view().is_some()
    }
}

/// An 8-bit normalized density volume.
#[derive(Debug)]
pub struct DensityVolume {
    dimensions: Dimensions,
    texture: OnceLock<GpuTexture>,
}

impl DensityVolume {
    /// A volume whose data arrives later through [`DensityVolume::upload`].
    pub fn pending(dimensions: Dimensions) -> RenderResult<Self> {
        dimensions.validate()?;
        Ok(Self {
            dimensions,
            texture: OnceLock::new(),
        })
    }

    /// Creates and uploads a volume in one step.
    pub fn from_bytes(gpu: &GpuContext, dimensions: Dimensions, data: &[u8]) -> RenderResult<Self> {
        let volume = Self::pending(dimensions)?;
        volume.upload(gpu, data)?;
        Ok(volume)
    }

    /// Uploads the voxel data, one byte per voxel in x-fastest order.
    ///
    /// A volume accepts data once.
    pub fn upload(&self, gpu: &GpuContext, data: &[u8]) -> RenderResult<()> {
        if self.texture.get().is_some() {
            return Err(VptError::InvalidConfig("volume data already uploaded".into()).into());
        }
        if data.len() != self.dimensions.voxel_count() {
            return Err(VptError::SizeMismatch {
                expected: self.dimensions.voxel_count(),
                actual: data.len(),
            }
            .into());
        }

        let texture = GpuTexture::new_3d(
            &gpu.device,
            "Density Volume",
            self.dimensions,
            wgpu::TextureFormat::R8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        )?;
        texture.write(&gpu.queue, data)?;
        log::info!("uploaded {} density volume", self.dimensions);

        // A concurrent upload that won the race keeps its texture.
        if let Err(texture) = self.texture.set(texture) {
            texture.release();
            return Err(VptError::InvalidConfig("volume data already uploaded".into()).into());
        }
        Ok(())
    }
}

impl VolumeSource for DensityVolume {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn view(&self) -> Option<&wgpu::TextureView> {
        self.texture.get().map(GpuTexture::view)
    }
}
