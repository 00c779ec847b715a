//! Light-field and diffusion-field volumes of the convection-diffusion renderer.
//!
//! Both are single-channel `R32Float` 3D textures on the downsampled grid
//! described by a [`LightFieldLayout`]. The light field is updated in place
//! by the convection kernel; the diffusion field is rewritten from it.

use vpt_core::{LightFieldLayout, Release};

use crate::error::RenderResult;
use crate::texture::GpuTexture;

pub const FIELD_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

fn field_usage() -> wgpu::TextureUsages {
    wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
}

/// Per-voxel light energy `E` reaching each grid cell.
#[derive(Debug)]
pub struct LightField {
    layout: LightFieldLayout,
    texture: GpuTexture,
}

impl LightField {
    /// A zero-initialized field on `layout`'s grid.
    pub fn new(device: &wgpu::Device, layout: LightFieldLayout) -> RenderResult<Self> {
        let texture = GpuTexture::new_3d(device, "Light Field", layout.grid(), FIELD_FORMAT, field_usage())?;
        Ok(Self { layout, texture })
    }

    pub fn layout(&self) -> LightFieldLayout {
        self.layout
    }

    pub fn view(&self) -> &wgpu::TextureView {
        self.texture.view()
    }
}

impl Release for LightField {
    fn release(self) {
        self.texture.release();
    }
}

/// Scattered energy `D` derived from the light field's neighborhood.
#[derive(Debug)]
pub struct DiffusionField {
    layout: LightFieldLayout,
    texture: GpuTexture,
}

impl DiffusionField {
    pub fn new(device: &wgpu::Device, layout: LightFieldLayout) -> RenderResult<Self> {
        let texture = GpuTexture::new_3d(device, "Diffusion Field", layout.grid(), FIELD_FORMAT, field_usage())?;
        Ok(Self { layout, texture })
    }

    pub fn layout(&self) -> LightFieldLayout {
        self.layout
    }

    pub fn view(&self) -> &wgpu::TextureView {
        self.texture.view()
    }
}

impl Release for DiffusionField {
    fn release(self) {
        self.texture.release();
    }
}
