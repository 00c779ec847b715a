//! GPU copies of transfer function lookup tables.

use vpt_core::{Release, TransferFunction};

use crate::error::RenderResult;
use crate::gpu::GpuContext;
use crate::texture::GpuTexture;

/// An RGBA8 transfer function sampled as a filterable `texture_2d<f32>`.
#[derive(Debug)]
pub struct TransferFunctionTexture {
    texture: GpuTexture,
}

impl TransferFunctionTexture {
    pub fn new(gpu: &GpuContext, transfer_function: &TransferFunction) -> RenderResult<Self> {
        let texture = GpuTexture::new_2d(
            &gpu.device,
            "Transfer Function",
            transfer_function.width(),
            transfer_function.height(),
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        )?;
        texture.write(&gpu.queue, transfer_function.as_bytes())?;
        Ok(Self { texture })
    }

    /// Overwrites the table in place when the size matches.
    ///
    /// Returns `false` without uploading when the size differs.
    pub fn update(&self, gpu: &GpuContext, transfer_function: &TransferFunction) -> RenderResult<bool> {
        if self.texture.width() != transfer_function.width()
            || self.texture.height() != transfer_function.height()
        {
            return Ok(false);
        }
        self.texture.write(&gpu.queue, transfer_function.as_bytes())?;
        Ok(true)
    }

    pub fn view(&self) -> &wgpu::TextureView {
        self.texture.view()
    }
}

impl Release for TransferFunctionTexture {
    fn release(self) {
        self.texture.release();
    }
}
