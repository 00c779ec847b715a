//! Off-screen frame and accumulation targets.

use vpt_core::{Release, VptError};

use crate::error::RenderResult;
use crate::gpu::GpuContext;
use crate::texture::GpuTexture;

/// Pixel formats of a renderer's off-screen targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormats {
    /// Format the generate pass writes.
    pub frame: wgpu::TextureFormat,
    /// Format of the running average.
    pub accumulation: wgpu::TextureFormat,
}

impl TargetFormats {
    /// Fails unless both formats can be rendered to on `gpu`.
    pub fn ensure_supported(self, gpu: &GpuContext) -> RenderResult<()> {
        gpu.ensure_renderable(self.frame)?;
        gpu.ensure_renderable(self.accumulation)
    }
}

/// The frame target plus a double-buffered accumulation target.
///
/// Integrate reads the front accumulation buffer and writes the back one,
/// then [`RenderTargets::swap_accumulation`] flips them.
#[derive(Debug)]
pub struct RenderTargets {
    width: u32,
    height: u32,
    formats: TargetFormats,
    frame: GpuTexture,
    accumulation: [GpuTexture; 2],
    front: usize,
}

impl RenderTargets {
    pub fn new(device: &wgpu::Device, width: u32, height: u32, formats: TargetFormats) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(VptError::InvalidTargetSize { width, height }.into());
        }

        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC;
        let frame = GpuTexture::new_2d(device, "Frame Target", width, height, formats.frame, usage)?;
        let accumulation = [
            GpuTexture::new_2d(
                device,
                "Accumulation Target A",
                width,
                height,
                formats.accumulation,
                usage,
            )?,
            GpuTexture::new_2d(
                device,
                "Accumulation Target B",
                width,
                height,
                formats.accumulation,
                usage,
            )?,
        ];

        Ok(Self {
            width,
            height,
            formats,
            frame,
            accumulation,
            front: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn formats(&self) -> TargetFormats {
        self.formats
    }

    pub fn frame(&self) -> &GpuTexture {
        &self.frame
    }

    pub fn frame_view(&self) -> &wgpu::TextureView {
        self.frame.view()
    }

    /// The buffer holding the current running average.
    pub fn accumulation(&self) -> &GpuTexture {
        &self.accumulation[self.front]
    }

    pub fn accumulation_view(&self) -> &wgpu::TextureView {
        self.accumulation().view()
    }

    pub fn back_accumulation_view(&self) -> &wgpu::TextureView {
        self.accumulation[1 - self.front].view()
    }

    pub fn swap_accumulation(&mut self) {
        self.front = 1 - self.front;
    }

    /// Clears both accumulation buffers.
    pub fn clear_accumulation(&mut self, encoder: &mut wgpu::CommandEncoder) {
        for buffer in &self.accumulation {
            crate::passes::clear(encoder, "Reset Accumulation", buffer.view());
        }
        self.front = 0;
    }
}

impl Release for RenderTargets {
    fn release(self) {
        let [a, b] = self.accumulation;
        self.frame.release();
        a.release();
        b.release();
    }
}
