//! Present pass: tone maps the accumulation target into the output view.

use vpt_core::ToneMappingConfig;

use super::{fullscreen_pipeline, texture_entry, uniform_entry};
use crate::buffer::{create_uniform_buffer, update_uniform_buffer};

/// GPU representation of the tone mapping uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct PresentUniforms {
    pub exposure: f32,
    pub white_level: f32,
    pub gamma: f32,
    pub _pad: f32,
}

impl From<ToneMappingConfig> for PresentUniforms {
    fn from(config: ToneMappingConfig) -> Self {
        Self {
            exposure: config.exposure,
            white_level: config.white_level,
            gamma: config.gamma,
            _pad: 0.0,
        }
    }
}

impl Default for PresentUniforms {
    fn default() -> Self {
        ToneMappingConfig::default().into()
    }
}

/// Tone mapping render resources.
pub struct PresentPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    output_format: wgpu::TextureFormat,
}

impl PresentPass {
    pub fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Present Bind Group Layout"),
            entries: &[
                // Accumulation texture, read with textureLoad
                texture_entry(
                    0,
                    wgpu::ShaderStages::FRAGMENT,
                    wgpu::TextureViewDimension::D2,
                    false,
                ),
                uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Present Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/present.wgsl").into()),
        });

        let pipeline = fullscreen_pipeline(
            device,
            "Present Pipeline",
            &shader,
            &bind_group_layout,
            output_format,
        );

        let uniform_buffer = create_uniform_buffer(
            device,
            &PresentUniforms::default(),
            Some("Present Uniform Buffer"),
        );

        Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            output_format,
        }
    }

    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.output_format
    }

    pub fn update_uniforms(&self, queue: &wgpu::Queue, config: ToneMappingConfig) {
        update_uniform_buffer(queue, &self.uniform_buffer, &PresentUniforms::from(config));
    }

    /// Tone maps `accumulation` into `output_view`.
    pub fn render(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        accumulation: &wgpu::TextureView,
        output_view: &wgpu::TextureView,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Present Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(accumulation),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });
        super::draw_fullscreen(encoder, "Present Pass", output_view, &self.pipeline, &bind_group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<PresentUniforms>(), 16);
    }

    #[test]
    fn test_uniforms_from_config() {
        let uniforms = PresentUniforms::from(ToneMappingConfig::new().with_exposure(2.0));
        assert_eq!(uniforms.exposure, 2.0);
        assert_eq!(uniforms.gamma, ToneMappingConfig::default().gamma);
    }
}
