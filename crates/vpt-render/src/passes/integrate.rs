//! Integrate pass: folds the frame target into the running average.

use super::{fullscreen_pipeline, texture_entry, uniform_entry};
use crate::buffer::{create_uniform_buffer, update_uniform_buffer};
use crate::targets::RenderTargets;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct IntegrateUniforms {
    /// Blend weight of the new frame, `1 / N` for frame number `N`.
    pub weight: f32,
    pub _pad: [f32; 3],
}

impl IntegrateUniforms {
    pub fn new(weight: f32) -> Self {
        Self {
            weight,
            _pad: [0.0; 3],
        }
    }
}

pub struct IntegratePass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
}

impl IntegratePass {
    pub fn new(device: &wgpu::Device, accumulation_format: wgpu::TextureFormat) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Integrate Bind Group Layout"),
            entries: &[
                // Previous accumulation
                texture_entry(
                    0,
                    wgpu::ShaderStages::FRAGMENT,
                    wgpu::TextureViewDimension::D2,
                    false,
                ),
                // Frame
                texture_entry(
                    1,
                    wgpu::ShaderStages::FRAGMENT,
                    wgpu::TextureViewDimension::D2,
                    false,
                ),
                uniform_entry(2, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Integrate Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/integrate.wgsl").into()),
        });

        let pipeline = fullscreen_pipeline(
            device,
            "Integrate Pipeline",
            &shader,
            &bind_group_layout,
            accumulation_format,
        );

        let uniform_buffer = create_uniform_buffer(
            device,
            &IntegrateUniforms::new(1.0),
            Some("Integrate Uniform Buffer"),
        );

        Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
        }
    }

    /// Writes `mix(accumulation, frame, weight)` into the back accumulation
    /// buffer, then makes it the front one.
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        targets: &mut RenderTargets,
        weight: f32,
    ) {
        update_uniform_buffer(queue, &self.uniform_buffer, &IntegrateUniforms::new(weight));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Integrate Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(targets.accumulation_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(targets.frame_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });
        super::draw_fullscreen(
            encoder,
            "Integrate Pass",
            targets.back_accumulation_view(),
            &self.pipeline,
            &bind_group,
        );
        targets.swap_accumulation();
    }
}
