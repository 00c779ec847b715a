//! Diffusion pass: spreads light-field energy into the diffusion field.

use super::{compute_pipeline, storage_entry, texture_entry, uniform_entry};
use crate::buffer::{create_uniform_buffer, update_uniform_buffer};
use crate::light_field::{DiffusionField, LightField, FIELD_FORMAT};

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct DiffusionUniforms {
    pub size: [u32; 4],
    pub scattering: f32,
    pub _pad: [f32; 3],
}

impl DiffusionUniforms {
    pub fn new(grid: [u32; 3], scattering: f32) -> Self {
        Self {
            size: [grid[0], grid[1], grid[2], 0],
            scattering,
            _pad: [0.0; 3],
        }
    }
}

pub struct DiffusionPass {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
}

impl DiffusionPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Diffusion Bind Group Layout"),
            entries: &[
                // Light field, read with textureLoad
                texture_entry(
                    0,
                    wgpu::ShaderStages::COMPUTE,
                    wgpu::TextureViewDimension::D3,
                    false,
                ),
                storage_entry(1, wgpu::StorageTextureAccess::WriteOnly, FIELD_FORMAT),
                uniform_entry(2, wgpu::ShaderStages::COMPUTE),
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Diffusion Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/diffusion.wgsl").into()),
        });

        let pipeline = compute_pipeline(device, "Diffusion Pipeline", &shader, &bind_group_layout, "diffuse");

        let uniform_buffer = create_uniform_buffer(
            device,
            &DiffusionUniforms::new([1, 1, 1], 0.0),
            Some("Diffusion Uniform Buffer"),
        );

        Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
        }
    }

    pub fn record(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        light_field: &LightField,
        diffusion_field: &DiffusionField,
        scattering: f32,
    ) {
        let layout = diffusion_field.layout();
        let uniforms = DiffusionUniforms::new(layout.grid().to_array(), scattering);
        update_uniform_buffer(queue, &self.uniform_buffer, &uniforms);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Diffusion Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(light_field.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(diffusion_field.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let [x, y, z] = layout.workgroups();
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Diffusion Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(x, y, z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<DiffusionUniforms>(), 32);
        assert_eq!(DiffusionUniforms::new([4, 5, 6], 0.5).size, [4, 5, 6, 0]);
    }
}
