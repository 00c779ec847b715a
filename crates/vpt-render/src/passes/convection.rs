//! Convection pass: propagates light energy through the light field.
//!
//! One pipeline per light type; both share a bind group layout and the
//! same WGSL module.

use vpt_core::{Light, LightType};

use super::{compute_pipeline, linear_sampler, sampler_entry, storage_entry, texture_entry, uniform_entry};
use crate::buffer::{create_uniform_buffer, update_uniform_buffer};
use crate::light_field::{LightField, FIELD_FORMAT};

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct ConvectionUniforms {
    /// Light direction (distant) or position in normalized volume space (point).
    pub light: [f32; 4],
    /// Light-field grid size in xyz, upwind iterations in w.
    pub size: [u32; 4],
    pub absorption: f32,
    pub _pad: [f32; 3],
}

impl ConvectionUniforms {
    pub fn new(light: &Light, grid: [u32; 3], steps: u32, absorption: f32) -> Self {
        let v = light.kernel_vector();
        Self {
            light: [v.x, v.y, v.z, 0.0],
            size: [grid[0], grid[1], grid[2], steps],
            absorption,
            _pad: [0.0; 3],
        }
    }
}

pub struct ConvectionPass {
    distant: wgpu::ComputePipeline,
    point: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
}

impl ConvectionPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Convection Bind Group Layout"),
            entries: &[
                storage_entry(0, wgpu::StorageTextureAccess::ReadWrite, FIELD_FORMAT),
                // Volume
                texture_entry(
                    1,
                    wgpu::ShaderStages::COMPUTE,
                    wgpu::TextureViewDimension::D3,
                    true,
                ),
                // Transfer function
                texture_entry(
                    2,
                    wgpu::ShaderStages::COMPUTE,
                    wgpu::TextureViewDimension::D2,
                    true,
                ),
                sampler_entry(3, wgpu::ShaderStages::COMPUTE, wgpu::SamplerBindingType::Filtering),
                uniform_entry(4, wgpu::ShaderStages::COMPUTE),
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Convection Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/convection.wgsl").into()),
        });

        let distant = compute_pipeline(
            device,
            "Convection Pipeline (distant)",
            &shader,
            &bind_group_layout,
            "convect_distant",
        );
        let point = compute_pipeline(
            device,
            "Convection Pipeline (point)",
            &shader,
            &bind_group_layout,
            "convect_point",
        );

        let uniform_buffer = create_uniform_buffer(
            device,
            &ConvectionUniforms::new(&Light::default(), [1, 1, 1], 1, 0.0),
            Some("Convection Uniform Buffer"),
        );

        Self {
            distant,
            point,
            bind_group_layout,
            uniform_buffer,
            sampler: linear_sampler(device, "Convection Sampler"),
        }
    }

    fn pipeline(&self, light_type: LightType) -> &wgpu::ComputePipeline {
        match light_type {
            LightType::Distant => &self.distant,
            LightType::Point => &self.point,
        }
    }

    /// Records one convection dispatch updating `light_field` in place.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        light_field: &LightField,
        volume: &wgpu::TextureView,
        transfer_function: &wgpu::TextureView,
        light: &Light,
        steps: u32,
        absorption: f32,
    ) {
        let layout = light_field.layout();
        let uniforms = ConvectionUniforms::new(light, layout.grid().to_array(), steps, absorption);
        update_uniform_buffer(queue, &self.uniform_buffer, &uniforms);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Convection Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(light_field.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(volume),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(transfer_function),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let [x, y, z] = layout.workgroups();
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Convection Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(self.pipeline(light.light_type));
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(x, y, z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpt_core::Vec3;

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<ConvectionUniforms>(), 48);
    }

    #[test]
    fn test_uniforms_pack_grid_and_steps() {
        let light = Light::new(LightType::Distant, Vec3::new(0.0, 2.0, 0.0)).unwrap();
        let uniforms = ConvectionUniforms::new(&light, [64, 64, 32], 5, 0.5);
        assert_eq!(uniforms.size, [64, 64, 32, 5]);
        // distant lights are normalized
        assert_eq!(uniforms.light, [0.0, 1.0, 0.0, 0.0]);
    }
}
