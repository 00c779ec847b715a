//! Spectral renderer.
//!
//! Each frame traces one wavelength band per pixel with free-path sampling
//! against the majorant `extinction`, scatters once along a direction shared
//! by the whole frame, and looks up the environment. The running average
//! over frames converges to the spectrally integrated image.

use std::sync::Arc;

use vpt_core::{
    quantize_spectrum, Constraints, Dimensions, EngineConfig, FrameRng, FrameStages, Invalidation,
    Mat4, ParameterChange, ParameterDescriptor, ParameterKind, ParameterValue, Release,
    ResourceSlot, SpectralConfig, TransferFunction, Vec3, VptError,
};

use crate::buffer::{create_uniform_buffer, update_uniform_buffer};
use crate::engine::{FrameContext, RendererEngine, RendererStages};
use crate::error::{RenderError, RenderResult};
use crate::gpu::GpuContext;
use crate::passes::{fullscreen_pipeline, linear_sampler, sampler_entry, texture_entry, uniform_entry};
use crate::targets::TargetFormats;
use crate::texture::GpuTexture;

pub const EXTINCTION: &str = "extinction";
pub const LIGHT_SPECTRUM: &str = "light_spectrum";
pub const TRANSFER_FUNCTION: &str = "transfer_function";

/// Texel of the spectrum texture before any spectrum is set.
const UNSET_SPECTRUM: [u8; 4] = [0, 0, 0, 255];
const DEFAULT_ENVIRONMENT: [u8; 4] = [255, 255, 255, 255];

/// The parameter schema of the spectral renderer.
pub fn descriptors(config: &SpectralConfig) -> Vec<ParameterDescriptor> {
    let bands = config.spectrum_bands as usize;
    let size = config.transfer_function_size;
    vec![
        ParameterDescriptor::new(
            EXTINCTION,
            "Extinction",
            ParameterKind::Spinner,
            ParameterValue::Float(config.extinction),
            Invalidation::Accumulation,
        )
        .with_constraints(Constraints::none().with_min(0.0)),
        ParameterDescriptor::new(
            LIGHT_SPECTRUM,
            "Light spectrum",
            ParameterKind::Spectrum,
            ParameterValue::Floats(vec![0.0; bands]),
            Invalidation::Accumulation,
        )
        .with_constraints(Constraints::none().with_min(0.0).with_max(1.0).with_length(bands)),
        ParameterDescriptor::new(
            TRANSFER_FUNCTION,
            "Spectral transfer function",
            ParameterKind::SpectralTransferFunction,
            ParameterValue::Bytes(TransferFunction::linear_ramp(size, size).into_bytes()),
            Invalidation::Accumulation,
        )
        .with_constraints(Constraints::none().with_length(size as usize * size as usize * 4)),
    ]
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpectralGenerateUniforms {
    pub mvp_inverse: [[f32; 4]; 4],
    /// Scattering direction of this frame in xyz.
    pub scattering_direction: [f32; 4],
    /// Per-frame random seed in `[0, 1)`.
    pub offset: f32,
    /// Majorant extinction for free-path sampling.
    pub sigma_max: f32,
    /// Scale from transfer-function opacity to extinction.
    pub alpha_correction: f32,
    pub band_count: u32,
}

impl SpectralGenerateUniforms {
    pub fn new(mvp_inverse: Mat4, direction: Vec3, offset: f32, config: &SpectralConfig) -> Self {
        Self {
            mvp_inverse: mvp_inverse.to_cols_array_2d(),
            scattering_direction: [direction.x, direction.y, direction.z, 0.0],
            offset,
            sigma_max: config.extinction,
            alpha_correction: config.extinction,
            band_count: config.spectrum_bands,
        }
    }
}

/// Traces one spectral sample per pixel into the frame target.
pub struct SpectralGeneratePass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
}

impl SpectralGeneratePass {
    pub fn new(device: &wgpu::Device, frame_format: wgpu::TextureFormat) -> Self {
        let fragment = wgpu::ShaderStages::FRAGMENT;
        let d2 = wgpu::TextureViewDimension::D2;
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Spectral Generate Bind Group Layout"),
            entries: &[
                uniform_entry(0, fragment),
                // Volume
                texture_entry(1, fragment, wgpu::TextureViewDimension::D3, true),
                // Environment
                texture_entry(2, fragment, d2, true),
                // Spectral transfer function
                texture_entry(3, fragment, d2, true),
                // Light spectrum
                texture_entry(4, fragment, d2, true),
                sampler_entry(5, fragment, wgpu::SamplerBindingType::Filtering),
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Spectral Generate Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/spectral_generate.wgsl").into()),
        });

        let pipeline = fullscreen_pipeline(
            device,
            "Spectral Generate Pipeline",
            &shader,
            &bind_group_layout,
            frame_format,
        );

        let uniform_buffer = create_uniform_buffer(
            device,
            &SpectralGenerateUniforms::new(Mat4::IDENTITY, Vec3::Z, 0.0, &SpectralConfig::default()),
            Some("Spectral Generate Uniform Buffer"),
        );

        Self {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            sampler: linear_sampler(device, "Spectral Sampler"),
        }
    }

    pub fn render(
        &self,
        ctx: &mut FrameContext<'_>,
        environment: &wgpu::TextureView,
        spectrum: &wgpu::TextureView,
        uniforms: &SpectralGenerateUniforms,
    ) {
        update_uniform_buffer(&ctx.gpu.queue, &self.uniform_buffer, uniforms);

        let bind_group = ctx.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Spectral Generate Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(ctx.volume),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(environment),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(ctx.transfer_function),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(spectrum),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        crate::passes::draw_fullscreen(
            ctx.encoder,
            "Spectral Generate Pass",
            ctx.targets.frame_view(),
            &self.pipeline,
            &bind_group,
        );
    }
}

impl Release for SpectralGeneratePass {
    fn release(self) {
        drop(self);
    }
}

fn lookup_texture(gpu: &GpuContext, label: &str, width: u32, height: u32, rgba: &[u8]) -> RenderResult<GpuTexture> {
    let texture = GpuTexture::new_2d(
        &gpu.device,
        label,
        width,
        height,
        wgpu::TextureFormat::Rgba8Unorm,
        wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
    )?;
    texture.write(&gpu.queue, rgba)?;
    Ok(texture)
}

/// The spectral algorithm plugged into [`RendererEngine`].
pub struct SpectralStages {
    config: SpectralConfig,
    rng: FrameRng,
    generate: ResourceSlot<SpectralGeneratePass>,
    spectrum: ResourceSlot<GpuTexture>,
    environment: ResourceSlot<GpuTexture>,
    last_direction: Option<Vec3>,
}

impl SpectralStages {
    pub const FORMATS: TargetFormats = TargetFormats {
        frame: wgpu::TextureFormat::Rgba32Float,
        accumulation: wgpu::TextureFormat::Rgba32Float,
    };

    pub fn new(gpu: &GpuContext, config: SpectralConfig, seed: Option<u64>) -> RenderResult<Self> {
        config.validate()?;
        Self::FORMATS.ensure_supported(gpu)?;
        let spectrum = lookup_texture(gpu, "Light Spectrum", 1, 1, &UNSET_SPECTRUM)?;
        let environment = lookup_texture(gpu, "Environment", 1, 1, &DEFAULT_ENVIRONMENT)?;
        Ok(Self {
            generate: ResourceSlot::with(SpectralGeneratePass::new(&gpu.device, Self::FORMATS.frame)),
            config,
            rng: FrameRng::from_optional_seed(seed),
            spectrum: ResourceSlot::with(spectrum),
            environment: ResourceSlot::with(environment),
            last_direction: None,
        })
    }

    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }

    /// Scattering direction used by the last generate stage.
    pub fn last_direction(&self) -> Option<Vec3> {
        self.last_direction
    }

    /// Uploads a sampled light spectrum, one value in `[0, 1]` per band.
    pub fn upload_spectrum(&mut self, gpu: &GpuContext, bands: &[f32]) -> RenderResult<()> {
        let expected = self.config.spectrum_bands as usize;
        if bands.len() != expected {
            return Err(VptError::SizeMismatch {
                expected,
                actual: bands.len(),
            }
            .into());
        }
        let texels = quantize_spectrum(bands);
        let width = self.config.spectrum_bands;
        self.spectrum
            .replace_with(|| lookup_texture(gpu, "Light Spectrum", width, 1, &texels))?;
        Ok(())
    }

    /// Replaces the equirectangular environment map.
    pub fn upload_environment(&mut self, gpu: &GpuContext, width: u32, height: u32, rgba: &[u8]) -> RenderResult<()> {
        self.environment
            .replace_with(|| lookup_texture(gpu, "Environment", width, height, rgba))?;
        log::info!("environment map set ({width}x{height})");
        Ok(())
    }
}

impl RendererStages for SpectralStages {
    fn name(&self) -> &'static str {
        "spectral"
    }

    fn target_formats(&self) -> TargetFormats {
        Self::FORMATS
    }

    fn transfer_function_extent(&self) -> (u32, u32) {
        let size = self.config.transfer_function_size;
        (size, size)
    }

    fn descriptors(&self) -> Vec<ParameterDescriptor> {
        descriptors(&self.config)
    }

    fn apply(
        &mut self,
        gpu: &GpuContext,
        change: &ParameterChange,
        _volume: Option<Dimensions>,
    ) -> RenderResult<()> {
        let mismatch = |expected: &'static str| VptError::ParameterTypeMismatch {
            name: change.name.clone(),
            expected,
        };
        match change.name.as_str() {
            EXTINCTION => {
                self.config.extinction = change.value.as_f32().ok_or_else(|| mismatch("numeric"))?;
            }
            LIGHT_SPECTRUM => {
                let bands = change.value.as_floats().ok_or_else(|| mismatch("float array"))?;
                self.upload_spectrum(gpu, bands)?;
            }
            other => return Err(VptError::UnknownParameter(other.to_string()).into()),
        }
        Ok(())
    }

    fn prepare(&mut self, _gpu: &GpuContext, volume: Dimensions, _invalidation: Invalidation) -> RenderResult<()> {
        log::debug!("spectral renderer ready for {volume} volume");
        Ok(())
    }

    fn release(&mut self) {
        self.generate.release();
        self.spectrum.release();
        self.environment.release();
    }
}

impl<'a> FrameStages<FrameContext<'a>> for SpectralStages {
    type Error = RenderError;

    fn reset_frame(&mut self, ctx: &mut FrameContext<'a>) -> RenderResult<()> {
        ctx.reset_accumulation();
        Ok(())
    }

    fn generate_frame(&mut self, ctx: &mut FrameContext<'a>) -> RenderResult<()> {
        let generate = self.generate.get().ok_or(VptError::Destroyed)?;
        let spectrum = self.spectrum.get().ok_or(VptError::Destroyed)?;
        let environment = self.environment.get().ok_or(VptError::Destroyed)?;

        let direction = self.rng.scattering_direction();
        self.last_direction = Some(direction);
        let uniforms = SpectralGenerateUniforms::new(ctx.mvp_inverse, direction, self.rng.offset(), &self.config);
        generate.render(ctx, environment.view(), spectrum.view(), &uniforms);
        Ok(())
    }

    fn integrate_frame(&mut self, ctx: &mut FrameContext<'a>, weight: f32) -> RenderResult<()> {
        ctx.integrate(weight);
        Ok(())
    }

    fn present_frame(&mut self, ctx: &mut FrameContext<'a>) -> RenderResult<()> {
        ctx.present();
        Ok(())
    }
}

/// A spectral renderer.
pub type SpectralRenderer = RendererEngine<SpectralStages>;

impl RendererEngine<SpectralStages> {
    pub fn new(
        gpu: Arc<GpuContext>,
        engine: EngineConfig,
        config: SpectralConfig,
        output_format: wgpu::TextureFormat,
    ) -> RenderResult<Self> {
        let stages = SpectralStages::new(&gpu, config, engine.seed)?;
        Self::with_stages(gpu, engine, output_format, stages)
    }

    /// Sets the light spectrum and restarts accumulation.
    pub fn set_light_spectrum(&mut self, bands: &[f32]) -> RenderResult<()> {
        self.set_parameter(LIGHT_SPECTRUM, ParameterValue::Floats(bands.to_vec()))
            .map(|_| ())
    }

    /// Sets the equirectangular environment map and restarts accumulation.
    pub fn set_environment(&mut self, width: u32, height: u32, rgba: &[u8]) -> RenderResult<()> {
        if self.is_destroyed() {
            return Err(VptError::Destroyed.into());
        }
        let gpu = Arc::clone(self.gpu());
        self.stages_mut().upload_environment(&gpu, width, height, rgba)?;
        self.reset()
    }
}
