//! The renderer engine shared by every progressive renderer.
//!
//! [`RendererEngine`] owns everything a renderer needs besides its own
//! algorithm: the off-screen targets, the transfer function, the camera, the
//! parameter schema and channel, and the [`FrameCycle`] that sequences the
//! reset/generate/integrate/present stages. The algorithm itself plugs in
//! through [`RendererStages`].

use std::sync::Arc;

use vpt_core::{
    parameter_channel, Dimensions, EngineConfig, FrameCycle, FrameStages, Invalidation,
    LightStep, Mat4, ParameterChange, ParameterDescriptor, ParameterKind, ParameterReceiver,
    ParameterSender, ParameterValue, PropertySchema, Release, ResourceSlot, ToneMappingConfig,
    TransferFunction, VptError,
};

use crate::error::{RenderError, RenderResult};
use crate::gpu::GpuContext;
use crate::passes::{IntegratePass, PresentPass};
use crate::targets::{RenderTargets, TargetFormats};
use crate::transfer_function::TransferFunctionTexture;
use crate::volume::VolumeSource;

/// Passes every renderer runs the same way.
pub struct CommonPasses {
    pub integrate: IntegratePass,
    pub present: PresentPass,
}

impl Release for CommonPasses {
    fn release(self) {
        drop(self);
    }
}

/// What a stage may touch while one frame is being recorded.
pub struct FrameContext<'a> {
    pub gpu: &'a GpuContext,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub targets: &'a mut RenderTargets,
    pub passes: &'a CommonPasses,
    pub volume: &'a wgpu::TextureView,
    pub volume_dimensions: Dimensions,
    pub transfer_function: &'a wgpu::TextureView,
    pub mvp_inverse: Mat4,
    pub output: &'a wgpu::TextureView,
}

impl FrameContext<'_> {
    /// Clears the accumulation buffers.
    pub fn reset_accumulation(&mut self) {
        self.targets.clear_accumulation(self.encoder);
    }

    /// Blends the frame target into the running average.
    pub fn integrate(&mut self, weight: f32) {
        self.passes.integrate.render(
            &self.gpu.device,
            &self.gpu.queue,
            self.encoder,
            self.targets,
            weight,
        );
    }

    /// Tone maps the running average into the output view.
    pub fn present(&mut self) {
        self.passes.present.render(
            &self.gpu.device,
            self.encoder,
            self.targets.accumulation_view(),
            self.output,
        );
    }
}

/// The algorithm-specific half of a renderer.
///
/// Implementations record their four stages into a [`FrameContext`] and
/// react to parameter changes and volume (re)initialization.
pub trait RendererStages: for<'a> FrameStages<FrameContext<'a>, Error = RenderError> {
    fn name(&self) -> &'static str;

    fn target_formats(&self) -> TargetFormats;

    /// Width and height of the transfer function this renderer samples.
    fn transfer_function_extent(&self) -> (u32, u32);

    fn default_transfer_function(&self) -> TransferFunction {
        let (width, height) = self.transfer_function_extent();
        TransferFunction::linear_ramp(width, height)
    }

    /// The tunables this renderer exposes, with their current values.
    fn descriptors(&self) -> Vec<ParameterDescriptor>;

    /// Applies an already validated change to the renderer's own state.
    ///
    /// Transfer function changes are handled by the engine and never reach
    /// this method.
    fn apply(
        &mut self,
        gpu: &GpuContext,
        change: &ParameterChange,
        volume: Option<Dimensions>,
    ) -> RenderResult<()>;

    /// Rejects volume dimensions the current settings cannot handle, before
    /// the volume is installed.
    fn check_volume(&self, _volume: Dimensions) -> RenderResult<()> {
        Ok(())
    }

    /// Rebuilds volume-dependent state. `invalidation` is
    /// [`Invalidation::LightField`] when a volume becomes ready.
    fn prepare(&mut self, gpu: &GpuContext, volume: Dimensions, invalidation: Invalidation) -> RenderResult<()>;

    /// Frees every GPU resource the stages own.
    fn release(&mut self);

    /// Which light-field passes the last generate stage recorded.
    fn light_step(&self) -> Option<LightStep> {
        None
    }
}

/// Summary of one [`RendererEngine::render`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// `false` when the frame was skipped because no volume is ready.
    pub rendered: bool,
    /// Progressive frame number that was integrated.
    pub frame_number: u32,
    /// Whether the accumulation was cleared first.
    pub cleared: bool,
    pub light_step: Option<LightStep>,
}

impl FrameReport {
    fn skipped(frame_number: u32) -> Self {
        Self {
            rendered: false,
            frame_number,
            cleared: false,
            light_step: None,
        }
    }
}

/// A progressive volume renderer.
pub struct RendererEngine<S: RendererStages> {
    gpu: Arc<GpuContext>,
    config: EngineConfig,
    cycle: FrameCycle,
    schema: PropertySchema,
    sender: ParameterSender,
    receiver: ParameterReceiver,
    volume: Option<Arc<dyn VolumeSource>>,
    prepared: bool,
    pending: Invalidation,
    transfer_function: ResourceSlot<TransferFunctionTexture>,
    targets: ResourceSlot<RenderTargets>,
    passes: ResourceSlot<CommonPasses>,
    mvp_inverse: Mat4,
    stages: S,
}

impl<S: RendererStages> RendererEngine<S> {
    /// Builds the shared resources around `stages`.
    ///
    /// `output_format` is the format of the views later passed to
    /// [`RendererEngine::render`].
    pub fn with_stages(
        gpu: Arc<GpuContext>,
        config: EngineConfig,
        output_format: wgpu::TextureFormat,
        stages: S,
    ) -> RenderResult<Self> {
        config.validate()?;
        gpu.ensure_renderable(output_format)?;

        let formats = stages.target_formats();
        formats.ensure_supported(&gpu)?;
        let targets = RenderTargets::new(&gpu.device, config.width, config.height, formats)?;
        let passes = CommonPasses {
            integrate: IntegratePass::new(&gpu.device, formats.accumulation),
            present: PresentPass::new(&gpu.device, output_format),
        };
        passes.present.update_uniforms(&gpu.queue, config.tone_mapping);
        let transfer_function = TransferFunctionTexture::new(&gpu, &stages.default_transfer_function())?;

        let mut schema = PropertySchema::new();
        schema.register(stages.descriptors())?;
        let (sender, receiver) = parameter_channel();

        log::info!(
            "created {} renderer ({}x{}, {} parameters)",
            stages.name(),
            config.width,
            config.height,
            schema.len()
        );

        Ok(Self {
            gpu,
            config,
            cycle: FrameCycle::new(),
            schema,
            sender,
            receiver,
            volume: None,
            prepared: false,
            pending: Invalidation::None,
            transfer_function: ResourceSlot::with(transfer_function),
            targets: ResourceSlot::with(targets),
            passes: ResourceSlot::with(passes),
            mvp_inverse: Mat4::IDENTITY,
            stages,
        })
    }

    pub fn name(&self) -> &'static str {
        self.stages.name()
    }

    pub fn gpu(&self) -> &Arc<GpuContext> {
        &self.gpu
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stages(&self) -> &S {
        &self.stages
    }

    pub(crate) fn stages_mut(&mut self) -> &mut S {
        &mut self.stages
    }

    /// The parameter schema with current values.
    pub fn schema(&self) -> &PropertySchema {
        &self.schema
    }

    pub fn properties(&self) -> Vec<ParameterDescriptor> {
        self.schema.iter().cloned().collect()
    }

    /// A handle for queueing parameter changes from any thread.
    pub fn sender(&self) -> ParameterSender {
        self.sender.clone()
    }

    /// Frame number the next integrate pass will use.
    pub fn frame_number(&self) -> u32 {
        self.cycle.frame_number()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.cycle.frames_rendered()
    }

    pub fn is_destroyed(&self) -> bool {
        self.cycle.is_destroyed()
    }

    pub fn mvp_inverse(&self) -> Mat4 {
        self.mvp_inverse
    }

    pub fn volume_dimensions(&self) -> Option<Dimensions> {
        self.volume.as_ref().map(|v| v.dimensions())
    }

    /// The target holding the current running average.
    pub fn targets(&self) -> RenderResult<&RenderTargets> {
        self.targets.get().ok_or_else(|| VptError::Destroyed.into())
    }

    /// Marks the accumulated image invalid.
    pub fn reset(&mut self) -> RenderResult<()> {
        self.cycle.invalidate()?;
        Ok(())
    }

    /// Replaces the volume. Volume-dependent state is built as soon as the
    /// source reports ready.
    ///
    /// A volume the stages cannot work with is rejected and the previous
    /// volume stays in place.
    pub fn set_volume(&mut self, volume: Arc<dyn VolumeSource>) -> RenderResult<()> {
        self.cycle.ensure_alive()?;
        let dimensions = volume.dimensions();
        dimensions.validate()?;
        self.stages.check_volume(dimensions)?;

        let previous = self.volume.replace(volume);
        self.prepared = false;
        if let Err(err) = self.prepare_if_ready() {
            // The stages may have dropped their old state; rebuild it on the next frame.
            self.volume = previous;
            self.cycle.invalidate()?;
            return Err(err);
        }
        self.reset()
    }

    /// Uploads a new transfer function and restarts accumulation.
    pub fn set_transfer_function(&mut self, transfer_function: TransferFunction) -> RenderResult<()> {
        self.cycle.ensure_alive()?;
        let name = self
            .transfer_function_parameter()
            .ok_or_else(|| VptError::UnknownParameter("transfer_function".into()))?;
        let change = ParameterChange::new(name, ParameterValue::Bytes(transfer_function.into_bytes()));
        self.apply_changes([change]).map(|_| ())
    }

    /// Sets the inverse model-view-projection matrix used for ray generation.
    pub fn set_mvp_inverse(&mut self, mvp_inverse: Mat4) -> RenderResult<()> {
        self.cycle.ensure_alive()?;
        self.mvp_inverse = mvp_inverse;
        self.reset()
    }

    /// Derives the inverse model-view-projection from camera matrices.
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) -> RenderResult<()> {
        self.set_mvp_inverse((projection * view).inverse())
    }

    /// Changes tone mapping; the accumulated image is kept.
    pub fn set_tone_mapping(&mut self, tone_mapping: ToneMappingConfig) -> RenderResult<()> {
        self.cycle.ensure_alive()?;
        tone_mapping.validate()?;
        let passes = self.passes.get().ok_or(VptError::Destroyed)?;
        passes.present.update_uniforms(&self.gpu.queue, tone_mapping);
        self.config.tone_mapping = tone_mapping;
        Ok(())
    }

    /// Recreates the off-screen targets at a new size.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.cycle.ensure_alive()?;
        if width == 0 || height == 0 {
            return Err(VptError::InvalidTargetSize { width, height }.into());
        }
        let formats = self.stages.target_formats();
        let device = &self.gpu.device;
        self.targets
            .replace_with(|| RenderTargets::new(device, width, height, formats))?;
        self.config.width = width;
        self.config.height = height;
        log::info!("{} renderer resized to {width}x{height}", self.stages.name());
        self.reset()
    }

    /// Applies one change immediately.
    pub fn set_parameter(&mut self, name: &str, value: ParameterValue) -> RenderResult<Invalidation> {
        self.apply_changes([ParameterChange::new(name, value)])
    }

    /// Applies a batch of changes, then performs the most expensive
    /// invalidation any of them requires, once.
    ///
    /// Stops at the first invalid change; the ones before it stay applied.
    pub fn apply_changes<I>(&mut self, changes: I) -> RenderResult<Invalidation>
    where
        I: IntoIterator<Item = ParameterChange>,
    {
        self.cycle.ensure_alive()?;
        let mut merged = Invalidation::None;
        let mut failure = None;
        for change in changes {
            match self.apply_change(&change) {
                Ok(invalidation) => merged = merged.merge(invalidation),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        self.commit(merged)?;
        match failure {
            Some(err) => Err(err),
            None => Ok(merged),
        }
    }

    /// Renders one progressive frame into `output`.
    ///
    /// Queued parameter changes are applied first; invalid ones are logged
    /// and dropped. Without a ready volume nothing is recorded.
    pub fn render(&mut self, output: &wgpu::TextureView) -> RenderResult<FrameReport> {
        self.cycle.ensure_alive()?;

        let mut merged = Invalidation::None;
        for change in self.receiver.drain() {
            match self.apply_change(&change) {
                Ok(invalidation) => merged = merged.merge(invalidation),
                Err(err) => log::warn!("dropping change to `{}`: {err}", change.name),
            }
        }
        self.commit(merged)?;

        let Some(volume) = self.volume.as_ref().filter(|v| v.is_ready()).map(Arc::clone) else {
            log::trace!("{} renderer waiting for volume", self.stages.name());
            return Ok(FrameReport::skipped(self.cycle.frame_number()));
        };
        self.prepare_if_ready()?;
        let volume_view = volume.view().ok_or(VptError::VolumeNotReady)?;

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("vpt frame encoder"),
            });

        let targets = self.targets.get_mut().ok_or(VptError::Destroyed)?;
        let passes = self.passes.get().ok_or(VptError::Destroyed)?;
        let transfer_function = self.transfer_function.get().ok_or(VptError::Destroyed)?;
        let mut ctx = FrameContext {
            gpu: &self.gpu,
            encoder: &mut encoder,
            targets,
            passes,
            volume: volume_view,
            volume_dimensions: volume.dimensions(),
            transfer_function: transfer_function.view(),
            mvp_inverse: self.mvp_inverse,
            output,
        };
        let outcome = self.cycle.run(&mut self.stages, &mut ctx)?;
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        Ok(FrameReport {
            rendered: true,
            frame_number: outcome.frame_number,
            cleared: outcome.cleared,
            light_step: self.stages.light_step(),
        })
    }

    /// Releases every GPU resource. All later calls fail with
    /// [`VptError::Destroyed`], including a second `destroy`.
    pub fn destroy(&mut self) -> RenderResult<()> {
        if !self.cycle.destroy() {
            return Err(VptError::Destroyed.into());
        }
        self.stages.release();
        self.targets.release();
        self.passes.release();
        self.transfer_function.release();
        self.volume = None;
        log::info!("destroyed {} renderer", self.stages.name());
        Ok(())
    }

    fn transfer_function_parameter(&self) -> Option<String> {
        self.schema
            .iter()
            .find(|d| {
                matches!(
                    d.kind,
                    ParameterKind::TransferFunction | ParameterKind::SpectralTransferFunction
                )
            })
            .map(|d| d.name.clone())
    }

    /// Validates and applies one change. Field rebuilds are deferred to
    /// [`Self::commit`].
    fn apply_change(&mut self, change: &ParameterChange) -> RenderResult<Invalidation> {
        let descriptor = self
            .schema
            .get(&change.name)
            .ok_or_else(|| VptError::UnknownParameter(change.name.clone()))?;
        descriptor.check(&change.value)?;
        let kind = descriptor.kind;

        match kind {
            ParameterKind::TransferFunction | ParameterKind::SpectralTransferFunction => {
                let (width, height) = self.stages.transfer_function_extent();
                let bytes = change.value.as_bytes().map(<[u8]>::to_vec).unwrap_or_default();
                let transfer_function = TransferFunction::new(width, height, bytes)?;
                self.upload_transfer_function(&transfer_function)?;
            }
            _ => {
                let volume = self.volume_dimensions();
                self.stages.apply(&self.gpu, change, volume)?;
            }
        }

        Ok(self.schema.apply(change)?)
    }

    fn upload_transfer_function(&mut self, transfer_function: &TransferFunction) -> RenderResult<()> {
        if let Some(texture) = self.transfer_function.get() {
            if texture.update(&self.gpu, transfer_function)? {
                return Ok(());
            }
        }
        let gpu = &self.gpu;
        self.transfer_function
            .replace_with(|| TransferFunctionTexture::new(gpu, transfer_function))?;
        Ok(())
    }

    fn commit(&mut self, invalidation: Invalidation) -> RenderResult<()> {
        if invalidation > Invalidation::Accumulation {
            self.pending = self.pending.merge(invalidation);
            self.prepare_if_ready()?;
        }
        if invalidation.resets_accumulation() {
            self.reset()?;
        }
        Ok(())
    }

    /// Runs deferred volume-dependent work once the volume is ready.
    fn prepare_if_ready(&mut self) -> RenderResult<()> {
        let Some(dimensions) = self
            .volume
            .as_ref()
            .filter(|v| v.is_ready())
            .map(|v| v.dimensions())
        else {
            return Ok(());
        };

        let invalidation = if self.prepared {
            self.pending
        } else {
            Invalidation::LightField
        };
        if invalidation > Invalidation::Accumulation {
            self.stages.prepare(&self.gpu, dimensions, invalidation)?;
            self.cycle.invalidate()?;
        }
        self.prepared = true;
        self.pending = Invalidation::None;
        Ok(())
    }
}
