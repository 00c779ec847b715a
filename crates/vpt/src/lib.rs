//! vpt-rs: progressive volume rendering on wgpu.
//!
//! Two renderers share one engine. The [`ConvDiffRenderer`] approximates
//! scattering with a convected light field and a diffusion field; the
//! [`SpectralRenderer`] accumulates single-wavelength path samples.
//!
//! # Quick Start
//!
//! ```no_run
//! use vpt::*;
//!
//! init_logging();
//! let gpu = headless::create_gpu().unwrap();
//! let dims = Dimensions::new(64, 64, 64).unwrap();
//! let volume = DensityVolume::from_bytes(&gpu, dims, &synthetic::sphere(dims)).unwrap();
//!
//! let mut renderer = ConvDiffRenderer::new(
//!     gpu.clone(),
//!     EngineConfig::new().with_size(256, 256),
//!     ConvDiffConfig::new().with_convection_limit(5),
//!     CAPTURE_FORMAT,
//! )
//! .unwrap();
//! renderer.set_volume(std::sync::Arc::new(volume)).unwrap();
//! renderer.set_mvp_inverse(camera::orbit(1.0, 0.6, 0.4, 2.5)).unwrap();
//! headless::render_to_file(&mut renderer, 16, "convdiff.png").unwrap();
//! ```

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

pub mod camera;
pub mod headless;
pub mod synthetic;

pub use vpt_core::{
    quantize_spectrum, Constraints, ConvDiffConfig, ConvectionSchedule, Dimensions, EngineConfig,
    FrameRng, Invalidation, Light, LightFieldLayout, LightStep, LightType, Mat4, ParameterChange,
    ParameterDescriptor, ParameterKind, ParameterSender, ParameterValue, PropertySchema,
    SpectralConfig, ToneMappingConfig, TransferFunction, Vec3, Vec4, VptError,
};
pub use vpt_render::{
    CaptureTarget, ConvDiffRenderer, ConvDiffStages, DensityVolume, FrameReport, GpuContext,
    RenderError, RenderResult, RendererEngine, RendererStages, SpectralRenderer, SpectralStages,
    VolumeSource, CAPTURE_FORMAT,
};

/// Installs `env_logger` once; later calls are no-ops.
///
/// Verbosity follows `RUST_LOG`, e.g. `RUST_LOG=vpt_render=debug`.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
