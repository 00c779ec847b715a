//! Rendering backend for vpt-rs.
//!
//! This crate provides the wgpu implementation of the progressive renderers:
//! - [`RendererEngine`], which owns the targets, camera and parameter
//!   channel and drives the four-stage frame cycle
//! - [`ConvDiffRenderer`], the convection-diffusion light-field renderer
//! - [`SpectralRenderer`], the progressive spectral renderer
//! - Shared passes (integrate, present), volume sources and image capture

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::too_many_lines)]

pub mod buffer;
pub mod capture;
pub mod convdiff;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod light_field;
pub mod passes;
pub mod spectral;
pub mod targets;
pub mod texture;
pub mod transfer_function;
pub mod volume;

pub use capture::{encode_png, read_rgba8, save_image, CaptureTarget, CAPTURE_FORMAT};
pub use convdiff::{ConvDiffRenderer, ConvDiffStages};
pub use engine::{CommonPasses, FrameContext, FrameReport, RendererEngine, RendererStages};
pub use error::{RenderError, RenderResult};
pub use gpu::GpuContext;
pub use light_field::{DiffusionField, LightField};
pub use spectral::{SpectralRenderer, SpectralStages};
pub use targets::{RenderTargets, TargetFormats};
pub use texture::GpuTexture;
pub use transfer_function::TransferFunctionTexture;
pub use volume::{DensityVolume, VolumeSource};
