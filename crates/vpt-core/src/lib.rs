//! Core abstractions for vpt-rs.
//!
//! This crate holds everything about the renderers that does not need a GPU:
//! - [`FrameCycle`] and the [`FrameStages`] contract driving reset/generate/integrate/present
//! - The declarative parameter [`PropertySchema`] and the typed change channel
//! - Light types, light-field grid layout and the convection amortization schedule
//! - Progressive accumulation and per-frame random sampling
//! - Single-ownership resource slots used for GPU textures and programs

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Grid math converts between u32 extents and f32 coordinates
#![allow(clippy::cast_precision_loss)]

pub mod accumulation;
pub mod config;
pub mod error;
pub mod frame;
pub mod light;
pub mod params;
pub mod resource;
pub mod sampling;
pub mod schedule;
pub mod tone_mapping;
pub mod transfer_function;
pub mod volume;

pub use accumulation::ProgressiveAccumulator;
pub use config::{ConvDiffConfig, EngineConfig, SpectralConfig};
pub use error::{Result, VptError};
pub use frame::{FrameCycle, FrameOutcome, FrameStages};
pub use light::{Light, LightFieldLayout, LightType, WORKGROUP_SIZE_X, WORKGROUP_SIZE_Y};
pub use params::{
    parameter_channel, Constraints, Invalidation, ParameterChange, ParameterDescriptor,
    ParameterKind, ParameterReceiver, ParameterSender, ParameterValue, PropertySchema,
};
pub use resource::{Release, ResourceSlot};
pub use sampling::{rejection_sample_direction, FrameRng};
pub use schedule::{ConvectionSchedule, LightStep};
pub use tone_mapping::ToneMappingConfig;
pub use transfer_function::{quantize_spectrum, TransferFunction};
pub use volume::Dimensions;

// Re-export glam types for convenience
pub use glam::{Mat4, Vec3, Vec4};
