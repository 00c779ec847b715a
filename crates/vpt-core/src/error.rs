//! Error types for vpt-rs.

use thiserror::Error;

/// The main error type for vpt-rs configuration and pipeline operations.
#[derive(Error, Debug)]
pub enum VptError {
    /// A volume or grid extent has a zero axis.
    #[error("invalid dimensions {width}x{height}x{depth}: every axis must be positive")]
    InvalidDimensions { width: u32, height: u32, depth: u32 },

    /// A render target size has a zero axis.
    #[error("invalid render target size {width}x{height}: both axes must be positive")]
    InvalidTargetSize { width: u32, height: u32 },

    /// The light-volume downsampling ratio is zero.
    #[error("invalid light volume ratio {0}: must be at least 1")]
    InvalidRatio(u32),

    /// A light type tag did not name a known light.
    #[error("unknown light type '{0}' (expected 'distant' or 'point')")]
    UnknownLightType(String),

    /// A change message named a parameter that is not in the schema.
    #[error("parameter '{0}' is not registered")]
    UnknownParameter(String),

    /// A change message carried a value of the wrong kind.
    #[error("parameter '{name}' expects a {expected} value")]
    ParameterTypeMismatch { name: String, expected: &'static str },

    /// A parameter name was registered twice.
    #[error("parameter '{0}' is already registered")]
    DuplicateParameter(String),

    /// A selection parameter received a value that is not one of its options.
    #[error("'{value}' is not a valid option for parameter '{name}'")]
    InvalidChoice { name: String, value: String },

    /// A change message carried a value outside the declared constraints.
    #[error("parameter '{name}' value {value} outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The renderer was destroyed and cannot be used anymore.
    #[error("renderer has been destroyed")]
    Destroyed,

    /// The volume has not finished loading.
    #[error("volume is not ready")]
    VolumeNotReady,

    /// A configuration value is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for vpt-rs operations.
pub type Result<T> = std::result::Result<T, VptError>;
