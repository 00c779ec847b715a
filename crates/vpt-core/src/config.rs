//! Renderer configuration.
//!
//! Every renderer is built from an immutable, validated configuration. All
//! structs deserialize from JSON with missing fields taking their defaults.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VptError};
use crate::light::{Light, LightType};
use crate::tone_mapping::ToneMappingConfig;

/// Default edge length of the square off-screen targets.
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

fn check_positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(VptError::InvalidConfig(format!(
            "{name} must be positive, got {value}"
        )))
    }
}

fn check_non_negative(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(VptError::InvalidConfig(format!(
            "{name} must be non-negative, got {value}"
        )))
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Settings shared by every renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Width of the frame and accumulation targets.
    pub width: u32,
    /// Height of the frame and accumulation targets.
    pub height: u32,
    /// Present pass tone mapping.
    pub tone_mapping: ToneMappingConfig,
    /// Fixed seed for the per-frame random generator; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_BUFFER_SIZE,
            height: DEFAULT_BUFFER_SIZE,
            tone_mapping: ToneMappingConfig::default(),
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_tone_mapping(mut self, tone_mapping: ToneMappingConfig) -> Self {
        self.tone_mapping = tone_mapping;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(VptError::InvalidTargetSize {
                width: self.width,
                height: self.height,
            });
        }
        self.tone_mapping.validate()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }
}

/// Tunables of the convection-diffusion renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvDiffConfig {
    /// Light type and its direction or position.
    pub light: Light,
    /// Ray-march step size in normalized volume units.
    pub step_size: f32,
    /// Opacity correction compensating for the step size.
    pub alpha_correction: f32,
    /// Absorption applied while convecting light through the volume.
    pub absorption_coefficient: f32,
    /// Weight of the neighborhood term in the diffusion pass, in `[0, 1]`.
    pub scattering: f32,
    /// Light-field downsampling factor relative to the volume.
    pub light_volume_ratio: u32,
    /// Frames of convection before switching to diffusion only; 0 runs both every frame.
    pub convection_limit: u32,
    /// Upwind iterations per convection dispatch.
    pub convection_steps: u32,
}

impl Default for ConvDiffConfig {
    fn default() -> Self {
        Self {
            light: Light::default(),
            step_size: 0.00333,
            alpha_correction: 100.0,
            absorption_coefficient: 0.5,
            scattering: 0.5,
            light_volume_ratio: 1,
            convection_limit: 0,
            convection_steps: 5,
        }
    }
}

impl ConvDiffConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_light(mut self, light_type: LightType, vector: Vec3) -> Self {
        self.light = Light { light_type, vector };
        self
    }

    pub fn with_step_size(mut self, step_size: f32) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_alpha_correction(mut self, alpha_correction: f32) -> Self {
        self.alpha_correction = alpha_correction;
        self
    }

    pub fn with_absorption(mut self, absorption: f32) -> Self {
        self.absorption_coefficient = absorption;
        self
    }

    pub fn with_scattering(mut self, scattering: f32) -> Self {
        self.scattering = scattering;
        self
    }

    pub fn with_light_volume_ratio(mut self, ratio: u32) -> Self {
        self.light_volume_ratio = ratio;
        self
    }

    pub fn with_convection_limit(mut self, limit: u32) -> Self {
        self.convection_limit = limit;
        self
    }

    pub fn with_convection_steps(mut self, steps: u32) -> Self {
        self.convection_steps = steps;
        self
    }

    /// Ray-march step count equivalent to the step size.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn steps(&self) -> u32 {
        (1.0 / self.step_size).round().max(1.0) as u32
    }

    pub fn validate(&self) -> Result<()> {
        self.light.validate()?;
        check_positive("step_size", self.step_size)?;
        check_non_negative("alpha_correction", self.alpha_correction)?;
        check_non_negative("absorption_coefficient", self.absorption_coefficient)?;
        if !(0.0..=1.0).contains(&self.scattering) {
            return Err(VptError::InvalidConfig(format!(
                "scattering must lie in [0, 1], got {}",
                self.scattering
            )));
        }
        if self.light_volume_ratio == 0 {
            return Err(VptError::InvalidRatio(0));
        }
        if self.convection_steps == 0 {
            return Err(VptError::InvalidConfig(
                "convection_steps must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }
}

/// Tunables of the spectral renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Majorant extinction used for free-path sampling.
    pub extinction: f32,
    /// Number of wavelength bands of the light spectrum.
    pub spectrum_bands: u32,
    /// Edge length of the square spectral transfer function.
    pub transfer_function_size: u32,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            extinction: 1.0,
            spectrum_bands: 32,
            transfer_function_size: 256,
        }
    }
}

impl SpectralConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extinction(mut self, extinction: f32) -> Self {
        self.extinction = extinction;
        self
    }

    pub fn with_spectrum_bands(mut self, bands: u32) -> Self {
        self.spectrum_bands = bands;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_non_negative("extinction", self.extinction)?;
        if self.spectrum_bands == 0 {
            return Err(VptError::InvalidConfig(
                "spectrum_bands must be at least 1".into(),
            ));
        }
        if self.transfer_function_size == 0 {
            return Err(VptError::InvalidConfig(
                "transfer_function_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }
}
