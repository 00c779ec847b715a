//! Tone mapping configuration for the present pass.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VptError};

/// Tone mapping configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMappingConfig {
    /// Exposure multiplier (default 1.0).
    pub exposure: f32,
    /// White level for highlight compression (default 1.0).
    pub white_level: f32,
    /// Gamma correction exponent (default 2.2). Use 1.0 for sRGB outputs.
    pub gamma: f32,
}

impl Default for ToneMappingConfig {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            white_level: 1.0,
            gamma: 2.2,
        }
    }
}

impl ToneMappingConfig {
    /// Creates a new tone mapping configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the exposure value.
    pub fn with_exposure(mut self, exposure: f32) -> Self {
        self.exposure = exposure;
        self
    }

    /// Sets the white level.
    pub fn with_white_level(mut self, white_level: f32) -> Self {
        self.white_level = white_level;
        self
    }

    /// Sets the gamma value.
    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("exposure", self.exposure),
            ("white_level", self.white_level),
            ("gamma", self.gamma),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(VptError::InvalidConfig(format!(
                    "tone mapping {name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Extended Reinhard operator followed by gamma, as applied per channel on the GPU.
    pub fn map(&self, value: f32) -> f32 {
        let c = value.max(0.0) * self.exposure;
        let white_sq = self.white_level * self.white_level;
        let mapped = c * (1.0 + c / white_sq) / (1.0 + c);
        mapped.min(1.0).powf(1.0 / self.gamma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_mapping_default() {
        let config = ToneMappingConfig::default();
        assert_eq!(config.exposure, 1.0);
        assert_eq!(config.white_level, 1.0);
        assert_eq!(config.gamma, 2.2);
    }

    #[test]
    fn test_tone_mapping_builder() {
        let config = ToneMappingConfig::new().with_exposure(1.5).with_gamma(2.0);
        assert_eq!(config.exposure, 1.5);
        assert_eq!(config.gamma, 2.0);
    }

    #[test]
    fn test_map_endpoints() {
        let config = ToneMappingConfig::new();
        assert_eq!(config.map(0.0), 0.0);
        assert!((config.map(1.0) - 1.0).abs() < 1e-6);
        assert!(config.map(0.25) > 0.25);
    }

    #[test]
    fn test_validate_rejects_zero_gamma() {
        assert!(ToneMappingConfig::new().with_gamma(0.0).validate().is_err());
        assert!(ToneMappingConfig::new().validate().is_ok());
    }
}
