//! Light sources and the light-field grid layout.

use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VptError};
use crate::volume::Dimensions;

/// Work group size of the light-field compute kernels along x.
pub const WORKGROUP_SIZE_X: u32 = 16;
/// Work group size of the light-field compute kernels along y.
pub const WORKGROUP_SIZE_Y: u32 = 16;

/// Kind of light illuminating the volume.
///
/// Each variant maps to its own compiled convection kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LightType {
    /// Parallel light arriving from a direction.
    Distant,
    /// Light radiating from a position.
    #[default]
    Point,
}

impl LightType {
    /// All light types, in schema order.
    pub const ALL: [LightType; 2] = [LightType::Distant, LightType::Point];

    /// The tag used in change messages and configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            LightType::Distant => "distant",
            LightType::Point => "point",
        }
    }
}

impl fmt::Display for LightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightType {
    type Err = VptError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "distant" => Ok(LightType::Distant),
            "point" => Ok(LightType::Point),
            other => Err(VptError::UnknownLightType(other.to_string())),
        }
    }
}

/// A light with its geometry.
///
/// `vector` is a direction for [`LightType::Distant`] and a position in
/// volume space for [`LightType::Point`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub light_type: LightType,
    pub vector: Vec3,
}

impl Light {
    pub fn new(light_type: LightType, vector: Vec3) -> Result<Self> {
        let light = Self { light_type, vector };
        light.validate()?;
        Ok(light)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.vector.is_finite() {
            return Err(VptError::InvalidConfig(format!(
                "light vector {} is not finite",
                self.vector
            )));
        }
        if self.light_type == LightType::Distant && self.vector.length_squared() == 0.0 {
            return Err(VptError::InvalidConfig(
                "distant light needs a non-zero direction".into(),
            ));
        }
        Ok(())
    }

    /// The vector handed to the convection kernel: a unit direction for
    /// distant lights, the raw position for point lights.
    pub fn kernel_vector(&self) -> Vec3 {
        match self.light_type {
            LightType::Distant => self.vector.normalize(),
            LightType::Point => self.vector,
        }
    }
}

impl Default for Light {
    fn default() -> Self {
        Self {
            light_type: LightType::Point,
            vector: Vec3::new(10.0, 10.0, 10.0),
        }
    }
}

/// Grid layout of a light field, derived from the volume and a ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightFieldLayout {
    volume: Dimensions,
    ratio: u32,
    grid: Dimensions,
}

impl LightFieldLayout {
    /// Computes the light-field grid as `floor(volume / ratio)` per axis.
    ///
    /// Fails if the ratio is zero or if any axis of the grid would be empty.
    pub fn new(volume: Dimensions, ratio: u32) -> Result<Self> {
        if ratio == 0 {
            return Err(VptError::InvalidRatio(ratio));
        }
        volume.validate()?;
        let grid = volume.downsampled(ratio);
        grid.validate()?;
        Ok(Self {
            volume,
            ratio,
            grid,
        })
    }

    pub fn volume(&self) -> Dimensions {
        self.volume
    }

    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    pub fn grid(&self) -> Dimensions {
        self.grid
    }

    /// Work group counts covering the whole grid: 16x16 tiles in x/y, one
    /// group per slice in z.
    pub fn workgroups(&self) -> [u32; 3] {
        [
            self.grid.width.div_ceil(WORKGROUP_SIZE_X),
            self.grid.height.div_ceil(WORKGROUP_SIZE_Y),
            self.grid.depth,
        ]
    }
}
