//! Volume extents.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VptError};

/// Extent of a 3D grid in voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Dimensions {
    /// Creates validated dimensions. Every axis must be positive.
    pub fn new(width: u32, height: u32, depth: u32) -> Result<Self> {
        let dims = Self {
            width,
            height,
            depth,
        };
        dims.validate()?;
        Ok(dims)
    }

    /// Returns an error if any axis is zero.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(VptError::InvalidDimensions {
                width: self.width,
                height: self.height,
                depth: self.depth,
            });
        }
        Ok(())
    }

    /// Total number of voxels.
    pub fn voxel_count(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// Extent with every axis divided by `ratio`, rounding down.
    ///
    /// The caller is responsible for `ratio >= 1`.
    pub fn downsampled(&self, ratio: u32) -> Self {
        Self {
            width: self.width / ratio,
            height: self.height / ratio,
            depth: self.depth / ratio,
        }
    }

    pub fn to_array(self) -> [u32; 3] {
        [self.width, self.height, self.depth]
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}
