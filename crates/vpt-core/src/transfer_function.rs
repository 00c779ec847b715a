//! Transfer function lookup tables and light spectra.

use crate::error::{Result, VptError};

/// An RGBA8 lookup table.
///
/// The horizontal axis is density. The vertical axis is unused (height 1)
/// for plain transfer functions and wavelength for spectral ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFunction {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl TransferFunction {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(VptError::InvalidDimensions {
                width,
                height,
                depth: 1,
            });
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(VptError::SizeMismatch {
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Grey ramp whose opacity grows linearly with density.
    #[allow(clippy::cast_possible_truncation)]
    pub fn linear_ramp(width: u32, height: u32) -> Self {
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..height {
            for x in 0..width {
                let v = if width > 1 {
                    (x * 255 / (width - 1)) as u8
                } else {
                    255
                };
                rgba.extend_from_slice(&[255, 255, 255, v]);
            }
        }
        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.rgba
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.rgba
    }
}

/// Quantizes a sampled light spectrum into RGBA8 texels.
///
/// Each band becomes `floor(v * 255)` replicated into all four channels;
/// values are clamped to `[0, 1]` first.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantize_spectrum(bands: &[f32]) -> Vec<u8> {
    bands
        .iter()
        .flat_map(|v| {
            let q = (v.clamp(0.0, 1.0) * 255.0).floor() as u8;
            [q; 4]
        })
        .collect()
}
