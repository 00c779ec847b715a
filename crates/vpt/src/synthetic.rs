//! Procedural test volumes and spectra.

use vpt_core::Dimensions;

/// A soft sphere filling the volume: density 255 at the center falling to 0
/// at the inscribed radius.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn sphere(dimensions: Dimensions) -> Vec<u8> {
    let Dimensions { width, height, depth } = dimensions;
    let mut voxels = Vec::with_capacity(dimensions.voxel_count());
    for z in 0..depth {
        for y in 0..height {
            for x in 0..width {
                let p = [
                    (x as f32 + 0.5) / width as f32 - 0.5,
                    (y as f32 + 0.5) / height as f32 - 0.5,
                    (z as f32 + 0.5) / depth as f32 - 0.5,
                ];
                let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt() * 2.0;
                voxels.push(((1.0 - r).clamp(0.0, 1.0) * 255.0) as u8);
            }
        }
    }
    voxels
}

/// A slab whose density ramps linearly along x.
#[allow(clippy::cast_possible_truncation)]
pub fn ramp(dimensions: Dimensions) -> Vec<u8> {
    let Dimensions { width, height, depth } = dimensions;
    let row: Vec<u8> = (0..width)
        .map(|x| (x * 255 / width.saturating_sub(1).max(1)) as u8)
        .collect();
    let mut voxels = Vec::with_capacity(dimensions.voxel_count());
    for _ in 0..height * depth {
        voxels.extend_from_slice(&row);
    }
    voxels
}

/// A spectrum with every band at `intensity`.
pub fn flat_spectrum(bands: u32, intensity: f32) -> Vec<f32> {
    vec![intensity; bands as usize]
}
