//! Per-frame random numbers for jitter and scattering directions.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Draws a uniformly distributed unit vector by rejection sampling.
///
/// Three coordinates are drawn uniformly in `[-1, 1]`; draws outside the
/// unit ball are rejected and the accepted vector is normalized. The
/// degenerate zero vector is rejected as well.
pub fn rejection_sample_direction<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        let length = v.length();
        if length <= 1.0 && length > 0.0 {
            return v / length;
        }
    }
}

/// Random source owned by one renderer.
///
/// Seeded generators make frame sequences reproducible in tests.
#[derive(Debug, Clone)]
pub struct FrameRng {
    rng: StdRng,
}

impl FrameRng {
    /// A generator seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded generator when a seed is configured, entropy otherwise.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }

    /// Ray-start jitter in `[0, 1)`.
    pub fn offset(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    /// One scattering direction, see [`rejection_sample_direction`].
    pub fn scattering_direction(&mut self) -> Vec3 {
        rejection_sample_direction(&mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: u64 = 42;

    #[test]
    fn test_seeded_sequences_repeat() {
        let mut a = FrameRng::seeded(SEED);
        let mut b = FrameRng::seeded(SEED);
        for _ in 0..16 {
            assert_eq!(a.offset(), b.offset());
            assert_eq!(a.scattering_direction(), b.scattering_direction());
        }
    }

    #[test]
    fn test_offset_range() {
        let mut rng = FrameRng::seeded(SEED);
        for _ in 0..1000 {
            let o = rng.offset();
            assert!((0.0..1.0).contains(&o));
        }
    }

    #[test]
    fn test_directions_are_unit() {
        let mut rng = FrameRng::seeded(SEED);
        for _ in 0..10_000 {
            let d = rng.scattering_direction();
            assert!((d.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_accepted_draws_inside_ball() {
        // Replays the generator to observe the raw draws the sampler accepts.
        let mut raw = StdRng::seed_from_u64(SEED);
        let mut sampler = StdRng::seed_from_u64(SEED);
        for _ in 0..1000 {
            let d = rejection_sample_direction(&mut sampler);
            let accepted = loop {
                let v = Vec3::new(
                    raw.gen_range(-1.0..=1.0),
                    raw.gen_range(-1.0..=1.0),
                    raw.gen_range(-1.0..=1.0),
                );
                if v.length() <= 1.0 && v.length() > 0.0 {
                    break v;
                }
            };
            assert!(accepted.length() <= 1.0);
            assert!((accepted.normalize() - d).length() < 1e-6);
        }
    }

    #[test]
    fn test_directions_uniform_on_sphere() {
        let mut rng = FrameRng::seeded(SEED);
        let n = 20_000;
        let mut sum = Vec3::ZERO;
        let mut sum_sq = Vec3::ZERO;
        let mut octants = [0u32; 8];
        for _ in 0..n {
            let d = rng.scattering_direction();
            sum += d;
            sum_sq += d * d;
            let idx = usize::from(d.x > 0.0) | usize::from(d.y > 0.0) << 1 | usize::from(d.z > 0.0) << 2;
            octants[idx] += 1;
        }
        let mean = sum / n as f32;
        let second = sum_sq / n as f32;
        assert!(mean.abs().max_element() < 0.03, "mean {mean}");
        for c in second.to_array() {
            assert!((c - 1.0 / 3.0).abs() < 0.02, "second moment {second}");
        }
        let expected = n as f32 / 8.0;
        for count in octants {
            assert!((count as f32 - expected).abs() < 0.1 * expected, "octants {octants:?}");
        }
    }
}
