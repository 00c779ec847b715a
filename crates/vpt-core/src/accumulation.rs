//! Progressive running-average accumulation.

/// Tracks the frame number of a progressive running average.
///
/// Frame `N` contributes with weight `1/N`, so after `N` frames the
/// accumulation target holds the unweighted mean of all samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressiveAccumulator {
    frame_number: u32,
}

impl ProgressiveAccumulator {
    pub fn new() -> Self {
        Self { frame_number: 1 }
    }

    /// Frame number of the next integrate call (1-based).
    pub fn frame_number(&self) -> u32 {
        self.frame_number
    }

    /// Blend weight of the next sample.
    pub fn weight(&self) -> f32 {
        1.0 / self.frame_number as f32
    }

    /// Restarts the average.
    pub fn reset(&mut self) {
        self.frame_number = 1;
    }

    /// Called after every integrate pass.
    pub fn advance(&mut self) {
        self.frame_number = self.frame_number.saturating_add(1);
    }

    /// Folds one sample into a running mean the way the integrate shader does.
    pub fn blend(accumulated: f32, sample: f32, weight: f32) -> f32 {
        accumulated + (sample - accumulated) * weight
    }
}

impl Default for ProgressiveAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
