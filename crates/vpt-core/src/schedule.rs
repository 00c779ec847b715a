//! Amortization schedule for the convection and diffusion passes.

/// Compute work performed on the light field for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightStep {
    /// Full simulation: convection followed by diffusion.
    ConvectionAndDiffusion,
    /// Convection only; diffusion is deferred.
    Convection,
    /// Diffusion only; the convected field is final.
    Diffusion,
}

impl LightStep {
    pub fn runs_convection(self) -> bool {
        matches!(self, Self::ConvectionAndDiffusion | Self::Convection)
    }

    pub fn runs_diffusion(self) -> bool {
        matches!(self, Self::ConvectionAndDiffusion | Self::Diffusion)
    }
}

/// Decides per frame which light-field passes run.
///
/// A limit of zero runs the full simulation every frame. A positive limit `L`
/// runs convection on the first `L` frames after a restart and diffusion on
/// every frame after that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvectionSchedule {
    limit: u32,
    counter: u32,
}

impl ConvectionSchedule {
    pub fn new(limit: u32) -> Self {
        Self { limit, counter: 0 }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of convection frames run since the last restart (limited mode only).
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Whether the convection phase has finished for good.
    pub fn is_converged(&self) -> bool {
        self.limit > 0 && self.counter >= self.limit
    }

    /// Starts the schedule over, typically after the light field was recreated.
    pub fn restart(&mut self) {
        self.counter = 0;
    }

    /// Changes the limit and restarts.
    pub fn set_limit(&mut self, limit: u32) {
        self.limit = limit;
        self.restart();
    }

    /// Returns the step for the coming frame and advances the counter.
    pub fn advance(&mut self) -> LightStep {
        if self.limit == 0 {
            return LightStep::ConvectionAndDiffusion;
        }
        if self.counter < self.limit {
            self.counter += 1;
            if self.counter == self.limit {
                log::debug!("convection converged after {} frames", self.limit);
            }
            LightStep::Convection
        } else {
            LightStep::Diffusion
        }
    }
}
