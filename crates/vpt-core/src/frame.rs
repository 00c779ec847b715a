//! The four-stage frame cycle shared by every renderer.

use crate::accumulation::ProgressiveAccumulator;
use crate::error::{Result, VptError};

/// The per-frame stages a renderer provides.
///
/// `C` is whatever the stages record into, a GPU command encoder in the
/// render backend. Each stage reads what the previous one wrote, so
/// [`FrameCycle::run`] always calls them in declaration order.
pub trait FrameStages<C: ?Sized> {
    type Error: From<VptError>;

    /// Clears the accumulation target.
    fn reset_frame(&mut self, ctx: &mut C) -> std::result::Result<(), Self::Error>;

    /// Ray-marches the volume into the frame target.
    fn generate_frame(&mut self, ctx: &mut C) -> std::result::Result<(), Self::Error>;

    /// Folds the frame target into the accumulation target with `weight`.
    fn integrate_frame(&mut self, ctx: &mut C, weight: f32) -> std::result::Result<(), Self::Error>;

    /// Maps the accumulation target to the visible output.
    fn present_frame(&mut self, ctx: &mut C) -> std::result::Result<(), Self::Error>;
}

/// Result of one [`FrameCycle::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    /// Progressive frame number that was integrated (1 right after a reset).
    pub frame_number: u32,
    /// Whether the accumulation target was cleared first.
    pub cleared: bool,
}

/// Tracks image validity, the progressive frame counter and the
/// destroyed state of a renderer.
#[derive(Debug, Clone)]
pub struct FrameCycle {
    dirty: bool,
    destroyed: bool,
    accumulator: ProgressiveAccumulator,
    frames_rendered: u64,
}

impl FrameCycle {
    /// A fresh cycle; the first frame always starts from a cleared target.
    pub fn new() -> Self {
        Self {
            dirty: true,
            destroyed: false,
            accumulator: ProgressiveAccumulator::new(),
            frames_rendered: 0,
        }
    }

    pub fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            Err(VptError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Marks the accumulated image invalid. The next run clears it.
    pub fn invalidate(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.dirty = true;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Frame number the next integrate pass will use.
    ///
    /// Reads 1 while a reset is pending.
    pub fn frame_number(&self) -> u32 {
        if self.dirty {
            1
        } else {
            self.accumulator.frame_number()
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Makes the cycle permanently unusable. Returns `false` if it already was.
    pub fn destroy(&mut self) -> bool {
        let was_alive = !self.destroyed;
        self.destroyed = true;
        was_alive
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Runs reset (when dirty), generate, integrate and present in order.
    pub fn run<C, S>(&mut self, stages: &mut S, ctx: &mut C) -> std::result::Result<FrameOutcome, S::Error>
    where
        C: ?Sized,
        S: FrameStages<C>,
    {
        self.ensure_alive()?;

        let cleared = self.dirty;
        if cleared {
            stages.reset_frame(ctx)?;
            self.accumulator.reset();
            self.dirty = false;
        }

        let frame_number = self.accumulator.frame_number();
        stages.generate_frame(ctx)?;
        stages.integrate_frame(ctx, self.accumulator.weight())?;
        self.accumulator.advance();
        stages.present_frame(ctx)?;

        self.frames_rendered += 1;
        log::trace!("frame {} presented (cleared: {cleared})", frame_number);
        Ok(FrameOutcome {
            frame_number,
            cleared,
        })
    }
}

impl Default for FrameCycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        fail_generate: bool,
    }

    impl FrameStages<Vec<String>> for Recorder {
        type Error = VptError;

        fn reset_frame(&mut self, log: &mut Vec<String>) -> Result<()> {
            log.push("reset".into());
            Ok(())
        }

        fn generate_frame(&mut self, log: &mut Vec<String>) -> Result<()> {
            if self.fail_generate {
                return Err(VptError::VolumeNotReady);
            }
            log.push("generate".into());
            Ok(())
        }

        fn integrate_frame(&mut self, log: &mut Vec<String>, weight: f32) -> Result<()> {
            log.push(format!("integrate {weight}"));
            Ok(())
        }

        fn present_frame(&mut self, log: &mut Vec<String>) -> Result<()> {
            log.push("present".into());
            Ok(())
        }
    }

    #[test]
    fn test_first_frame_resets_then_runs_in_order() {
        let mut cycle = FrameCycle::new();
        let mut log = Vec::new();
        let outcome = cycle.run(&mut Recorder::default(), &mut log).unwrap();
        assert_eq!(log, ["reset", "generate", "integrate 1", "present"]);
        assert!(outcome.cleared);
        assert_eq!(outcome.frame_number, 1);
    }

    #[test]
    fn test_clean_frames_skip_reset_and_decay_weight() {
        let mut cycle = FrameCycle::new();
        let mut stages = Recorder::default();
        let mut log = Vec::new();
        cycle.run(&mut stages, &mut log).unwrap();
        log.clear();
        let outcome = cycle.run(&mut stages, &mut log).unwrap();
        assert_eq!(log, ["generate", "integrate 0.5", "present"]);
        assert!(!outcome.cleared);
        assert_eq!(outcome.frame_number, 2);
    }

    #[test]
    fn test_invalidate_restarts_counter_from_any_state() {
        let mut cycle = FrameCycle::new();
        let mut stages = Recorder::default();
        let mut log = Vec::new();
        for _ in 0..7 {
            cycle.run(&mut stages, &mut log).unwrap();
        }
        assert_eq!(cycle.frame_number(), 8);
        cycle.invalidate().unwrap();
        assert_eq!(cycle.frame_number(), 1);
        log.clear();
        let outcome = cycle.run(&mut stages, &mut log).unwrap();
        assert_eq!(log[0], "reset");
        assert_eq!(outcome.frame_number, 1);
    }

    #[test]
    fn test_multiple_invalidations_coalesce_into_one_reset() {
        let mut cycle = FrameCycle::new();
        let mut stages = Recorder::default();
        let mut log = Vec::new();
        cycle.run(&mut stages, &mut log).unwrap();
        cycle.invalidate().unwrap();
        cycle.invalidate().unwrap();
        cycle.invalidate().unwrap();
        log.clear();
        cycle.run(&mut stages, &mut log).unwrap();
        assert_eq!(log.iter().filter(|s| *s == "reset").count(), 1);
    }

    #[test]
    fn test_failed_stage_is_not_counted() {
        let mut cycle = FrameCycle::new();
        let mut stages = Recorder {
            fail_generate: true,
        };
        let mut log = Vec::new();
        assert!(cycle.run(&mut stages, &mut log).is_err());
        assert_eq!(cycle.frames_rendered(), 0);
        assert_eq!(log, ["reset"]);
    }

    #[test]
    fn test_destroyed_cycle_refuses_everything() {
        let mut cycle = FrameCycle::new();
        assert!(cycle.destroy());
        assert!(!cycle.destroy());
        let mut log = Vec::new();
        assert!(matches!(
            cycle.run(&mut Recorder::default(), &mut log),
            Err(VptError::Destroyed)
        ));
        assert!(matches!(cycle.invalidate(), Err(VptError::Destroyed)));
        assert!(log.is_empty());
    }
}
