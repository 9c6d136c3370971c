//! Fixed-timestep accumulator
//!
//! The host feeds real frame times; the simulation always advances in whole
//! `SIM_DT` steps. Real time is clamped to `MAX_FRAME_DT` per frame so a
//! stall (debugger, window drag) never triggers a burst of catch-up steps.

use crate::consts::{MAX_FRAME_DT, SIM_DT};
use crate::finite_or_zero;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedTimestep {
    step: f32,
    max_frame: f32,
    accumulator: f32,
    /// Steps taken since creation
    pub ticks: u64,
}

impl Default for FixedTimestep {
    fn default() -> Self {
        Self::new(SIM_DT, MAX_FRAME_DT)
    }
}

impl FixedTimestep {
    pub fn new(step: f32, max_frame: f32) -> Self {
        let step = if step.is_finite() && step > 0.0 { step } else { SIM_DT };
        Self {
            step,
            max_frame: finite_or_zero(max_frame).max(step),
            accumulator: 0.0,
            ticks: 0,
        }
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    /// Feed one frame of real time, returning how many fixed steps to run
    pub fn advance(&mut self, real_dt: f32) -> u32 {
        let dt = finite_or_zero(real_dt).clamp(0.0, self.max_frame);
        self.accumulator += dt;

        let mut steps = 0;
        // Small tolerance so 60 Hz frames with float noise still yield one step
        while self.accumulator + 1e-6 >= self.step {
            self.accumulator = (self.accumulator - self.step).max(0.0);
            steps += 1;
        }
        self.ticks += steps as u64;
        steps
    }

    /// Fraction of a step left over (for render interpolation)
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.step
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_step_per_frame_at_target_rate() {
        let mut clock = FixedTimestep::default();
        for _ in 0..120 {
            assert_eq!(clock.advance(SIM_DT), 1);
        }
        assert_eq!(clock.ticks, 120);
    }

    #[test]
    fn test_stall_is_clamped() {
        let mut clock = FixedTimestep::default();
        assert_eq!(clock.advance(5.0), 2);
        assert!(clock.alpha() < 0.01);
    }

    #[test]
    fn test_fast_frames_accumulate() {
        let mut clock = FixedTimestep::default();
        let steps: u32 = (0..4).map(|_| clock.advance(SIM_DT / 2.0)).sum();
        assert_eq!(steps, 2);
    }

    #[test]
    fn test_bad_time_is_ignored() {
        let mut clock = FixedTimestep::default();
        assert_eq!(clock.advance(f32::NAN), 0);
        assert_eq!(clock.advance(-1.0), 0);
        assert_eq!(clock.ticks, 0);
    }
}
