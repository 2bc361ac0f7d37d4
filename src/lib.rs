//! Neuro Lab - simulation engine for an MRI physics and neuro-ethics game
//!
//! Core modules:
//! - `sim`: Deterministic engines (formulas, scan resolution, optics, neuromodulation, maze, debate)
//! - `store`: The two state stores (MRI lab track, Neuro-Files track)
//! - `session`: Owns both stores and drives timed loops
//! - `settings`: Player preferences
//! - `tuning`: Data-driven game balance
//! - `error`: Precondition errors raised by store transitions

pub mod error;
pub mod session;
pub mod settings;
pub mod sim;
pub mod store;
pub mod tuning;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use error::{Error, Result};
pub use session::Session;
pub use settings::{RevealPacing, Settings};
pub use tuning::Balance;

use std::time::Duration;

/// Timing and physics constants shared across modules
pub mod consts {
    use std::time::Duration;

    /// Optical engine recompute cadence while Chapter 1 is on screen
    pub const OPTICS_TICK: Duration = Duration::from_millis(50);
    /// Steering maze cadence (Chapter 2)
    pub const MAZE_TICK: Duration = Duration::from_millis(50);
    /// Neuromodulation loop cadence (Chapter 3)
    pub const NEUROMOD_TICK: Duration = Duration::from_millis(100);
    /// Simulated seconds advanced per neuromodulation tick
    pub const NEUROMOD_DT: f64 = 0.1;
    /// Delay between a chapter win and the automatic move to the next chapter
    pub const CHAPTER_ADVANCE_DELAY: Duration = Duration::from_millis(2000);
    /// Delay the UI holds debate feedback on screen before the next claim
    pub const DEBATE_FEEDBACK_DELAY: Duration = Duration::from_millis(2000);
    /// Maximum catch-up ticks per loop per update (prevents spiral of death)
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Body temperature baseline (°C)
    pub const BODY_TEMPERATURE: f64 = 37.0;
}

/// Fixed-timestep accumulator
///
/// Converts wall-clock deltas into a whole number of ticks at a fixed
/// cadence. Leftover time carries over to the next call.
#[derive(Debug, Clone)]
pub struct FixedStep {
    interval: Duration,
    accumulator: Duration,
}

impl FixedStep {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            accumulator: Duration::ZERO,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Add elapsed time, return how many ticks are due (capped at `MAX_SUBSTEPS`)
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        if self.interval.is_zero() {
            return 0;
        }
        self.accumulator += elapsed;

        let mut steps = 0;
        while self.accumulator >= self.interval && steps < consts::MAX_SUBSTEPS {
            self.accumulator -= self.interval;
            steps += 1;
        }
        // Drop the backlog instead of replaying it on the next frame
        if steps == consts::MAX_SUBSTEPS {
            self.accumulator = Duration::ZERO;
        }
        steps
    }

    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}

/// Loop generation token
///
/// Timers capture the generation current when they were scheduled. Any
/// reset or terminal outcome bumps the generation, so a stale timer can be
/// recognized and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn bump(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_step_carries_remainder() {
        let mut step = FixedStep::new(Duration::from_millis(100));
        assert_eq!(step.advance(Duration::from_millis(250)), 2);
        assert_eq!(step.advance(Duration::from_millis(50)), 1);
        assert_eq!(step.advance(Duration::from_millis(99)), 0);
    }

    #[test]
    fn test_fixed_step_caps_substeps() {
        let mut step = FixedStep::new(Duration::from_millis(10));
        assert_eq!(step.advance(Duration::from_secs(5)), consts::MAX_SUBSTEPS);
        // Backlog dropped
        assert_eq!(step.advance(Duration::from_millis(5)), 0);
    }

    #[test]
    fn test_generation_bump() {
        let mut g = Generation::default();
        let before = g;
        g.bump();
        assert_ne!(before, g);
        assert_eq!(g.value(), 1);
    }
}
