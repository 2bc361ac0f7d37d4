//! Chapter 2 wireless steering maze
//!
//! The mouse walks forward on its own; the player steers it through the
//! implant. Turning needs two LEDs far enough apart that their light does
//! not spill into the neighbouring cortex.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Arena coordinates are percent of the arena size
pub const START: DVec2 = DVec2::new(50.0, 90.0);
pub const SPEED: f64 = 1.5;
pub const TURN_DEGREES: f64 = 30.0;
/// Leaving this box snaps the mouse back into `CLAMP_BOUNDS`
const WALL_BOUNDS: (f64, f64) = (10.0, 90.0);
const CLAMP_BOUNDS: (f64, f64) = (5.0, 95.0);
/// Reaching above this line escapes the arena
pub const EXTRACTION_LINE: f64 = 15.0;

pub const LED_SPACING_RANGE: (f64, f64) = (0.1, 3.0);
pub const DEFAULT_LED_SPACING: f64 = 0.5;
/// Minimum spacing (mm) before turning signals cross-talk
pub const CROSSTALK_SPACING: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MazeStatus {
    #[default]
    Setup,
    Active,
    Failed,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SteerAction {
    Left,
    Right,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MazeOutcome {
    /// LEDs too close, neighbouring cortex lit up
    Crosstalk,
    /// Mouse reached the extraction zone
    Escaped,
}

impl MazeOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            MazeOutcome::Crosstalk => {
                "CRITICAL FAILURE: Signal Crosstalk Detected! LEDs are too close (<1.5mm). Red light spread to adjacent cortex."
            }
            MazeOutcome::Escaped => "TARGET ACQUIRED. Wireless Control Successful.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mouse {
    pub position: DVec2,
    /// Degrees, 0 is up, positive turns right
    pub angle: f64,
    pub frozen: bool,
}

impl Default for Mouse {
    fn default() -> Self {
        Self {
            position: START,
            angle: 0.0,
            frozen: false,
        }
    }
}

impl Mouse {
    fn heading(&self) -> DVec2 {
        let rad = (self.angle - 90.0).to_radians();
        DVec2::new(rad.cos(), rad.sin())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maze {
    led_spacing: f64,
    mouse: Mouse,
    status: MazeStatus,
}

impl Default for Maze {
    fn default() -> Self {
        Self {
            led_spacing: DEFAULT_LED_SPACING,
            mouse: Mouse::default(),
            status: MazeStatus::Setup,
        }
    }
}

impl Maze {
    pub fn led_spacing(&self) -> f64 {
        self.led_spacing
    }

    pub fn mouse(&self) -> &Mouse {
        &self.mouse
    }

    pub fn status(&self) -> MazeStatus {
        self.status
    }

    pub fn message(&self) -> &'static str {
        match self.status {
            MazeStatus::Setup | MazeStatus::Active => {
                "Mission: Navigate the mouse to the extraction point."
            }
            MazeStatus::Failed => MazeOutcome::Crosstalk.message(),
            MazeStatus::Complete => MazeOutcome::Escaped.message(),
        }
    }

    /// Implant configuration is only editable during setup
    pub fn set_led_spacing(&mut self, spacing: f64) -> bool {
        if self.status != MazeStatus::Setup {
            return false;
        }
        self.led_spacing = spacing.clamp(LED_SPACING_RANGE.0, LED_SPACING_RANGE.1);
        true
    }

    pub fn start(&mut self) -> bool {
        if self.status != MazeStatus::Setup {
            return false;
        }
        self.status = MazeStatus::Active;
        true
    }

    /// Apply a player command; ignored unless the run is active
    pub fn steer(&mut self, action: SteerAction) -> Option<MazeOutcome> {
        if self.status != MazeStatus::Active {
            return None;
        }
        match action {
            SteerAction::Left | SteerAction::Right if self.led_spacing < CROSSTALK_SPACING => {
                self.status = MazeStatus::Failed;
                log::info!("Maze failed: crosstalk at {:.1}mm spacing", self.led_spacing);
                Some(MazeOutcome::Crosstalk)
            }
            SteerAction::Left => {
                self.turn(-TURN_DEGREES);
                None
            }
            SteerAction::Right => {
                self.turn(TURN_DEGREES);
                None
            }
            SteerAction::Stop => {
                self.mouse.frozen = true;
                None
            }
        }
    }

    fn turn(&mut self, degrees: f64) {
        self.mouse.angle += degrees;
        self.mouse.frozen = false;
    }

    /// Walk one 50 ms step
    pub fn tick(&mut self) -> Option<MazeOutcome> {
        if self.status != MazeStatus::Active || self.mouse.frozen {
            return None;
        }

        let mut next = self.mouse.position + self.mouse.heading() * SPEED;
        let outside = |v: f64| v < WALL_BOUNDS.0 || v > WALL_BOUNDS.1;
        if outside(next.x) || outside(next.y) {
            next = next.clamp(DVec2::splat(CLAMP_BOUNDS.0), DVec2::splat(CLAMP_BOUNDS.1));
        }
        self.mouse.position = next;

        if next.y < EXTRACTION_LINE {
            self.status = MazeStatus::Complete;
            log::info!("Maze complete at ({:.1}, {:.1})", next.x, next.y);
            return Some(MazeOutcome::Escaped);
        }
        None
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_until_done(maze: &mut Maze, max_ticks: usize) -> (usize, Option<MazeOutcome>) {
        for i in 1..=max_ticks {
            if let Some(outcome) = maze.tick() {
                return (i, Some(outcome));
            }
        }
        (max_ticks, None)
    }

    #[test]
    fn test_walks_straight_to_extraction() {
        let mut maze = Maze::default();
        assert!(maze.start());
        let (ticks, outcome) = run_until_done(&mut maze, 200);
        assert_eq!(outcome, Some(MazeOutcome::Escaped));
        // 90 -> below 15 at 1.5 per tick
        assert_eq!(ticks, 51);
        assert!((maze.mouse().position.x - 50.0).abs() < 1e-9);
        assert_eq!(maze.status(), MazeStatus::Complete);
        assert_eq!(maze.tick(), None);
    }

    #[test]
    fn test_setup_does_not_move() {
        let mut maze = Maze::default();
        assert_eq!(maze.tick(), None);
        assert_eq!(maze.mouse().position, START);
        assert_eq!(maze.steer(SteerAction::Left), None);
        assert_eq!(maze.mouse().angle, 0.0);
    }

    #[test]
    fn test_turning_with_narrow_spacing_crosstalks() {
        let mut maze = Maze::default();
        maze.start();
        assert_eq!(maze.steer(SteerAction::Right), Some(MazeOutcome::Crosstalk));
        assert_eq!(maze.status(), MazeStatus::Failed);
        assert_eq!(maze.tick(), None);
    }

    #[test]
    fn test_stop_allowed_with_narrow_spacing() {
        let mut maze = Maze::default();
        maze.start();
        assert_eq!(maze.steer(SteerAction::Stop), None);
        assert!(maze.mouse().frozen);
        maze.tick();
        assert_eq!(maze.mouse().position, START);
    }

    #[test]
    fn test_wide_spacing_turns_and_unfreezes() {
        let mut maze = Maze::default();
        assert!(maze.set_led_spacing(2.0));
        maze.start();
        assert!(!maze.set_led_spacing(0.5));

        maze.steer(SteerAction::Stop);
        maze.steer(SteerAction::Right);
        assert_eq!(maze.mouse().angle, 30.0);
        assert!(!maze.mouse().frozen);

        maze.tick();
        let pos = maze.mouse().position;
        assert!(pos.x > 50.0 && pos.y < 90.0);
    }

    #[test]
    fn test_wall_clamps_position() {
        let mut maze = Maze::default();
        maze.set_led_spacing(3.0);
        maze.start();
        maze.steer(SteerAction::Right);
        maze.steer(SteerAction::Right);
        maze.steer(SteerAction::Right);
        // Heading right along y = 90
        for _ in 0..100 {
            maze.tick();
        }
        let pos = maze.mouse().position;
        assert_eq!(pos.x, 95.0);
        assert!((pos.y - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_spacing_clamped_and_reset() {
        let mut maze = Maze::default();
        maze.set_led_spacing(9.0);
        assert_eq!(maze.led_spacing(), 3.0);
        maze.start();
        maze.tick();
        maze.reset();
        assert_eq!(maze, Maze::default());
    }
}
