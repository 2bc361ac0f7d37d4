//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Randomness only through `RandomSource` or a seeded RNG
//! - Fixed tick cadences, driven from outside
//! - No rendering or platform dependencies

pub mod debate;
pub mod formulas;
pub mod hardware;
pub mod level;
pub mod maze;
pub mod neuromod;
pub mod optics;
pub mod random;
pub mod scan;

pub use debate::{Card, DebateState, Verdict};
pub use hardware::{
    CoilType, CoolingSystem, GradientTier, LabConfiguration, MagnetStrength, ModelCount,
    PulseSequence, ScanParameters, ShimmingVector,
};
pub use level::{GridPos, LevelLayout};
pub use maze::{Maze, MazeOutcome, MazeStatus, SteerAction};
pub use neuromod::{Circuit, Method, NeuromodulationState, TreatmentControls, TreatmentResult};
pub use optics::{BeamControls, OpticalFrame, OpticalOutcome, OpticsPuzzle, WavelengthClass};
pub use random::{FixedRoll, RandomSource, RngState, RollSequence};
pub use scan::{ExperimentResult, FailureReason, ScanPreview, ScanReport, ScanRequest, resolve_scan};
