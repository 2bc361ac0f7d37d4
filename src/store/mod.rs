//! State stores
//!
//! Each store owns one track's state and exposes the only transitions that
//! may change it. Stores never sleep or schedule on their own; timed work
//! is driven by `Session`.

pub mod lab;
pub mod neuro;

pub use lab::{LabSetup, LabState, LabStore, Purchase, Stage, SubjectType};
pub use neuro::{Chapter, Deferred, Loop, NeuroState, NeuroStore, Scheduled};
