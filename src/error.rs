//! Precondition errors raised by store transitions
//!
//! Game failures (quench, overheating, ...) are outcomes, not errors. These
//! variants cover calls the UI layer should not have made.

use thiserror::Error;

use crate::sim::debate::Card;
use crate::sim::hardware::MagnetStrength;
use crate::sim::neuromod::Circuit;
use crate::store::lab::{Purchase, SubjectType};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("lab setup incomplete: no {0} purchased")]
    IncompleteSetup(&'static str),

    #[error("model count {0} outside valid range 2..=64")]
    InvalidModelCount(u32),

    #[error("insufficient budget: item costs {cost}, budget is {budget}")]
    InsufficientBudget { cost: u64, budget: u64 },

    #[error("{0} already installed")]
    AlreadyInstalled(Purchase),

    #[error("{magnet} magnet requires {required} prestige")]
    MagnetLocked { magnet: MagnetStrength, required: u32 },

    #[error("{subject} subjects require {required} prestige")]
    SubjectLocked { subject: SubjectType, required: u32 },

    #[error("scan not ready: {0}")]
    ScanNotReady(&'static str),

    #[error("incorrect diagnosis: {0} does not match the recorded circuit")]
    WrongDiagnosis(Circuit),

    #[error("treatment requires a confirmed diagnosis")]
    NotDiagnosed,

    #[error("no treatment method selected")]
    NoTreatmentSelected,

    #[error("debate already decided, card {0} not played")]
    DebateFinished(Card),

    #[error("invalid {what} data: {reason}")]
    InvalidData { what: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
