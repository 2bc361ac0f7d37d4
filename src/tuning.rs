//! Data-driven game balance
//!
//! Prices, unlock thresholds and progression awards. Defaults match the
//! shipped game; a host can override any subset from JSON.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sim::hardware::{CoilType, CoolingSystem, GradientTier, MagnetStrength};
use crate::store::lab::{Purchase, SubjectType};

/// Procurement prices in dollars
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostTable {
    pub magnet_3t: u64,
    pub magnet_7t: u64,
    pub magnet_11_7t: u64,
    pub cooling_standard: u64,
    pub cooling_superfluid: u64,
    pub coil_birdcage: u64,
    pub coil_avanti2: u64,
    pub gradient_standard: u64,
    pub gradient_high_perf: u64,
    pub gradient_connectome: u64,
    pub parallel_transmit: u64,
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            magnet_3t: 1_000_000,
            magnet_7t: 3_000_000,
            magnet_11_7t: 8_000_000,
            cooling_standard: 500_000,
            cooling_superfluid: 2_000_000,
            coil_birdcage: 100_000,
            coil_avanti2: 500_000,
            gradient_standard: 0,
            gradient_high_perf: 800_000,
            gradient_connectome: 2_500_000,
            parallel_transmit: 1_500_000,
        }
    }
}

impl CostTable {
    pub fn price(&self, purchase: Purchase) -> u64 {
        match purchase {
            Purchase::Magnet(MagnetStrength::T3) => self.magnet_3t,
            Purchase::Magnet(MagnetStrength::T7) => self.magnet_7t,
            Purchase::Magnet(MagnetStrength::T11_7) => self.magnet_11_7t,
            Purchase::Cooling(CoolingSystem::Standard) => self.cooling_standard,
            Purchase::Cooling(CoolingSystem::Superfluid) => self.cooling_superfluid,
            Purchase::Coil(CoilType::Birdcage) => self.coil_birdcage,
            Purchase::Coil(CoilType::Avanti2) => self.coil_avanti2,
            Purchase::Gradient(GradientTier::Standard) => self.gradient_standard,
            Purchase::Gradient(GradientTier::HighPerf) => self.gradient_high_perf,
            Purchase::Gradient(GradientTier::Connectome) => self.gradient_connectome,
            Purchase::ParallelTransmit => self.parallel_transmit,
        }
    }
}

/// Prestige needed to buy each magnet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockThresholds {
    pub magnet_7t: u32,
    pub magnet_11_7t: u32,
}

impl Default for UnlockThresholds {
    fn default() -> Self {
        Self {
            magnet_7t: 50,
            magnet_11_7t: 200,
        }
    }
}

impl UnlockThresholds {
    pub fn required(&self, magnet: MagnetStrength) -> u32 {
        match magnet {
            MagnetStrength::T3 => 0,
            MagnetStrength::T7 => self.magnet_7t,
            MagnetStrength::T11_7 => self.magnet_11_7t,
        }
    }
}

/// Prestige needed to scan each subject population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectRequirements {
    pub adult: u32,
    pub pediatric: u32,
    pub neonate: u32,
}

impl Default for SubjectRequirements {
    fn default() -> Self {
        Self {
            adult: 20,
            pediatric: 80,
            neonate: 300,
        }
    }
}

impl SubjectRequirements {
    pub fn required(&self, subject: SubjectType) -> u32 {
        match subject {
            SubjectType::Phantom => 0,
            SubjectType::Adult => self.adult,
            SubjectType::Pediatric => self.pediatric,
            SubjectType::Neonate => self.neonate,
        }
    }
}

/// Knowledge points and penalties on the Neuro-Files track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryAwards {
    pub optics_solved: u64,
    pub maze_escaped: u64,
    pub diagnosis: u64,
    pub treatment_selected: u64,
    pub debate_won: u64,
    /// Suspicion raised by implant crosstalk
    pub crosstalk_suspicion: u32,
    /// CEO credibility swing from the treatment outcome
    pub treatment_credibility_shift: i32,
}

impl Default for StoryAwards {
    fn default() -> Self {
        Self {
            optics_solved: 200,
            maze_escaped: 150,
            diagnosis: 50,
            treatment_selected: 30,
            debate_won: 500,
            crosstalk_suspicion: 30,
            treatment_credibility_shift: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Balance {
    pub starting_budget: u64,
    pub costs: CostTable,
    pub unlocks: UnlockThresholds,
    pub subjects: SubjectRequirements,
    pub story: StoryAwards,
}

impl Default for Balance {
    fn default() -> Self {
        Self {
            starting_budget: 2_000_000,
            costs: CostTable::default(),
            unlocks: UnlockThresholds::default(),
            subjects: SubjectRequirements::default(),
            story: StoryAwards::default(),
        }
    }
}

impl Balance {
    pub fn from_json(json: &str) -> Result<Self> {
        let balance: Self = serde_json::from_str(json).map_err(|e| Error::InvalidData {
            what: "balance",
            reason: e.to_string(),
        })?;
        if balance.unlocks.magnet_7t > balance.unlocks.magnet_11_7t {
            log::warn!(
                "11.7T unlocks before 7T ({} < {})",
                balance.unlocks.magnet_11_7t,
                balance.unlocks.magnet_7t
            );
        }
        Ok(balance)
    }
}
