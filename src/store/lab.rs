//! MRI lab store
//!
//! Budget, prestige, procurement, safety console settings and the
//! experiment lifecycle. Every mutation is a named transition; readers get
//! plain getters.

use std::fmt;

use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sim::formulas;
use crate::sim::hardware::{
    CoilType, CoolingSystem, GradientTier, LabConfiguration, MagnetStrength, ModelCount,
    ScanParameters, ShimmingVector,
};
use crate::sim::random::RngState;
use crate::sim::scan::{self, ExperimentResult, ScanPreview, ScanReport, ScanRequest};
use crate::tuning::Balance;

/// Tutorial step value once the tutorial is over
pub const TUTORIAL_DONE: u32 = 99;
/// Range of each shim axis after a new round
const ROUND_SHIM_DRIFT: std::ops::Range<i32> = -30..30;

/// Subject population for the next scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SubjectType {
    #[default]
    Phantom,
    Adult,
    Pediatric,
    Neonate,
}

impl SubjectType {
    pub const ALL: [SubjectType; 4] = [
        Self::Phantom,
        Self::Adult,
        Self::Pediatric,
        Self::Neonate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::Phantom => "Phantom",
            SubjectType::Adult => "Adult",
            SubjectType::Pediatric => "Pediatric",
            SubjectType::Neonate => "Neonate",
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item from the procurement shop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purchase {
    Magnet(MagnetStrength),
    Cooling(CoolingSystem),
    Coil(CoilType),
    Gradient(GradientTier),
    ParallelTransmit,
}

impl fmt::Display for Purchase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Purchase::Magnet(m) => write!(f, "{} magnet", m),
            Purchase::Cooling(c) => write!(f, "{:?} cooling", c),
            Purchase::Coil(c) => write!(f, "{:?} coil", c),
            Purchase::Gradient(g) => write!(f, "{:?} gradients", g),
            Purchase::ParallelTransmit => f.write_str("pTx system"),
        }
    }
}

/// Installed hardware; magnet, cooling and coil are empty until bought
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LabSetup {
    pub magnet: Option<MagnetStrength>,
    pub cooling: Option<CoolingSystem>,
    pub coil: Option<CoilType>,
    pub gradient: GradientTier,
    pub parallel_transmit: bool,
}

impl LabSetup {
    pub fn is_complete(&self) -> bool {
        self.validated().is_ok()
    }

    /// The configuration a scan runs with
    pub fn validated(&self) -> Result<LabConfiguration> {
        Ok(LabConfiguration {
            magnet: self.magnet.ok_or(Error::IncompleteSetup("magnet"))?,
            cooling: self.cooling.ok_or(Error::IncompleteSetup("cooling system"))?,
            coil: self.coil.ok_or(Error::IncompleteSetup("RF coil"))?,
            gradient: self.gradient,
            parallel_transmit: self.parallel_transmit,
        })
    }

    fn has(&self, item: Purchase) -> bool {
        match item {
            Purchase::Magnet(m) => self.magnet == Some(m),
            Purchase::Cooling(c) => self.cooling == Some(c),
            Purchase::Coil(c) => self.coil == Some(c),
            Purchase::Gradient(g) => self.gradient == g,
            Purchase::ParallelTransmit => self.parallel_transmit,
        }
    }

    fn install(&mut self, item: Purchase) {
        match item {
            Purchase::Magnet(m) => self.magnet = Some(m),
            Purchase::Cooling(c) => self.cooling = Some(c),
            Purchase::Coil(c) => self.coil = Some(c),
            Purchase::Gradient(g) => self.gradient = g,
            Purchase::ParallelTransmit => self.parallel_transmit = true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChecklistItem {
    /// Physiological monitoring attached
    Physiological,
    /// Vestibular screening done
    Vestibular,
    /// Metallic implants ruled out
    MetallicImplants,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Checklist {
    pub physiological: bool,
    pub vestibular: bool,
    pub metallic_implants: bool,
}

impl Checklist {
    pub fn toggle(&mut self, item: ChecklistItem) {
        let flag = match item {
            ChecklistItem::Physiological => &mut self.physiological,
            ChecklistItem::Vestibular => &mut self.vestibular,
            ChecklistItem::MetallicImplants => &mut self.metallic_implants,
        };
        *flag = !*flag;
    }

    pub fn all_checked(&self) -> bool {
        self.physiological && self.vestibular && self.metallic_implants
    }
}

/// Screen flow of the lab track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    Start,
    Procurement,
    Safety,
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tutorial {
    pub active: bool,
    pub step: u32,
}

impl Default for Tutorial {
    fn default() -> Self {
        Self {
            active: true,
            step: 0,
        }
    }
}

impl Tutorial {
    /// Move `from -> from + 1` only when the tutorial is waiting on that step
    fn advance_from(&mut self, from: u32) {
        if self.active && self.step == from {
            self.step = from + 1;
            log::debug!("Tutorial step {}", self.step);
        }
    }
}

/// Everything a new game starts with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabState {
    pub budget: u64,
    pub prestige: u32,
    pub day: u32,
    pub unlocked_magnets: Vec<MagnetStrength>,
    pub setup: LabSetup,
    pub subject: SubjectType,
    pub models: ModelCount,
    pub checklist: Checklist,
    pub params: ScanParameters,
    pub shim: ShimmingVector,
    pub stage: Stage,
    pub last_result: Option<ExperimentResult>,
    pub tutorial: Tutorial,
}

impl LabState {
    pub fn new(balance: &Balance) -> Self {
        Self {
            budget: balance.starting_budget,
            prestige: 0,
            day: 1,
            unlocked_magnets: vec![MagnetStrength::T3],
            setup: LabSetup::default(),
            subject: SubjectType::Phantom,
            models: ModelCount::default(),
            checklist: Checklist::default(),
            params: ScanParameters::default(),
            shim: ShimmingVector::default(),
            stage: Stage::Start,
            last_result: None,
            tutorial: Tutorial::default(),
        }
    }
}

#[derive(Debug)]
pub struct LabStore {
    balance: Balance,
    state: LabState,
    rng: Pcg32,
}

impl LabStore {
    pub fn new(balance: Balance, rng: RngState) -> Self {
        let state = LabState::new(&balance);
        Self {
            balance,
            state,
            rng: rng.to_rng(),
        }
    }

    pub fn state(&self) -> &LabState {
        &self.state
    }

    pub fn balance(&self) -> &Balance {
        &self.balance
    }

    pub fn is_unlocked(&self, magnet: MagnetStrength) -> bool {
        self.state.unlocked_magnets.contains(&magnet)
    }

    pub fn set_budget(&mut self, budget: u64) {
        self.state.budget = budget;
    }

    /// Buy and install an item, returning what it cost
    pub fn purchase(&mut self, item: Purchase) -> Result<u64> {
        if let Purchase::Magnet(magnet) = item {
            if !self.is_unlocked(magnet) {
                return Err(Error::MagnetLocked {
                    magnet,
                    required: self.balance.unlocks.required(magnet),
                });
            }
        }
        if self.state.setup.has(item) {
            return Err(Error::AlreadyInstalled(item));
        }
        let cost = self.balance.costs.price(item);
        if cost > self.state.budget {
            return Err(Error::InsufficientBudget {
                cost,
                budget: self.state.budget,
            });
        }

        self.state.budget -= cost;
        self.state.setup.install(item);
        log::info!("Purchased {} for ${}", item, cost);

        let tutorial = &mut self.state.tutorial;
        match item {
            Purchase::Magnet(MagnetStrength::T3) => tutorial.advance_from(2),
            Purchase::Cooling(_) => tutorial.advance_from(3),
            Purchase::Coil(_) => tutorial.advance_from(4),
            _ => {}
        }
        Ok(cost)
    }

    pub fn select_subject(&mut self, subject: SubjectType) -> Result<()> {
        let required = self.balance.subjects.required(subject);
        if self.state.prestige < required {
            return Err(Error::SubjectLocked { subject, required });
        }
        self.state.subject = subject;
        self.state.tutorial.advance_from(1);
        Ok(())
    }

    pub fn set_model_count(&mut self, n: u32) -> Result<()> {
        self.state.models = ModelCount::new(n)?;
        Ok(())
    }

    pub fn set_scan_params(&mut self, params: ScanParameters) {
        self.state.params =
            ScanParameters::new(params.sequence, params.resolution, params.duration);
    }

    pub fn set_shimming(&mut self, shim: ShimmingVector) {
        self.state.shim = ShimmingVector::new(shim.x, shim.y, shim.z);
    }

    pub fn toggle_checklist(&mut self, item: ChecklistItem) {
        self.state.checklist.toggle(item);
    }

    /// Change screen; the safety console needs a complete setup
    pub fn set_stage(&mut self, stage: Stage) -> Result<()> {
        if stage == Stage::Safety {
            self.state.setup.validated()?;
            self.state.tutorial.advance_from(5);
        }
        self.state.stage = stage;
        Ok(())
    }

    /// Console readouts for the current settings
    pub fn preview(&self) -> ScanPreview {
        let setup = &self.state.setup;
        ScanPreview::compute(
            setup.magnet.unwrap_or(MagnetStrength::T3),
            setup.gradient,
            setup.parallel_transmit,
            &self.state.params,
            &self.state.shim,
            self.state.models,
        )
    }

    /// Freeze the current settings into a scan request, if a scan may start
    pub fn scan_request(&self) -> Result<ScanRequest> {
        let config = self.state.setup.validated()?;
        if !self.state.checklist.all_checked() {
            return Err(Error::ScanNotReady("safety checklist incomplete"));
        }
        let params = &self.state.params;
        let demand = formulas::gradient_demand(params.resolution, params.sequence);
        if demand > formulas::gradient_capacity(config.gradient) {
            return Err(Error::ScanNotReady("gradient demand exceeds hardware capacity"));
        }
        Ok(ScanRequest {
            config,
            params: self.state.params,
            shim: self.state.shim,
            models: self.state.models,
        })
    }

    /// Resolve a scan with the current settings
    ///
    /// Does not apply rewards; the result is committed with
    /// `complete_experiment` once the console has played the log back.
    pub fn run_experiment(&mut self) -> Result<ScanReport> {
        let request = self.scan_request()?;
        log::info!(
            "Running {} scan on {} ({}, {}mm, {}min, N={})",
            request.config.magnet,
            self.state.subject,
            request.params.sequence.as_str(),
            request.params.resolution,
            request.params.duration,
            request.models.get()
        );
        Ok(scan::resolve_scan(&request, &mut self.rng))
    }

    /// Apply a result's rewards, unlock magnets and end the tutorial
    pub fn complete_experiment(&mut self, result: ExperimentResult) {
        let state = &mut self.state;
        state.prestige += result.prestige_delta;
        state.budget += result.money_delta;

        for magnet in MagnetStrength::ALL {
            if state.prestige >= self.balance.unlocks.required(magnet)
                && !state.unlocked_magnets.contains(&magnet)
            {
                log::info!("Unlocked {} magnet at {} prestige", magnet, state.prestige);
                state.unlocked_magnets.push(magnet);
            }
        }
        if state.tutorial.active {
            state.tutorial.step = TUTORIAL_DONE;
        }
        state.last_result = Some(result);
    }

    /// Start the next day: back to procurement with a drifted shim
    pub fn next_round(&mut self) {
        let mut drift = || f64::from(self.rng.random_range(ROUND_SHIM_DRIFT));
        let shim = ShimmingVector::new(drift(), drift(), drift());

        let state = &mut self.state;
        state.day += 1;
        state.stage = Stage::Procurement;
        state.last_result = None;
        state.shim = shim;
        log::info!("Day {}", state.day);
    }

    pub fn next_tutorial_step(&mut self) {
        self.state.tutorial.step += 1;
    }

    pub fn skip_tutorial(&mut self) {
        self.state.tutorial = Tutorial {
            active: false,
            step: TUTORIAL_DONE,
        };
    }

    pub fn reset(&mut self) {
        self.state = LabState::new(&self.balance);
    }
}
