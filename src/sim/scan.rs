//! MRI experiment resolution
//!
//! A scan runs through a fixed sequence of gates. The first gate that
//! trips ends the scan with a classified failure; if none trips the scan
//! succeeds and pays out by image quality. The order of the gates is part
//! of the game's contract.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::formulas::{
    self, MOTION_RISK_DURATION, PNS_WARNING_PERCENT, SHIM_ABORT_THRESHOLD, SHIM_GOOD_THRESHOLD,
};
use super::hardware::{
    CoolingSystem, GradientTier, LabConfiguration, MagnetStrength, ModelCount, ScanParameters,
    ShimmingVector,
};
use super::random::RandomSource;

/// Minimum SNR for a publishable image
pub const SNR_FLOOR: f64 = 20.0;
/// SNR at which rewards are paid at 1x
pub const REFERENCE_SNR: f64 = 50.0;
/// Grant money for a 1x quality scan
pub const BASE_MONEY: f64 = 500_000.0;
/// Prestige for a 1x quality scan
pub const BASE_PRESTIGE: f64 = 10.0;
/// Consolation grant paid on any failure
pub const CONSOLATION_MONEY: u64 = 50_000;
/// Consolation prestige awarded on any failure
pub const CONSOLATION_PRESTIGE: u32 = 2;
/// A long scan fails from motion when the draw exceeds this
pub const MOTION_ARTIFACT_ROLL: f64 = 0.5;

/// Console pauses between stages
pub const INIT_DELAY: Duration = Duration::from_millis(800);
pub const B0_DELAY: Duration = Duration::from_millis(800);
pub const SHIM_DELAY: Duration = Duration::from_millis(800);
pub const ACQUISITION_DELAY: Duration = Duration::from_millis(1000);

/// Why a scan failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    /// Hardware incompatibility: 11.7T magnet without superfluid cooling
    Quench,
    /// Ultra-high field without parallel transmit
    RfInhomogeneity,
    /// Residual shim error above the abort threshold
    GeometricDistortion,
    /// Requested slew rate above hardware capacity
    GradientOverload,
    /// Peripheral nerve stimulation above tolerance
    PnsAbort,
    /// Subject moved during a long scan
    MotionArtifact,
    /// Image indistinguishable from noise
    LowSnr,
}

impl FailureReason {
    /// Short classification code
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::Quench => "quench",
            FailureReason::RfInhomogeneity => "B1 inhomogeneity",
            FailureReason::GeometricDistortion => "geometric distortion",
            FailureReason::GradientOverload => "gradient overload",
            FailureReason::PnsAbort => "PNS abort",
            FailureReason::MotionArtifact => "motion artifact",
            FailureReason::LowSnr => "noise",
        }
    }

    /// Player-facing console message
    pub fn message(&self) -> &'static str {
        match self {
            FailureReason::Quench => "MAGNET QUENCH DETECTED! Temp > 2.1K. Critical failure.",
            FailureReason::RfInhomogeneity => {
                "FATAL: B1+ Inhomogeneity too high. Black holes in ROI. pTx hardware missing."
            }
            FailureReason::GeometricDistortion => {
                "Geometric Distortion severe. Shimming failed to correct field."
            }
            FailureReason::GradientOverload => {
                "GRADIENT FAILURE: Requested slew rate exceeds hardware capacity. Upgrade gradients."
            }
            FailureReason::PnsAbort => {
                "SAFETY HALT: Subject reported intense peripheral nerve stimulation (PNS). Scan aborted."
            }
            FailureReason::MotionArtifact => {
                "Subject moved during long scan. Motion artifacts render image useless."
            }
            FailureReason::LowSnr => "SNR too low. Image is just noise.",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Terminal record of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub success: bool,
    /// Computed SNR, 0 when a gate before the SNR stage tripped
    pub snr: f64,
    pub reason: Option<FailureReason>,
    pub message: String,
    pub prestige_delta: u32,
    pub money_delta: u64,
}

impl ExperimentResult {
    fn failure(reason: FailureReason, snr: f64) -> Self {
        Self {
            success: false,
            snr,
            reason: Some(reason),
            message: reason.message().to_string(),
            prestige_delta: CONSOLATION_PRESTIGE,
            money_delta: CONSOLATION_MONEY,
        }
    }

    fn success(snr: f64) -> Self {
        let quality = snr / REFERENCE_SNR;
        Self {
            success: true,
            snr,
            reason: None,
            message: "Paper Published".to_string(),
            prestige_delta: (BASE_PRESTIGE * quality).floor() as u32,
            money_delta: (BASE_MONEY * quality).floor() as u64,
        }
    }
}

/// Everything the resolution engine reads, frozen for one scan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub config: LabConfiguration,
    pub params: ScanParameters,
    pub shim: ShimmingVector,
    pub models: ModelCount,
}

/// A console line and the pause that follows it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanLogEntry {
    pub message: String,
    pub delay_after: Duration,
}

/// Result plus the staged console log that leads up to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub result: ExperimentResult,
    pub log: Vec<ScanLogEntry>,
}

impl ScanReport {
    /// Sum of all artificial pauses
    pub fn total_delay(&self) -> Duration {
        self.log.iter().map(|e| e.delay_after).sum()
    }
}

struct Console {
    log: Vec<ScanLogEntry>,
}

impl Console {
    fn line(&mut self, message: impl Into<String>, delay_after: Duration) {
        self.log.push(ScanLogEntry {
            message: message.into(),
            delay_after,
        });
    }

    fn fail(mut self, reason: FailureReason, snr: f64) -> ScanReport {
        log::info!("Scan failed: {}", reason);
        self.line(reason.message(), Duration::ZERO);
        ScanReport {
            result: ExperimentResult::failure(reason, snr),
            log: self.log,
        }
    }
}

/// Run one scan through the gate pipeline
///
/// Draws from `rng` only when the scan is long enough to risk motion, so a
/// scan of 10 minutes or less is a pure function of the request.
pub fn resolve_scan<R: RandomSource + ?Sized>(request: &ScanRequest, rng: &mut R) -> ScanReport {
    let ScanRequest {
        config,
        params,
        shim,
        models,
    } = *request;
    let mut console = Console { log: Vec::new() };

    console.line("Initializing gradients...", INIT_DELAY);

    // 1. Magnet / cryogenics
    if config.magnet == MagnetStrength::T11_7 && config.cooling != CoolingSystem::Superfluid {
        return console.fail(FailureReason::Quench, 0.0);
    }
    console.line(format!("B0 Field Strength: {}... Stable.", config.magnet), B0_DELAY);

    // 2. RF transmit homogeneity
    if config.magnet.needs_parallel_transmit() && !config.parallel_transmit {
        return console.fail(FailureReason::RfInhomogeneity, 0.0);
    }

    // 3. Shimming
    let shim_error = formulas::shim_error(&shim);
    console.line(
        format!("Running Active Shimming... Residual Δ: {}Hz", shim_error),
        Duration::ZERO,
    );
    if shim_error > SHIM_ABORT_THRESHOLD {
        return console.fail(FailureReason::GeometricDistortion, 0.0);
    }
    if let Some(last) = console.log.last_mut() {
        last.delay_after = SHIM_DELAY;
    }

    // 4. Gradient slew rate
    let demand = formulas::gradient_demand(params.resolution, params.sequence);
    let capacity = formulas::gradient_capacity(config.gradient);
    console.line(
        format!("Checking Gradient Slew Rates... Demand: {:.0} T/m/s", demand),
        Duration::ZERO,
    );
    if demand > capacity {
        return console.fail(FailureReason::GradientOverload, 0.0);
    }

    // 5. Peripheral nerve stimulation (uncapped ratio)
    if formulas::pns_ratio(demand) > 100.0 {
        return console.fail(FailureReason::PnsAbort, 0.0);
    }

    // 6. Signal
    let safety_factor = formulas::safety_factor(models);
    let snr = formulas::predicted_snr(
        config.magnet,
        params.resolution,
        params.duration,
        params.sequence,
        safety_factor,
    );
    log::debug!(
        "SNR {:.2} (sf={:.3}, res={}mm, dur={}min)",
        snr,
        safety_factor,
        params.resolution,
        params.duration
    );
    console.line(
        format!("Acquiring k-Space data... [{}]", params.sequence.as_str()),
        ACQUISITION_DELAY,
    );

    // 7. Subject motion, the only random gate
    if params.duration > MOTION_RISK_DURATION && rng.next_unit() > MOTION_ARTIFACT_ROLL {
        return console.fail(FailureReason::MotionArtifact, snr);
    }

    // 8. Noise floor
    if snr < SNR_FLOOR {
        return console.fail(FailureReason::LowSnr, snr);
    }

    let result = ExperimentResult::success(snr);
    log::info!(
        "Scan succeeded: SNR {:.1}, +{} prestige, +${}",
        snr,
        result.prestige_delta,
        result.money_delta
    );
    console.line(
        format!("Reconstruction complete. SNR {:.1}", snr),
        Duration::ZERO,
    );
    ScanReport {
        result,
        log: console.log,
    }
}

/// Live console feedback computed from the current (unfrozen) settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanPreview {
    pub predicted_snr: f64,
    pub safety_factor: f64,
    pub gradient_demand: f64,
    pub gradient_capacity: f64,
    pub gradient_load: f64,
    pub gradient_overloaded: bool,
    pub pns_risk: f64,
    pub pns_warning: bool,
    pub shim_error: f64,
    pub shim_good: bool,
    pub shim_blur: f64,
    pub motion_blur: f64,
    pub total_blur: f64,
    /// 7T/11.7T without parallel transmit shows B1+ dropouts
    pub rf_artifacts: bool,
}

impl ScanPreview {
    pub fn compute(
        magnet: MagnetStrength,
        gradient: GradientTier,
        parallel_transmit: bool,
        params: &ScanParameters,
        shim: &ShimmingVector,
        models: ModelCount,
    ) -> Self {
        let safety_factor = formulas::safety_factor(models);
        let demand = formulas::gradient_demand(params.resolution, params.sequence);
        let capacity = formulas::gradient_capacity(gradient);
        let pns_risk = formulas::pns_risk(demand);
        let shim_error = formulas::shim_error(shim);
        let blur = formulas::blur_estimate(shim_error, params.resolution, params.duration);

        Self {
            predicted_snr: formulas::predicted_snr(
                magnet,
                params.resolution,
                params.duration,
                params.sequence,
                safety_factor,
            ),
            safety_factor,
            gradient_demand: demand,
            gradient_capacity: capacity,
            gradient_load: formulas::gradient_load(demand, capacity),
            gradient_overloaded: demand > capacity,
            pns_risk,
            pns_warning: pns_risk > PNS_WARNING_PERCENT,
            shim_error,
            shim_good: shim_error < SHIM_GOOD_THRESHOLD,
            shim_blur: blur.shim,
            motion_blur: blur.motion,
            total_blur: blur.total,
            rf_artifacts: magnet.needs_parallel_transmit() && !parallel_transmit,
        }
    }
}

/// Plays a scan report's console log back against elapsed time
#[derive(Debug, Clone)]
pub struct ScanReveal {
    report: ScanReport,
    /// Time at which each entry appears, relative to the start
    reveal_at: Vec<Duration>,
    elapsed: Duration,
    shown: usize,
}

impl ScanReveal {
    /// `pacing` scales every artificial delay (0 reveals everything at once)
    pub fn new(report: ScanReport, pacing: f64) -> Self {
        let pacing = pacing.max(0.0);
        let mut reveal_at = Vec::with_capacity(report.log.len());
        let mut t = Duration::ZERO;
        for entry in &report.log {
            reveal_at.push(t);
            t += entry.delay_after.mul_f64(pacing);
        }
        Self {
            report,
            reveal_at,
            elapsed: Duration::ZERO,
            shown: 0,
        }
    }

    /// Advance the clock, returning the entries that became visible
    pub fn advance(&mut self, elapsed: Duration) -> &[ScanLogEntry] {
        self.elapsed += elapsed;
        let start = self.shown;
        while self.shown < self.reveal_at.len() && self.reveal_at[self.shown] <= self.elapsed {
            self.shown += 1;
        }
        &self.report.log[start..self.shown]
    }

    pub fn visible(&self) -> &[ScanLogEntry] {
        &self.report.log[..self.shown]
    }

    pub fn is_done(&self) -> bool {
        self.shown == self.report.log.len()
    }

    pub fn report(&self) -> &ScanReport {
        &self.report
    }

    pub fn into_report(self) -> ScanReport {
        self.report
    }
}
