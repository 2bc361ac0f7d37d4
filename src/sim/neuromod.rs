//! Chapter 3 closed-loop neuromodulation
//!
//! Light suppresses an overactive subthalamic nucleus (STN). Too little
//! effective light leaves the tremor; too much raw power cooks the tissue.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::random::RandomSource;
use crate::consts::{BODY_TEMPERATURE, NEUROMOD_DT};

pub const WAVELENGTH_RANGE: (f64, f64) = (400.0, 1100.0);
pub const POWER_RANGE: (f64, f64) = (0.0, 100.0);
pub const FREQUENCY_RANGE: (f64, f64) = (1.0, 100.0);

/// Untreated STN activity
pub const BASELINE_ACTIVITY: f64 = 80.0;
const ACTIVITY_RANGE: (f64, f64) = (10.0, 100.0);
const SUPPRESSION_GAIN: f64 = 2.0;
const NOISE_AMPLITUDE: f64 = 10.0;

const HEATING_GAIN: f64 = 0.02;
const COOLING_PER_TICK: f64 = 0.5;
/// Above this the tissue loses integrity
pub const DAMAGE_TEMPERATURE: f64 = 41.0;
/// Stability only accrues below this temperature
pub const STABLE_TEMPERATURE: f64 = 40.0;
/// Stability only accrues below this activity
pub const STABLE_ACTIVITY: f64 = 40.0;
pub const FULL_STABILITY: f64 = 100.0;

/// ChR2 absorption window for direct fiber illumination (nm)
const FIBER_WINDOW: (f64, f64) = (450.0, 500.0);
const FIBER_OFF_BAND: f64 = 0.1;
/// UCNP absorption peak and half-width (nm)
const UCNP_PEAK: f64 = 980.0;
const UCNP_HALF_WIDTH: f64 = 50.0;

/// Basal ganglia states offered in the diagnosis step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Circuit {
    Healthy,
    Parkinsonian,
    Huntington,
}

impl Circuit {
    pub const ALL: [Circuit; 3] = [Self::Healthy, Self::Parkinsonian, Self::Huntington];

    /// The case file shows STN hyperactivity
    pub const PATIENT: Circuit = Circuit::Parkinsonian;

    pub fn label(&self) -> &'static str {
        match self {
            Circuit::Healthy => "Normal Pathway",
            Circuit::Parkinsonian => "Parkinsonian State",
            Circuit::Huntington => "Huntington State",
        }
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Light delivery method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Implanted optical fiber, fixed 473nm
    Fiber,
    /// Injected upconverting nanoparticles driven by NIR
    Nanoparticle,
}

impl Method {
    pub fn default_wavelength(&self) -> f64 {
        match self {
            Method::Fiber => 473.0,
            Method::Nanoparticle => 980.0,
        }
    }

    pub fn fixed_wavelength(&self) -> bool {
        matches!(self, Method::Fiber)
    }
}

/// Fraction of delivered light that reaches the opsin
pub fn efficiency(method: Method, wavelength: f64) -> f64 {
    match method {
        Method::Fiber => {
            if (FIBER_WINDOW.0..=FIBER_WINDOW.1).contains(&wavelength) {
                1.0
            } else {
                FIBER_OFF_BAND
            }
        }
        Method::Nanoparticle => {
            let delta = (wavelength - UCNP_PEAK).abs();
            if delta < UCNP_HALF_WIDTH {
                (1.0 - delta / UCNP_HALF_WIDTH).max(0.0)
            } else {
                0.0
            }
        }
    }
}

/// Stimulation knobs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreatmentControls {
    pub method: Method,
    /// nm
    pub wavelength: f64,
    /// mW
    pub power: f64,
    /// Hz
    pub frequency: f64,
}

impl TreatmentControls {
    /// Fresh controls for a method: default wavelength, power off, 20 Hz
    pub fn for_method(method: Method) -> Self {
        Self {
            method,
            wavelength: method.default_wavelength(),
            power: 0.0,
            frequency: 20.0,
        }
    }

    pub fn set_wavelength(&mut self, wavelength: f64) {
        if !self.method.fixed_wavelength() {
            self.wavelength = wavelength.clamp(WAVELENGTH_RANGE.0, WAVELENGTH_RANGE.1);
        }
    }

    pub fn set_power(&mut self, power: f64) {
        self.power = power.clamp(POWER_RANGE.0, POWER_RANGE.1);
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency.clamp(FREQUENCY_RANGE.0, FREQUENCY_RANGE.1);
    }

    pub fn duty_cycle(&self) -> f64 {
        (self.frequency / 100.0).min(1.0)
    }

    pub fn effective_power(&self) -> f64 {
        self.power * efficiency(self.method, self.wavelength) * self.duty_cycle()
    }
}

/// Live patient readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeuromodulationState {
    /// Seconds of stimulation
    pub elapsed: f64,
    /// Celsius
    pub temperature: f64,
    /// STN activity, 10..=100
    pub activity: f64,
    pub tremor: f64,
    /// Tissue integrity, 0..=100
    pub integrity: f64,
    /// Accumulated stable time, 0..=100
    pub stability: f64,
}

impl Default for NeuromodulationState {
    fn default() -> Self {
        Self {
            elapsed: 0.0,
            temperature: BODY_TEMPERATURE,
            activity: BASELINE_ACTIVITY,
            tremor: 100.0,
            integrity: 100.0,
            stability: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreatmentResult {
    pub success: bool,
    pub integrity: f64,
    pub stability: f64,
}

impl TreatmentResult {
    pub fn message(&self) -> &'static str {
        if self.success {
            "Treatment successful. Tremor eliminated, tissue intact."
        } else {
            "Treatment failed. Severe thermal tissue damage, trial halted."
        }
    }
}

/// Advance the patient model by one 100 ms tick
///
/// Draws exactly one noise sample. Returns the result once stability is
/// full or integrity is exhausted.
pub fn step<R: RandomSource + ?Sized>(
    state: &mut NeuromodulationState,
    controls: &TreatmentControls,
    rng: &mut R,
) -> Option<TreatmentResult> {
    let duty = controls.duty_cycle();
    let effective = controls.effective_power();

    let noise = (rng.next_unit() - 0.5) * NOISE_AMPLITUDE;
    state.activity = (BASELINE_ACTIVITY - SUPPRESSION_GAIN * effective + noise)
        .clamp(ACTIVITY_RANGE.0, ACTIVITY_RANGE.1);
    state.tremor = state.activity;

    state.temperature = (state.temperature + controls.power * duty * HEATING_GAIN
        - COOLING_PER_TICK)
        .max(BODY_TEMPERATURE);

    if state.temperature > DAMAGE_TEMPERATURE {
        state.integrity = (state.integrity - 1.0).max(0.0);
    }
    if state.activity < STABLE_ACTIVITY && state.temperature < STABLE_TEMPERATURE {
        state.stability = (state.stability + 1.0).min(FULL_STABILITY);
    }
    state.elapsed += NEUROMOD_DT;

    let success = state.stability >= FULL_STABILITY;
    if success || state.integrity <= 0.0 {
        Some(TreatmentResult {
            success,
            integrity: state.integrity,
            stability: state.stability,
        })
    } else {
        None
    }
}

/// A running (or paused) treatment session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentLoop {
    controls: TreatmentControls,
    state: NeuromodulationState,
    active: bool,
    result: Option<TreatmentResult>,
}

impl TreatmentLoop {
    pub fn new(method: Method) -> Self {
        Self {
            controls: TreatmentControls::for_method(method),
            state: NeuromodulationState::default(),
            active: false,
            result: None,
        }
    }

    pub fn controls(&self) -> &TreatmentControls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut TreatmentControls {
        &mut self.controls
    }

    pub fn state(&self) -> &NeuromodulationState {
        &self.state
    }

    pub fn result(&self) -> Option<&TreatmentResult> {
        self.result.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Resume stimulation; a finished session stays finished
    pub fn start(&mut self) -> bool {
        if self.result.is_some() {
            return false;
        }
        self.active = true;
        true
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Restore the patient readings, keeping the controls
    pub fn reset(&mut self) {
        self.active = false;
        self.state = NeuromodulationState::default();
        self.result = None;
    }

    pub fn tick<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Option<TreatmentResult> {
        if !self.active {
            return None;
        }
        let result = step(&mut self.state, &self.controls, rng)?;
        self.active = false;
        self.result = Some(result);
        log::info!(
            "Treatment finished after {:.1}s: success={} integrity={} stability={}",
            self.state.elapsed,
            result.success,
            result.integrity,
            result.stability
        );
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::random::{FixedRoll, RngState};

    fn fiber(power: f64, frequency: f64) -> TreatmentControls {
        let mut controls = TreatmentControls::for_method(Method::Fiber);
        controls.set_power(power);
        controls.set_frequency(frequency);
        controls
    }

    #[test]
    fn test_efficiency_windows() {
        assert_eq!(efficiency(Method::Fiber, 473.0), 1.0);
        assert_eq!(efficiency(Method::Fiber, 450.0), 1.0);
        assert_eq!(efficiency(Method::Fiber, 520.0), 0.1);
        assert_eq!(efficiency(Method::Nanoparticle, 980.0), 1.0);
        assert!((efficiency(Method::Nanoparticle, 955.0) - 0.5).abs() < 1e-9);
        assert_eq!(efficiency(Method::Nanoparticle, 1030.0), 0.0);
        assert_eq!(efficiency(Method::Nanoparticle, 473.0), 0.0);
    }

    #[test]
    fn test_fiber_wavelength_fixed() {
        let mut controls = TreatmentControls::for_method(Method::Fiber);
        controls.set_wavelength(980.0);
        assert_eq!(controls.wavelength, 473.0);

        let mut controls = TreatmentControls::for_method(Method::Nanoparticle);
        controls.set_wavelength(2000.0);
        assert_eq!(controls.wavelength, 1100.0);
        assert_eq!(controls.power, 0.0);
        assert_eq!(controls.frequency, 20.0);
    }

    #[test]
    fn test_zero_power_holds_body_temperature() {
        let controls = fiber(0.0, 100.0);
        let mut state = NeuromodulationState::default();
        let mut rng = RngState::new(3).to_rng();
        for _ in 0..500 {
            assert_eq!(step(&mut state, &controls, &mut rng), None);
            assert_eq!(state.temperature, 37.0);
            assert_eq!(state.stability, 0.0);
            assert!(state.activity >= 75.0 && state.activity <= 85.0);
            assert_eq!(state.tremor, state.activity);
        }
        assert!((state.elapsed - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_moderate_power_succeeds() {
        let mut session = TreatmentLoop::new(Method::Fiber);
        *session.controls_mut() = fiber(25.0, 100.0);
        assert!(session.start());

        let mut ticks = 0;
        let result = loop {
            ticks += 1;
            if let Some(result) = session.tick(&mut FixedRoll(0.5)) {
                break result;
            }
            assert!(ticks < 1000);
        };
        assert!(result.success);
        assert_eq!(ticks, 100);
        assert_eq!(result.integrity, 100.0);
        assert!(!session.is_active());
        assert!(!session.start());
    }

    #[test]
    fn test_overpowered_loop_burns_tissue() {
        let mut session = TreatmentLoop::new(Method::Fiber);
        *session.controls_mut() = fiber(100.0, 100.0);
        session.start();

        let mut result = None;
        for _ in 0..1000 {
            result = session.tick(&mut FixedRoll(0.5));
            if result.is_some() {
                break;
            }
        }
        let result = result.expect("loop should end");
        assert!(!result.success);
        assert_eq!(result.integrity, 0.0);
        assert!(result.stability < FULL_STABILITY);
        assert!(session.state().temperature > DAMAGE_TEMPERATURE);
    }

    #[test]
    fn test_stopped_loop_does_not_tick() {
        let mut session = TreatmentLoop::new(Method::Nanoparticle);
        session.controls_mut().set_power(50.0);
        assert_eq!(session.tick(&mut FixedRoll(0.5)), None);
        assert_eq!(session.state(), &NeuromodulationState::default());

        session.start();
        session.tick(&mut FixedRoll(0.5));
        session.stop();
        let paused = *session.state();
        session.tick(&mut FixedRoll(0.5));
        assert_eq!(session.state(), &paused);

        session.reset();
        assert_eq!(session.state(), &NeuromodulationState::default());
        assert_eq!(session.controls().power, 50.0);
    }
}
