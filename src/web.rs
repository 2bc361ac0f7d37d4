//! Browser binding
//!
//! A thin `wasm-bindgen` wrapper around `Session`. Structured arguments and
//! every returned state snapshot travel as JSON strings so the page script
//! never needs generated TypeScript types.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

use crate::error::{Error, Result};
use crate::session::Session;
use crate::settings::Settings;
use crate::sim::hardware::{ScanParameters, ShimmingVector};
use crate::sim::level::GridPos;
use crate::sim::optics::BeamControls;
use crate::tuning::Balance;

fn parse<T: DeserializeOwned>(what: &'static str, json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| Error::InvalidData {
        what,
        reason: e.to_string(),
    })
}

fn to_json<T: Serialize + ?Sized>(what: &'static str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::InvalidData {
        what,
        reason: e.to_string(),
    })
}

/// Install the panic hook and console logger once per page
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    // Fails only if a logger is already installed
    let _ = console_log::init_with_level(log::Level::Info);
    log::info!("Neuro Lab (web) ready");
}

#[wasm_bindgen]
pub struct WebSession {
    session: Session,
}

#[wasm_bindgen]
impl WebSession {
    /// `settings` and `balance` are optional JSON overrides; seed 0 uses the clock
    #[wasm_bindgen(constructor)]
    pub fn new(
        settings: Option<String>,
        balance: Option<String>,
        seed: u64,
    ) -> std::result::Result<WebSession, JsError> {
        let settings = match settings {
            Some(json) => Settings::from_json(&json)?,
            None => Settings::default(),
        };
        let balance = match balance {
            Some(json) => Balance::from_json(&json)?,
            None => Balance::default(),
        };
        let seed = if seed == 0 {
            js_sys::Date::now() as u64
        } else {
            seed
        };
        Ok(WebSession {
            session: Session::new(settings, balance, seed),
        })
    }

    /// Advance by `elapsed_ms`; returns the events as JSON
    pub fn update(&mut self, elapsed_ms: f64) -> std::result::Result<String, JsError> {
        let elapsed = Duration::from_secs_f64(elapsed_ms.max(0.0) / 1000.0);
        let events = self.session.update(elapsed)?;
        Ok(to_json("events", &events)?)
    }

    pub fn settings(&self) -> std::result::Result<String, JsError> {
        Ok(self.session.settings().to_json()?)
    }

    pub fn set_settings(&mut self, json: &str) -> std::result::Result<(), JsError> {
        self.session.set_settings(Settings::from_json(json)?);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    // === MRI lab ===

    pub fn lab_state(&self) -> std::result::Result<String, JsError> {
        Ok(to_json("lab state", self.session.lab().state())?)
    }

    pub fn preview(&self) -> std::result::Result<String, JsError> {
        Ok(to_json("preview", &self.session.lab().preview())?)
    }

    pub fn scan_log(&self) -> std::result::Result<String, JsError> {
        Ok(to_json("scan log", self.session.scan_log())?)
    }

    /// `item` is a `Purchase`, e.g. `{"Magnet":"T7"}` or `"ParallelTransmit"`
    pub fn purchase(&mut self, item: &str) -> std::result::Result<f64, JsError> {
        let cost = self.session.lab_mut().purchase(parse("purchase", item)?)?;
        Ok(cost as f64)
    }

    pub fn select_subject(&mut self, subject: &str) -> std::result::Result<(), JsError> {
        Ok(self.session.lab_mut().select_subject(parse("subject", subject)?)?)
    }

    pub fn set_model_count(&mut self, n: u32) -> std::result::Result<(), JsError> {
        Ok(self.session.lab_mut().set_model_count(n)?)
    }

    pub fn set_scan_params(&mut self, json: &str) -> std::result::Result<(), JsError> {
        let params: ScanParameters = parse("scan parameters", json)?;
        self.session.lab_mut().set_scan_params(params);
        Ok(())
    }

    pub fn set_shimming(&mut self, x: f64, y: f64, z: f64) {
        self.session.lab_mut().set_shimming(ShimmingVector::new(x, y, z));
    }

    pub fn toggle_checklist(&mut self, item: &str) -> std::result::Result<(), JsError> {
        self.session.lab_mut().toggle_checklist(parse("checklist item", item)?);
        Ok(())
    }

    pub fn set_stage(&mut self, stage: &str) -> std::result::Result<(), JsError> {
        Ok(self.session.lab_mut().set_stage(parse("stage", stage)?)?)
    }

    pub fn start_scan(&mut self) -> std::result::Result<String, JsError> {
        let events = self.session.start_scan()?;
        Ok(to_json("events", &events)?)
    }

    pub fn next_round(&mut self) {
        self.session.lab_mut().next_round();
    }

    pub fn next_tutorial_step(&mut self) {
        self.session.lab_mut().next_tutorial_step();
    }

    pub fn skip_tutorial(&mut self) {
        self.session.lab_mut().skip_tutorial();
    }

    // === Neuro-Files ===

    pub fn neuro_state(&self) -> std::result::Result<String, JsError> {
        Ok(to_json("neuro state", self.session.neuro().state())?)
    }

    pub fn set_chapter(&mut self, chapter: &str) -> std::result::Result<(), JsError> {
        self.session.neuro_mut().set_chapter(parse("chapter", chapter)?);
        Ok(())
    }

    pub fn continue_story(&mut self) -> bool {
        self.session.continue_story().is_some()
    }

    pub fn init_level(&mut self) {
        self.session.neuro_mut().init_level();
    }

    pub fn toggle_nanoparticle(&mut self, x: usize, y: usize) -> bool {
        self.session.neuro_mut().toggle_nanoparticle(GridPos::new(x, y))
    }

    pub fn set_beam(
        &mut self,
        angle: f64,
        power: f64,
        wavelength: &str,
    ) -> std::result::Result<(), JsError> {
        let wavelength = parse("wavelength", wavelength)?;
        self.session
            .neuro_mut()
            .set_beam(BeamControls::new(angle, power, wavelength));
        Ok(())
    }

    pub fn start_firing(&mut self) -> bool {
        self.session.neuro_mut().start_firing()
    }

    pub fn stop_firing(&mut self) {
        self.session.neuro_mut().stop_firing();
    }

    pub fn reset_attempt(&mut self) {
        self.session.neuro_mut().reset_attempt();
    }

    pub fn set_led_spacing(&mut self, spacing: f64) -> bool {
        self.session.neuro_mut().set_led_spacing(spacing)
    }

    pub fn start_maze(&mut self) -> bool {
        self.session.neuro_mut().start_maze()
    }

    /// Returns the outcome JSON, or `null` while the run continues
    pub fn steer(&mut self, action: &str) -> std::result::Result<String, JsError> {
        let outcome = self.session.steer(parse("steer action", action)?);
        Ok(to_json("maze outcome", &outcome)?)
    }

    pub fn reset_maze(&mut self) {
        self.session.neuro_mut().reset_maze();
    }

    pub fn diagnose(&mut self, circuit: &str) -> std::result::Result<(), JsError> {
        Ok(self.session.neuro_mut().diagnose(parse("circuit", circuit)?)?)
    }

    pub fn select_treatment(&mut self, method: &str) -> std::result::Result<(), JsError> {
        Ok(self.session.neuro_mut().select_treatment(parse("method", method)?)?)
    }

    pub fn set_treatment_controls(
        &mut self,
        wavelength: f64,
        power: f64,
        frequency: f64,
    ) -> std::result::Result<(), JsError> {
        Ok(self
            .session
            .neuro_mut()
            .set_treatment_controls(wavelength, power, frequency)?)
    }

    pub fn start_treatment(&mut self) -> std::result::Result<bool, JsError> {
        Ok(self.session.neuro_mut().start_treatment()?)
    }

    pub fn stop_treatment(&mut self) -> std::result::Result<(), JsError> {
        Ok(self.session.neuro_mut().stop_treatment()?)
    }

    pub fn reset_treatment(&mut self) -> std::result::Result<(), JsError> {
        Ok(self.session.neuro_mut().reset_treatment()?)
    }

    pub fn play_card(&mut self, card: &str) -> std::result::Result<String, JsError> {
        let play = self.session.play_card(parse("card", card)?)?;
        Ok(to_json("card play", &play)?)
    }

    pub fn reset_debate(&mut self) {
        self.session.neuro_mut().reset_debate();
    }
}
