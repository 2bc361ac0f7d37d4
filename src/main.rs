//! Neuro Lab entry point
//!
//! The browser build is driven through `neuro_lab::web`. Natively this runs
//! a scripted session on both tracks and logs what happens.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Neuro Lab (native) starting...");

    let seed = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(42);

    if let Err(e) = demo::run(seed) {
        log::error!("Demo stopped: {}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is neuro_lab::web::init
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use std::time::Duration;

    use neuro_lab::session::Event;
    use neuro_lab::sim::debate::Card;
    use neuro_lab::sim::hardware::{
        CoilType, CoolingSystem, MagnetStrength, PulseSequence, ScanParameters,
        ShimmingVector,
    };
    use neuro_lab::sim::level::GridPos;
    use neuro_lab::sim::neuromod::{Circuit, Method};
    use neuro_lab::sim::optics::{BeamControls, WavelengthClass};
    use neuro_lab::store::lab::{ChecklistItem, Purchase, Stage};
    use neuro_lab::store::neuro::Chapter;
    use neuro_lab::{Balance, Result, Session, Settings};

    /// Simulated frame length
    const FRAME: Duration = Duration::from_millis(16);
    /// Give up on a loop after this many simulated frames
    const FRAME_LIMIT: u32 = 10_000;

    pub fn run(seed: u64) -> Result<()> {
        let mut session = Session::new(Settings::default(), Balance::default(), seed);
        run_lab(&mut session)?;
        run_story(&mut session)?;
        Ok(())
    }

    fn frames<F>(session: &mut Session, mut done: F) -> Result<()>
    where
        F: FnMut(&Session, &[Event]) -> bool,
    {
        for _ in 0..FRAME_LIMIT {
            let events = session.update(FRAME)?;
            for event in &events {
                log::debug!("{:?}", event);
            }
            if done(session, &events) {
                return Ok(());
            }
        }
        log::warn!("Frame limit reached");
        Ok(())
    }

    fn run_lab(session: &mut Session) -> Result<()> {
        let lab = session.lab_mut();
        lab.set_stage(Stage::Procurement)?;
        for item in [
            Purchase::Magnet(MagnetStrength::T3),
            Purchase::Cooling(CoolingSystem::Standard),
            Purchase::Coil(CoilType::Birdcage),
        ] {
            lab.purchase(item)?;
        }
        lab.set_stage(Stage::Safety)?;
        lab.set_scan_params(ScanParameters::new(PulseSequence::Gre, 2.5, 8.0));
        lab.set_shimming(ShimmingVector::new(0.0, 0.0, 0.0));
        lab.set_model_count(32)?;
        for item in [
            ChecklistItem::Physiological,
            ChecklistItem::Vestibular,
            ChecklistItem::MetallicImplants,
        ] {
            lab.toggle_checklist(item);
        }
        log::info!("Preview: {:?}", session.lab().preview());

        session.start_scan()?;
        frames(session, |s, _| !s.is_scanning())?;
        let state = session.lab().state();
        if let Some(result) = &state.last_result {
            log::info!(
                "Day {}: {} (SNR {:.1}), budget ${}, prestige {}",
                state.day,
                result.message,
                result.snr,
                state.budget,
                state.prestige
            );
        }
        session.lab_mut().next_round();
        Ok(())
    }

    fn run_story(session: &mut Session) -> Result<()> {
        // Chapter 1: the fixed training layout keeps the demo reproducible
        let neuro = session.neuro_mut();
        neuro.reset();
        neuro.toggle_nanoparticle(GridPos::new(10, 11));
        neuro.set_beam(BeamControls::new(0.0, 100.0, WavelengthClass::NearInfrared));
        neuro.start_firing();
        frames(session, |s, _| s.neuro().state().chapter != Chapter::Optics)?;

        // Chapter 2: widen the LED spacing, then walk straight out
        let neuro = session.neuro_mut();
        neuro.set_led_spacing(2.0);
        neuro.start_maze();
        frames(session, |s, _| s.neuro().state().chapter != Chapter::Steering)?;

        // Chapter 3
        let neuro = session.neuro_mut();
        neuro.diagnose(Circuit::PATIENT)?;
        neuro.select_treatment(Method::Nanoparticle)?;
        neuro.set_treatment_controls(980.0, 25.0, 100.0)?;
        neuro.start_treatment()?;
        frames(session, |s, _| s.neuro().state().chapter != Chapter::Treatment)?;

        // Chapter 4
        for card in Card::ALL {
            let play = session.play_card(card)?;
            log::info!("{}", play.log);
        }
        frames(session, |_, events| {
            events.iter().any(|e| matches!(e, Event::ChapterChanged(_)))
        })?;

        let state = session.neuro().state();
        log::info!(
            "Ending {:?}: knowledge {}, suspicion {}, evidence {:?}",
            state.chapter,
            state.knowledge,
            state.suspicion,
            state.evidence
        );
        Ok(())
    }
}
