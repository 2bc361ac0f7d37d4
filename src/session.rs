//! Game session
//!
//! Owns both stores and the clock. The host calls `update` once per frame
//! with the wall-clock delta; the session reveals the scan console, runs
//! every active loop at its own cadence and fires delayed chapter moves.

use std::time::Duration;

use serde::Serialize;

use crate::consts::{MAZE_TICK, NEUROMOD_TICK, OPTICS_TICK};
use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::sim::debate::{Card, CardPlay};
use crate::sim::maze::{MazeOutcome, MazeStatus, SteerAction};
use crate::sim::neuromod::TreatmentResult;
use crate::sim::optics::{OpticalOutcome, PuzzleStatus};
use crate::sim::random::RngState;
use crate::sim::scan::{ExperimentResult, ScanLogEntry, ScanReveal};
use crate::store::lab::{LabStore, Stage};
use crate::store::neuro::{Chapter, Deferred, Loop, NeuroStore, Scheduled};
use crate::tuning::Balance;
use crate::{FixedStep, Generation};

/// Something the UI should react to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Event {
    ScanLog(ScanLogEntry),
    ScanFinished(ExperimentResult),
    Optics(OpticalOutcome),
    Maze(MazeOutcome),
    Treatment(TreatmentResult),
    ChapterChanged(Chapter),
    /// A chapter was won but `auto_advance` is off
    AdvanceReady(Chapter),
}

/// Fixed-step driver for one store loop
///
/// Follows the store's generation: when the loop is reset or finishes, the
/// timer drops its backlog and starts over under the new generation.
#[derive(Debug, Clone)]
struct LoopTimer {
    owner: Loop,
    step: FixedStep,
    generation: Generation,
}

impl LoopTimer {
    fn new(owner: Loop, interval: Duration) -> Self {
        Self {
            owner,
            step: FixedStep::new(interval),
            generation: Generation::default(),
        }
    }

    /// Ticks due this frame and the generation they run under
    fn due(&mut self, store: &NeuroStore, elapsed: Duration) -> (u32, Generation) {
        let current = store.generation(self.owner);
        if current != self.generation {
            self.generation = current;
            self.step.reset();
        }
        (self.step.advance(elapsed), self.generation)
    }

    fn idle(&mut self) {
        self.step.reset();
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    remaining: Duration,
    scheduled: Scheduled,
}

#[derive(Debug)]
pub struct Session {
    settings: Settings,
    lab: LabStore,
    neuro: NeuroStore,
    reveal: Option<ScanReveal>,
    optics: LoopTimer,
    maze: LoopTimer,
    treatment: LoopTimer,
    pending: Vec<Pending>,
    /// Chapter move waiting for the player when `auto_advance` is off
    held: Option<Scheduled>,
}

impl Session {
    pub fn new(settings: Settings, balance: Balance, seed: u64) -> Self {
        let mut lab = LabStore::new(balance.clone(), RngState::new(seed));
        if !settings.tutorial {
            lab.skip_tutorial();
        }
        let mut neuro = NeuroStore::new(&balance, RngState::new(seed.wrapping_add(1)));
        neuro.init_level();
        log::info!("Session started (seed {})", seed);

        Self {
            settings,
            lab,
            neuro,
            reveal: None,
            optics: LoopTimer::new(Loop::Optics, OPTICS_TICK),
            maze: LoopTimer::new(Loop::Maze, MAZE_TICK),
            treatment: LoopTimer::new(Loop::Treatment, NEUROMOD_TICK),
            pending: Vec::new(),
            held: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
        if self.settings.auto_advance {
            if let Some(held) = self.held.take() {
                self.queue(held);
            }
        }
    }

    pub fn lab(&self) -> &LabStore {
        &self.lab
    }

    pub fn lab_mut(&mut self) -> &mut LabStore {
        &mut self.lab
    }

    pub fn neuro(&self) -> &NeuroStore {
        &self.neuro
    }

    pub fn neuro_mut(&mut self) -> &mut NeuroStore {
        &mut self.neuro
    }

    // === MRI lab ===

    pub fn is_scanning(&self) -> bool {
        self.reveal.is_some()
    }

    /// Console lines revealed so far for the running scan
    pub fn scan_log(&self) -> &[ScanLogEntry] {
        self.reveal.as_ref().map(|r| r.visible()).unwrap_or_default()
    }

    /// Resolve a scan now and start playing its console log back
    ///
    /// Rewards land when the last line is shown. With instant pacing that
    /// happens before this returns.
    pub fn start_scan(&mut self) -> Result<Vec<Event>> {
        if self.reveal.is_some() {
            return Err(Error::ScanNotReady("a scan is already running"));
        }
        let report = self.lab.run_experiment()?;
        self.reveal = Some(ScanReveal::new(report, self.settings.reveal_multiplier()));

        let mut events = Vec::new();
        self.advance_reveal(Duration::ZERO, &mut events)?;
        Ok(events)
    }

    fn advance_reveal(&mut self, elapsed: Duration, events: &mut Vec<Event>) -> Result<()> {
        let Some(reveal) = self.reveal.as_mut() else {
            return Ok(());
        };
        events.extend(reveal.advance(elapsed).iter().cloned().map(Event::ScanLog));
        if !reveal.is_done() {
            return Ok(());
        }

        if let Some(reveal) = self.reveal.take() {
            let result = reveal.into_report().result;
            self.lab.complete_experiment(result.clone());
            self.lab.set_stage(Stage::Review)?;
            events.push(Event::ScanFinished(result));
        }
        Ok(())
    }

    // === Neuro-Files ===

    /// Play a debate card and schedule its follow-ups
    pub fn play_card(&mut self, card: Card) -> Result<CardPlay> {
        let (play, scheduled) = self.neuro.play_card(card)?;
        for s in scheduled {
            self.queue(s);
        }
        Ok(play)
    }

    /// Steer the mouse; returns the outcome if the steer ended the run
    pub fn steer(&mut self, action: SteerAction) -> Option<MazeOutcome> {
        self.neuro.steer(action)
    }

    /// Apply a chapter move held back because `auto_advance` is off
    pub fn continue_story(&mut self) -> Option<Chapter> {
        let held = self.held.take()?;
        if self.neuro.apply(held) {
            Some(self.neuro.state().chapter)
        } else {
            None
        }
    }

    fn queue(&mut self, scheduled: Scheduled) {
        if !self.settings.auto_advance
            && matches!(scheduled.action, Deferred::AdvanceChapter { .. })
        {
            self.held = Some(scheduled);
            return;
        }
        self.pending.push(Pending {
            remaining: scheduled.delay,
            scheduled,
        });
    }

    // === Clock ===

    /// Advance everything by one frame
    pub fn update(&mut self, elapsed: Duration) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        self.advance_reveal(elapsed, &mut events)?;
        self.tick_optics(elapsed, &mut events);
        self.tick_maze(elapsed, &mut events);
        self.tick_treatment(elapsed, &mut events);
        self.run_pending(elapsed, &mut events);
        Ok(events)
    }

    fn tick_optics(&mut self, elapsed: Duration, events: &mut Vec<Event>) {
        let optics = &self.neuro.state().optics;
        let running = optics.is_firing()
            || (self.settings.idle_preview && optics.status() == PuzzleStatus::Idle);
        if self.neuro.state().chapter != Chapter::Optics || !running {
            self.optics.idle();
            return;
        }
        let (ticks, generation) = self.optics.due(&self.neuro, elapsed);
        for _ in 0..ticks {
            let scheduled = self.neuro.tick_optics(generation);
            match self.neuro.state().optics.status() {
                PuzzleStatus::Idle => continue,
                PuzzleStatus::Success => events.push(Event::Optics(OpticalOutcome::TargetActivated)),
                PuzzleStatus::Failed => events.push(Event::Optics(OpticalOutcome::ThermalDamage)),
            }
            if let Some(s) = scheduled {
                self.announce(s, events);
                self.queue(s);
            }
            break;
        }
    }

    fn tick_maze(&mut self, elapsed: Duration, events: &mut Vec<Event>) {
        let maze = &self.neuro.state().maze;
        if self.neuro.state().chapter != Chapter::Steering || maze.status() != MazeStatus::Active {
            self.maze.idle();
            return;
        }
        let (ticks, generation) = self.maze.due(&self.neuro, elapsed);
        for _ in 0..ticks {
            if self.neuro.state().maze.status() != MazeStatus::Active {
                break;
            }
            let scheduled = self.neuro.tick_maze(generation);
            if self.neuro.state().maze.status() == MazeStatus::Complete {
                events.push(Event::Maze(MazeOutcome::Escaped));
            }
            if let Some(s) = scheduled {
                self.announce(s, events);
                self.queue(s);
            }
        }
    }

    fn tick_treatment(&mut self, elapsed: Duration, events: &mut Vec<Event>) {
        let active = self
            .neuro
            .state()
            .treatment
            .session
            .as_ref()
            .is_some_and(|s| s.is_active());
        if self.neuro.state().chapter != Chapter::Treatment || !active {
            self.treatment.idle();
            return;
        }
        let (ticks, generation) = self.treatment.due(&self.neuro, elapsed);
        for _ in 0..ticks {
            if let Some(result) = self.neuro.tick_treatment(generation) {
                events.push(Event::Treatment(result));
                events.push(Event::ChapterChanged(Chapter::Debate));
                break;
            }
        }
    }

    fn announce(&self, scheduled: Scheduled, events: &mut Vec<Event>) {
        if let Deferred::AdvanceChapter { to, .. } = scheduled.action {
            if !self.settings.auto_advance {
                events.push(Event::AdvanceReady(to));
            }
        }
    }

    fn run_pending(&mut self, elapsed: Duration, events: &mut Vec<Event>) {
        let mut due = Vec::new();
        self.pending.retain_mut(|p| {
            p.remaining = p.remaining.saturating_sub(elapsed);
            if p.remaining.is_zero() {
                due.push(p.scheduled);
                false
            } else {
                true
            }
        });
        for scheduled in due {
            let before = self.neuro.state().chapter;
            if self.neuro.apply(scheduled) && self.neuro.state().chapter != before {
                events.push(Event::ChapterChanged(self.neuro.state().chapter));
            }
        }
    }

    /// New game on both tracks
    pub fn reset(&mut self) {
        self.lab.reset();
        if !self.settings.tutorial {
            self.lab.skip_tutorial();
        }
        self.neuro.reset();
        self.neuro.init_level();
        self.reveal = None;
        self.pending.clear();
        self.held = None;
        for timer in [&mut self.optics, &mut self.maze, &mut self.treatment] {
            timer.idle();
        }
        log::info!("Session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::CHAPTER_ADVANCE_DELAY;
    use crate::settings::RevealPacing;
    use crate::sim::hardware::{
        CoilType, CoolingSystem, GradientTier, MagnetStrength, PulseSequence, ScanParameters,
        ShimmingVector,
    };
    use crate::sim::level::GridPos;
    use crate::sim::neuromod::{Circuit, Method};
    use crate::sim::optics::{BeamControls, WavelengthClass};
    use crate::store::lab::{ChecklistItem, Purchase};

    fn session(settings: Settings) -> Session {
        Session::new(settings, Balance::default(), 11)
    }

    fn prepare_scan(session: &mut Session) {
        let lab = session.lab_mut();
        lab.set_budget(10_000_000);
        for item in [
            Purchase::Magnet(MagnetStrength::T3),
            Purchase::Cooling(CoolingSystem::Standard),
            Purchase::Coil(CoilType::Birdcage),
            Purchase::Gradient(GradientTier::HighPerf),
        ] {
            lab.purchase(item).unwrap();
        }
        lab.set_scan_params(ScanParameters::new(PulseSequence::Gre, 1.0, 9.0));
        lab.set_shimming(ShimmingVector::new(0.0, 0.0, 0.0));
        lab.set_model_count(64).unwrap();
        for item in [
            ChecklistItem::Physiological,
            ChecklistItem::Vestibular,
            ChecklistItem::MetallicImplants,
        ] {
            lab.toggle_checklist(item);
        }
        lab.set_stage(Stage::Safety).unwrap();
    }

    /// Puts a nanoparticle under the target on a fixed layout and fires
    fn fire_winning_shot(session: &mut Session) {
        let neuro = session.neuro_mut();
        neuro.reset();
        assert!(neuro.toggle_nanoparticle(GridPos::new(10, 11)));
        neuro.set_beam(BeamControls::new(0.0, 100.0, WavelengthClass::NearInfrared));
        assert!(neuro.start_firing());
    }

    #[test]
    fn test_scan_reveal_commits_at_end() {
        let mut session = session(Settings::default());
        prepare_scan(&mut session);

        let events = session.start_scan().unwrap();
        assert_eq!(events.len(), 1);
        assert!(session.is_scanning());
        assert!(matches!(session.start_scan(), Err(Error::ScanNotReady(_))));

        let events = session.update(Duration::from_millis(3399)).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(session.lab().state().prestige, 0);

        let events = session.update(Duration::from_millis(1)).unwrap();
        let Some(Event::ScanFinished(result)) = events.last() else {
            panic!("expected scan to finish, got {:?}", events);
        };
        assert!(result.success);
        assert!(!session.is_scanning());
        assert_eq!(session.lab().state().prestige, result.prestige_delta);
        assert_eq!(session.lab().state().stage, Stage::Review);
    }

    #[test]
    fn test_instant_pacing_finishes_immediately() {
        let mut session = session(Settings::from_preset(RevealPacing::Instant));
        prepare_scan(&mut session);
        let events = session.start_scan().unwrap();
        assert!(matches!(events.last(), Some(Event::ScanFinished(_))));
        assert!(!session.is_scanning());
        assert!(session.scan_log().is_empty());
    }

    #[test]
    fn test_scan_requires_ready_lab() {
        let mut session = session(Settings::default());
        assert!(matches!(session.start_scan(), Err(Error::IncompleteSetup(_))));
        assert!(!session.is_scanning());
    }

    #[test]
    fn test_optics_win_advances_after_delay() {
        let mut session = session(Settings::default());
        fire_winning_shot(&mut session);

        let events = session.update(OPTICS_TICK).unwrap();
        assert_eq!(events, vec![Event::Optics(OpticalOutcome::TargetActivated)]);
        assert_eq!(session.neuro().state().knowledge, 200);

        session.update(CHAPTER_ADVANCE_DELAY / 2).unwrap();
        assert_eq!(session.neuro().state().chapter, Chapter::Optics);
        let events = session.update(CHAPTER_ADVANCE_DELAY).unwrap();
        assert_eq!(events, vec![Event::ChapterChanged(Chapter::Steering)]);
    }

    #[test]
    fn test_reset_cancels_pending_advance() {
        let mut session = session(Settings::default());
        fire_winning_shot(&mut session);
        session.update(OPTICS_TICK).unwrap();

        session.neuro_mut().reset_attempt();
        session.update(CHAPTER_ADVANCE_DELAY * 2).unwrap();
        assert_eq!(session.neuro().state().chapter, Chapter::Optics);
    }

    #[test]
    fn test_manual_advance() {
        let settings = Settings {
            auto_advance: false,
            ..Settings::default()
        };
        let mut session = session(settings);
        fire_winning_shot(&mut session);

        let events = session.update(OPTICS_TICK).unwrap();
        assert!(events.contains(&Event::AdvanceReady(Chapter::Steering)));
        session.update(CHAPTER_ADVANCE_DELAY * 2).unwrap();
        assert_eq!(session.neuro().state().chapter, Chapter::Optics);

        assert_eq!(session.continue_story(), Some(Chapter::Steering));
        assert_eq!(session.continue_story(), None);
    }

    #[test]
    fn test_maze_runs_at_its_own_cadence() {
        let mut session = session(Settings::default());
        session.neuro_mut().set_chapter(Chapter::Steering);
        assert!(session.neuro_mut().start_maze());

        session.update(MAZE_TICK * 3).unwrap();
        let y = session.neuro().state().maze.mouse().position.y;
        assert!((y - (90.0 - 3.0 * 1.5)).abs() < 1e-9);

        let mut escaped = false;
        for _ in 0..20 {
            let events = session.update(MAZE_TICK * 4).unwrap();
            if events.contains(&Event::Maze(MazeOutcome::Escaped)) {
                escaped = true;
                break;
            }
        }
        assert!(escaped);
        assert_eq!(session.neuro().state().evidence.len(), 1);
    }

    #[test]
    fn test_treatment_loop_moves_to_debate() {
        let mut session = session(Settings::default());
        let neuro = session.neuro_mut();
        neuro.set_chapter(Chapter::Treatment);
        neuro.diagnose(Circuit::Parkinsonian).unwrap();
        neuro.select_treatment(Method::Nanoparticle).unwrap();
        neuro.set_treatment_controls(980.0, 25.0, 100.0).unwrap();
        assert_eq!(neuro.start_treatment(), Ok(true));

        // 100 stable ticks at 100 ms each
        let mut finished = None;
        for _ in 0..20 {
            let events = session.update(NEUROMOD_TICK * 8).unwrap();
            if let Some(Event::Treatment(result)) = events.first() {
                finished = Some(*result);
                break;
            }
        }
        let result = finished.expect("treatment should finish");
        assert!(result.success);
        assert_eq!(session.neuro().state().chapter, Chapter::Debate);
    }

    #[test]
    fn test_paused_treatment_does_not_tick() {
        let mut session = session(Settings::default());
        let neuro = session.neuro_mut();
        neuro.set_chapter(Chapter::Treatment);
        neuro.diagnose(Circuit::Parkinsonian).unwrap();
        neuro.select_treatment(Method::Fiber).unwrap();
        neuro.start_treatment().unwrap();
        neuro.stop_treatment().unwrap();

        session.update(Duration::from_secs(1)).unwrap();
        let elapsed = session.neuro().state().treatment.session.as_ref().unwrap().state().elapsed;
        assert_eq!(elapsed, 0.0);
    }

    #[test]
    fn test_debate_feedback_clears_and_ending_follows() {
        let mut session = session(Settings::default());
        session.neuro_mut().set_chapter(Chapter::Debate);
        for card in Card::ALL {
            session.play_card(card).unwrap();
        }
        assert!(session.neuro().state().debate_feedback.is_some());

        let events = session.update(Duration::from_secs(2)).unwrap();
        assert_eq!(events, vec![Event::ChapterChanged(Chapter::GoodEnding)]);
        assert!(session.neuro().state().debate_feedback.is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = session(Settings::default());
        prepare_scan(&mut session);
        session.start_scan().unwrap();
        session.neuro_mut().set_chapter(Chapter::Debate);
        session.play_card(Card::MkUltra).unwrap();

        session.reset();
        assert!(!session.is_scanning());
        assert_eq!(session.lab().state().budget, 2_000_000);
        assert_eq!(session.neuro().state().chapter, Chapter::Optics);
        assert!(session.update(Duration::from_secs(5)).unwrap().is_empty());
    }
}
