//! Neuro-Files store
//!
//! Story progress (knowledge, evidence, suspicion, chapter) plus the live
//! state of each chapter. Timed loops are ticked from outside with the
//! generation they were started under; anything delayed comes back to the
//! caller as a `Scheduled` action.

use std::time::Duration;

use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::Generation;
use crate::consts::{CHAPTER_ADVANCE_DELAY, DEBATE_FEEDBACK_DELAY};
use crate::error::{Error, Result};
use crate::sim::debate::{Card, CardPlay, DebateState, Verdict};
use crate::sim::level::{GridPos, LevelLayout};
use crate::sim::maze::{Maze, MazeOutcome, SteerAction};
use crate::sim::neuromod::{Circuit, Method, TreatmentLoop, TreatmentResult};
use crate::sim::optics::{BeamControls, OpticalOutcome, OpticsPuzzle};
use crate::sim::random::RngState;
use crate::tuning::{Balance, StoryAwards};

pub const MAX_SUSPICION: u32 = 100;
pub const PHOTOMETRY_EVIDENCE: &str = "Wireless Photometry Specs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Chapter {
    Intro,
    /// Chapter 1: light propagation puzzle
    #[default]
    Optics,
    /// Chapter 2: wireless steering maze
    Steering,
    /// Chapter 3: closed-loop neuromodulation
    Treatment,
    /// Chapter 4: courtroom debate
    Debate,
    GoodEnding,
    BadEnding,
}

impl Chapter {
    /// Chapter number for the four playable chapters
    pub fn number(&self) -> Option<u8> {
        match self {
            Chapter::Optics => Some(1),
            Chapter::Steering => Some(2),
            Chapter::Treatment => Some(3),
            Chapter::Debate => Some(4),
            _ => None,
        }
    }
}

/// Timed loops owned by this store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Loop {
    Optics,
    Maze,
    Treatment,
    Debate,
}

impl Loop {
    const COUNT: usize = 4;

    fn slot(self) -> usize {
        self as usize
    }
}

/// Work to run later, valid only while its loop's generation is unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deferred {
    /// Move on if the story is still at `from`
    AdvanceChapter { from: Chapter, to: Chapter },
    ClearDebateFeedback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub delay: Duration,
    pub owner: Loop,
    pub generation: Generation,
    pub action: Deferred,
}

/// Chapter 3 progress
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TreatmentChapter {
    pub diagnosed: bool,
    pub session: Option<TreatmentLoop>,
    pub result: Option<TreatmentResult>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NeuroState {
    pub knowledge: u64,
    pub evidence: Vec<String>,
    pub suspicion: u32,
    pub chapter: Chapter,
    pub optics: OpticsPuzzle,
    pub maze: Maze,
    pub treatment: TreatmentChapter,
    pub debate: DebateState,
    /// Last card play, shown until the feedback delay runs out
    pub debate_feedback: Option<CardPlay>,
}

#[derive(Debug)]
pub struct NeuroStore {
    awards: StoryAwards,
    state: NeuroState,
    generations: [Generation; Loop::COUNT],
    rng: Pcg32,
}

impl NeuroStore {
    pub fn new(balance: &Balance, rng: RngState) -> Self {
        Self {
            awards: balance.story.clone(),
            state: NeuroState::default(),
            generations: [Generation::default(); Loop::COUNT],
            rng: rng.to_rng(),
        }
    }

    pub fn state(&self) -> &NeuroState {
        &self.state
    }

    pub fn generation(&self, owner: Loop) -> Generation {
        self.generations[owner.slot()]
    }

    fn bump(&mut self, owner: Loop) -> Generation {
        self.generations[owner.slot()].bump();
        self.generations[owner.slot()]
    }

    fn is_current(&self, owner: Loop, generation: Generation) -> bool {
        self.generation(owner) == generation
    }

    fn schedule(&self, owner: Loop, delay: Duration, action: Deferred) -> Scheduled {
        Scheduled {
            delay,
            owner,
            generation: self.generation(owner),
            action,
        }
    }

    /// Run a delayed action; stale ones are dropped
    pub fn apply(&mut self, scheduled: Scheduled) -> bool {
        if !self.is_current(scheduled.owner, scheduled.generation) {
            log::debug!("Dropping stale {:?}", scheduled.action);
            return false;
        }
        match scheduled.action {
            Deferred::AdvanceChapter { from, to } => {
                if self.state.chapter != from {
                    return false;
                }
                self.set_chapter(to);
            }
            Deferred::ClearDebateFeedback => self.state.debate_feedback = None,
        }
        true
    }

    // === Story progress ===

    pub fn set_chapter(&mut self, chapter: Chapter) {
        log::info!("Chapter {:?} -> {:?}", self.state.chapter, chapter);
        self.state.chapter = chapter;
    }

    pub fn add_knowledge(&mut self, points: u64) {
        self.state.knowledge += points;
    }

    /// Returns false if the evidence was already on file
    pub fn add_evidence(&mut self, evidence: &str) -> bool {
        if self.state.evidence.iter().any(|e| e == evidence) {
            return false;
        }
        self.state.evidence.push(evidence.to_string());
        true
    }

    pub fn increase_suspicion(&mut self, amount: u32) {
        self.state.suspicion = (self.state.suspicion + amount).min(MAX_SUSPICION);
    }

    // === Chapter 1 ===

    /// Roll a fresh level and discard the current attempt
    pub fn init_level(&mut self) {
        let layout = LevelLayout::generate(&mut self.rng);
        self.state.optics = OpticsPuzzle::new(layout);
        self.bump(Loop::Optics);
    }

    pub fn toggle_nanoparticle(&mut self, pos: GridPos) -> bool {
        self.state.optics.toggle_nanoparticle(pos)
    }

    pub fn set_beam(&mut self, controls: BeamControls) {
        self.state.optics.set_controls(controls);
    }

    pub fn start_firing(&mut self) -> bool {
        self.state.optics.start_firing()
    }

    pub fn stop_firing(&mut self) {
        self.state.optics.stop_firing();
    }

    pub fn reset_attempt(&mut self) {
        self.state.optics.reset_attempt();
        self.bump(Loop::Optics);
    }

    /// One optics frame
    pub fn tick_optics(&mut self, generation: Generation) -> Option<Scheduled> {
        if !self.is_current(Loop::Optics, generation) {
            return None;
        }
        let outcome = self.state.optics.tick()?;
        self.bump(Loop::Optics);
        match outcome {
            OpticalOutcome::ThermalDamage => None,
            OpticalOutcome::TargetActivated => {
                self.add_knowledge(self.awards.optics_solved);
                Some(self.schedule(
                    Loop::Optics,
                    CHAPTER_ADVANCE_DELAY,
                    Deferred::AdvanceChapter {
                        from: Chapter::Optics,
                        to: Chapter::Steering,
                    },
                ))
            }
        }
    }

    // === Chapter 2 ===

    pub fn set_led_spacing(&mut self, spacing: f64) -> bool {
        self.state.maze.set_led_spacing(spacing)
    }

    pub fn start_maze(&mut self) -> bool {
        self.state.maze.start()
    }

    pub fn steer(&mut self, action: SteerAction) -> Option<MazeOutcome> {
        let outcome = self.state.maze.steer(action)?;
        if outcome == MazeOutcome::Crosstalk {
            self.increase_suspicion(self.awards.crosstalk_suspicion);
            self.bump(Loop::Maze);
        }
        Some(outcome)
    }

    pub fn tick_maze(&mut self, generation: Generation) -> Option<Scheduled> {
        if !self.is_current(Loop::Maze, generation) {
            return None;
        }
        match self.state.maze.tick()? {
            MazeOutcome::Escaped => {
                self.bump(Loop::Maze);
                self.add_knowledge(self.awards.maze_escaped);
                self.add_evidence(PHOTOMETRY_EVIDENCE);
                Some(self.schedule(
                    Loop::Maze,
                    CHAPTER_ADVANCE_DELAY,
                    Deferred::AdvanceChapter {
                        from: Chapter::Steering,
                        to: Chapter::Treatment,
                    },
                ))
            }
            MazeOutcome::Crosstalk => None,
        }
    }

    pub fn reset_maze(&mut self) {
        self.state.maze.reset();
        self.bump(Loop::Maze);
    }

    // === Chapter 3 ===

    pub fn diagnose(&mut self, circuit: Circuit) -> Result<()> {
        if circuit != Circuit::PATIENT {
            return Err(Error::WrongDiagnosis(circuit));
        }
        if !self.state.treatment.diagnosed {
            self.state.treatment.diagnosed = true;
            self.add_knowledge(self.awards.diagnosis);
        }
        Ok(())
    }

    /// Pick a delivery method; controls reset to that method's defaults
    pub fn select_treatment(&mut self, method: Method) -> Result<()> {
        let chapter = &mut self.state.treatment;
        if !chapter.diagnosed {
            return Err(Error::NotDiagnosed);
        }
        let first = chapter.session.is_none();
        chapter.session = Some(TreatmentLoop::new(method));
        chapter.result = None;
        if first {
            self.add_knowledge(self.awards.treatment_selected);
        }
        self.bump(Loop::Treatment);
        Ok(())
    }

    fn treatment_mut(&mut self) -> Result<&mut TreatmentLoop> {
        self.state
            .treatment
            .session
            .as_mut()
            .ok_or(Error::NoTreatmentSelected)
    }

    pub fn set_treatment_controls(&mut self, wavelength: f64, power: f64, frequency: f64) -> Result<()> {
        let controls = self.treatment_mut()?.controls_mut();
        controls.set_wavelength(wavelength);
        controls.set_power(power);
        controls.set_frequency(frequency);
        Ok(())
    }

    /// Returns false when the session already finished
    pub fn start_treatment(&mut self) -> Result<bool> {
        Ok(self.treatment_mut()?.start())
    }

    pub fn stop_treatment(&mut self) -> Result<()> {
        self.treatment_mut()?.stop();
        Ok(())
    }

    pub fn reset_treatment(&mut self) -> Result<()> {
        self.treatment_mut()?.reset();
        self.state.treatment.result = None;
        self.bump(Loop::Treatment);
        Ok(())
    }

    pub fn tick_treatment(&mut self, generation: Generation) -> Option<TreatmentResult> {
        if !self.is_current(Loop::Treatment, generation) {
            return None;
        }
        let session = self.state.treatment.session.as_mut()?;
        let result = session.tick(&mut self.rng)?;
        self.complete_treatment(result);
        Some(result)
    }

    /// Record the outcome, sway the CEO's credibility and open Chapter 4
    pub fn complete_treatment(&mut self, result: TreatmentResult) {
        self.bump(Loop::Treatment);
        self.state.treatment.result = Some(result);
        let shift = self.awards.treatment_credibility_shift;
        self.state
            .debate
            .adjust_ceo_credibility(if result.success { shift } else { -shift });
        self.set_chapter(Chapter::Debate);
    }

    // === Chapter 4 ===

    /// Play a card; the returned actions clear the feedback and, after the
    /// last card, move to the ending
    pub fn play_card(&mut self, card: Card) -> Result<(CardPlay, Vec<Scheduled>)> {
        let play = self.state.debate.play_card(card)?;
        self.bump(Loop::Debate);
        self.state.debate_feedback = Some(play.clone());

        let mut scheduled = vec![self.schedule(
            Loop::Debate,
            DEBATE_FEEDBACK_DELAY,
            Deferred::ClearDebateFeedback,
        )];
        if let Some(verdict) = play.verdict {
            if verdict == Verdict::Guilty {
                self.add_knowledge(self.awards.debate_won);
            }
            let ending = if verdict.is_win() {
                Chapter::GoodEnding
            } else {
                Chapter::BadEnding
            };
            scheduled.push(self.schedule(
                Loop::Debate,
                DEBATE_FEEDBACK_DELAY,
                Deferred::AdvanceChapter {
                    from: Chapter::Debate,
                    to: ending,
                },
            ));
        }
        Ok((play, scheduled))
    }

    pub fn reset_debate(&mut self) {
        self.state.debate.reset();
        self.state.debate_feedback = None;
        self.bump(Loop::Debate);
    }

    /// New game; every pending timer becomes stale
    pub fn reset(&mut self) {
        self.state = NeuroState::default();
        for owner in [Loop::Optics, Loop::Maze, Loop::Treatment, Loop::Debate] {
            self.bump(owner);
        }
    }
}
