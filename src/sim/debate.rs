//! Chapter 4 courtroom debate
//!
//! The CEO makes three claims in order. Each has exactly one counter card;
//! playing it costs the CEO credibility, anything else costs the player.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const STARTING_CREDIBILITY: i32 = 100;
pub const MAX_PLAYER_CREDIBILITY: i32 = 100;

const HIT_DAMAGE: i32 = 40;
const HIT_HEAL: i32 = 10;
const MISS_DAMAGE: i32 = 5;
const MISS_PENALTY: i32 = -20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Card {
    MkUltra,
    ViralVector,
    Clearance,
}

impl Card {
    pub const ALL: [Card; 3] = [Self::MkUltra, Self::ViralVector, Self::Clearance];

    pub fn title(&self) -> &'static str {
        match self {
            Card::MkUltra => "MKUltra Precedent",
            Card::ViralVector => "Viral Vector Risk",
            Card::Clearance => "Clearance Unknown",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Card::MkUltra => {
                "Historical evidence of unethical behavioral control. Cites loss of free will."
            }
            Card::ViralVector => {
                "Requires AAV injection. Genetic modification is permanent and invasive."
            }
            Card::Clearance => {
                "Cites Li et al., 2025: \"UCNP clearance mechanism is not fully understood.\""
            }
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub text: &'static str,
    pub weakness: Card,
}

pub const CLAIMS: [Claim; 3] = [
    Claim {
        text: "Ladies and gentlemen of the jury, our technology simply helps organisms 'win'. In the food competition test, the controlled subjects were more successful. We are optimizing nature!",
        weakness: Card::MkUltra,
    },
    Claim {
        text: "Critics call this invasive, but look! No wires! The device weighs less than 2 grams. It's practically invisible compared to the barbarism of optical fibers.",
        weakness: Card::ViralVector,
    },
    Claim {
        text: "And safety? These upconversion nanoparticles are harmless. They do their job and... well, they are biocompatible. There is absolutely no long-term risk.",
        weakness: Card::Clearance,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Ruled in favour of ethical oversight
    Guilty,
    CaseDismissed,
}

impl Verdict {
    pub fn is_win(&self) -> bool {
        matches!(self, Verdict::Guilty)
    }
}

/// What one card did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPlay {
    pub card: Card,
    pub effective: bool,
    pub log: String,
    /// Set when this card was the last one
    pub verdict: Option<Verdict>,
}

impl CardPlay {
    pub fn feedback(&self) -> &'static str {
        if self.effective {
            "EFFECTIVE COUNTER! The CEO stammers."
        } else {
            "IRRELEVANT! The Judge sustains the CEO's point."
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateState {
    claim_index: usize,
    ceo_credibility: i32,
    player_credibility: i32,
    history: Vec<String>,
    verdict: Option<Verdict>,
}

impl Default for DebateState {
    fn default() -> Self {
        Self {
            claim_index: 0,
            ceo_credibility: STARTING_CREDIBILITY,
            player_credibility: STARTING_CREDIBILITY,
            history: Vec::new(),
            verdict: None,
        }
    }
}

impl DebateState {
    pub fn claim_index(&self) -> usize {
        self.claim_index
    }

    pub fn current_claim(&self) -> Option<&'static Claim> {
        if self.verdict.is_some() {
            return None;
        }
        CLAIMS.get(self.claim_index)
    }

    pub fn ceo_credibility(&self) -> i32 {
        self.ceo_credibility
    }

    pub fn player_credibility(&self) -> i32 {
        self.player_credibility
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    /// Shift the CEO's standing from outside the debate (Chapter 3 result)
    pub fn adjust_ceo_credibility(&mut self, delta: i32) {
        self.ceo_credibility = (self.ceo_credibility + delta).max(0);
    }

    /// Counter the current claim with `card`
    pub fn play_card(&mut self, card: Card) -> Result<CardPlay> {
        let claim = self.current_claim().ok_or(Error::DebateFinished(card))?;
        let effective = card == claim.weakness;

        let (damage, heal, log) = if effective {
            (
                HIT_DAMAGE,
                HIT_HEAL,
                format!("OBJECTION! {} completely refutes the claim.", card.title()),
            )
        } else {
            (
                MISS_DAMAGE,
                MISS_PENALTY,
                format!("WEAK ARGUMENT. The card {} is irrelevant here.", card.title()),
            )
        };
        self.ceo_credibility = (self.ceo_credibility - damage).max(0);
        self.player_credibility =
            (self.player_credibility + heal).clamp(0, MAX_PLAYER_CREDIBILITY);
        self.history.push(log.clone());

        if self.claim_index + 1 < CLAIMS.len() {
            self.claim_index += 1;
        } else {
            let verdict = if self.ceo_credibility <= 0
                || self.ceo_credibility < self.player_credibility
            {
                Verdict::Guilty
            } else {
                Verdict::CaseDismissed
            };
            log::info!(
                "Debate verdict {:?} (ceo {}, player {})",
                verdict,
                self.ceo_credibility,
                self.player_credibility
            );
            self.verdict = Some(verdict);
        }

        Ok(CardPlay {
            card,
            effective,
            log,
            verdict: self.verdict,
        })
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_have_unique_counters() {
        for (i, card) in Card::ALL.iter().enumerate() {
            assert_eq!(CLAIMS[i].weakness, *card);
        }
    }

    #[test]
    fn test_perfect_debate_wins() {
        let mut debate = DebateState::default();
        for card in Card::ALL {
            let play = debate.play_card(card).unwrap();
            assert!(play.effective);
        }
        assert_eq!(debate.ceo_credibility(), 0);
        assert_eq!(debate.player_credibility(), 100);
        assert_eq!(debate.verdict(), Some(Verdict::Guilty));
        assert_eq!(debate.history().len(), 3);
    }

    #[test]
    fn test_all_wrong_cards_lose() {
        let mut debate = DebateState::default();
        for card in [Card::Clearance, Card::MkUltra, Card::ViralVector] {
            let play = debate.play_card(card).unwrap();
            assert!(!play.effective);
        }
        assert_eq!(debate.ceo_credibility(), 85);
        assert_eq!(debate.player_credibility(), 40);
        assert_eq!(debate.verdict(), Some(Verdict::CaseDismissed));
    }

    #[test]
    fn test_verdict_uses_final_card_values() {
        // Two hits then a miss: ceo 100-40-40-5 = 15, player 100-20 = 80
        let mut debate = DebateState::default();
        debate.play_card(Card::MkUltra).unwrap();
        debate.play_card(Card::ViralVector).unwrap();
        let last = debate.play_card(Card::MkUltra).unwrap();
        assert_eq!(last.verdict, Some(Verdict::Guilty));
        assert_eq!(debate.ceo_credibility(), 15);
        assert_eq!(debate.player_credibility(), 80);
    }

    #[test]
    fn test_boosted_ceo_can_survive() {
        // Successful treatment raised the CEO to 110: 110-5-40-40 = 25 vs 80+10+10 = 100
        let mut debate = DebateState::default();
        debate.adjust_ceo_credibility(10);
        debate.play_card(Card::Clearance).unwrap();
        debate.play_card(Card::ViralVector).unwrap();
        debate.play_card(Card::Clearance).unwrap();
        assert_eq!(debate.ceo_credibility(), 25);
        assert_eq!(debate.player_credibility(), 100);
        assert_eq!(debate.verdict(), Some(Verdict::Guilty));
    }

    #[test]
    fn test_tie_is_dismissed() {
        // miss, miss, hit from 120: ceo 120-5-5-40 = 70, player 100-20-20+10 = 70
        let mut debate = DebateState::default();
        debate.adjust_ceo_credibility(20);
        debate.play_card(Card::Clearance).unwrap();
        debate.play_card(Card::Clearance).unwrap();
        debate.play_card(Card::Clearance).unwrap();
        assert_eq!(debate.ceo_credibility(), 70);
        assert_eq!(debate.player_credibility(), 70);
        assert_eq!(debate.verdict(), Some(Verdict::CaseDismissed));
    }

    #[test]
    fn test_play_after_verdict_rejected() {
        let mut debate = DebateState::default();
        for card in Card::ALL {
            debate.play_card(card).unwrap();
        }
        assert_eq!(
            debate.play_card(Card::MkUltra),
            Err(Error::DebateFinished(Card::MkUltra))
        );
        assert_eq!(debate.history().len(), 3);

        debate.reset();
        assert_eq!(debate, DebateState::default());
    }

    #[test]
    fn test_ceo_floor() {
        let mut debate = DebateState::default();
        debate.adjust_ceo_credibility(-500);
        assert_eq!(debate.ceo_credibility(), 0);
    }
}
