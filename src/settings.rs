//! Player settings and preferences
//!
//! Kept separate from game state; the host persists them as JSON.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How fast the scan console plays back its staged log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RevealPacing {
    Instant,
    #[default]
    Normal,
    Relaxed,
}

impl RevealPacing {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevealPacing::Instant => "Instant",
            RevealPacing::Normal => "Normal",
            RevealPacing::Relaxed => "Relaxed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "instant" | "off" => Some(RevealPacing::Instant),
            "normal" => Some(RevealPacing::Normal),
            "relaxed" | "slow" => Some(RevealPacing::Relaxed),
            _ => None,
        }
    }

    /// Scale applied to every console delay
    pub fn multiplier(&self) -> f64 {
        match self {
            RevealPacing::Instant => 0.0,
            RevealPacing::Normal => 1.0,
            RevealPacing::Relaxed => 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Scan console pacing
    pub reveal: RevealPacing,
    /// Start new lab games with the tutorial running
    pub tutorial: bool,
    /// Trace the low-power aiming ray while the laser is idle
    pub idle_preview: bool,
    /// Move to the next chapter automatically after a win
    pub auto_advance: bool,

    // === Accessibility ===
    /// Reduced motion (skip staged console delays)
    pub reduced_motion: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reveal: RevealPacing::Normal,
            tutorial: true,
            idle_preview: true,
            auto_advance: true,
            reduced_motion: false,
        }
    }
}

impl Settings {
    pub fn from_preset(reveal: RevealPacing) -> Self {
        Self {
            reveal,
            ..Self::default()
        }
    }

    /// Effective console delay scale (respects reduced_motion)
    pub fn reveal_multiplier(&self) -> f64 {
        if self.reduced_motion {
            0.0
        } else {
            self.reveal.multiplier()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let settings = serde_json::from_str(json).map_err(|e| Error::InvalidData {
            what: "settings",
            reason: e.to_string(),
        })?;
        log::info!("Loaded settings");
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidData {
            what: "settings",
            reason: e.to_string(),
        })
    }
}
