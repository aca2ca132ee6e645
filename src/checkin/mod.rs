//! Emotional check-in ("Salario Emocional").
//!
//! The collaborator picks a mood on the dashboard and gets a short
//! supportive message back. Generation never fails visibly; every failure
//! path lands on a static Spanish fallback.

pub mod coach;
pub mod prompts;

pub use coach::{AdvisoryTextGenerator, MoodCoach};

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Mood reported in a check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    #[serde(rename = "Feliz")]
    Happy,
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Estresado")]
    Stressed,
}

impl Mood {
    pub const ALL: [Mood; 3] = [Self::Happy, Self::Neutral, Self::Stressed];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Happy => "Feliz",
            Self::Neutral => "Neutral",
            Self::Stressed => "Estresado",
        }
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "feliz" | "happy" => Ok(Self::Happy),
            "neutral" => Ok(Self::Neutral),
            "estresado" | "estresada" | "stressed" => Ok(Self::Stressed),
            other => Err(format!(
                "unknown mood '{other}' (expected feliz, neutral or estresado)"
            )),
        }
    }
}
