//! Difficulty tiers for the computer opponent.

use serde::{Deserialize, Serialize};

/// How strongly the computer plays.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Difficulty {
    /// Occasionally plays a random cell instead of searching.
    Easy,
    /// Searches three plies deep, then falls back to the line heuristic.
    #[default]
    Normal,
    /// Full search. Never loses.
    Hard,
}

impl Difficulty {
    /// Chance of replacing the searched move with a random empty cell.
    pub fn blunder_probability(self) -> f64 {
        match self {
            Difficulty::Easy => 0.25,
            Difficulty::Normal | Difficulty::Hard => 0.0,
        }
    }

    /// Maximum search depth, `None` for a full search.
    pub fn depth_cap(self) -> Option<u8> {
        match self {
            Difficulty::Normal => Some(3),
            Difficulty::Easy | Difficulty::Hard => None,
        }
    }
}
