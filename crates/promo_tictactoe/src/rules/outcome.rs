//! Board evaluation.

use super::super::{Board, Mark};
use super::{Line, is_full, winning_line};
use serde::{Deserialize, Serialize};

/// State of a board after evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// No winner and at least one empty square.
    Ongoing,
    /// `winner` owns `line`.
    Win {
        /// The winning mark.
        winner: Mark,
        /// The first completed line in evaluation order.
        line: Line,
    },
    /// Full board without a winner.
    Draw,
}

impl Outcome {
    /// True for `Win` and `Draw`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Ongoing)
    }

    /// Returns the winner if there is one.
    pub fn winner(&self) -> Option<Mark> {
        match self {
            Outcome::Win { winner, .. } => Some(*winner),
            _ => None,
        }
    }

    /// Wire form: `None` while the game is ongoing.
    pub fn report(&self) -> Option<OutcomeReport> {
        match self {
            Outcome::Ongoing => None,
            Outcome::Win { winner, line } => Some(OutcomeReport {
                winner: Some(*winner),
                combo: Some(line.indices()),
                is_draw: false,
            }),
            Outcome::Draw => Some(OutcomeReport {
                winner: None,
                combo: None,
                is_draw: true,
            }),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Ongoing => write!(f, "In progress"),
            Outcome::Win { winner, .. } => write!(f, "{} wins", winner),
            Outcome::Draw => write!(f, "Draw"),
        }
    }
}

/// Serialized evaluation result shared with clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeReport {
    /// Winning mark, `null` on a draw.
    pub winner: Option<Mark>,
    /// Indices of the winning line, `null` on a draw.
    pub combo: Option<[usize; 3]>,
    /// True on a draw.
    pub is_draw: bool,
}

/// Evaluates a board: first winning line in fixed order, then draw, then ongoing.
pub fn evaluate(board: &Board) -> Outcome {
    if let Some((winner, line)) = winning_line(board) {
        Outcome::Win { winner, line }
    } else if is_full(board) {
        Outcome::Draw
    } else {
        Outcome::Ongoing
    }
}
