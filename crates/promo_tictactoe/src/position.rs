//! Named board positions.

use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A cell on the board, numbered 0-8 in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Position {
    TopLeft = 0,
    TopCenter = 1,
    TopRight = 2,
    MiddleLeft = 3,
    Center = 4,
    MiddleRight = 5,
    BottomLeft = 6,
    BottomCenter = 7,
    BottomRight = 8,
}

impl Position {
    /// All 9 positions in board order.
    pub const ALL: [Position; 9] = [
        Position::TopLeft,
        Position::TopCenter,
        Position::TopRight,
        Position::MiddleLeft,
        Position::Center,
        Position::MiddleRight,
        Position::BottomLeft,
        Position::BottomCenter,
        Position::BottomRight,
    ];

    /// Lowercase name accepted by [`Position::from_input`].
    pub fn label(self) -> &'static str {
        const LABELS: [&str; 9] = [
            "top-left",
            "top-center",
            "top-right",
            "middle-left",
            "center",
            "middle-right",
            "bottom-left",
            "bottom-center",
            "bottom-right",
        ];
        LABELS[self.to_index()]
    }

    /// Board index, 0-8.
    pub fn to_index(self) -> usize {
        self as usize
    }

    /// Creates position from board index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Parses player input: a cell number 1-9 as printed on the board, or a label.
    #[instrument]
    pub fn from_input(input: &str) -> Option<Position> {
        let input = input.trim();
        match input.parse::<usize>() {
            Ok(number) => number.checked_sub(1).and_then(Self::from_index),
            Err(_) => Self::ALL
                .into_iter()
                .find(|pos| pos.label().eq_ignore_ascii_case(input)),
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
