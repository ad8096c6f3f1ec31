//! Result reports sent from a finished game to the promo backend.

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Length of client-generated event identifiers.
pub const EVENT_ID_LEN: usize = 32;

/// Game result from the human player's point of view.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GameResult {
    /// The human won.
    Win,
    /// The computer won.
    Loss,
    /// Nobody won.
    Draw,
}

/// Body of a result submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(rename_all = "camelCase")]
pub struct ResultReport {
    /// What happened.
    result: GameResult,
    /// Idempotency token, unique per finished game.
    event_id: String,
}

impl ResultReport {
    /// Creates a report with a fresh event identifier.
    pub fn new<R: Rng>(result: GameResult, rng: &mut R) -> Self {
        Self {
            result,
            event_id: new_event_id(rng),
        }
    }
}

/// Generates a random alphanumeric event identifier.
pub fn new_event_id<R: Rng>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(EVENT_ID_LEN)
        .map(char::from)
        .collect()
}
