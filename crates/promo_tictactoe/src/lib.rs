//! Tic-tac-toe against a computer opponent.
//!
//! # Architecture
//!
//! - **Rules**: pure board evaluation (win line, draw, ongoing)
//! - **Search**: minimax with an optional depth cap and a line heuristic
//! - **Difficulty**: blunder probability and depth cap per tier
//! - **Controller**: turn-taking state machine that emits result reports
//!
//! # Example
//!
//! ```
//! use promo_tictactoe::{Board, Difficulty, Mark, Position, choose_move};
//! use rand::SeedableRng;
//!
//! let board = Board::new()
//!     .with_mark(Position::TopLeft, Mark::X)
//!     .with_mark(Position::TopCenter, Mark::X)
//!     .with_mark(Position::Center, Mark::O);
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! assert_eq!(choose_move(&board, Difficulty::Hard, &mut rng), Some(Position::TopRight));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod controller;
mod difficulty;
mod position;
mod report;
pub mod rules;
pub mod search;
mod types;

pub use controller::{ControllerState, GameController, Side, Step, TurnTicket};
pub use difficulty::Difficulty;
pub use position::Position;
pub use report::{EVENT_ID_LEN, GameResult, ResultReport, new_event_id};
pub use rules::{Line, Outcome, OutcomeReport, evaluate};
pub use search::{choose_move, choose_move_as};
pub use types::{Board, Mark, Square};
