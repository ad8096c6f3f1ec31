//! Game rules for tic-tac-toe.
//!
//! Pure functions for evaluating a board. Rules are separated from board
//! storage so the search engine and the controller share one evaluator.

pub mod draw;
pub mod outcome;
pub mod win;

pub use draw::is_full;
pub use outcome::{Outcome, OutcomeReport, evaluate};
pub use win::{LINES, Line, winning_line};
