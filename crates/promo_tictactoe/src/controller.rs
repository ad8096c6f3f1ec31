//! Game session controller.
//!
//! Drives one game between the human (`X`) and the computer (`O`):
//!
//! ```text
//! AwaitingPlayerMove --click--> ComputerThinking --computer turn--> AwaitingPlayerMove
//!          \                          \
//!           `--------> GameOver <------'
//! ```
//!
//! The controller never sleeps. A client that wants a think delay asks for a
//! [`TurnTicket`], waits, then redeems it; a reset in between makes the ticket
//! stale and the delayed move is dropped.

use super::report::{GameResult, ResultReport};
use super::rules::{Outcome, evaluate};
use super::search::choose_move_as;
use super::{Board, Difficulty, Mark, Position, Square};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Who moves first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The human opens.
    #[default]
    Human,
    /// The computer opens.
    Computer,
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Waiting for a click.
    AwaitingPlayerMove,
    /// The computer is to move.
    ComputerThinking,
    /// Terminal until reset.
    GameOver(Outcome),
}

/// Permission to play one computer move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTicket {
    generation: u64,
}

/// Result of feeding an input to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Input was not valid in the current state; nothing changed.
    Ignored,
    /// A mark was placed.
    Placed {
        /// Mark that was placed.
        mark: Mark,
        /// Where it was placed.
        position: Position,
        /// State after the move.
        state: ControllerState,
        /// Present when the move ended the game with a winner.
        report: Option<ResultReport>,
    },
}

/// Client-side state machine for one game session.
#[derive(Debug, Clone)]
pub struct GameController {
    board: Board,
    state: ControllerState,
    first: Side,
    difficulty: Difficulty,
    generation: u64,
}

impl GameController {
    /// The human's mark.
    pub const HUMAN: Mark = Mark::X;
    /// The computer's mark.
    pub const COMPUTER: Mark = Mark::O;

    /// Creates a controller in its initial state.
    #[instrument]
    pub fn new(first: Side, difficulty: Difficulty) -> Self {
        Self {
            board: Board::new(),
            state: Self::initial_state(first),
            first,
            difficulty,
            generation: 0,
        }
    }

    fn initial_state(first: Side) -> ControllerState {
        match first {
            Side::Human => ControllerState::AwaitingPlayerMove,
            Side::Computer => ControllerState::ComputerThinking,
        }
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Current state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Configured difficulty.
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Changes difficulty. Only honoured before the first mark of a game.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> bool {
        if self.board.marks_placed() == 0 && self.state == Self::initial_state(self.first) {
            self.difficulty = difficulty;
            true
        } else {
            debug!(?difficulty, "Ignoring difficulty change mid-game");
            false
        }
    }

    /// Human clicks a cell.
    #[instrument(skip(self, rng))]
    pub fn click<R: Rng>(&mut self, position: Position, rng: &mut R) -> Step {
        if self.state != ControllerState::AwaitingPlayerMove || !self.board.is_empty(position) {
            debug!(state = ?self.state, "Click ignored");
            return Step::Ignored;
        }
        self.place(Self::HUMAN, position, rng)
    }

    /// Hands out a ticket when it is the computer's turn.
    pub fn computer_turn(&self) -> Option<TurnTicket> {
        (self.state == ControllerState::ComputerThinking).then_some(TurnTicket {
            generation: self.generation,
        })
    }

    /// Plays the computer's move if `ticket` is still current.
    #[instrument(skip(self, rng))]
    pub fn complete_computer_turn<R: Rng>(&mut self, ticket: TurnTicket, rng: &mut R) -> Step {
        if ticket.generation != self.generation || self.state != ControllerState::ComputerThinking {
            debug!("Stale computer turn dropped");
            return Step::Ignored;
        }

        match choose_move_as(&self.board, Self::COMPUTER, self.difficulty, rng) {
            Some(position) => self.place(Self::COMPUTER, position, rng),
            None => {
                self.state = match evaluate(&self.board) {
                    Outcome::Ongoing => ControllerState::AwaitingPlayerMove,
                    outcome => ControllerState::GameOver(outcome),
                };
                Step::Ignored
            }
        }
    }

    /// Returns to the initial state and invalidates pending computer turns.
    #[instrument(skip(self))]
    pub fn reset(&mut self) {
        self.board = Board::new();
        self.state = Self::initial_state(self.first);
        self.generation += 1;
        debug!(generation = self.generation, "Game reset");
    }

    fn place<R: Rng>(&mut self, mark: Mark, position: Position, rng: &mut R) -> Step {
        self.board.set(position, Square::Occupied(mark));
        let outcome = evaluate(&self.board);

        let mut report = None;
        self.state = match outcome {
            Outcome::Ongoing if mark == Self::HUMAN => ControllerState::ComputerThinking,
            Outcome::Ongoing => ControllerState::AwaitingPlayerMove,
            Outcome::Win { winner, .. } => {
                let result = if winner == Self::HUMAN {
                    GameResult::Win
                } else {
                    GameResult::Loss
                };
                info!(%result, "Game over");
                report = Some(ResultReport::new(result, rng));
                ControllerState::GameOver(outcome)
            }
            Outcome::Draw => {
                info!("Game over: draw");
                ControllerState::GameOver(outcome)
            }
        };

        Step::Placed {
            mark,
            position,
            state: self.state,
            report,
        }
    }
}

impl Default for GameController {
    fn default() -> Self {
        Self::new(Side::default(), Difficulty::default())
    }
}
