//! Minimax search for the computer opponent.
//!
//! The search is a pure recursion over copied boards: every branch places a
//! mark on its own copy, so nothing has to be undone on the way back up.
//! A depth cap turns the search into a static evaluation once the cap is
//! reached, scored by [`heuristic`].

use super::rules::{LINES, Outcome, evaluate};
use super::{Board, Difficulty, Mark, Position};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, instrument};

/// Score of a win found at depth zero.
const WIN_SCORE: i32 = 10;

/// Static evaluation of a board from the computer's point of view.
///
/// Every line holding marks of only one side scores 3 for two marks and
/// 1 for a single mark; lines held by both sides score nothing.
pub fn heuristic(board: &Board, computer: Mark) -> i32 {
    LINES
        .iter()
        .map(|line| {
            let (mut ours, mut theirs) = (0, 0);
            for pos in line.positions() {
                match board.get(pos).mark() {
                    Some(mark) if mark == computer => ours += 1,
                    Some(_) => theirs += 1,
                    None => {}
                }
            }
            match (ours, theirs) {
                (2, 0) => 3,
                (1, 0) => 1,
                (0, 2) => -3,
                (0, 1) => -1,
                _ => 0,
            }
        })
        .sum()
}

/// Minimax value of `board` with `to_move` about to play.
///
/// Terminal boards score `10 - depth` for a computer win and `depth - 10`
/// for a loss, so faster wins and slower losses are preferred.
pub fn minimax(board: &Board, depth: u8, to_move: Mark, computer: Mark, cap: Option<u8>) -> i32 {
    match evaluate(board) {
        Outcome::Win { winner, .. } if winner == computer => return WIN_SCORE - i32::from(depth),
        Outcome::Win { .. } => return i32::from(depth) - WIN_SCORE,
        Outcome::Draw => return 0,
        Outcome::Ongoing => {}
    }

    if cap.is_some_and(|cap| depth >= cap) {
        return heuristic(board, computer);
    }

    let scores = board.empty_positions().map(|pos| {
        minimax(
            &board.with_mark(pos, to_move),
            depth + 1,
            to_move.opponent(),
            computer,
            cap,
        )
    });

    if to_move == computer {
        scores.max().unwrap_or(0)
    } else {
        scores.min().unwrap_or(0)
    }
}

/// Best cell for `computer`, lowest index among equally scored cells.
///
/// Returns `None` only when the board has no empty cell.
pub fn best_move(board: &Board, computer: Mark, cap: Option<u8>) -> Option<Position> {
    let mut best: Option<(Position, i32)> = None;
    for pos in board.empty_positions() {
        let score = minimax(
            &board.with_mark(pos, computer),
            0,
            computer.opponent(),
            computer,
            cap,
        );
        // Strict comparison keeps the first cell on ties.
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((pos, score));
        }
    }
    best.map(|(pos, _)| pos)
}

/// Chooses the computer's move, the computer playing `O`.
pub fn choose_move<R: Rng>(board: &Board, difficulty: Difficulty, rng: &mut R) -> Option<Position> {
    choose_move_as(board, Mark::O, difficulty, rng)
}

/// Chooses a move for `computer` under the given difficulty.
///
/// Must only be called on a board that [`evaluate`] reports as ongoing.
#[instrument(skip(board, rng), fields(empty = board.empty_positions().count()))]
pub fn choose_move_as<R: Rng>(
    board: &Board,
    computer: Mark,
    difficulty: Difficulty,
    rng: &mut R,
) -> Option<Position> {
    let blunder = difficulty.blunder_probability();
    if blunder > 0.0 && rng.gen_bool(blunder) {
        let empty: Vec<Position> = board.empty_positions().collect();
        let pick = empty.choose(rng).copied();
        debug!(?pick, "Blundering with a random cell");
        return pick;
    }

    let pick = best_move(board, computer, difficulty.depth_cap());
    debug!(?pick, depth_cap = ?difficulty.depth_cap(), "Searched move");
    pick
}
