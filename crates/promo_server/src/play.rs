//! Line-oriented terminal game against the computer.

use crate::client::ResultClient;
use crate::error::PROMO_UNAVAILABLE;
use anyhow::Result;
use promo_tictactoe::{
    ControllerState, Difficulty, GameController, Outcome, Position, Side, Step, TurnTicket,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::Write;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::Sleep;
use tracing::{debug, info, instrument, warn};

const HELP: &str = "Enter 1-9 (or a name like center) to move, r to restart, d <easy|normal|hard> to change difficulty, q to quit.";

/// A parsed line of player input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Move(Position),
    Reset,
    SetDifficulty(Difficulty),
    Quit,
    Help,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        match line.to_lowercase().as_str() {
            "q" | "quit" => return Some(Command::Quit),
            "r" | "reset" => return Some(Command::Reset),
            "h" | "help" | "?" => return Some(Command::Help),
            _ => {}
        }
        if let Some(tier) = line.strip_prefix("d ") {
            return Difficulty::from_str(tier.trim()).ok().map(Command::SetDifficulty);
        }
        Position::from_input(line).map(Command::Move)
    }
}

/// One terminal player's game loop.
pub struct PlaySession {
    controller: GameController,
    client: Option<ResultClient>,
    think_delay: Duration,
    rng: StdRng,
}

impl PlaySession {
    /// Creates a session. Without a client, finished games are not reported.
    #[instrument(skip(client))]
    pub fn new(
        first: Side,
        difficulty: Difficulty,
        think_delay: Duration,
        client: Option<ResultClient>,
    ) -> Self {
        Self {
            controller: GameController::new(first, difficulty),
            client,
            think_delay,
            rng: StdRng::from_entropy(),
        }
    }

    /// The underlying controller.
    pub fn controller(&self) -> &GameController {
        &self.controller
    }

    /// Runs until `q` or end of input.
    ///
    /// While the computer is thinking, input is still read; a restart
    /// during the delay drops the pending move.
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        let mut pending: Option<(TurnTicket, Pin<Box<Sleep>>)> = None;
        writeln!(out, "{}", HELP)?;
        self.show(out)?;

        loop {
            // One delay per computer turn; input read meanwhile does not restart it.
            let ticket = self.controller.computer_turn();
            if pending.as_ref().map(|(t, _)| *t) != ticket {
                pending = ticket.map(|t| (t, Box::pin(tokio::time::sleep(self.think_delay))));
            }

            let line = match pending.as_mut() {
                None => lines.next_line().await?,
                Some((ticket, delay)) => {
                    let ticket = *ticket;
                    let interrupted = if self.think_delay.is_zero() {
                        None
                    } else {
                        tokio::select! {
                            biased;
                            _ = delay.as_mut() => None,
                            line = lines.next_line() => Some(line?),
                        }
                    };
                    match interrupted {
                        Some(line) => line,
                        None => {
                            pending = None;
                            let step = self.controller.complete_computer_turn(ticket, &mut self.rng);
                            self.after_step(step, out).await?;
                            continue;
                        }
                    }
                }
            };

            let Some(line) = line else {
                debug!("Input closed");
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            match Command::parse(&line) {
                Some(Command::Quit) => break,
                Some(Command::Help) => writeln!(out, "{}", HELP)?,
                Some(Command::Reset) => {
                    self.controller.reset();
                    writeln!(out, "New game.")?;
                    self.show(out)?;
                }
                Some(Command::SetDifficulty(difficulty)) => {
                    if self.controller.set_difficulty(difficulty) {
                        writeln!(out, "Difficulty set to {}.", difficulty)?;
                    } else {
                        writeln!(out, "Difficulty can only change before the first move.")?;
                    }
                }
                Some(Command::Move(position)) => {
                    let step = self.controller.click(position, &mut self.rng);
                    if step == Step::Ignored {
                        writeln!(out, "Can't play {} now.", position)?;
                    } else {
                        self.after_step(step, out).await?;
                    }
                }
                None => writeln!(out, "Unrecognised input. {}", HELP)?,
            }
        }

        info!("Leaving game");
        Ok(())
    }

    async fn after_step<W: Write>(&self, step: Step, out: &mut W) -> Result<()> {
        let Step::Placed {
            mark,
            position,
            state,
            report,
        } = step
        else {
            return Ok(());
        };

        writeln!(out, "{} plays {}.", mark, position)?;
        self.show(out)?;

        if let ControllerState::GameOver(outcome) = state {
            let headline = match outcome {
                Outcome::Win { winner, .. } if winner == GameController::HUMAN => "You win!",
                Outcome::Win { .. } => "The computer wins.",
                _ => "It's a draw.",
            };
            writeln!(out, "{} Type r to play again.", headline)?;
        }

        if let (Some(report), Some(client)) = (report, &self.client) {
            match client.submit(&report).await {
                Ok(response) => {
                    if let Some(code) = response.code {
                        writeln!(out, "Your promo code: {}", code)?;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Result report failed");
                    writeln!(out, "{}", PROMO_UNAVAILABLE)?;
                }
            }
        }
        Ok(())
    }

    fn show<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "\n{}\n", self.controller.board().display())?;
        Ok(())
    }
}
