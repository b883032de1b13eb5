//! Raw game results as handed over by ingestion.

use serde::{Deserialize, Serialize};

/// Index of a competitor in the competitor table.
pub type PlayerId = usize;

/// Result of a single game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    WhiteWins,
    Draw,
    BlackWins,
    /// Game without a usable result; kept in the list but never rated.
    Discard,
}

impl Outcome {
    /// Score obtained by the first mover, or `None` for a discarded game.
    #[inline]
    pub const fn score_for_white(self) -> Option<f64> {
        match self {
            Outcome::WhiteWins => Some(1.0),
            Outcome::Draw => Some(0.5),
            Outcome::BlackWins => Some(0.0),
            Outcome::Discard => None,
        }
    }

    /// PGN result token.
    pub const fn as_pgn(self) -> &'static str {
        match self {
            Outcome::WhiteWins => "1-0",
            Outcome::Draw => "1/2-1/2",
            Outcome::BlackWins => "0-1",
            Outcome::Discard => "*",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_pgn())
    }
}

/// One game between two competitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub white: PlayerId,
    pub black: PlayerId,
    pub outcome: Outcome,
}

impl Game {
    #[must_use]
    pub const fn new(white: PlayerId, black: PlayerId, outcome: Outcome) -> Self {
        Self {
            white,
            black,
            outcome,
        }
    }

    /// Returns true if the game counts toward ratings.
    #[inline]
    pub fn is_rated(&self) -> bool {
        self.outcome != Outcome::Discard && self.white != self.black
    }
}
