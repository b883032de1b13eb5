//! Win/draw/loss probability model.
//!
//! Expected scores follow a logistic curve in the rating difference. The
//! draw share at a given expected score is controlled by a single draw rate,
//! the probability of a draw between equally rated opponents.

use crate::game::Outcome;
use serde::{Deserialize, Serialize};

/// Rating points that correspond to a 76% expected score by default.
pub const DEFAULT_POINTS_AT_76: f64 = 202.0;

/// Lower bound applied to every win, draw and loss probability.
pub const MIN_PROBABILITY: f64 = 1e-12;

/// Logistic scale of the rating system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    /// Logistic slope per rating point.
    pub beta: f64,
}

/// Log-odds of a 76% expected score.
fn logit_76() -> f64 {
    -(1.0_f64 / 0.76 - 1.0).ln()
}

impl Scale {
    /// Builds the scale at which `points` of rating difference give a 76%
    /// expected score.
    #[must_use]
    pub fn from_points_at_76(points: f64) -> Self {
        Self {
            beta: logit_76() / points,
        }
    }

    /// Rating difference that gives a 76% expected score.
    pub fn points_at_76(&self) -> f64 {
        logit_76() / self.beta
    }

    /// Expected score of a competitor rated `a` against one rated `b`.
    #[inline]
    pub fn expected_score(&self, a: f64, b: f64) -> f64 {
        expected_score(a, b, self.beta)
    }

    /// Outcome probabilities at rating difference `diff` (white minus black,
    /// white advantage included).
    #[inline]
    pub fn wdl(&self, diff: f64, draw_rate: f64) -> Wdl {
        Wdl::at(diff, draw_rate, self.beta)
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::from_points_at_76(DEFAULT_POINTS_AT_76)
    }
}

/// Expected score of `a` against `b` under slope `beta`.
#[inline]
pub fn expected_score(a: f64, b: f64, beta: f64) -> f64 {
    1.0 / (1.0 + ((b - a) * beta).exp())
}

/// Draw probability for a pairing whose expected score is `perf`, given the
/// draw rate between equal opponents.
///
/// The draw share `x` is the positive root of `a x^2 + 2x + c = 0` with
/// `fi = (1 - d0) / (2 d0)`, `a = 4 fi^2 - 1` and `c = 4 (p^2 - p)`, written
/// in a form that stays finite for every `d0` in `(0, 1]`.
pub fn draw_probability(perf: f64, draw_rate: f64) -> f64 {
    if draw_rate <= 0.0 {
        return 0.0;
    }
    let d0 = draw_rate.min(1.0);
    let fi = (1.0 - d0) / (2.0 * d0);
    let a = 4.0 * fi * fi - 1.0;
    let c = 4.0 * (perf * perf - perf);
    let disc = (1.0 - a * c).max(0.0);
    -c / (1.0 + disc.sqrt())
}

/// Probabilities of a white win, a draw and a black win.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wdl {
    pub win: f64,
    pub draw: f64,
    pub loss: f64,
}

impl Wdl {
    /// Outcome probabilities at rating difference `diff`.
    ///
    /// Each probability is at least [`MIN_PROBABILITY`] and the three sum
    /// to one.
    pub fn at(diff: f64, draw_rate: f64, beta: f64) -> Self {
        let perf = expected_score(diff.abs(), 0.0, beta);
        let draw = draw_probability(perf, draw_rate);
        let better = perf - 0.5 * draw;
        let worse = 1.0 - better - draw;
        let raw = if diff >= 0.0 {
            Wdl { win: better, draw, loss: worse }
        } else {
            Wdl { win: worse, draw, loss: better }
        };
        raw.floored()
    }

    fn floored(self) -> Self {
        let mut p = [
            self.win.max(MIN_PROBABILITY),
            self.draw.max(MIN_PROBABILITY),
            self.loss.max(MIN_PROBABILITY),
        ];
        let excess = p.iter().sum::<f64>() - 1.0;
        let largest = (0..3)
            .max_by(|&i, &j| p[i].total_cmp(&p[j]))
            .unwrap_or(0);
        p[largest] -= excess;
        Wdl {
            win: p[0],
            draw: p[1],
            loss: p[2],
        }
    }

    /// Expected score for white.
    pub fn score(&self) -> f64 {
        self.win + 0.5 * self.draw
    }

    /// Probability of `outcome`; discarded games carry no information.
    pub fn of(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::WhiteWins => self.win,
            Outcome::Draw => self.draw,
            Outcome::BlackWins => self.loss,
            Outcome::Discard => 1.0,
        }
    }

    /// Maps a uniform draw `u` in `[0, 1)` to an outcome.
    pub fn sample(&self, u: f64) -> Outcome {
        if u < self.win {
            Outcome::WhiteWins
        } else if u < self.win + self.draw {
            Outcome::Draw
        } else {
            Outcome::BlackWins
        }
    }
}
