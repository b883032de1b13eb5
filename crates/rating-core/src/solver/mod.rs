//! Rating solvers.
//!
//! Both strategies take the same [`Problem`] and move the ratings held in a
//! [`SolverContext`] toward a stationary point of their own deviation
//! measure:
//!
//! - [`LeastSquares`] matches expected to obtained scores.
//! - [`Bayesian`] maximises the likelihood of the win/draw/loss counts,
//!   penalised by any priors.
//!
//! Steps shrink phase by phase. A step that does not improve the deviation
//! is rolled back from the context's backup and ends the phase.

mod bayes;
pub mod extrapolate;
mod least_squares;

pub use bayes::Bayesian;
pub use least_squares::LeastSquares;

use crate::encounter::{expected_scores, obtained_and_played, Encounter};
use crate::game::PlayerId;
use crate::model::Scale;
use crate::prior::PriorSet;
use crate::rating::RatingError;
use crate::scratch;
use serde::{Deserialize, Serialize};

/// Steps smaller than this end the solve.
pub const MIN_RESOLUTION: f64 = 1e-6;

/// Default white advantage when none is given.
pub const DEFAULT_WHITE_ADVANTAGE: f64 = 0.0;

/// Default draw rate between equal opponents when none is given.
pub const DEFAULT_DRAW_RATE: f64 = 0.5;

/// A model parameter that is either given or fitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Parameter {
    Fixed(f64),
    /// Fitted from the games, starting at the given value.
    Fit(f64),
}

impl Parameter {
    /// Builds a parameter from a user-given value and a fit request.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError::ConflictingParameter`] when both a fixed value
    /// and fitting are requested.
    pub fn from_flags(
        name: &'static str,
        fixed: Option<f64>,
        fit: bool,
        default: f64,
    ) -> Result<Self, RatingError> {
        match (fixed, fit) {
            (Some(_), true) => Err(RatingError::ConflictingParameter(name)),
            (Some(v), false) => Ok(Parameter::Fixed(v)),
            (None, true) => Ok(Parameter::Fit(default)),
            (None, false) => Ok(Parameter::Fixed(default)),
        }
    }

    /// Current or starting value.
    pub const fn value(self) -> f64 {
        match self {
            Parameter::Fixed(v) | Parameter::Fit(v) => v,
        }
    }

    pub const fn is_fitted(self) -> bool {
        matches!(self, Parameter::Fit(_))
    }
}

/// How the free additive constant of the ratings is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Anchor {
    /// Mean of the rated competitors equals the value.
    Average(f64),
    /// One competitor is pinned to a rating.
    Single { player: PlayerId, rating: f64 },
    /// Several competitors are held at fixed ratings and never adjusted.
    Multiple(Vec<(PlayerId, f64)>),
}

impl Anchor {
    /// Rating every free competitor starts from.
    pub fn reference(&self) -> f64 {
        match self {
            Anchor::Average(avg) => *avg,
            Anchor::Single { rating, .. } => *rating,
            Anchor::Multiple(list) if !list.is_empty() => {
                list.iter().map(|(_, r)| r).sum::<f64>() / list.len() as f64
            }
            Anchor::Multiple(_) => crate::rating::DEFAULT_AVERAGE,
        }
    }

    /// Ids of every anchored competitor.
    pub fn players(&self) -> Vec<PlayerId> {
        match self {
            Anchor::Average(_) => Vec::new(),
            Anchor::Single { player, .. } => vec![*player],
            Anchor::Multiple(list) => list.iter().map(|(p, _)| *p).collect(),
        }
    }
}

/// Everything a solver reads.
#[derive(Debug, Clone, Copy)]
pub struct Problem<'a> {
    pub encounters: &'a [Encounter],
    pub priors: &'a PriorSet,
    pub anchor: &'a Anchor,
    pub white_advantage: Parameter,
    pub draw_rate: Parameter,
    pub scale: Scale,
}

/// Result of a solve apart from the ratings, which stay in the context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fit {
    pub white_advantage: f64,
    pub draw_rate: f64,
    /// Phases run, summed over outer cycles.
    pub phases: u32,
    /// Accepted steps.
    pub rounds: u64,
    /// Final value of the solver's deviation measure.
    pub deviation: f64,
}

/// Per-solve working state.
#[derive(Debug, Clone)]
pub struct SolverContext {
    pub ratings: Vec<f64>,
    backup: Vec<f64>,
    pub obtained: Vec<f64>,
    pub expected: Vec<f64>,
    pub played: Vec<u64>,
    changing: Vec<f64>,
    /// Not adjusted and not counted.
    pub flagged: Vec<bool>,
    /// Not adjusted but counted.
    pub fixed: Vec<bool>,
}

impl SolverContext {
    /// Context for `flagged.len()` competitors, all starting at `start`.
    pub fn new(flagged: Vec<bool>, start: f64) -> Self {
        let n = flagged.len();
        Self {
            ratings: scratch::filled(n, start, "rating"),
            backup: scratch::filled(n, start, "rating backup"),
            obtained: scratch::filled(n, 0.0, "obtained"),
            expected: scratch::filled(n, 0.0, "expected"),
            played: scratch::filled(n, 0, "played"),
            changing: scratch::filled(n, 0.0, "changing"),
            flagged,
            fixed: vec![false; n],
        }
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Returns true if competitor `j` may be moved.
    #[inline]
    pub fn is_free(&self, j: PlayerId) -> bool {
        !self.flagged[j] && !self.fixed[j]
    }

    /// Loads tallies for `encounters` and places fixed competitors.
    fn prepare(&mut self, encounters: &[Encounter], fixed: &[(PlayerId, f64)]) {
        let (obtained, played) = obtained_and_played(encounters, self.len());
        self.obtained = obtained;
        self.played = played;
        self.fixed.iter_mut().for_each(|f| *f = false);
        for &(p, r) in fixed {
            if p < self.len() {
                self.fixed[p] = true;
                self.ratings[p] = r;
            }
        }
    }

    fn refresh_expected(&mut self, encounters: &[Encounter], white_advantage: f64, beta: f64) {
        self.expected = expected_scores(encounters, &self.ratings, white_advantage, beta);
    }

    fn save(&mut self) {
        self.backup.copy_from_slice(&self.ratings);
    }

    fn restore(&mut self) {
        self.ratings.copy_from_slice(&self.backup);
    }

    /// Shifts every free competitor by `excess` downward.
    fn shift(&mut self, excess: f64) {
        for j in 0..self.len() {
            if self.is_free(j) {
                self.ratings[j] -= excess;
            }
        }
    }

    /// Moves the free ratings so that the mean equals `average`, or so that
    /// `anchor` sits exactly on its rating.
    fn recenter(&mut self, anchor: &Anchor) {
        match anchor {
            Anchor::Average(avg) => {
                let (sum, count) = (0..self.len())
                    .filter(|&j| !self.flagged[j])
                    .fold((0.0, 0usize), |(s, c), j| (s + self.ratings[j], c + 1));
                if count > 0 {
                    self.shift(sum / count as f64 - avg);
                }
            }
            Anchor::Single { player, rating } => {
                if *player < self.len() {
                    let excess = self.ratings[*player] - rating;
                    self.shift(excess);
                    self.ratings[*player] = *rating;
                }
            }
            Anchor::Multiple(_) => {}
        }
    }
}

/// Common contract of the two strategies.
pub trait RatingSolver {
    /// Moves `ctx.ratings` to the solution of `problem` and returns the
    /// fitted parameters.
    fn solve(&self, problem: &Problem<'_>, ctx: &mut SolverContext) -> Fit;
}

/// Strategy selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    #[default]
    LeastSquares,
    Bayesian,
}

impl Strategy {
    /// Runs the selected solver with its default tuning.
    pub fn solve(self, problem: &Problem<'_>, ctx: &mut SolverContext) -> Fit {
        match self {
            Strategy::LeastSquares => LeastSquares::default().solve(problem, ctx),
            Strategy::Bayesian => Bayesian::default().solve(problem, ctx),
        }
    }
}
