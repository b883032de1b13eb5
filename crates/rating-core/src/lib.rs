//! Rating engine for competitors that play head-to-head games.
//!
//! This crate turns a list of game results into ratings on an Elo-style
//! logistic scale:
//! - [`aggregate`] folds games into per-pair [`Encounter`]s
//! - [`analyze`] splits competitors into groups that can be rated together
//! - [`solver`] holds the least-squares and Bayesian solvers
//! - [`rate`] runs the whole pipeline and returns a [`RatingReport`]
//! - [`Simulation`] resamples results to estimate rating errors
//!
//! File formats belong to the ingestion and reporting crates.

mod bitset;
mod competitor;
mod encounter;
pub mod fit1d;
mod game;
pub mod gauss;
mod groups;
mod model;
mod prior;
mod rating;
mod scratch;
mod simulation;
pub mod solver;

pub use bitset::BitSet;
pub use competitor::{Competitor, PurgePass, Record, Roster};
pub use encounter::{aggregate, expected_scores, obtained_and_played, performance, Encounter, Performance, Tally};
pub use game::{Game, Outcome, PlayerId};
pub use groups::{analyze, analyze_undirected, Connectivity, Group, GroupId, GroupSet, GroupSummary};
pub use model::{draw_probability, expected_score, Scale, Wdl, DEFAULT_POINTS_AT_76, MIN_PROBABILITY};
pub use prior::{Prior, PriorError, PriorSet, RelativePrior, PRIOR_SMALLEST_SIGMA};
pub use rating::{
    center_to_zero, rate, RatingConfig, RatingError, RatingInput, RatingReport, DEFAULT_AVERAGE, DEFAULT_CONFIDENCE,
};
pub use simulation::{
    round_seed, simulate, Accumulator, RoundResult, Simulation, SimulationConfig, SimulationSummary,
    DEFAULT_RETRY_LIMIT, DEFAULT_SEED, MAX_THREADS,
};
pub use solver::{Anchor, Fit, Parameter, Strategy};
