//! Error estimation by resampling.
//!
//! Every round replaces each rated game with an outcome drawn from the
//! model at the fitted ratings, perturbs the priors, and solves again from
//! scratch. The spread of the resulting ratings, per competitor and per
//! pair, is the reported error.
//!
//! Rounds run on a pool of scoped threads. Each round seeds its own
//! generator from the process seed and its index, and the accumulator folds
//! rounds in index order, so a summary is bit-identical for a given seed no
//! matter how many threads produced it.

use crate::competitor::Roster;
use crate::game::{Game, PlayerId};
use crate::gauss;
use crate::model::Wdl;
use crate::prior::PriorSet;
use crate::rating::{center_to_zero, prepare, roster_for, solve_prepared, RatingInput, RatingReport};
use crate::scratch;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Upper bound on worker threads.
pub const MAX_THREADS: usize = 64;

/// Regenerations allowed for a round whose sample is disconnected.
pub const DEFAULT_RETRY_LIMIT: u32 = 100;

/// Seed used when the caller gives none.
pub const DEFAULT_SEED: u64 = 0x0D0_5EED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub rounds: usize,
    /// Worker threads, clamped to `1..=MAX_THREADS`.
    pub threads: usize,
    pub seed: u64,
    pub retry_limit: u32,
    /// Measure every round relative to its own average instead of the
    /// anchor.
    pub errors_relative_to_average: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rounds: 0,
            threads: 1,
            seed: DEFAULT_SEED,
            retry_limit: DEFAULT_RETRY_LIMIT,
            errors_relative_to_average: false,
        }
    }
}

/// Seed of round `round`, a splitmix64 mix of the process seed and the index.
pub fn round_seed(seed: u64, round: u64) -> u64 {
    let mut z = seed ^ round.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Triangular index of the unordered pair `{i, j}`, `i != j`.
#[inline]
fn pair_index(i: PlayerId, j: PlayerId) -> usize {
    let (x, y) = if i > j { (i, j) } else { (j, i) };
    x * (x - 1) / 2 + y
}

/// Sample standard deviation from a sum and sum of squares over `n` values.
fn sdev(s1: f64, s2: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    (n * s2 - s1 * s1).max(0.0).sqrt() / n
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Sums {
    s1: f64,
    s2: f64,
}

impl Sums {
    #[inline]
    fn add(&mut self, x: f64) {
        self.s1 += x;
        self.s2 += x * x;
    }
}

/// Outcome of one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResult {
    pub ratings: Vec<f64>,
    pub white_advantage: f64,
    pub draw_rate: f64,
}

/// Running sums over the simulated rounds.
#[derive(Debug, Clone)]
pub struct Accumulator {
    ratings: Vec<Sums>,
    pairs: Vec<Sums>,
    white_advantage: Sums,
    draw_rate: Sums,
    rounds: usize,
}

impl Accumulator {
    /// Starts the sums for `n` competitors. The fitted white advantage and
    /// draw rate count as one extra sample.
    pub fn new(n: usize, white_advantage: f64, draw_rate: f64) -> Self {
        let pairs = n * n.saturating_sub(1) / 2;
        let mut acc = Self {
            ratings: scratch::filled(n, Sums::default(), "rating sums"),
            pairs: scratch::filled(pairs, Sums::default(), "pair sums"),
            white_advantage: Sums::default(),
            draw_rate: Sums::default(),
            rounds: 0,
        };
        acc.white_advantage.add(white_advantage);
        acc.draw_rate.add(draw_rate);
        acc
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn add(&mut self, round: &RoundResult) {
        self.white_advantage.add(round.white_advantage);
        self.draw_rate.add(round.draw_rate);
        let r = &round.ratings;
        for i in 0..self.ratings.len() {
            self.ratings[i].add(r[i]);
            for j in 0..i {
                self.pairs[pair_index(i, j)].add(r[i] - r[j]);
            }
        }
        self.rounds += 1;
    }

    pub fn summary(&self) -> SimulationSummary {
        let n = self.rounds as f64;
        SimulationSummary {
            rounds: self.rounds,
            rating_sdev: self.ratings.iter().map(|s| sdev(s.s1, s.s2, n)).collect(),
            pair_sdev: self.pairs.iter().map(|s| sdev(s.s1, s.s2, n)).collect(),
            white_advantage_sdev: sdev(self.white_advantage.s1, self.white_advantage.s2, n + 1.0),
            draw_rate_sdev: sdev(self.draw_rate.s1, self.draw_rate.s2, n + 1.0),
        }
    }
}

/// Accumulator that folds rounds strictly by index.
#[derive(Debug)]
struct Ordered {
    acc: Accumulator,
    pending: BTreeMap<usize, RoundResult>,
    next_round: usize,
}

impl Ordered {
    fn submit(&mut self, round: usize, result: RoundResult) {
        self.pending.insert(round, result);
        while let Some(r) = self.pending.remove(&self.next_round) {
            self.acc.add(&r);
            self.next_round += 1;
        }
    }
}

/// Standard deviations gathered over the simulated rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub rounds: usize,
    pub rating_sdev: Vec<f64>,
    /// Indexed by `x(x-1)/2 + y` for `y < x`.
    pub pair_sdev: Vec<f64>,
    pub white_advantage_sdev: f64,
    pub draw_rate_sdev: f64,
}

impl SimulationSummary {
    /// Standard deviation of the rating difference between `i` and `j`.
    pub fn pair_sdev(&self, i: PlayerId, j: PlayerId) -> f64 {
        if i == j {
            0.0
        } else {
            self.pair_sdev[pair_index(i, j)]
        }
    }

    /// Confidence that `i` is stronger than `j`.
    pub fn superiority(&self, i: PlayerId, j: PlayerId, ratings: &[f64]) -> f64 {
        let diff = ratings[i] - ratings[j];
        let sd = self.pair_sdev(i, j);
        if sd > 0.0 {
            gauss::cdf(diff / sd)
        } else if diff > 0.0 {
            1.0
        } else if diff < 0.0 {
            0.0
        } else {
            0.5
        }
    }

    /// Half-width of the two-sided interval at `confidence` percent.
    pub fn error(&self, i: PlayerId, confidence: f64) -> f64 {
        gauss::confidence_to_z(confidence / 100.0) * self.rating_sdev[i]
    }

    /// Half-width of the interval for the difference between `i` and `j`.
    pub fn pair_error(&self, i: PlayerId, j: PlayerId, confidence: f64) -> f64 {
        gauss::confidence_to_z(confidence / 100.0) * self.pair_sdev(i, j)
    }
}

/// Replaces every rated outcome with one sampled from the model.
fn resample<R: Rng + ?Sized>(
    games: &[Game],
    ratings: &[f64],
    wa: f64,
    dr: f64,
    beta: f64,
    rng: &mut R,
    out: &mut Vec<Game>,
) {
    out.clear();
    out.extend(games.iter().map(|g| {
        if !g.is_rated() {
            return *g;
        }
        let p = Wdl::at(ratings[g.white] + wa - ratings[g.black], dr, beta);
        Game {
            outcome: p.sample(rng.random::<f64>()),
            ..*g
        }
    }));
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Progress {
    done: usize,
    next_report: usize,
}

/// Resampling driver bound to one finished rating.
pub struct Simulation<'a> {
    input: RatingInput<'a>,
    report: &'a RatingReport,
    config: SimulationConfig,
}

impl<'a> Simulation<'a> {
    /// `report` must be the result of rating `input`.
    #[must_use]
    pub fn new(input: RatingInput<'a>, report: &'a RatingReport, config: SimulationConfig) -> Self {
        Self { input, report, config }
    }

    /// Runs every round and returns the error summary.
    pub fn run(&self) -> SimulationSummary {
        self.run_with_observer(|_, _| {})
    }

    /// Like [`Simulation::run`], handing every accepted synthetic game set
    /// to `observer` along with its round index.
    pub fn run_with_observer<F>(&self, observer: F) -> SimulationSummary
    where
        F: Fn(usize, &[Game]) + Sync,
    {
        let rounds = self.config.rounds;
        let threads = self.config.threads.clamp(1, MAX_THREADS).min(rounds.max(1));
        let n = self.input.competitors;

        let counter = Mutex::new(0usize);
        let ordered = Mutex::new(Ordered {
            acc: Accumulator::new(n, self.report.white_advantage, self.report.draw_rate),
            pending: BTreeMap::new(),
            next_round: 0,
        });
        let progress = Mutex::new(Progress {
            done: 0,
            next_report: rounds.div_ceil(10).max(1),
        });

        info!(rounds, threads, seed = self.config.seed, "simulation started");
        std::thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|| {
                    let mut synthetic = Vec::with_capacity(self.input.games.len());
                    loop {
                        let round = {
                            let mut next = lock(&counter);
                            if *next >= rounds {
                                break;
                            }
                            *next += 1;
                            *next - 1
                        };
                        let result = self.round(round, &mut synthetic, &observer);
                        lock(&ordered).submit(round, result);

                        let mut p = lock(&progress);
                        p.done += 1;
                        if p.done >= p.next_report || p.done == rounds {
                            info!(done = p.done, rounds, "simulation progress");
                            p.next_report += rounds.div_ceil(10).max(1);
                        }
                    }
                });
            }
        });

        let ordered = ordered.into_inner().unwrap_or_else(PoisonError::into_inner);
        debug_assert!(ordered.pending.is_empty());
        ordered.acc.summary()
    }

    fn round<F>(&self, round: usize, synthetic: &mut Vec<Game>, observer: &F) -> RoundResult
    where
        F: Fn(usize, &[Game]),
    {
        let config = self.input.config;
        let beta = config.scale.beta;
        let must_connect = self.report.connectivity.is_connected();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(round_seed(self.config.seed, round as u64));

        let mut roster: Roster = roster_for(self.input.competitors, self.input.priors, &config.anchor);
        let mut attempts = 0u32;
        let (mut prepared, priors): (_, PriorSet) = loop {
            resample(
                self.input.games,
                &self.report.ratings,
                self.report.white_advantage,
                self.report.draw_rate,
                beta,
                &mut rng,
                synthetic,
            );
            let priors = self.input.priors.perturbed(&mut rng);
            let prepared = prepare(synthetic, roster);
            attempts += 1;
            let usable = !prepared.rated.is_empty() && (!must_connect || prepared.connectivity.is_connected());
            if usable {
                break (prepared, priors);
            }
            if attempts > self.config.retry_limit {
                warn!(round, attempts, "retry limit reached, keeping the last synthetic sample");
                break (prepared, priors);
            }
            debug!(round, attempts, "synthetic sample rejected");
            roster = prepared.roster;
            roster.reset_records();
        };
        debug!(round, attempts, "synthetic sample accepted");
        observer(round, synthetic);

        let solved = solve_prepared(&mut prepared, &priors, config);
        let excluded = prepared.roster.excluded();
        let mut ratings = solved.ratings;
        for (r, &x) in ratings.iter_mut().zip(&excluded) {
            if x {
                *r = 0.0;
            }
        }
        if self.config.errors_relative_to_average {
            center_to_zero(&mut ratings, &excluded);
        }
        RoundResult {
            ratings,
            white_advantage: solved.fit.white_advantage,
            draw_rate: solved.fit.draw_rate,
        }
    }
}

/// Runs `config.rounds` resampling rounds for a finished rating.
pub fn simulate(input: &RatingInput<'_>, report: &RatingReport, config: SimulationConfig) -> SimulationSummary {
    Simulation::new(*input, report, config).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Outcome;
    use crate::rating::{rate, RatingConfig};

    fn round(ratings: Vec<f64>) -> RoundResult {
        RoundResult {
            ratings,
            white_advantage: 0.0,
            draw_rate: 0.5,
        }
    }

    #[test]
    fn test_pair_index_is_triangular() {
        assert_eq!(pair_index(1, 0), 0);
        assert_eq!(pair_index(2, 0), 1);
        assert_eq!(pair_index(0, 2), 1);
        assert_eq!(pair_index(2, 1), 2);
        assert_eq!(pair_index(3, 0), 3);
    }

    #[test]
    fn test_sdev_never_negative() {
        assert_eq!(sdev(3.0, 3.0, 3.0), 0.0);
        assert!((sdev(0.0, 2.0, 2.0) - 1.0).abs() < 1e-12);
        // cancellation can push n*s2 - s1^2 slightly below zero
        let x = 0.1f64;
        assert!(sdev(3.0 * x, 3.0 * x * x, 3.0) >= 0.0);
    }

    #[test]
    fn test_accumulator_seeds_parameters() {
        let mut acc = Accumulator::new(2, 10.0, 0.5);
        acc.add(&round(vec![1.0, 3.0]));
        acc.add(&round(vec![3.0, 1.0]));
        let s = acc.summary();
        assert_eq!(s.rounds, 2);
        assert!((s.rating_sdev[0] - 1.0).abs() < 1e-12);
        assert!((s.pair_sdev(0, 1) - 2.0).abs() < 1e-12);
        // fitted 10 then two rounds at 0
        let expected = sdev(10.0, 100.0, 3.0);
        assert!((s.white_advantage_sdev - expected).abs() < 1e-12);
        assert_eq!(s.draw_rate_sdev, 0.0);
    }

    #[test]
    fn test_ordered_folds_by_index() {
        let mut a = Ordered {
            acc: Accumulator::new(2, 0.0, 0.5),
            pending: BTreeMap::new(),
            next_round: 0,
        };
        a.submit(1, round(vec![0.1, 0.7]));
        assert_eq!(a.acc.rounds(), 0);
        a.submit(0, round(vec![0.3, 0.2]));
        assert_eq!(a.acc.rounds(), 2);
        assert!(a.pending.is_empty());
    }

    #[test]
    fn test_superiority() {
        let s = SimulationSummary {
            rounds: 1,
            rating_sdev: vec![10.0, 10.0],
            pair_sdev: vec![0.0],
            white_advantage_sdev: 0.0,
            draw_rate_sdev: 0.0,
        };
        assert_eq!(s.superiority(0, 1, &[10.0, 0.0]), 1.0);
        assert_eq!(s.superiority(0, 1, &[0.0, 0.0]), 0.5);
        assert!((s.error(0, 95.0) - 19.6).abs() < 0.01);
    }

    #[test]
    fn test_round_seed_differs_per_round() {
        assert_ne!(round_seed(1, 0), round_seed(1, 1));
        assert_ne!(round_seed(1, 0), round_seed(2, 0));
        assert_eq!(round_seed(7, 3), round_seed(7, 3));
    }

    #[test]
    fn test_simulation_produces_spread() {
        let mut games = Vec::new();
        for _ in 0..10 {
            games.push(Game::new(0, 1, Outcome::WhiteWins));
            games.push(Game::new(1, 2, Outcome::Draw));
            games.push(Game::new(2, 0, Outcome::BlackWins));
            games.push(Game::new(1, 0, Outcome::Draw));
        }
        let config = RatingConfig::default();
        let priors = PriorSet::default();
        let input = RatingInput {
            games: &games,
            competitors: 3,
            priors: &priors,
            config: &config,
        };
        let report = rate(&input).expect("connected");
        let observed = Mutex::new(0usize);
        let summary = Simulation::new(
            input,
            &report,
            SimulationConfig {
                rounds: 20,
                threads: 2,
                seed: 42,
                ..SimulationConfig::default()
            },
        )
        .run_with_observer(|_, set| {
            assert_eq!(set.len(), 40);
            *lock(&observed) += 1;
        });
        assert_eq!(summary.rounds, 20);
        assert_eq!(*lock(&observed), 20);
        assert!(summary.rating_sdev.iter().all(|&s| s > 0.0));
        assert!(summary.pair_sdev(0, 2) > 0.0);
    }
}
