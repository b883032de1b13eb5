//! Ratings for competitors with perfect records.
//!
//! A competitor that won (or lost) every game has no finite maximum
//! likelihood rating, so it is left out of the main solve. Afterwards it is
//! placed where the chance of its perfect record, against the opponents it
//! actually met, is one half.

use crate::competitor::{Record, Roster};
use crate::encounter::{obtained_and_played, Encounter};
use crate::game::PlayerId;
use crate::model::{expected_score, Scale, Wdl};
use tracing::info;

const IND_ROUNDS: u32 = 10_000;
const IND_PHASES: u32 = 20;
const SUPER_ROUNDS: u32 = 2_000;

/// Opponent ratings, already shifted by the white advantage, with the
/// number of games played against each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Opposition {
    pub ratings: Vec<f64>,
    pub weights: Vec<f64>,
}

impl Opposition {
    /// Collects the opposition of `player` from `encounters`.
    pub fn of(player: PlayerId, encounters: &[Encounter], ratings: &[f64], white_advantage: f64) -> Self {
        let mut out = Opposition::default();
        for e in encounters.iter().filter(|e| e.a == player || e.b == player) {
            let opp = ratings[e.opponent(player)];
            let (as_white, as_black) = e.tallies_for(player);
            if as_white.played() > 0 {
                out.ratings.push(opp - white_advantage);
                out.weights.push(as_white.played() as f64);
            }
            if as_black.played() > 0 {
                out.ratings.push(opp + white_advantage);
                out.weights.push(as_black.played() as f64);
            }
        }
        out
    }

    fn expected(&self, x: f64, beta: f64) -> f64 {
        self.ratings
            .iter()
            .zip(&self.weights)
            .map(|(&r, &w)| w * expected_score(x, r, beta))
            .sum()
    }

    /// Probability of winning every game (or losing every game).
    fn perfect_record_probability(&self, record: Record, x: f64, draw_rate: f64, beta: f64) -> f64 {
        self.ratings
            .iter()
            .zip(&self.weights)
            .map(|(&r, &w)| {
                let p = Wdl::at(x - r, draw_rate, beta);
                let single = if record == Record::AllWins { p.win } else { p.loss };
                w * single.ln()
            })
            .sum::<f64>()
            .exp()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

/// Rating at which the expected total against `opp` equals `target`.
pub fn performance_rating(target: f64, opp: &Opposition, start: f64, beta: f64) -> f64 {
    let mut delta = 200.0;
    let mut kappa = 0.05;
    let mut x = start;
    let mut dev = (opp.expected(x, beta) - target).powi(2);

    for _ in 0..IND_PHASES {
        let mut kk = 1.0;
        for _ in 0..IND_ROUNDS {
            let xp = opp.expected(x, beta);
            let d = (xp - target).abs();
            let y = d / (kappa * kk + d);
            let next = if xp > target { x - delta * y } else { x + delta * y };
            let next_dev = (opp.expected(next, beta) - target).powi(2);
            if next_dev >= dev {
                break;
            }
            x = next;
            dev = next_dev;
            if dev < 1e-6 {
                break;
            }
            kk *= 0.995;
        }
        delta /= 2.0;
        kappa *= 2.0;
        if dev < 1e-6 {
            break;
        }
    }
    x
}

/// Refines `estimate` to where the perfect record has probability 0.5.
pub fn perfect_record_rating(
    record: Record,
    estimate: f64,
    opp: &Opposition,
    draw_rate: f64,
    beta: f64,
) -> f64 {
    let misfit = |x: f64| {
        let p = opp.perfect_record_probability(record, x, draw_rate, beta);
        if record == Record::AllLosses {
            p - 0.5
        } else {
            0.5 - p
        }
    };

    let mut delta = 200.0;
    let mut x = estimate;
    let mut d = misfit(x);
    let mut unfit = d * d;
    for _ in 0..SUPER_ROUNDS {
        let step = if d < 0.0 { -delta } else { delta };
        let next_d = misfit(x + step);
        let next_unfit = next_d * next_d;
        if next_unfit >= unfit {
            delta /= 2.0;
        } else {
            x += step;
            d = next_d;
            unfit = next_unfit;
        }
        if unfit < 1e-10 {
            break;
        }
    }
    x
}

/// Competitors purged together, with the games they were judged on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurgeLayer {
    pub encounters: Vec<Encounter>,
    pub players: Vec<PlayerId>,
}

/// Rates every competitor marked all-wins or all-losses against the
/// current ratings and lifts its exclusion.
///
/// Layers are rated last first, so every competitor meets opponents that
/// are already rated. Returns the ids that were rated.
pub fn rate_perfect_records(
    roster: &mut Roster,
    layers: &[PurgeLayer],
    ratings: &mut [f64],
    white_advantage: f64,
    draw_rate: f64,
    scale: Scale,
) -> Vec<PlayerId> {
    let mut rated = Vec::new();
    for layer in layers.iter().rev() {
        for &j in &layer.players {
            let record = roster[j].record;
            if !matches!(record, Record::AllWins | Record::AllLosses) {
                continue;
            }
            let opp = Opposition::of(j, &layer.encounters, ratings, white_advantage);
            if opp.is_empty() {
                continue;
            }
            let games: f64 = opp.weights.iter().sum();
            let target = if record == Record::AllWins { games - 0.25 } else { 0.25 };
            let estimate = performance_rating(target, &opp, ratings[j], scale.beta);
            ratings[j] = perfect_record_rating(record, estimate, &opp, draw_rate, scale.beta);
            info!(competitor = j, record = ?record, rating = ratings[j], "perfect record extrapolated");
            roster[j].excluded = false;
            rated.push(j);
        }
    }
    rated
}

/// Rates competitors cut off by the purge at their performance against
/// every opponent in `encounters`, and lifts their exclusion.
pub fn rate_cut_off(
    roster: &mut Roster,
    cut_off: &[PlayerId],
    encounters: &[Encounter],
    ratings: &mut [f64],
    white_advantage: f64,
    scale: Scale,
) {
    let (obtained, _) = obtained_and_played(encounters, roster.len());
    for &j in cut_off {
        let opp = Opposition::of(j, encounters, ratings, white_advantage);
        if opp.is_empty() {
            continue;
        }
        ratings[j] = performance_rating(obtained[j], &opp, ratings[j], scale.beta);
        info!(competitor = j, rating = ratings[j], "cut-off competitor rated on performance");
        roster[j].excluded = false;
    }
}
