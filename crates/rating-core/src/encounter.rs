//! Encounter aggregation.
//!
//! An encounter is the combined record of every rated game between one
//! unordered pair of competitors. The lower id is always `a` and tallies are
//! kept from its point of view, split by the colour it had, so the white
//! advantage can still be applied per game.

use crate::game::{Game, PlayerId};
use crate::model::expected_score;
use crate::scratch;
use serde::{Deserialize, Serialize};

/// Wins, draws and losses from one side's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

impl Tally {
    #[inline]
    pub fn played(&self) -> u64 {
        u64::from(self.wins) + u64::from(self.draws) + u64::from(self.losses)
    }

    #[inline]
    pub fn score(&self) -> f64 {
        f64::from(self.wins) + 0.5 * f64::from(self.draws)
    }

    /// The same tally seen from the opponent.
    #[inline]
    pub fn mirrored(&self) -> Tally {
        Tally {
            wins: self.losses,
            draws: self.draws,
            losses: self.wins,
        }
    }

    fn record(&mut self, score: f64) {
        if score > 0.75 {
            self.wins += 1;
        } else if score < 0.25 {
            self.losses += 1;
        } else {
            self.draws += 1;
        }
    }

    fn merge(&mut self, other: &Tally) {
        self.wins += other.wins;
        self.draws += other.draws;
        self.losses += other.losses;
    }
}

/// Aggregated record between competitors `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    pub a: PlayerId,
    pub b: PlayerId,
    /// Games in which `a` had white.
    pub as_white: Tally,
    /// Games in which `a` had black.
    pub as_black: Tally,
}

impl Encounter {
    /// Combined tally for `a` over both colours.
    pub fn total(&self) -> Tally {
        let mut t = self.as_white;
        t.merge(&self.as_black);
        t
    }

    pub fn wins(&self) -> u64 {
        u64::from(self.as_white.wins) + u64::from(self.as_black.wins)
    }

    pub fn draws(&self) -> u64 {
        u64::from(self.as_white.draws) + u64::from(self.as_black.draws)
    }

    pub fn losses(&self) -> u64 {
        u64::from(self.as_white.losses) + u64::from(self.as_black.losses)
    }

    pub fn played(&self) -> u64 {
        self.as_white.played() + self.as_black.played()
    }

    /// Points scored by `a`.
    pub fn score_a(&self) -> f64 {
        self.as_white.score() + self.as_black.score()
    }

    /// Points scored by `b`.
    pub fn score_b(&self) -> f64 {
        self.played() as f64 - self.score_a()
    }

    /// The opponent of `player` in this encounter.
    #[inline]
    pub fn opponent(&self, player: PlayerId) -> PlayerId {
        if player == self.a {
            self.b
        } else {
            self.a
        }
    }

    /// Tallies `(as_white, as_black)` seen from `player`.
    pub fn tallies_for(&self, player: PlayerId) -> (Tally, Tally) {
        if player == self.a {
            (self.as_white, self.as_black)
        } else {
            (self.as_black.mirrored(), self.as_white.mirrored())
        }
    }

    /// True if every game went the same way with no draws.
    pub fn is_strict(&self) -> bool {
        self.played() > 0 && self.draws() == 0 && (self.wins() == 0 || self.losses() == 0)
    }

    /// `(winner, loser)` of a strict encounter.
    pub fn winner(&self) -> Option<(PlayerId, PlayerId)> {
        if !self.is_strict() {
            None
        } else if self.wins() > 0 {
            Some((self.a, self.b))
        } else {
            Some((self.b, self.a))
        }
    }

    /// Expected points for `a` at the given ratings.
    pub fn expected_a(&self, ratings: &[f64], white_advantage: f64, beta: f64) -> f64 {
        let (ra, rb) = (ratings[self.a], ratings[self.b]);
        self.as_white.played() as f64 * expected_score(ra + white_advantage, rb, beta)
            + self.as_black.played() as f64 * expected_score(ra, rb + white_advantage, beta)
    }
}

/// Collapses a game list into one encounter per unordered pair.
///
/// Discarded games, self-pairings and games with an excluded competitor on
/// either side are skipped. Ids beyond the end of `excluded` count as
/// included. The result is ordered by `(a, b)`.
pub fn aggregate(games: &[Game], excluded: &[bool]) -> Vec<Encounter> {
    let is_excluded = |id: PlayerId| excluded.get(id).copied().unwrap_or(false);

    let mut keyed: Vec<(PlayerId, PlayerId, bool, f64)> = scratch::buffer(games.len(), "game key");
    for g in games {
        let Some(white_score) = g.outcome.score_for_white() else {
            continue;
        };
        if g.white == g.black || is_excluded(g.white) || is_excluded(g.black) {
            continue;
        }
        if g.white < g.black {
            keyed.push((g.white, g.black, true, white_score));
        } else {
            keyed.push((g.black, g.white, false, 1.0 - white_score));
        }
    }
    keyed.sort_unstable_by_key(|&(a, b, _, _)| (a, b));

    let mut out: Vec<Encounter> = scratch::buffer(keyed.len(), "encounter");
    for (a, b, a_white, score) in keyed {
        let fresh = match out.last() {
            Some(last) => last.a != a || last.b != b,
            None => true,
        };
        if fresh {
            out.push(Encounter {
                a,
                b,
                as_white: Tally::default(),
                as_black: Tally::default(),
            });
        }
        if let Some(e) = out.last_mut() {
            if a_white {
                e.as_white.record(score);
            } else {
                e.as_black.record(score);
            }
        }
    }
    out.shrink_to_fit();
    out
}

/// Points obtained and games played per competitor.
pub fn obtained_and_played(encounters: &[Encounter], n: usize) -> (Vec<f64>, Vec<u64>) {
    let mut obtained = scratch::filled(n, 0.0, "obtained");
    let mut played = scratch::filled(n, 0u64, "played");
    for e in encounters {
        let games = e.played();
        obtained[e.a] += e.score_a();
        obtained[e.b] += e.score_b();
        played[e.a] += games;
        played[e.b] += games;
    }
    (obtained, played)
}

/// Expected points per competitor at the given ratings.
pub fn expected_scores(
    encounters: &[Encounter],
    ratings: &[f64],
    white_advantage: f64,
    beta: f64,
) -> Vec<f64> {
    let mut expected = scratch::filled(ratings.len(), 0.0, "expected");
    for e in encounters {
        let ea = e.expected_a(ratings, white_advantage, beta);
        expected[e.a] += ea;
        expected[e.b] += e.played() as f64 - ea;
    }
    expected
}

/// Per-competitor record used in reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub wins: u64,
    pub draws: u64,
    pub losses: u64,
    /// Number of distinct opponents.
    pub opponents: usize,
    /// Game-weighted mean rating of the opponents faced.
    pub average_opponent: f64,
    /// Effective number of opponents: exp of the entropy of the share of
    /// games played against each opponent.
    pub diversity: f64,
}

impl Performance {
    pub fn played(&self) -> u64 {
        self.wins + self.draws + self.losses
    }
}

/// Builds the [`Performance`] of every competitor.
pub fn performance(encounters: &[Encounter], ratings: &[f64]) -> Vec<Performance> {
    let n = ratings.len();
    let mut out = scratch::filled(n, Performance::default(), "performance");
    let mut opp_sum = scratch::filled(n, 0.0, "opponent rating");

    for e in encounters {
        let games = e.played();
        let (w, d, l) = (e.wins(), e.draws(), e.losses());
        let pa = &mut out[e.a];
        pa.wins += w;
        pa.draws += d;
        pa.losses += l;
        pa.opponents += 1;
        let pb = &mut out[e.b];
        pb.wins += l;
        pb.draws += d;
        pb.losses += w;
        pb.opponents += 1;
        opp_sum[e.a] += ratings[e.b] * games as f64;
        opp_sum[e.b] += ratings[e.a] * games as f64;
    }

    let mut entropy = scratch::filled(n, 0.0f64, "entropy");
    for e in encounters {
        for p in [e.a, e.b] {
            let total = out[p].played() as f64;
            let share = e.played() as f64 / total;
            if share > 0.0 {
                entropy[p] -= share * share.ln();
            }
        }
    }

    for (j, perf) in out.iter_mut().enumerate() {
        let games = perf.played();
        if games > 0 {
            perf.average_opponent = opp_sum[j] / games as f64;
            perf.diversity = entropy[j].exp();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Outcome;
    use crate::model::Scale;

    fn games() -> Vec<Game> {
        vec![
            Game::new(0, 1, Outcome::WhiteWins),
            Game::new(1, 0, Outcome::WhiteWins),
            Game::new(1, 0, Outcome::Draw),
            Game::new(2, 0, Outcome::BlackWins),
            Game::new(2, 1, Outcome::Discard),
            Game::new(2, 2, Outcome::Draw),
        ]
    }

    #[test]
    fn test_aggregate_merges_pairs() {
        let enc = aggregate(&games(), &[]);
        assert_eq!(enc.len(), 2);
        let e01 = enc[0];
        assert_eq!((e01.a, e01.b), (0, 1));
        assert_eq!(e01.as_white, Tally { wins: 1, draws: 0, losses: 0 });
        assert_eq!(e01.as_black, Tally { wins: 0, draws: 1, losses: 1 });
        assert_eq!(e01.played(), 3);
        assert!((e01.score_a() - 1.5).abs() < 1e-12);

        let e02 = enc[1];
        assert_eq!((e02.a, e02.b), (0, 2));
        assert_eq!(e02.as_black, Tally { wins: 1, draws: 0, losses: 0 });
        assert!(e02.is_strict());
        assert_eq!(e02.winner(), Some((0, 2)));
    }

    #[test]
    fn test_aggregate_skips_excluded() {
        let enc = aggregate(&games(), &[false, true, false]);
        assert_eq!(enc.len(), 1);
        assert_eq!((enc[0].a, enc[0].b), (0, 2));
    }

    #[test]
    fn test_aggregate_empty() {
        let only_discards = vec![Game::new(0, 1, Outcome::Discard)];
        assert!(aggregate(&only_discards, &[]).is_empty());
    }

    #[test]
    fn test_obtained_and_played() {
        let enc = aggregate(&games(), &[]);
        let (obtained, played) = obtained_and_played(&enc, 3);
        assert_eq!(played, vec![4, 3, 1]);
        assert!((obtained[0] - 2.5).abs() < 1e-12);
        assert!((obtained[1] - 1.5).abs() < 1e-12);
        assert!(obtained[2].abs() < 1e-12);
    }

    #[test]
    fn test_expected_scores_sum_to_games() {
        let enc = aggregate(&games(), &[]);
        let beta = Scale::default().beta;
        let exp = expected_scores(&enc, &[2400.0, 2300.0, 2200.0], 30.0, beta);
        let total: f64 = exp.iter().sum();
        assert!((total - 4.0).abs() < 1e-9);
        assert!(exp[0] > 2.0);
    }

    #[test]
    fn test_tallies_for_opponent_are_mirrored() {
        let enc = aggregate(&games(), &[]);
        let (w, b) = enc[0].tallies_for(1);
        assert_eq!(w, Tally { wins: 1, draws: 1, losses: 0 });
        assert_eq!(b, Tally { wins: 0, draws: 0, losses: 1 });
        assert_eq!(enc[0].opponent(1), 0);
    }

    #[test]
    fn test_performance_diversity() {
        let enc = aggregate(&games(), &[]);
        let perf = performance(&enc, &[2400.0, 2300.0, 2200.0]);
        assert_eq!(perf[0].wins, 2);
        assert_eq!(perf[0].draws, 1);
        assert_eq!(perf[0].losses, 1);
        assert_eq!(perf[0].opponents, 2);
        assert!((perf[0].average_opponent - (3.0 * 2300.0 + 2200.0) / 4.0).abs() < 1e-9);
        assert!(perf[0].diversity > 1.0 && perf[0].diversity < 2.0);
        assert!((perf[2].diversity - 1.0).abs() < 1e-12);
    }
}
