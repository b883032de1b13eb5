//! Least-squares solver.
//!
//! Minimises `sum((expected - obtained)^2 / played)` over the rated
//! competitors. Every competitor moves against its residual by
//! `delta * d / (kappa + d)`, where `d` is the residual per game, so large
//! misfits take a full step and small ones a proportionally smaller one.

use super::{Anchor, Fit, Parameter, Problem, RatingSolver, SolverContext, MIN_RESOLUTION};
use crate::encounter::Encounter;
use crate::fit1d;
use crate::model::Scale;
use tracing::debug;

/// Bounds on a fitted white advantage.
const WHITE_ADVANTAGE_LIMIT: f64 = 1000.0;

/// Bounds on a fitted draw rate.
const DRAW_RATE_LIMITS: (f64, f64) = (1e-4, 1.0 - 1e-4);

/// Tuning of the least-squares iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeastSquares {
    pub initial_delta: f64,
    pub initial_kappa: f64,
    /// Step divisor and kappa multiplier between phases.
    pub denominator: f64,
    pub phases: u32,
    pub rounds_per_phase: u32,
    /// Outer cycles when the white advantage or draw rate is fitted.
    pub max_cycles: u32,
}

impl Default for LeastSquares {
    fn default() -> Self {
        Self {
            initial_delta: 200.0,
            initial_kappa: 0.05,
            denominator: 3.0,
            phases: 20,
            rounds_per_phase: 10_000,
            max_cycles: 10,
        }
    }
}

fn deviation(ctx: &SolverContext) -> f64 {
    (0..ctx.len())
        .filter(|&j| !ctx.flagged[j] && ctx.played[j] > 0)
        .map(|j| {
            let d = ctx.expected[j] - ctx.obtained[j];
            d * d / ctx.played[j] as f64
        })
        .sum()
}

/// One damped step for every free competitor. Returns the largest step
/// taken.
fn adjust(ctx: &mut SolverContext, delta: f64, kappa: f64, anchor: &Anchor) -> f64 {
    let mut ymax: f64 = 0.0;
    for j in 0..ctx.len() {
        if !ctx.is_free(j) || ctx.played[j] == 0 {
            continue;
        }
        let d = (ctx.expected[j] - ctx.obtained[j]).abs() / ctx.played[j] as f64;
        let y = d / (kappa + d);
        ymax = ymax.max(y);
        if ctx.expected[j] > ctx.obtained[j] {
            ctx.ratings[j] -= delta * y;
        } else {
            ctx.ratings[j] += delta * y;
        }
    }
    ctx.recenter(anchor);
    ymax * delta
}

/// Squared error of the white scores, split by which side had white.
fn white_score_error(encounters: &[Encounter], ratings: &[f64], wa: f64, scale: Scale) -> f64 {
    encounters
        .iter()
        .map(|e| {
            let (ra, rb) = (ratings[e.a], ratings[e.b]);
            let as_white = e.as_white.played() as f64 * scale.expected_score(ra + wa, rb) - e.as_white.score();
            let as_black = e.as_black.played() as f64 * scale.expected_score(ra, rb + wa) - e.as_black.score();
            as_white * as_white + as_black * as_black
        })
        .sum()
}

/// Squared error of the draw counts, split by colour.
fn draw_count_error(encounters: &[Encounter], ratings: &[f64], wa: f64, dr: f64, scale: Scale) -> f64 {
    encounters
        .iter()
        .map(|e| {
            let (ra, rb) = (ratings[e.a], ratings[e.b]);
            let white = e.as_white.played() as f64 * scale.wdl(ra + wa - rb, dr).draw - f64::from(e.as_white.draws);
            let black = e.as_black.played() as f64 * scale.wdl(rb + wa - ra, dr).draw - f64::from(e.as_black.draws);
            white * white + black * black
        })
        .sum()
}

impl LeastSquares {
    /// Runs the phase schedule at fixed white advantage.
    fn run_phases(&self, problem: &Problem<'_>, ctx: &mut SolverContext, wa: f64, fit: &mut Fit) {
        let beta = problem.scale.beta;
        let total_games: u64 = problem.encounters.iter().map(Encounter::played).sum();
        let mut delta = self.initial_delta;
        let mut kappa = self.initial_kappa;

        ctx.recenter(problem.anchor);
        ctx.refresh_expected(problem.encounters, wa, beta);
        let mut dev = deviation(ctx);
        let mut resolution = delta;

        for phase in 0..self.phases {
            let mut kk = 1.0;
            let mut accepted = 0u32;
            for _ in 0..self.rounds_per_phase {
                ctx.save();
                resolution = adjust(ctx, delta * kk, kappa, problem.anchor);
                ctx.refresh_expected(problem.encounters, wa, beta);
                let current = deviation(ctx);
                if current >= dev {
                    ctx.restore();
                    ctx.refresh_expected(problem.encounters, wa, beta);
                    break;
                }
                dev = current;
                accepted += 1;
                kk *= 0.995;
                if resolution < MIN_RESOLUTION {
                    break;
                }
            }
            fit.phases += 1;
            fit.rounds += u64::from(accepted);
            debug!(
                phase,
                accepted,
                deviation = 1000.0 * (dev / total_games.max(1) as f64).sqrt(),
                resolution,
                "least-squares phase"
            );

            delta /= self.denominator;
            kappa *= self.denominator;
            if resolution < MIN_RESOLUTION || dev < MIN_RESOLUTION * MIN_RESOLUTION {
                break;
            }
        }
        fit.deviation = dev;
    }
}

impl RatingSolver for LeastSquares {
    fn solve(&self, problem: &Problem<'_>, ctx: &mut SolverContext) -> Fit {
        let fixed = match problem.anchor {
            Anchor::Multiple(list) => list.clone(),
            _ => Vec::new(),
        };
        ctx.prepare(problem.encounters, &fixed);

        let mut fit = Fit {
            white_advantage: problem.white_advantage.value(),
            draw_rate: problem.draw_rate.value(),
            ..Fit::default()
        };
        let cycles = if problem.white_advantage.is_fitted() || problem.draw_rate.is_fitted() {
            self.max_cycles
        } else {
            1
        };

        for cycle in 0..cycles {
            self.run_phases(problem, ctx, fit.white_advantage, &mut fit);

            let mut moved = 0.0f64;
            if let Parameter::Fit(_) = problem.white_advantage {
                let ratings = &ctx.ratings;
                let wa = fit1d::minimize(
                    |w| white_score_error(problem.encounters, ratings, w, problem.scale),
                    fit.white_advantage,
                    100.0,
                    0.01,
                    (-WHITE_ADVANTAGE_LIMIT, WHITE_ADVANTAGE_LIMIT),
                );
                moved = moved.max((wa - fit.white_advantage).abs());
                fit.white_advantage = wa;
            }
            if let Parameter::Fit(_) = problem.draw_rate {
                let ratings = &ctx.ratings;
                let wa = fit.white_advantage;
                let dr = fit1d::minimize(
                    |d| draw_count_error(problem.encounters, ratings, wa, d, problem.scale),
                    fit.draw_rate,
                    0.1,
                    1e-5,
                    DRAW_RATE_LIMITS,
                );
                moved = moved.max(100.0 * (dr - fit.draw_rate).abs());
                fit.draw_rate = dr;
            }
            debug!(cycle, white_advantage = fit.white_advantage, draw_rate = fit.draw_rate, "parameters refitted");
            if cycle > 0 && moved < 0.01 {
                break;
            }
        }

        ctx.refresh_expected(problem.encounters, fit.white_advantage, problem.scale.beta);
        fit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encounter::aggregate;
    use crate::game::{Game, Outcome};
    use crate::prior::PriorSet;

    fn problem<'a>(encounters: &'a [Encounter], priors: &'a PriorSet, anchor: &'a Anchor) -> Problem<'a> {
        Problem {
            encounters,
            priors,
            anchor,
            white_advantage: Parameter::Fixed(0.0),
            draw_rate: Parameter::Fixed(0.5),
            scale: Scale::default(),
        }
    }

    #[test]
    fn test_even_record_gives_equal_ratings() {
        let games = vec![
            Game::new(0, 1, Outcome::WhiteWins),
            Game::new(1, 0, Outcome::WhiteWins),
            Game::new(0, 1, Outcome::Draw),
        ];
        let enc = aggregate(&games, &[]);
        let priors = PriorSet::default();
        let anchor = Anchor::Average(2000.0);
        let mut ctx = SolverContext::new(vec![false; 2], 2000.0);
        LeastSquares::default().solve(&problem(&enc, &priors, &anchor), &mut ctx);
        assert!((ctx.ratings[0] - 2000.0).abs() < 1e-6);
        assert!((ctx.ratings[1] - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn test_three_to_one_matches_logistic_gap() {
        let mut games = vec![Game::new(0, 1, Outcome::WhiteWins); 3];
        games.push(Game::new(0, 1, Outcome::BlackWins));
        let enc = aggregate(&games, &[]);
        let priors = PriorSet::default();
        let anchor = Anchor::Average(2000.0);
        let mut ctx = SolverContext::new(vec![false; 2], 2000.0);
        LeastSquares::default().solve(&problem(&enc, &priors, &anchor), &mut ctx);
        let gap = ctx.ratings[0] - ctx.ratings[1];
        let beta = Scale::default().beta;
        let target = (3.0f64).ln() / beta;
        assert!((gap - target).abs() < 0.1, "gap {gap} target {target}");
        assert!((ctx.ratings[0] + ctx.ratings[1] - 4000.0).abs() < 1e-6);
    }

    #[test]
    fn test_fitted_white_advantage_is_positive_when_white_scores_more() {
        let mut games = Vec::new();
        for _ in 0..30 {
            games.push(Game::new(0, 1, Outcome::WhiteWins));
            games.push(Game::new(1, 0, Outcome::WhiteWins));
            games.push(Game::new(0, 1, Outcome::Draw));
            games.push(Game::new(1, 0, Outcome::Draw));
        }
        let enc = aggregate(&games, &[]);
        let priors = PriorSet::default();
        let anchor = Anchor::Average(2000.0);
        let mut p = problem(&enc, &priors, &anchor);
        p.white_advantage = Parameter::Fit(0.0);
        p.draw_rate = Parameter::Fit(0.5);
        let mut ctx = SolverContext::new(vec![false; 2], 2000.0);
        let fit = LeastSquares::default().solve(&p, &mut ctx);
        // white scores 75%
        let beta = Scale::default().beta;
        let target = (3.0f64).ln() / beta;
        assert!((fit.white_advantage - target).abs() < 1.0, "wa {}", fit.white_advantage);
        assert!(fit.draw_rate > 0.3 && fit.draw_rate < 1.0, "draw rate {}", fit.draw_rate);
    }
}
