//! Maximum-likelihood solver with priors.
//!
//! The deviation is the negative log-likelihood of every win, draw and loss
//! under [`Wdl`], plus `0.5 * z^2` for each prior. Each round probes every
//! free competitor one step down and one step up with everyone else held
//! still and moves it toward the better side.

use super::{Anchor, Fit, Parameter, Problem, RatingSolver, SolverContext, MIN_RESOLUTION};
use crate::encounter::{Encounter, Tally};
use crate::fit1d;
use crate::game::PlayerId;
use crate::model::Wdl;
use crate::prior::PriorSet;
use tracing::debug;

const WHITE_ADVANTAGE_LIMIT: f64 = 1000.0;
const DRAW_RATE_LIMITS: (f64, f64) = (1e-4, 1.0 - 1e-4);

/// Tuning of the likelihood iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bayesian {
    /// Step divisor between phases.
    pub denominator: f64,
    pub phases: u32,
    pub rounds_per_phase: u32,
}

impl Default for Bayesian {
    fn default() -> Self {
        Self {
            denominator: 3.0,
            phases: 40,
            rounds_per_phase: 10_000,
        }
    }
}

/// Negative log-likelihood of one side's games at white-minus-black
/// difference `diff`, with `mine` counted from the side that had white.
fn tally_nll(mine: &Tally, diff: f64, dr: f64, beta: f64) -> f64 {
    if mine.played() == 0 {
        return 0.0;
    }
    let p = Wdl::at(diff, dr, beta);
    -(f64::from(mine.wins) * p.win.ln() + f64::from(mine.draws) * p.draw.ln() + f64::from(mine.losses) * p.loss.ln())
}

/// Negative log-likelihood of an encounter at ratings `ra` and `rb`.
fn encounter_nll(e: &Encounter, ra: f64, rb: f64, wa: f64, dr: f64, beta: f64) -> f64 {
    tally_nll(&e.as_white, ra + wa - rb, dr, beta) + tally_nll(&e.as_black.mirrored(), rb + wa - ra, dr, beta)
}

struct Objective<'p, 'a> {
    problem: &'p Problem<'a>,
    /// Encounter indices per competitor.
    incident: Vec<Vec<usize>>,
}

impl<'p, 'a> Objective<'p, 'a> {
    fn new(problem: &'p Problem<'a>, n: usize) -> Self {
        let mut incident = vec![Vec::new(); n];
        for (i, e) in problem.encounters.iter().enumerate() {
            incident[e.a].push(i);
            incident[e.b].push(i);
        }
        Self { problem, incident }
    }

    fn priors(&self) -> &PriorSet {
        self.problem.priors
    }

    fn likelihood(&self, ratings: &[f64], wa: f64, dr: f64) -> f64 {
        let beta = self.problem.scale.beta;
        self.problem
            .encounters
            .iter()
            .map(|e| encounter_nll(e, ratings[e.a], ratings[e.b], wa, dr, beta))
            .sum()
    }

    fn parameter_penalty(&self, wa: f64, dr: f64) -> f64 {
        let priors = self.priors();
        priors.white_advantage.map_or(0.0, |p| p.penalty(wa)) + priors.draw_rate.map_or(0.0, |p| p.penalty(dr))
    }

    /// Full deviation.
    fn total(&self, ratings: &[f64], wa: f64, dr: f64) -> f64 {
        self.likelihood(ratings, wa, dr) + self.priors().rating_penalty(ratings) + self.parameter_penalty(wa, dr)
    }

    /// Terms of the deviation that depend on competitor `j`, at rating `x`.
    fn local(&self, j: PlayerId, x: f64, ratings: &[f64], wa: f64, dr: f64) -> f64 {
        let beta = self.problem.scale.beta;
        let games: f64 = self.incident[j]
            .iter()
            .map(|&i| {
                let e = &self.problem.encounters[i];
                if e.a == j {
                    encounter_nll(e, x, ratings[e.b], wa, dr, beta)
                } else {
                    encounter_nll(e, ratings[e.a], x, wa, dr, beta)
                }
            })
            .sum();
        games + self.priors().penalty_for(j, x, ratings)
    }

    /// Direction and size, in steps, toward lower deviation for `j`.
    fn changing(&self, j: PlayerId, delta: f64, ratings: &[f64], wa: f64, dr: f64) -> f64 {
        let r = ratings[j];
        let down = self.local(j, r - delta, ratings, wa, dr);
        let center = self.local(j, r, ratings, wa, dr);
        let up = self.local(j, r + delta, ratings, wa, dr);
        let toward = if down > up { 1.0 } else { -1.0 };
        if center < down && center < up {
            0.5 * toward
        } else {
            toward
        }
    }
}

impl Bayesian {
    /// Fixes the free additive constant after a step.
    fn normalize(&self, objective: &Objective<'_, '_>, ctx: &mut SolverContext) {
        let problem = objective.problem;
        match problem.anchor {
            Anchor::Multiple(_) => {}
            _ if problem.priors.has_absolute() => {
                let priors = problem.priors;
                let base = ctx.ratings.clone();
                let free: Vec<bool> = (0..ctx.len()).map(|j| ctx.is_free(j)).collect();
                let excess = fit1d::minimize(
                    |s| {
                        let shifted: Vec<f64> = base
                            .iter()
                            .zip(&free)
                            .map(|(&r, &f)| if f { r - s } else { r })
                            .collect();
                        priors.rating_penalty(&shifted)
                    },
                    0.0,
                    1.0,
                    1e-9,
                    (-1e6, 1e6),
                );
                ctx.shift(excess);
            }
            anchor => ctx.recenter(anchor),
        }
    }
}

impl RatingSolver for Bayesian {
    fn solve(&self, problem: &Problem<'_>, ctx: &mut SolverContext) -> Fit {
        // with absolute priors in play a single anchor is held fixed
        let fixed = match problem.anchor {
            Anchor::Multiple(list) => list.clone(),
            Anchor::Single { player, rating } if problem.priors.has_absolute() => vec![(*player, *rating)],
            _ => Vec::new(),
        };
        ctx.prepare(problem.encounters, &fixed);
        let objective = Objective::new(problem, ctx.len());

        let mut fit = Fit {
            white_advantage: problem
                .priors
                .white_advantage
                .filter(|_| problem.white_advantage.is_fitted())
                .map_or(problem.white_advantage.value(), |p| p.value),
            draw_rate: problem
                .priors
                .draw_rate
                .filter(|_| problem.draw_rate.is_fitted())
                .map_or(problem.draw_rate.value(), |p| p.value),
            ..Fit::default()
        };

        self.normalize(&objective, ctx);
        let mut delta = problem.scale.points_at_76();
        let mut resolution = delta;
        let mut dev = objective.total(&ctx.ratings, fit.white_advantage, fit.draw_rate);

        for phase in 0..self.phases {
            let mut accepted = 0u32;
            for _ in 0..self.rounds_per_phase {
                ctx.save();
                let mut ymax: f64 = 0.0;
                for j in 0..ctx.len() {
                    ctx.changing[j] = if ctx.is_free(j) {
                        objective.changing(j, delta, &ctx.ratings, fit.white_advantage, fit.draw_rate)
                    } else {
                        0.0
                    };
                }
                for j in 0..ctx.len() {
                    if ctx.is_free(j) {
                        ymax = ymax.max(ctx.changing[j].abs());
                        ctx.ratings[j] += delta * ctx.changing[j];
                    }
                }
                self.normalize(&objective, ctx);
                resolution = 0.5 * (resolution + ymax * delta);

                let current = objective.total(&ctx.ratings, fit.white_advantage, fit.draw_rate);
                if current >= dev {
                    ctx.restore();
                    break;
                }
                dev = current;
                accepted += 1;
                if resolution < MIN_RESOLUTION {
                    break;
                }
            }
            fit.phases += 1;
            fit.rounds += u64::from(accepted);

            if let Parameter::Fit(_) = problem.white_advantage {
                let (ratings, dr) = (&ctx.ratings, fit.draw_rate);
                fit.white_advantage = fit1d::minimize(
                    |w| objective.likelihood(ratings, w, dr) + objective.parameter_penalty(w, dr),
                    fit.white_advantage,
                    delta.max(1.0),
                    1e-3,
                    (-WHITE_ADVANTAGE_LIMIT, WHITE_ADVANTAGE_LIMIT),
                );
            }
            if let Parameter::Fit(_) = problem.draw_rate {
                let (ratings, wa) = (&ctx.ratings, fit.white_advantage);
                fit.draw_rate = fit1d::minimize(
                    |d| objective.likelihood(ratings, wa, d) + objective.parameter_penalty(wa, d),
                    fit.draw_rate,
                    0.05,
                    1e-6,
                    DRAW_RATE_LIMITS,
                );
            }
            dev = objective.total(&ctx.ratings, fit.white_advantage, fit.draw_rate);
            debug!(phase, accepted, deviation = dev, resolution, "likelihood phase");

            delta /= self.denominator;
            if resolution < MIN_RESOLUTION {
                break;
            }
        }

        if fixed.is_empty() && !problem.priors.has_absolute() {
            ctx.recenter(problem.anchor);
        }
        ctx.refresh_expected(problem.encounters, fit.white_advantage, problem.scale.beta);
        fit.deviation = dev;
        fit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encounter::aggregate;
    use crate::game::{Game, Outcome};
    use crate::model::Scale;
    use crate::prior::Prior;

    fn games() -> Vec<Game> {
        let mut g = Vec::new();
        for _ in 0..10 {
            g.push(Game::new(0, 1, Outcome::WhiteWins));
            g.push(Game::new(1, 0, Outcome::Draw));
            g.push(Game::new(1, 2, Outcome::WhiteWins));
            g.push(Game::new(2, 1, Outcome::Draw));
            g.push(Game::new(2, 0, Outcome::BlackWins));
            g.push(Game::new(0, 2, Outcome::Draw));
        }
        g.push(Game::new(2, 0, Outcome::WhiteWins));
        g
    }

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
    fn test_orders_by_strength_and_keeps_average() {
        let enc = aggregate(&games(), &[]);
        let priors = PriorSet::default();
        let anchor = Anchor::Average(2300.0);
        let mut ctx = SolverContext::new(vec![false; 3], 2300.0);
        Bayesian::default().solve(&problem(&enc, &priors, &anchor), &mut ctx);
        assert!(ctx.ratings[0] > ctx.ratings[1]);
        assert!(ctx.ratings[1] > ctx.ratings[2]);
        let mean = ctx.ratings.iter().sum::<f64>() / 3.0;
        assert!((mean - 2300.0).abs() < 1e-6);
    }

    #[test]
    fn test_multiple_anchors_stay_put() {
        let enc = aggregate(&games(), &[]);
        let priors = PriorSet::default();
        let anchor = Anchor::Multiple(vec![(0, 2600.0), (2, 2400.0)]);
        let mut ctx = SolverContext::new(vec![false; 3], anchor.reference());
        Bayesian::default().solve(&problem(&enc, &priors, &anchor), &mut ctx);
        assert_eq!(ctx.ratings[0], 2600.0);
        assert_eq!(ctx.ratings[2], 2400.0);
        assert!(ctx.ratings[1] > 2400.0 && ctx.ratings[1] < 2600.0);
    }

    #[test]
    fn test_strong_prior_pulls_rating() {
        let enc = aggregate(&games(), &[]);
        let priors = PriorSet {
            absolute: vec![None, Some(Prior::new(2500.0, 1e-3)), None],
            ..PriorSet::default()
        };
        let anchor = Anchor::Average(2300.0);
        let mut ctx = SolverContext::new(vec![false; 3], 2300.0);
        Bayesian::default().solve(&problem(&enc, &priors, &anchor), &mut ctx);
        assert!((ctx.ratings[1] - 2500.0).abs() < 0.5, "rating {}", ctx.ratings[1]);
    }

    #[test]
    fn test_nll_is_lowest_near_observed_score() {
        let enc = aggregate(&[Game::new(0, 1, Outcome::Draw)], &[]);
        let beta = Scale::default().beta;
        let even = encounter_nll(&enc[0], 0.0, 0.0, 0.0, 0.5, beta);
        let apart = encounter_nll(&enc[0], 300.0, 0.0, 0.0, 0.5, beta);
        assert!(even < apart);
    }
}
