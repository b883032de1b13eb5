//! Gaussian beliefs about ratings and model parameters.

use crate::game::PlayerId;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest uncertainty a prior may declare.
pub const PRIOR_SMALLEST_SIGMA: f64 = 1e-7;

/// Errors raised while checking a prior set against the competitor table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriorError {
    #[error("prior refers to unknown competitor {0}")]
    UnknownCompetitor(PlayerId),
    #[error("prior sigma {0} is not a positive finite number")]
    InvalidSigma(f64),
    #[error("relative prior links competitor {0} to itself")]
    SelfRelative(PlayerId),
}

/// Belief that a value is `value` give or take `sigma`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prior {
    pub value: f64,
    pub sigma: f64,
}

impl Prior {
    #[must_use]
    pub const fn new(value: f64, sigma: f64) -> Self {
        Self { value, sigma }
    }

    /// Quadratic penalty of observing `x`.
    #[inline]
    pub fn penalty(&self, x: f64) -> f64 {
        let z = (x - self.value) / self.sigma;
        0.5 * z * z
    }

    fn validate(&self) -> Result<(), PriorError> {
        if self.sigma.is_finite() && self.sigma >= PRIOR_SMALLEST_SIGMA {
            Ok(())
        } else {
            Err(PriorError::InvalidSigma(self.sigma))
        }
    }

    fn perturbed<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let z: f64 = StandardNormal.sample(rng);
        Self {
            value: self.value + self.sigma * z,
            sigma: self.sigma,
        }
    }
}

/// Belief that `rating[a] - rating[b]` is `delta` give or take `sigma`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativePrior {
    pub a: PlayerId,
    pub b: PlayerId,
    pub delta: f64,
    pub sigma: f64,
}

impl RelativePrior {
    #[inline]
    pub fn penalty(&self, ratings: &[f64]) -> f64 {
        let z = (ratings[self.a] - ratings[self.b] - self.delta) / self.sigma;
        0.5 * z * z
    }
}

/// Every prior supplied for one solve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorSet {
    /// Absolute prior per competitor id. May be shorter than the table.
    pub absolute: Vec<Option<Prior>>,
    pub relative: Vec<RelativePrior>,
    pub white_advantage: Option<Prior>,
    pub draw_rate: Option<Prior>,
}

impl PriorSet {
    /// Prior on competitor `id`, if any.
    #[inline]
    pub fn absolute_for(&self, id: PlayerId) -> Option<&Prior> {
        self.absolute.get(id).and_then(Option::as_ref)
    }

    /// Returns true if any competitor has an absolute prior.
    pub fn has_absolute(&self) -> bool {
        self.absolute.iter().any(Option::is_some)
    }

    /// Returns true if `id` takes part in any rating prior.
    pub fn involves(&self, id: PlayerId) -> bool {
        self.absolute_for(id).is_some() || self.relative.iter().any(|r| r.a == id || r.b == id)
    }

    /// Checks ids and sigmas against a table of `n` competitors.
    ///
    /// # Errors
    ///
    /// Returns [`PriorError`] for the first out-of-range id, invalid sigma or
    /// self-referencing relative prior.
    pub fn validate(&self, n: usize) -> Result<(), PriorError> {
        for (id, p) in self.absolute.iter().enumerate() {
            if let Some(p) = p {
                if id >= n {
                    return Err(PriorError::UnknownCompetitor(id));
                }
                p.validate()?;
            }
        }
        for r in &self.relative {
            for id in [r.a, r.b] {
                if id >= n {
                    return Err(PriorError::UnknownCompetitor(id));
                }
            }
            if r.a == r.b {
                return Err(PriorError::SelfRelative(r.a));
            }
            Prior::new(r.delta, r.sigma).validate()?;
        }
        for p in self.white_advantage.iter().chain(self.draw_rate.iter()) {
            p.validate()?;
        }
        Ok(())
    }

    /// Penalty of the absolute and relative rating priors at `ratings`.
    pub fn rating_penalty(&self, ratings: &[f64]) -> f64 {
        let absolute: f64 = self
            .absolute
            .iter()
            .zip(ratings)
            .filter_map(|(p, &r)| p.map(|p| p.penalty(r)))
            .sum();
        let relative: f64 = self.relative.iter().map(|r| r.penalty(ratings)).sum();
        absolute + relative
    }

    /// Penalty terms that involve competitor `id` at rating `x`, with every
    /// other rating read from `ratings`.
    pub fn penalty_for(&self, id: PlayerId, x: f64, ratings: &[f64]) -> f64 {
        let mut total = self.absolute_for(id).map_or(0.0, |p| p.penalty(x));
        for r in &self.relative {
            let diff = if r.a == id {
                x - ratings[r.b]
            } else if r.b == id {
                ratings[r.a] - x
            } else {
                continue;
            };
            let z = (diff - r.delta) / r.sigma;
            total += 0.5 * z * z;
        }
        total
    }

    /// A copy with every value moved by a normal draw scaled by its sigma.
    ///
    /// Simulation rounds use this so the spread of the priors shows up in
    /// the reported errors.
    pub fn perturbed<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        Self {
            absolute: self
                .absolute
                .iter()
                .map(|p| p.map(|p| p.perturbed(rng)))
                .collect(),
            relative: self
                .relative
                .iter()
                .map(|r| {
                    let z: f64 = StandardNormal.sample(rng);
                    RelativePrior {
                        delta: r.delta + r.sigma * z,
                        ..*r
                    }
                })
                .collect(),
            white_advantage: self.white_advantage.map(|p| p.perturbed(rng)),
            draw_rate: self.draw_rate.map(|p| {
                let mut q = p.perturbed(rng);
                q.value = q.value.clamp(0.0, 1.0);
                q
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn sample() -> PriorSet {
        PriorSet {
            absolute: vec![Some(Prior::new(2500.0, 50.0)), None, None],
            relative: vec![RelativePrior {
                a: 1,
                b: 2,
                delta: 100.0,
                sigma: 20.0,
            }],
            white_advantage: Some(Prior::new(30.0, 10.0)),
            draw_rate: None,
        }
    }

    #[test]
    fn test_validate() {
        assert!(sample().validate(3).is_ok());
        assert_eq!(sample().validate(2), Err(PriorError::UnknownCompetitor(2)));

        let mut bad = sample();
        bad.absolute[0] = Some(Prior::new(2500.0, 0.0));
        assert_eq!(bad.validate(3), Err(PriorError::InvalidSigma(0.0)));

        let mut selfref = sample();
        selfref.relative[0].b = 1;
        assert_eq!(selfref.validate(3), Err(PriorError::SelfRelative(1)));
    }

    #[test]
    fn test_penalties() {
        let set = sample();
        let ratings = [2550.0, 2300.0, 2240.0];
        // (50/50)^2/2 + (60-100)^2/20^2/2
        assert!((set.rating_penalty(&ratings) - (0.5 + 2.0)).abs() < 1e-12);
        assert!((set.penalty_for(2, 2200.0, &ratings) - 0.0).abs() < 1e-12);
        assert!((set.penalty_for(0, 2500.0, &ratings)).abs() < 1e-12);
        assert!(set.involves(2));
        assert!(!set.involves(5));
    }

    #[test]
    fn test_perturbed_keeps_sigma_and_moves_values() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let set = sample();
        let p = set.perturbed(&mut rng);
        let prior = p.absolute[0].expect("absolute prior kept");
        assert_eq!(prior.sigma, 50.0);
        assert_ne!(prior.value, 2500.0);
        assert!(p.absolute[1].is_none());
        assert_eq!(p.relative[0].a, 1);
        assert_ne!(p.relative[0].delta, 100.0);
    }

    #[test]
    fn test_perturbed_spread_matches_sigma() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let prior = Prior::new(100.0, 2.0);
        let n = 20_000;
        let values: Vec<f64> = (0..n).map(|_| prior.perturbed(&mut rng).value).collect();
        let mean = values.iter().sum::<f64>() / n as f64;
        let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 100.0).abs() < 0.1, "mean {mean}");
        assert!((var.sqrt() - 2.0).abs() < 0.1, "spread {}", var.sqrt());
    }
}
