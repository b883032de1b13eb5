//! Standard normal helpers: density, cumulative distribution and confidence
//! levels.

use crate::fit1d;
use std::f64::consts::PI;

const CDF_P: f64 = 0.231_641_9;
const CDF_B: [f64; 5] = [
    0.319_381_53,
    -0.356_563_782,
    1.781_477_937,
    -1.821_255_978,
    1.330_274_429,
];
const CDF_CLAMP: f64 = 6.0;

/// Standard normal probability density at `x`.
#[inline]
pub fn density(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Standard normal cumulative distribution at `x`.
///
/// Uses the five-term polynomial approximation (absolute error below 1e-7)
/// and saturates to exactly 0 or 1 beyond six standard deviations.
pub fn cdf(x: f64) -> f64 {
    if x >= CDF_CLAMP {
        return 1.0;
    }
    if x <= -CDF_CLAMP {
        return 0.0;
    }
    let t = 1.0 / (1.0 + CDF_P * x.abs());
    let poly = CDF_B.iter().rev().fold(0.0, |acc, &b| (acc + b) * t);
    let tail = density(x) * poly;
    if x >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Converts a two-sided confidence level in `[0, 1)` into a z-score.
///
/// Returns the `z` for which `P(-z < X < z) = confidence` under a standard
/// normal, found by bisection over `[0, 6]`.
pub fn confidence_to_z(confidence: f64) -> f64 {
    if confidence <= 0.0 {
        return 0.0;
    }
    if confidence >= 1.0 {
        return CDF_CLAMP;
    }
    fit1d::bisect_root(|z| 2.0 * (cdf(z) - 0.5) - confidence, 0.0, CDF_CLAMP, 48)
}
