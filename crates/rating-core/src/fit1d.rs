//! One-dimensional derivative-free minimization.
//!
//! Used to fit the white advantage and the draw rate while ratings are held
//! still, to fit the common offset of prior-anchored ratings, and for root
//! finding in [`crate::gauss::confidence_to_z`].
//!
//! The minimizer keeps a bracket `x1 < x2 < x3` with `f(x2)` no larger than
//! the ends. Each step tries the vertex of the parabola through the three
//! points and falls back to halving the wider half of the bracket when the
//! vertex is unusable.

/// Consecutive shrinks of one side before the other side is forced to move.
const MAX_ONE_SIDED_CHOPS: u32 = 3;

/// Ceiling on evaluations inside [`minimize_bracketed`].
const MAX_ITERATIONS: u32 = 500;

/// Ceiling on bracket expansions inside [`minimize`].
const MAX_EXPANSIONS: u32 = 64;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Minimizes `f` inside an already bracketed interval.
///
/// `bracket` must be strictly increasing and should satisfy
/// `f(x1) >= f(x2) <= f(x3)`. Every evaluation lies strictly inside the
/// current bracket. Returns the best abscissa once the bracket is narrower
/// than `tolerance`.
pub fn minimize_bracketed<F>(mut f: F, bracket: [f64; 3], tolerance: f64) -> f64
where
    F: FnMut(f64) -> f64,
{
    let [mut x1, mut x2, mut x3] = bracket;
    debug_assert!(x1 < x2 && x2 < x3, "bracket must be increasing");
    let mut f1 = f(x1);
    let mut f2 = f(x2);
    let mut f3 = f(x3);

    let mut last_side: Option<Side> = None;
    let mut chops = 0u32;

    for _ in 0..MAX_ITERATIONS {
        if x3 - x1 <= tolerance {
            break;
        }

        let bisect_wider = || {
            if x2 - x1 > x3 - x2 {
                0.5 * (x1 + x2)
            } else {
                0.5 * (x2 + x3)
            }
        };

        let u = if chops >= MAX_ONE_SIDED_CHOPS {
            // the stuck end has to move
            chops = 0;
            match last_side {
                Some(Side::Left) => 0.5 * (x2 + x3),
                _ => 0.5 * (x1 + x2),
            }
        } else {
            match parabola_vertex((x1, f1), (x2, f2), (x3, f3)) {
                Some(v) if v > x1 && v < x3 && (v - x2).abs() > tolerance * 0.01 => v,
                _ => bisect_wider(),
            }
        };

        if u <= x1 || u >= x3 || u == x2 {
            break;
        }
        let fu = f(u);

        let side = if u < x2 {
            if fu < f2 {
                x3 = x2;
                f3 = f2;
                x2 = u;
                f2 = fu;
                Side::Right
            } else {
                x1 = u;
                f1 = fu;
                Side::Left
            }
        } else if fu < f2 {
            x1 = x2;
            f1 = f2;
            x2 = u;
            f2 = fu;
            Side::Left
        } else {
            x3 = u;
            f3 = fu;
            Side::Right
        };

        if last_side == Some(side) {
            chops += 1;
        } else {
            chops = 1;
            last_side = Some(side);
        }
    }

    x2
}

fn parabola_vertex((x1, f1): (f64, f64), (x2, f2): (f64, f64), (x3, f3): (f64, f64)) -> Option<f64> {
    let a = x2 - x1;
    let b = x2 - x3;
    let num = a * a * (f2 - f3) - b * b * (f2 - f1);
    let den = a * (f2 - f3) - b * (f2 - f1);
    if den.abs() < f64::MIN_POSITIVE || !num.is_finite() {
        return None;
    }
    let v = x2 - 0.5 * num / den;
    v.is_finite().then_some(v)
}

/// Minimizes `f` starting from `start`, searching outward in steps that
/// double until a minimum is bracketed, never leaving `limits`.
///
/// A minimum pinned against one of the limits returns that limit.
pub fn minimize<F>(mut f: F, start: f64, step: f64, tolerance: f64, limits: (f64, f64)) -> f64
where
    F: FnMut(f64) -> f64,
{
    let (lo, hi) = limits;
    let mut step = step.abs().max(tolerance);
    let mut mid = start.clamp(lo, hi);
    let mut f_mid = f(mid);

    for _ in 0..MAX_EXPANSIONS {
        let left = (mid - step).max(lo);
        let right = (mid + step).min(hi);
        let f_left = if left < mid { f(left) } else { f_mid };
        let f_right = if right > mid { f(right) } else { f_mid };

        if f_mid <= f_left && f_mid <= f_right {
            if left < mid && mid < right {
                return minimize_bracketed(f, [left, mid, right], tolerance);
            }
            return mid;
        }

        if f_left < f_right {
            mid = left;
            f_mid = f_left;
        } else {
            mid = right;
            f_mid = f_right;
        }
        step *= 2.0;
    }

    mid
}

/// Finds a root of `f` on `[lo, hi]` by repeated halving.
///
/// `f(lo)` and `f(hi)` should have opposite signs; otherwise the result is
/// the end the halving drifts toward.
pub fn bisect_root<F>(f: F, mut lo: f64, mut hi: f64, iterations: u32) -> f64
where
    F: Fn(f64) -> f64,
{
    let rising = f(lo) < f(hi);
    for _ in 0..iterations {
        let mid = 0.5 * (lo + hi);
        let below = f(mid) < 0.0;
        if below == rising {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn bracketed_parabola_converges() {
        let x = minimize_bracketed(|x| (x - 1.25).powi(2), [0.0, 1.0, 3.0], 1e-9);
        assert!((x - 1.25).abs() < 1e-6);
    }

    #[test]
    fn bracketed_non_quadratic_converges() {
        let x = minimize_bracketed(|x: f64| (x - 0.3).abs().powf(1.5) + 2.0, [-2.0, 0.0, 5.0], 1e-8);
        assert!((x - 0.3).abs() < 1e-4, "got {x}");
    }

    #[test]
    fn bracketed_never_leaves_bracket() {
        let seen = RefCell::new(Vec::new());
        let f = |x: f64| {
            seen.borrow_mut().push(x);
            (x - 2.0).powi(4) - x
        };
        minimize_bracketed(f, [1.0, 2.0, 4.0], 1e-7);
        assert!(seen.borrow().iter().all(|&x| (1.0..=4.0).contains(&x)));
    }

    #[test]
    fn minimize_expands_to_find_bracket() {
        let x = minimize(|x| (x + 37.0).powi(2), 0.0, 1.0, 1e-8, (-1000.0, 1000.0));
        assert!((x + 37.0).abs() < 1e-5);
    }

    #[test]
    fn minimize_respects_limits() {
        let x = minimize(|x| -x, 0.5, 0.1, 1e-6, (0.0, 1.0));
        assert_eq!(x, 1.0);
    }

    #[test]
    fn bisect_root_finds_crossing() {
        let r = bisect_root(|x| x * x - 2.0, 0.0, 2.0, 60);
        assert!((r - std::f64::consts::SQRT_2).abs() < 1e-12);
        let falling = bisect_root(|x| 1.0 - x, 0.0, 4.0, 60);
        assert!((falling - 1.0).abs() < 1e-12);
    }
}
