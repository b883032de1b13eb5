//! End-to-end checks of the solvers on small synthetic pools.

use rating_core::solver::{LeastSquares, Problem, RatingSolver, SolverContext};
use rating_core::{
    aggregate, expected_score, rate, Anchor, Game, Outcome, Parameter, PriorSet, RatingConfig, RatingInput, Scale,
    Strategy,
};

/// Games between every pair whose results follow the model exactly, up to
/// rounding of the win count.
fn games_from_ratings(ratings: &[f64], per_pair: u32) -> Vec<Game> {
    let beta = Scale::default().beta;
    let mut games = Vec::new();
    for i in 0..ratings.len() {
        for j in (i + 1)..ratings.len() {
            let p = expected_score(ratings[i], ratings[j], beta);
            let wins = (p * f64::from(per_pair)).round() as u32;
            for k in 0..per_pair {
                let (white, black) = if k % 2 == 0 { (i, j) } else { (j, i) };
                let i_wins = k < wins;
                let outcome = match (i_wins, white == i) {
                    (true, true) | (false, false) => Outcome::WhiteWins,
                    _ => Outcome::BlackWins,
                };
                games.push(Game::new(white, black, outcome));
            }
        }
    }
    games
}

fn rate_with(games: &[Game], n: usize, config: &RatingConfig) -> Vec<f64> {
    let priors = PriorSet::default();
    rate(&RatingInput {
        games,
        competitors: n,
        priors: &priors,
        config,
    })
    .expect("rated")
    .ratings
}

#[test]
fn test_least_squares_recovers_known_ratings() {
    let truth = [1400.0, 1500.0, 1550.0, 1650.0];
    let games = games_from_ratings(&truth, 2000);
    let config = RatingConfig {
        anchor: Anchor::Average(1525.0),
        ..RatingConfig::default()
    };
    let ratings = rate_with(&games, truth.len(), &config);
    for (r, t) in ratings.iter().zip(truth) {
        assert!((r - t).abs() < 2.0, "rating {r} expected {t}");
    }
}

#[test]
fn test_single_anchor_lands_exactly() {
    let truth = [1400.0, 1500.0, 1600.0];
    let games = games_from_ratings(&truth, 200);
    for strategy in [Strategy::LeastSquares, Strategy::Bayesian] {
        let config = RatingConfig {
            anchor: Anchor::Single {
                player: 1,
                rating: 2000.0,
            },
            strategy,
            ..RatingConfig::default()
        };
        let ratings = rate_with(&games, 3, &config);
        assert!((ratings[1] - 2000.0).abs() < 1e-9, "{strategy:?}: {ratings:?}");
        assert!(ratings[0] < ratings[1] && ratings[1] < ratings[2]);
    }
}

#[test]
fn test_multiple_anchors_stay_fixed() {
    let truth = [1400.0, 1500.0, 1600.0, 1700.0];
    let games = games_from_ratings(&truth, 100);
    let config = RatingConfig {
        anchor: Anchor::Multiple(vec![(0, 1400.0), (3, 1700.0)]),
        ..RatingConfig::default()
    };
    let ratings = rate_with(&games, 4, &config);
    assert_eq!(ratings[0], 1400.0);
    assert_eq!(ratings[3], 1700.0);
    assert!((ratings[1] - 1500.0).abs() < 10.0);
    assert!((ratings[2] - 1600.0).abs() < 10.0);
}

#[test]
fn test_ten_straight_wins() {
    let games = vec![Game::new(0, 1, Outcome::WhiteWins); 10];
    let enc = aggregate(&games, &[]);
    let priors = PriorSet::default();
    let anchor = Anchor::Average(1500.0);
    let problem = Problem {
        encounters: &enc,
        priors: &priors,
        anchor: &anchor,
        white_advantage: Parameter::Fixed(0.0),
        draw_rate: Parameter::Fixed(0.5),
        scale: Scale::default(),
    };
    let mut ctx = SolverContext::new(vec![false; 2], 1500.0);
    LeastSquares::default().solve(&problem, &mut ctx);

    assert!(ctx.ratings[0] > ctx.ratings[1]);
    assert!((ctx.ratings[0] + ctx.ratings[1] - 3000.0).abs() < 1e-6);
    let share = ctx.expected[0] / ctx.played[0] as f64;
    let obtained = ctx.obtained[0] / ctx.played[0] as f64;
    assert!((share - obtained).abs() < 0.01, "expected share {share}");
}

#[test]
fn test_bayesian_and_least_squares_agree_on_order() {
    let truth = [1300.0, 1450.0, 1500.0, 1700.0];
    let games = games_from_ratings(&truth, 50);
    let ls = rate_with(&games, 4, &RatingConfig::default());
    let bayes = rate_with(
        &games,
        4,
        &RatingConfig {
            strategy: Strategy::Bayesian,
            ..RatingConfig::default()
        },
    );
    for w in [ls, bayes] {
        assert!(w.windows(2).all(|p| p[0] < p[1]), "{w:?}");
    }
}
