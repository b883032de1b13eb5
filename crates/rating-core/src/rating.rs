//! The rating pipeline: aggregate, classify, check connectivity, solve and
//! extrapolate.

use crate::competitor::{Record, Roster};
use crate::encounter::{aggregate, obtained_and_played, performance, Encounter, Performance};
use crate::game::{Game, PlayerId};
use crate::groups::{analyze, analyze_undirected, Connectivity};
use crate::model::Scale;
use crate::prior::{PriorError, PriorSet};
use crate::solver::extrapolate::{rate_cut_off, rate_perfect_records, PurgeLayer};
use crate::solver::{
    Anchor, Fit, Parameter, Problem, SolverContext, Strategy, DEFAULT_DRAW_RATE, DEFAULT_WHITE_ADVANTAGE,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Mean rating of the pool when nothing else fixes it.
pub const DEFAULT_AVERAGE: f64 = 2300.0;

/// Default two-sided confidence for reported errors, in percent.
pub const DEFAULT_CONFIDENCE: f64 = 95.0;

/// Conditions that stop a solve before it starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RatingError {
    #[error("no ratable games")]
    NoGames,
    #[error("results split the competitors into {groups} groups that cannot be rated together")]
    Disconnected { groups: usize },
    #[error("{0} cannot be both fixed and fitted")]
    ConflictingParameter(&'static str),
    #[error("competitor {0} is not in the table")]
    UnknownCompetitor(PlayerId),
    #[error("anchor {0} has no games")]
    AnchorWithoutGames(PlayerId),
    #[error("draw rate {0} is outside [0, 1]")]
    InvalidDrawRate(f64),
    #[error("confidence {0}% is outside (0, 100)")]
    InvalidConfidence(f64),
    #[error("invalid prior: {0}")]
    Prior(#[from] PriorError),
}

/// Solver configuration supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingConfig {
    pub anchor: Anchor,
    pub scale: Scale,
    pub white_advantage: Parameter,
    pub draw_rate: Parameter,
    pub strategy: Strategy,
    /// Two-sided confidence for reported errors, in percent.
    pub confidence: f64,
    /// Rate a disconnected result graph anyway.
    pub allow_disconnected: bool,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            anchor: Anchor::Average(DEFAULT_AVERAGE),
            scale: Scale::default(),
            white_advantage: Parameter::Fixed(DEFAULT_WHITE_ADVANTAGE),
            draw_rate: Parameter::Fixed(DEFAULT_DRAW_RATE),
            strategy: Strategy::default(),
            confidence: DEFAULT_CONFIDENCE,
            allow_disconnected: false,
        }
    }
}

impl RatingConfig {
    /// Checks the configuration against a table of `n` competitors.
    ///
    /// # Errors
    ///
    /// Returns the first [`RatingError`] found among anchor ids, draw rate
    /// and confidence.
    pub fn validate(&self, n: usize) -> Result<(), RatingError> {
        for p in self.anchor.players() {
            if p >= n {
                return Err(RatingError::UnknownCompetitor(p));
            }
        }
        let dr = self.draw_rate.value();
        if !(0.0..=1.0).contains(&dr) {
            return Err(RatingError::InvalidDrawRate(dr));
        }
        if !(self.confidence > 0.0 && self.confidence < 100.0) {
            return Err(RatingError::InvalidConfidence(self.confidence));
        }
        Ok(())
    }
}

/// Everything ingestion hands to the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RatingInput<'a> {
    pub games: &'a [Game],
    /// Size of the competitor table; every id in `games` is below it.
    pub competitors: usize,
    pub priors: &'a PriorSet,
    pub config: &'a RatingConfig,
}

/// Final ratings and everything reports need alongside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingReport {
    pub ratings: Vec<f64>,
    pub records: Vec<Record>,
    pub obtained: Vec<f64>,
    pub played: Vec<u64>,
    pub performance: Vec<Performance>,
    pub connectivity: Connectivity,
    pub white_advantage: f64,
    pub draw_rate: f64,
    pub fit: Fit,
    /// Competitors rated by extrapolation of a perfect record.
    pub extrapolated: Vec<PlayerId>,
}

/// Encounters and classification of one game set, ready to solve.
#[derive(Debug, Clone)]
pub(crate) struct Prepared {
    pub roster: Roster,
    /// Every rated game, perfect records included.
    pub full: Vec<Encounter>,
    /// Games between competitors that take part in the main solve.
    pub rated: Vec<Encounter>,
    /// Perfect records in the order they were purged.
    pub layers: Vec<PurgeLayer>,
    /// Competitors whose every opponent was purged.
    pub cut_off: Vec<PlayerId>,
    pub connectivity: Connectivity,
}

pub(crate) fn roster_for(n: usize, priors: &PriorSet, anchor: &Anchor) -> Roster {
    let mut roster = Roster::new(n);
    for id in 0..n {
        roster[id].has_prior = priors.involves(id);
    }
    for p in anchor.players() {
        if let Some(c) = roster.get_mut(p) {
            c.anchored = true;
        }
    }
    roster
}

/// Classifies the competitors and purges perfect records until every one
/// left has scored both ways within the remaining games.
///
/// Competitors cut off by the purge each count as a group of their own. If
/// nothing is left, every competitor with games is readmitted and the pool
/// is solved whole.
pub(crate) fn prepare(games: &[Game], mut roster: Roster) -> Prepared {
    let full = aggregate(games, &roster.excluded());
    roster.mark_records(&full);
    let mut layers = Vec::new();
    let first = roster.perfect_records();
    if !first.is_empty() {
        layers.push(PurgeLayer {
            encounters: full.clone(),
            players: first,
        });
    }
    roster.purge();

    let mut cut_off = Vec::new();
    let mut rated = aggregate(games, &roster.excluded());
    loop {
        let pass = roster.purge_pass(&rated);
        cut_off.extend(pass.cut_off);
        if pass.perfect.is_empty() {
            break;
        }
        let remaining = aggregate(games, &roster.excluded());
        layers.push(PurgeLayer {
            encounters: std::mem::replace(&mut rated, remaining),
            players: pass.perfect,
        });
    }

    if rated.is_empty() && !full.is_empty() {
        info!("every game involves a perfect record, rating the whole pool");
        roster.readmit(&full);
        let connectivity = analyze_undirected(&full, &roster.flagged());
        return Prepared {
            roster,
            rated: full.clone(),
            full,
            layers: Vec::new(),
            cut_off: Vec::new(),
            connectivity,
        };
    }

    let mut connectivity = analyze(&rated, &roster.flagged());
    for &p in &cut_off {
        connectivity.add_isolated(p);
    }
    Prepared {
        roster,
        full,
        rated,
        layers,
        cut_off,
        connectivity,
    }
}

pub(crate) struct Solved {
    pub ratings: Vec<f64>,
    pub fit: Fit,
    pub extrapolated: Vec<PlayerId>,
}

pub(crate) fn solve_prepared(prepared: &mut Prepared, priors: &PriorSet, config: &RatingConfig) -> Solved {
    let mut ctx = SolverContext::new(prepared.roster.flagged(), config.anchor.reference());
    let problem = Problem {
        encounters: &prepared.rated,
        priors,
        anchor: &config.anchor,
        white_advantage: config.white_advantage,
        draw_rate: config.draw_rate,
        scale: config.scale,
    };
    let fit = config.strategy.solve(&problem, &mut ctx);
    let extrapolated = rate_perfect_records(
        &mut prepared.roster,
        &prepared.layers,
        &mut ctx.ratings,
        fit.white_advantage,
        fit.draw_rate,
        config.scale,
    );
    rate_cut_off(
        &mut prepared.roster,
        &prepared.cut_off,
        &prepared.full,
        &mut ctx.ratings,
        fit.white_advantage,
        config.scale,
    );
    Solved {
        ratings: ctx.ratings,
        fit,
        extrapolated,
    }
}

/// Rates every competitor in `input`.
///
/// # Errors
///
/// Returns [`RatingError`] when the configuration or priors are invalid,
/// when no game can be rated, when an anchor has no games, or when the
/// results are disconnected and `allow_disconnected` is off.
pub fn rate(input: &RatingInput<'_>) -> Result<RatingReport, RatingError> {
    let n = input.competitors;
    let config = input.config;
    config.validate(n)?;
    input.priors.validate(n)?;
    if let Some(g) = input.games.iter().find(|g| g.white >= n || g.black >= n) {
        return Err(RatingError::UnknownCompetitor(g.white.max(g.black)));
    }

    let roster = roster_for(n, input.priors, &config.anchor);
    let mut prepared = prepare(input.games, roster);
    if prepared.full.is_empty() || prepared.rated.is_empty() {
        return Err(RatingError::NoGames);
    }
    for p in config.anchor.players() {
        if prepared.roster[p].record == Record::NoGames {
            return Err(RatingError::AnchorWithoutGames(p));
        }
    }

    let groups = prepared.connectivity.groups.len();
    if groups > 1 {
        if !config.allow_disconnected {
            return Err(RatingError::Disconnected { groups });
        }
        warn!(groups, "rating disconnected groups; ratings across groups are not comparable");
    }

    info!(
        competitors = n,
        encounters = prepared.rated.len(),
        strategy = ?config.strategy,
        "solving"
    );
    let solved = solve_prepared(&mut prepared, input.priors, config);

    let records: Vec<Record> = prepared.roster.iter().map(|c| c.record).collect();
    let shown: Vec<bool> = records.iter().map(|&r| r == Record::NoGames).collect();
    let final_encounters = aggregate(input.games, &shown);
    let (obtained, played) = obtained_and_played(&final_encounters, n);
    let performance = performance(&final_encounters, &solved.ratings);

    Ok(RatingReport {
        ratings: solved.ratings,
        records,
        obtained,
        played,
        performance,
        connectivity: prepared.connectivity,
        white_advantage: solved.fit.white_advantage,
        draw_rate: solved.fit.draw_rate,
        fit: solved.fit,
        extrapolated: solved.extrapolated,
    })
}

/// Shifts the ratings of the competitors not flagged so their mean is zero.
/// Flagged competitors are set to zero.
pub fn center_to_zero(ratings: &mut [f64], flagged: &[bool]) {
    let (sum, count) = ratings
        .iter()
        .zip(flagged)
        .filter(|(_, &f)| !f)
        .fold((0.0, 0usize), |(s, c), (r, _)| (s + r, c + 1));
    let mean = if count > 0 { sum / count as f64 } else { 0.0 };
    for (r, &f) in ratings.iter_mut().zip(flagged) {
        *r = if f { 0.0 } else { *r - mean };
    }
}
