//! Competitor table and record classification.

use crate::encounter::{obtained_and_played, Encounter};
use crate::game::PlayerId;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Scores this close to zero or to the games played count as perfect.
const PERFECT_SCORE_EPSILON: f64 = 0.001;

/// Shape of a competitor's record for the current solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Record {
    #[default]
    Normal,
    NoGames,
    AllWins,
    AllLosses,
}

impl Record {
    /// Marker used in reports next to competitors that were extrapolated.
    pub const fn marker(self) -> &'static str {
        match self {
            Record::AllWins => "(+)",
            Record::AllLosses => "(-)",
            Record::Normal | Record::NoGames => "   ",
        }
    }
}

/// Solver-facing view of one competitor. Names live with ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competitor {
    /// Left out of every summation.
    pub excluded: bool,
    /// Has an absolute or relative prior.
    pub has_prior: bool,
    /// Rating fixed externally.
    pub anchored: bool,
    pub record: Record,
}

/// Outcome of one purge pass over the games left after earlier passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgePass {
    /// Competitors that scored everything or nothing in the remaining games.
    pub perfect: Vec<PlayerId>,
    /// Competitors with games whose every opponent was already purged.
    pub cut_off: Vec<PlayerId>,
}

impl Competitor {
    fn classify(&self, obtained: f64, played: u64) -> Record {
        if played == 0 {
            Record::NoGames
        } else if self.has_prior || self.anchored {
            Record::Normal
        } else if obtained < PERFECT_SCORE_EPSILON {
            Record::AllLosses
        } else if played as f64 - obtained < PERFECT_SCORE_EPSILON {
            Record::AllWins
        } else {
            Record::Normal
        }
    }

    /// Returns true if the solver must not move or count this competitor.
    #[inline]
    pub fn is_flagged(&self) -> bool {
        self.excluded || self.record != Record::Normal
    }
}

/// The competitor table of one solve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    competitors: Vec<Competitor>,
}

impl Roster {
    /// Creates a table of `n` normal competitors.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            competitors: vec![Competitor::default(); n],
        }
    }

    pub fn len(&self) -> usize {
        self.competitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.competitors.is_empty()
    }

    pub fn get(&self, id: PlayerId) -> Option<&Competitor> {
        self.competitors.get(id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Competitor> {
        self.competitors.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Competitor> {
        self.competitors.iter()
    }

    /// `excluded` flag of every competitor, indexed by id.
    pub fn excluded(&self) -> Vec<bool> {
        self.competitors.iter().map(|c| c.excluded).collect()
    }

    /// Solver flag of every competitor, indexed by id.
    pub fn flagged(&self) -> Vec<bool> {
        self.competitors.iter().map(Competitor::is_flagged).collect()
    }

    /// Classifies every competitor from its encounters.
    ///
    /// A competitor without games is marked [`Record::NoGames`]. One that
    /// scored everything or nothing is marked [`Record::AllWins`] or
    /// [`Record::AllLosses`] unless a prior or an anchor pins it down.
    /// Returns the number of competitors whose record is not normal.
    pub fn mark_records(&mut self, encounters: &[Encounter]) -> usize {
        let (obtained, played) = obtained_and_played(encounters, self.len());
        let mut degenerate = 0;
        for (id, c) in self.competitors.iter_mut().enumerate() {
            c.record = c.classify(obtained[id], played[id]);
            match c.record {
                Record::Normal => {}
                Record::NoGames => {
                    degenerate += 1;
                    info!(competitor = id, "no games");
                }
                Record::AllWins | Record::AllLosses => {
                    degenerate += 1;
                    info!(competitor = id, record = ?c.record, "perfect record, rating will be extrapolated");
                }
            }
        }
        degenerate
    }

    /// Excludes every competitor that is flagged. Returns how many are now
    /// excluded.
    pub fn purge(&mut self) -> usize {
        let mut n = 0;
        for c in &mut self.competitors {
            if c.is_flagged() {
                c.excluded = true;
                n += 1;
            }
        }
        n
    }

    /// Ids of the competitors marked all-wins or all-losses.
    pub fn perfect_records(&self) -> Vec<PlayerId> {
        (0..self.len())
            .filter(|&id| matches!(self.competitors[id].record, Record::AllWins | Record::AllLosses))
            .collect()
    }

    /// Re-examines the competitors still in play against `encounters`, the
    /// games left after earlier purges.
    ///
    /// Those that now scored everything or nothing are marked and excluded.
    /// Those left without a game are cut off: they keep a normal record and
    /// are excluded unless anchored.
    pub fn purge_pass(&mut self, encounters: &[Encounter]) -> PurgePass {
        let (obtained, played) = obtained_and_played(encounters, self.len());
        let mut pass = PurgePass::default();
        for (id, c) in self.competitors.iter_mut().enumerate() {
            if c.is_flagged() {
                continue;
            }
            match c.classify(obtained[id], played[id]) {
                Record::Normal => {}
                Record::NoGames => {
                    c.excluded = !c.anchored;
                    info!(competitor = id, "cut off from the rated pool by perfect records");
                    pass.cut_off.push(id);
                }
                record => {
                    c.record = record;
                    c.excluded = true;
                    info!(competitor = id, record = ?record, "perfect record among the remaining games");
                    pass.perfect.push(id);
                }
            }
        }
        pass
    }

    /// Readmits every competitor with games in `encounters` as normal.
    /// The rest are marked [`Record::NoGames`] and stay excluded.
    pub fn readmit(&mut self, encounters: &[Encounter]) {
        let (_, played) = obtained_and_played(encounters, self.len());
        for (id, c) in self.competitors.iter_mut().enumerate() {
            let has_games = played[id] > 0;
            c.excluded = !has_games;
            c.record = if has_games { Record::Normal } else { Record::NoGames };
        }
    }

    /// Clears exclusion and record flags, keeping prior and anchor marks.
    pub fn reset_records(&mut self) {
        for c in &mut self.competitors {
            c.excluded = false;
            c.record = Record::Normal;
        }
    }
}

impl std::ops::Index<PlayerId> for Roster {
    type Output = Competitor;

    fn index(&self, id: PlayerId) -> &Competitor {
        &self.competitors[id]
    }
}

impl std::ops::IndexMut<PlayerId> for Roster {
    fn index_mut(&mut self, id: PlayerId) -> &mut Competitor {
        &mut self.competitors[id]
    }
}
