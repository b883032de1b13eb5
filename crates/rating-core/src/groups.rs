//! Connectivity analysis of the result graph.
//!
//! Two competitors can only be rated against each other when results flow
//! both ways between them, directly or through others. A pair with a mixed
//! record (wins both ways, or any draw) is always in the same group. A pair
//! where one side won every game only links the two groups in one
//! direction. Groups that beat each other, directly or around a longer
//! cycle, are merged until every remaining link points one way.
//!
//! Groups live in an arena and refer to each other by [`GroupId`]. A merged
//! group keeps a forwarding id in `combined` and empty lists.

use crate::bitset::BitSet;
use crate::encounter::{obtained_and_played, Encounter};
use crate::game::PlayerId;
use crate::scratch;
use serde::{Deserialize, Serialize};

/// Index of a group in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub usize);

/// One equivalence class of competitors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    pub participants: Vec<PlayerId>,
    /// Groups with a competitor that lost every game to one of ours.
    pub beats: Vec<GroupId>,
    /// Groups with a competitor that won every game against one of ours.
    pub lost_to: Vec<GroupId>,
    /// Set once this group has been merged into another.
    pub combined: Option<GroupId>,
}

/// Arena of groups built from one encounter list.
#[derive(Debug, Clone)]
pub struct GroupSet {
    groups: Vec<Group>,
    live: BitSet,
    scratch: BitSet,
}

impl GroupSet {
    /// Builds one group per component of mixed results.
    ///
    /// Only competitors marked in `eligible` take part; encounters touching
    /// anyone else are ignored.
    pub fn build(encounters: &[Encounter], eligible: &[bool]) -> Self {
        let n = eligible.len();
        let takes_part = |e: &Encounter| eligible.get(e.a) == Some(&true) && eligible.get(e.b) == Some(&true);

        let mut parent: Vec<usize> = (0..n).collect();
        for e in encounters.iter().filter(|e| takes_part(e)) {
            if !e.is_strict() {
                union(&mut parent, e.a, e.b);
            }
        }

        let mut links: Vec<(usize, usize)> = scratch::buffer(encounters.len(), "group link");
        for e in encounters.iter().filter(|e| takes_part(e)) {
            if let Some((winner, loser)) = e.winner() {
                let (w, l) = (find(&mut parent, winner), find(&mut parent, loser));
                if w != l {
                    links.push((w, l));
                }
            }
        }
        links.sort_unstable();
        links.dedup();

        let mut slot: Vec<Option<GroupId>> = scratch::filled(n, None, "group slot");
        let mut groups: Vec<Group> = scratch::buffer(n, "group");
        for p in (0..n).filter(|&p| eligible[p]) {
            let root = find(&mut parent, p);
            let id = *slot[root].get_or_insert_with(|| {
                groups.push(Group::default());
                GroupId(groups.len() - 1)
            });
            groups[id.0].participants.push(p);
        }

        for (w, l) in links {
            if let (Some(gw), Some(gl)) = (slot[w], slot[l]) {
                groups[gw.0].beats.push(gl);
                groups[gl.0].lost_to.push(gw);
            }
        }

        let count = groups.len();
        let mut live = BitSet::with_capacity(count);
        for g in 0..count {
            live.insert(g);
        }
        Self {
            groups,
            live,
            scratch: BitSet::with_capacity(count),
        }
    }

    /// Ids of the groups not merged into another, ascending.
    pub fn live_groups(&self) -> Vec<GroupId> {
        self.live.iter().map(GroupId).collect()
    }

    /// Number of live groups.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0]
    }

    /// Follows `combined` forwarding to the live group, compressing the path.
    pub fn resolve(&mut self, id: GroupId) -> GroupId {
        let mut root = id;
        while let Some(next) = self.groups[root.0].combined {
            root = next;
        }
        let mut cur = id;
        while let Some(next) = self.groups[cur.0].combined {
            if next != root {
                self.groups[cur.0].combined = Some(root);
            }
            cur = next;
        }
        root
    }

    /// Resolves every link of `g` and drops self links and repeats, keeping
    /// the first occurrence of each id.
    fn shrink(&mut self, g: GroupId) {
        for beats_side in [true, false] {
            let list = if beats_side {
                std::mem::take(&mut self.groups[g.0].beats)
            } else {
                std::mem::take(&mut self.groups[g.0].lost_to)
            };
            self.scratch.clear();
            let mut kept = Vec::with_capacity(list.len());
            for id in list {
                let id = self.resolve(id);
                if id != g && self.scratch.insert(id.0) {
                    kept.push(id);
                }
            }
            if beats_side {
                self.groups[g.0].beats = kept;
            } else {
                self.groups[g.0].lost_to = kept;
            }
        }
    }

    /// First id found in both link lists of `g`. Lists must be shrunk.
    fn two_way_link(&mut self, g: GroupId) -> Option<GroupId> {
        self.scratch.clear();
        for b in &self.groups[g.0].beats {
            self.scratch.insert(b.0);
        }
        self.groups[g.0]
            .lost_to
            .iter()
            .copied()
            .find(|l| self.scratch.contains(l.0))
    }

    /// Moves everything from `gone` into `keep` and retires `gone`.
    fn combine(&mut self, keep: GroupId, gone: GroupId) {
        debug_assert_ne!(keep, gone);
        let moved = std::mem::take(&mut self.groups[gone.0]);
        let target = &mut self.groups[keep.0];
        target.participants.extend(moved.participants);
        target.beats.extend(moved.beats);
        target.lost_to.extend(moved.lost_to);
        self.groups[gone.0].combined = Some(keep);
        self.live.remove(gone.0);
    }

    /// Shrinks `g` and merges every group it both beat and lost to, until
    /// none is left. Returns the number of merges.
    fn simplify_group(&mut self, g: GroupId) -> usize {
        let mut merges = 0;
        loop {
            self.shrink(g);
            match self.two_way_link(g) {
                Some(other) => {
                    self.combine(g, other);
                    merges += 1;
                }
                None => return merges,
            }
        }
    }

    /// Runs the shrink and merge loop over every live group until a full
    /// pass merges nothing. Returns the number of merges.
    pub fn simplify(&mut self) -> usize {
        let mut total = 0;
        loop {
            let mut merges = 0;
            for g in self.live_groups() {
                if self.live.contains(g.0) {
                    merges += self.simplify_group(g);
                }
            }
            total += merges;
            if merges == 0 {
                return total;
            }
        }
    }

    /// Merges groups joined by cycles of any length and returns the live
    /// groups ordered so that every group comes before the groups it beat.
    ///
    /// Walks chains along `beats` links. A group whose links all lead to
    /// finished groups is finished. A link back onto the current chain closes
    /// a cycle, and every group on it is merged into the first. Each restart
    /// follows a merge, so the walk ends after at most one restart per group.
    pub fn finish(&mut self) -> Vec<GroupId> {
        let mut done = BitSet::with_capacity(self.groups.len());
        let mut finished: Vec<GroupId> = Vec::with_capacity(self.live.len());

        'restart: loop {
            let Some(start) = self.live.iter().find(|&g| !done.contains(g)).map(GroupId) else {
                break;
            };
            let mut chain = vec![start];
            let mut on_chain = BitSet::with_capacity(self.groups.len());
            on_chain.insert(start.0);

            while let Some(&cur) = chain.last() {
                self.shrink(cur);

                let cycle_at = self.groups[cur.0]
                    .beats
                    .iter()
                    .filter(|t| on_chain.contains(t.0))
                    .filter_map(|t| chain.iter().position(|c| c == t))
                    .min();
                if let Some(pos) = cycle_at {
                    let keep = chain[pos];
                    for &gone in &chain[pos + 1..] {
                        self.combine(keep, gone);
                    }
                    self.simplify_group(keep);
                    continue 'restart;
                }

                let next = self.groups[cur.0]
                    .beats
                    .iter()
                    .copied()
                    .find(|t| !done.contains(t.0));
                match next {
                    Some(t) => {
                        chain.push(t);
                        on_chain.insert(t.0);
                    }
                    None => {
                        done.insert(cur.0);
                        finished.push(cur);
                        chain.pop();
                        on_chain.remove(cur.0);
                    }
                }
            }
        }

        for &g in &finished {
            self.shrink(g);
        }
        finished.reverse();
        finished
    }
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

/// Joins two sets, keeping the lower index as representative.
fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[hi] = lo;
    }
}

/// Final group of the connectivity report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Members in ascending id order.
    pub members: Vec<PlayerId>,
    /// Indices into [`Connectivity::groups`] of the groups this one beat.
    pub beats: Vec<usize>,
    /// Indices of the groups this one lost to.
    pub lost_to: Vec<usize>,
}

/// Outcome of the connectivity analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connectivity {
    /// Groups, each listed before the groups it beat.
    pub groups: Vec<GroupSummary>,
    /// Group index of every competitor, `None` for those left out.
    pub group_of: Vec<Option<usize>>,
    /// Encounters inside one group.
    pub intra_group: usize,
    /// Encounters between groups.
    pub inter_group: usize,
    /// Encounters touching a competitor that took no part.
    pub ignored: usize,
}

impl Connectivity {
    /// Returns true if every rated competitor is in one group.
    pub fn is_connected(&self) -> bool {
        self.groups.len() <= 1
    }

    /// Adds `player` as a group of its own, linked to no other group.
    pub fn add_isolated(&mut self, player: PlayerId) {
        if self.group_of.len() <= player {
            self.group_of.resize(player + 1, None);
        }
        self.group_of[player] = Some(self.groups.len());
        self.groups.push(GroupSummary {
            members: vec![player],
            beats: Vec::new(),
            lost_to: Vec::new(),
        });
    }

    fn count_encounters(&mut self, encounters: &[Encounter]) {
        for e in encounters {
            match (self.group_of.get(e.a).copied().flatten(), self.group_of.get(e.b).copied().flatten()) {
                (Some(x), Some(y)) if x == y => self.intra_group += 1,
                (Some(_), Some(_)) => self.inter_group += 1,
                _ => self.ignored += 1,
            }
        }
    }
}

/// Partitions the competitors into groups that can be rated together.
///
/// Competitors flagged in `flagged`, or without games in `encounters`, are
/// left out.
pub fn analyze(encounters: &[Encounter], flagged: &[bool]) -> Connectivity {
    let n = flagged.len();
    let (_, played) = obtained_and_played(encounters, n);
    let eligible: Vec<bool> = (0..n).map(|p| !flagged[p] && played[p] > 0).collect();

    let mut set = GroupSet::build(encounters, &eligible);
    let merges = set.simplify();
    let order = set.finish();
    tracing::debug!(merges, groups = order.len(), "connectivity analysed");

    let mut index_of: Vec<Option<usize>> = vec![None; set.groups.len()];
    for (i, g) in order.iter().enumerate() {
        index_of[g.0] = Some(i);
    }

    let mut group_of: Vec<Option<usize>> = scratch::filled(n, None, "group membership");
    let mut groups = Vec::with_capacity(order.len());
    for (i, &g) in order.iter().enumerate() {
        let group = set.group(g);
        let mut members = group.participants.clone();
        members.sort_unstable();
        for &p in &members {
            group_of[p] = Some(i);
        }
        let mut beats: Vec<usize> = group.beats.iter().filter_map(|t| index_of[t.0]).collect();
        let mut lost_to: Vec<usize> = group.lost_to.iter().filter_map(|t| index_of[t.0]).collect();
        beats.sort_unstable();
        lost_to.sort_unstable();
        groups.push(GroupSummary {
            members,
            beats,
            lost_to,
        });
    }

    let mut report = Connectivity {
        groups,
        group_of,
        ..Default::default()
    };
    report.count_encounters(encounters);
    report
}

/// Partitions the competitors by games played, ignoring which way the
/// results went.
///
/// Used when every game involves a perfect record, so no group has results
/// flowing both ways and only whether the pool hangs together matters.
pub fn analyze_undirected(encounters: &[Encounter], flagged: &[bool]) -> Connectivity {
    let n = flagged.len();
    let (_, played) = obtained_and_played(encounters, n);
    let eligible: Vec<bool> = (0..n).map(|p| !flagged[p] && played[p] > 0).collect();

    let mut parent: Vec<usize> = (0..n).collect();
    let takes_part = |e: &&Encounter| eligible.get(e.a) == Some(&true) && eligible.get(e.b) == Some(&true);
    for e in encounters.iter().filter(takes_part) {
        union(&mut parent, e.a, e.b);
    }

    let mut slot: Vec<Option<usize>> = scratch::filled(n, None, "group slot");
    let mut report = Connectivity {
        group_of: scratch::filled(n, None, "group membership"),
        ..Default::default()
    };
    for p in (0..n).filter(|&p| eligible[p]) {
        let root = find(&mut parent, p);
        let i = *slot[root].get_or_insert_with(|| {
            report.groups.push(GroupSummary::default());
            report.groups.len() - 1
        });
        report.groups[i].members.push(p);
        report.group_of[p] = Some(i);
    }
    tracing::debug!(groups = report.groups.len(), "undirected connectivity analysed");
    report.count_encounters(encounters);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encounter::aggregate;
    use crate::game::{Game, Outcome};

    fn beat(w: PlayerId, l: PlayerId) -> Game {
        Game::new(w, l, Outcome::WhiteWins)
    }

    fn draw(a: PlayerId, b: PlayerId) -> Game {
        Game::new(a, b, Outcome::Draw)
    }

    fn connectivity(games: &[Game], n: usize) -> Connectivity {
        analyze(&aggregate(games, &[]), &vec![false; n])
    }

    #[test]
    fn test_mixed_records_form_one_group() {
        let c = connectivity(&[beat(0, 1), beat(1, 0), draw(1, 2), draw(2, 0)], 3);
        assert!(c.is_connected());
        assert_eq!(c.groups[0].members, vec![0, 1, 2]);
        assert_eq!(c.intra_group, 3);
        assert_eq!(c.inter_group, 0);
    }

    #[test]
    fn test_one_way_results_stay_apart() {
        let c = connectivity(&[beat(0, 1), beat(1, 2)], 3);
        assert_eq!(c.groups.len(), 3);
        // strongest first
        assert_eq!(c.group_of, vec![Some(0), Some(1), Some(2)]);
        assert_eq!(c.groups[0].beats, vec![1]);
        assert_eq!(c.groups[2].lost_to, vec![1]);
        assert_eq!(c.inter_group, 2);
    }

    #[test]
    fn test_two_group_cycle_merges() {
        // {0,1} beat {2,3} through 0>2, and {2,3} beat {0,1} through 3>1
        let c = connectivity(&[draw(0, 1), draw(2, 3), beat(0, 2), beat(3, 1)], 4);
        assert!(c.is_connected());
        assert_eq!(c.groups[0].members, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_long_cycle_merges() {
        let c = connectivity(&[beat(0, 1), beat(1, 2), beat(2, 3), beat(3, 0), beat(4, 0)], 5);
        assert_eq!(c.groups.len(), 2);
        assert_eq!(c.groups[0].members, vec![4]);
        assert_eq!(c.groups[1].members, vec![0, 1, 2, 3]);
        assert_eq!(c.groups[0].beats, vec![1]);
    }

    #[test]
    fn test_separate_pools_are_disconnected() {
        let c = connectivity(&[draw(0, 1), beat(0, 1), draw(2, 3)], 4);
        assert_eq!(c.groups.len(), 2);
        assert!(c.groups.iter().all(|g| g.beats.is_empty() && g.lost_to.is_empty()));
        assert!(!c.is_connected());
    }

    #[test]
    fn test_flagged_competitors_are_left_out() {
        let enc = aggregate(&[draw(0, 1), draw(1, 2)], &[]);
        let c = analyze(&enc, &[false, false, true, false]);
        assert_eq!(c.groups.len(), 1);
        assert_eq!(c.group_of, vec![Some(0), Some(0), None, None]);
        assert_eq!(c.ignored, 1);
    }

    #[test]
    fn test_resolve_follows_forwarding() {
        let enc = aggregate(&[beat(0, 1), beat(1, 2), beat(2, 0)], &[]);
        let mut set = GroupSet::build(&enc, &[true; 3]);
        assert_eq!(set.live_count(), 3);
        set.simplify();
        let order = set.finish();
        assert_eq!(order.len(), 1);
        assert_eq!(set.live_count(), 1);
        for g in 0..3 {
            assert_eq!(set.resolve(GroupId(g)), order[0]);
        }
        let survivor = set.group(order[0]);
        assert!(survivor.beats.is_empty() && survivor.lost_to.is_empty());
    }

    #[test]
    fn test_merged_group_has_empty_lists() {
        let enc = aggregate(&[draw(0, 1), draw(2, 3), beat(0, 2), beat(3, 1)], &[]);
        let mut set = GroupSet::build(&enc, &[true; 4]);
        assert_eq!(set.simplify(), 1);
        for g in 0..2 {
            let group = set.group(GroupId(g));
            if group.combined.is_some() {
                assert!(group.participants.is_empty());
                assert!(group.beats.is_empty());
                assert!(group.lost_to.is_empty());
            }
        }
    }

    #[test]
    fn test_undirected_analysis_ignores_direction() {
        let enc = aggregate(&[beat(0, 1), beat(1, 2), beat(3, 4)], &[]);
        let c = analyze_undirected(&enc, &[false; 6]);
        assert_eq!(c.groups.len(), 2);
        assert_eq!(c.groups[0].members, vec![0, 1, 2]);
        assert_eq!(c.groups[1].members, vec![3, 4]);
        assert_eq!(c.group_of[5], None);
        assert_eq!((c.intra_group, c.inter_group, c.ignored), (3, 0, 0));
    }

    #[test]
    fn test_add_isolated_opens_a_new_group() {
        let mut c = connectivity(&[draw(0, 1)], 3);
        assert!(c.is_connected());
        c.add_isolated(2);
        assert_eq!(c.groups.len(), 2);
        assert_eq!(c.group_of[2], Some(1));
        assert!(!c.is_connected());
    }
}
