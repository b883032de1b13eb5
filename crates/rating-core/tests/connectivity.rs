//! Properties of the connectivity analysis over arbitrary result sets.

use proptest::prelude::*;
use rating_core::{aggregate, analyze, Connectivity, Encounter, Game, GroupId, GroupSet, Outcome};

fn outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        4 => Just(Outcome::WhiteWins),
        1 => Just(Outcome::Draw),
        4 => Just(Outcome::BlackWins),
        1 => Just(Outcome::Discard),
    ]
}

fn result_sets(max_players: usize) -> impl Strategy<Value = (usize, Vec<Game>)> {
    (2..=max_players).prop_flat_map(|n| {
        let game = (0..n, 0..n, outcome()).prop_map(|(w, b, o)| Game::new(w, b, o));
        (Just(n), prop::collection::vec(game, 0..40))
    })
}

/// Random pools of decisive games only, so most links run one way and
/// cycles through several groups are common.
fn decisive_sets(max_players: usize) -> impl Strategy<Value = (usize, Vec<Game>)> {
    (3..=max_players).prop_flat_map(|n| {
        let game = (0..n, 0..n).prop_map(|(w, b)| Game::new(w, b, Outcome::WhiteWins));
        (Just(n), prop::collection::vec(game, 0..24))
    })
}

/// Mutual reachability over the result graph: a strict pair points from
/// winner to loser, any other pair points both ways.
fn mutually_reachable(encounters: &[Encounter], n: usize) -> Vec<Vec<bool>> {
    let mut reach = vec![vec![false; n]; n];
    for (i, row) in reach.iter_mut().enumerate() {
        row[i] = true;
    }
    for e in encounters {
        match e.winner() {
            Some((w, l)) => reach[w][l] = true,
            None => {
                reach[e.a][e.b] = true;
                reach[e.b][e.a] = true;
            }
        }
    }
    for k in 0..n {
        for i in 0..n {
            if reach[i][k] {
                for j in 0..n {
                    if reach[k][j] {
                        reach[i][j] = true;
                    }
                }
            }
        }
    }
    (0..n)
        .map(|i| (0..n).map(|j| reach[i][j] && reach[j][i]).collect())
        .collect()
}

fn assert_matches_components(c: &Connectivity, encounters: &[Encounter], n: usize) -> Result<(), TestCaseError> {
    let same = mutually_reachable(encounters, n);
    let with_games: Vec<usize> = (0..n).filter(|&p| encounters.iter().any(|e| e.a == p || e.b == p)).collect();
    for &i in &with_games {
        prop_assert!(c.group_of[i].is_some());
        for &j in &with_games {
            prop_assert_eq!(
                c.group_of[i] == c.group_of[j],
                same[i][j],
                "competitors {} and {} disagree with mutual reachability",
                i,
                j
            );
        }
    }
    Ok(())
}

fn resolved(set: &mut GroupSet, ids: &[GroupId]) -> Vec<GroupId> {
    ids.iter().map(|&id| set.resolve(id)).collect()
}

proptest! {
    #[test]
    fn simplify_is_idempotent((n, games) in result_sets(10)) {
        let enc = aggregate(&games, &[]);
        let mut set = GroupSet::build(&enc, &vec![true; n]);
        set.simplify();
        prop_assert_eq!(set.simplify(), 0);
    }

    #[test]
    fn simplified_groups_have_no_two_way_links((n, games) in result_sets(10)) {
        let enc = aggregate(&games, &[]);
        let mut set = GroupSet::build(&enc, &vec![true; n]);
        set.simplify();
        for g in set.live_groups() {
            let group = set.group(g).clone();
            let beats = resolved(&mut set, &group.beats);
            let lost_to = resolved(&mut set, &group.lost_to);
            for b in &beats {
                prop_assert!(!lost_to.contains(b), "group {:?} both beat and lost to {:?}", g, b);
            }
        }
    }

    #[test]
    fn encounter_counts_are_conserved((n, games) in result_sets(10)) {
        let enc = aggregate(&games, &[]);
        let c = analyze(&enc, &vec![false; n]);
        prop_assert_eq!(c.intra_group + c.inter_group + c.ignored, enc.len());
        prop_assert_eq!(c.ignored, 0);
    }

    #[test]
    fn finished_groups_point_one_way((n, games) in result_sets(8)) {
        let enc = aggregate(&games, &[]);
        let c = analyze(&enc, &vec![false; n]);
        for (i, g) in c.groups.iter().enumerate() {
            prop_assert!(g.beats.iter().all(|&t| t > i));
            prop_assert!(g.lost_to.iter().all(|&t| t < i));
        }
    }

    #[test]
    fn groups_are_strongly_connected_components((n, games) in result_sets(8)) {
        let enc = aggregate(&games, &[]);
        let c = analyze(&enc, &vec![false; n]);
        assert_matches_components(&c, &enc, n)?;
    }

    #[test]
    fn decisive_groups_are_strongly_connected_components((n, games) in decisive_sets(9)) {
        let enc = aggregate(&games, &[]);
        let c = analyze(&enc, &vec![false; n]);
        assert_matches_components(&c, &enc, n)?;
        for (i, g) in c.groups.iter().enumerate() {
            prop_assert!(g.beats.iter().all(|&t| t > i));
        }
    }

    #[test]
    fn every_player_with_games_has_a_group((n, games) in result_sets(10)) {
        let enc = aggregate(&games, &[]);
        let c = analyze(&enc, &vec![false; n]);
        for e in &enc {
            prop_assert!(c.group_of[e.a].is_some());
            prop_assert!(c.group_of[e.b].is_some());
        }
        let members: usize = c.groups.iter().map(|g| g.members.len()).sum();
        prop_assert_eq!(members, c.group_of.iter().filter(|g| g.is_some()).count());
    }
}

#[test]
fn test_separate_pairs_form_two_groups() {
    // A and B play each other, C plays D, nobody crosses over
    let games = vec![
        Game::new(0, 1, Outcome::WhiteWins),
        Game::new(1, 0, Outcome::Draw),
        Game::new(2, 3, Outcome::BlackWins),
        Game::new(3, 2, Outcome::BlackWins),
    ];
    let c = analyze(&aggregate(&games, &[]), &[false; 4]);
    assert!(c.groups.len() >= 2);
    assert!(!c.is_connected());
    assert_ne!(c.group_of[0], c.group_of[2]);
    assert_eq!(c.group_of[0], c.group_of[1]);
    assert_eq!(c.group_of[2], c.group_of[3]);
}

#[test]
fn test_cycle_through_three_groups_merges_them() {
    let mut games = vec![
        Game::new(0, 1, Outcome::Draw),
        Game::new(2, 3, Outcome::Draw),
        Game::new(4, 5, Outcome::Draw),
        Game::new(1, 2, Outcome::WhiteWins),
        Game::new(3, 4, Outcome::WhiteWins),
    ];
    let enc = aggregate(&games, &[]);
    let chain = analyze(&enc, &[false; 6]);
    assert_eq!(chain.groups.len(), 3);
    assert_eq!(chain.groups[0].members, vec![0, 1]);
    assert_eq!(chain.groups[2].members, vec![4, 5]);

    // closing the loop from the last group back to the first
    games.push(Game::new(5, 0, Outcome::WhiteWins));
    let enc = aggregate(&games, &[]);
    let cycle = analyze(&enc, &[false; 6]);
    assert!(cycle.is_connected());
    assert_eq!(cycle.groups[0].members, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(cycle.intra_group, enc.len());
}
