//! Team formation. Consumes the active queue and produces balanced
//! 5v5 rosters with lane assignments.
//!
//! Selection is FIFO over join time, the assignment search is
//! exhaustive: 252 team partitions, each with an independent
//! best-lane permutation per team. Identical inputs always produce
//! identical outputs.

use crate::{
    config::QueueConfig,
    database::entities::{Lane, QueuePlayer},
};

/// A formed candidate match, rosters ordered by lane slot
/// (top, jungle, mid, bot, support)
#[derive(Debug, Clone)]
pub struct CandidateMatch {
    pub team1: Vec<QueuePlayer>,
    pub team2: Vec<QueuePlayer>,
    pub average_mmr_team1: i32,
    pub average_mmr_team2: i32,
    pub cost: AssignmentCost,
}

/// Cost breakdown of an assignment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignmentCost {
    /// Difference between the two team rating averages
    pub mmr_delta: i32,
    /// Players placed outside both declared lanes
    pub autofills: u32,
    /// Players placed outside their primary lane
    pub off_primary: u32,
}

impl AssignmentCost {
    fn weighted(&self, config: &QueueConfig) -> f64 {
        config.weight_mmr * self.mmr_delta as f64
            + config.weight_autofill * self.autofills as f64
            + config.weight_primary * self.off_primary as f64
    }
}

/// Attempts to form a single match from the active queue rows.
///
/// Returns `None` when fewer players than the match size are queued
/// or when the best achievable team balance exceeds the configured
/// rating ceiling (the players stay queued for a later tick).
pub fn build_match(players: &[QueuePlayer], config: &QueueConfig) -> Option<CandidateMatch> {
    if players.len() < config.match_size {
        return None;
    }

    let selected = select_players(players, config.match_size);
    let (team1, team2, cost) = best_assignment(&selected, config)?;

    if cost.mmr_delta > config.max_mmr_delta as i32 {
        return None;
    }

    let average_mmr_team1 = average_lp(&team1);
    let average_mmr_team2 = average_lp(&team2);

    Some(CandidateMatch {
        team1,
        team2,
        average_mmr_team1,
        average_mmr_team2,
        cost,
    })
}

/// Picks the players to form the next match: oldest joins first,
/// ties broken by rating closest to the queue mean, then by name so
/// the selection is total and stable
fn select_players(players: &[QueuePlayer], count: usize) -> Vec<QueuePlayer> {
    let mean = players.iter().map(|p| p.custom_lp as i64).sum::<i64>() / players.len() as i64;

    let mut ordered: Vec<&QueuePlayer> = players.iter().collect();
    ordered.sort_by(|a, b| {
        a.join_time
            .cmp(&b.join_time)
            .then_with(|| {
                let da = (a.custom_lp as i64 - mean).abs();
                let db = (b.custom_lp as i64 - mean).abs();
                da.cmp(&db)
            })
            .then_with(|| a.summoner_name.cmp(&b.summoner_name))
    });

    ordered.into_iter().take(count).cloned().collect()
}

/// Exhaustively searches team partitions and lane permutations for
/// the cheapest assignment of the ten selected players
fn best_assignment(
    selected: &[QueuePlayer],
    config: &QueueConfig,
) -> Option<(Vec<QueuePlayer>, Vec<QueuePlayer>, AssignmentCost)> {
    let mut best: Option<(Vec<usize>, Vec<usize>, AssignmentCost, f64)> = None;

    for partition in partitions(selected.len(), selected.len() / 2) {
        let other: Vec<usize> = (0..selected.len())
            .filter(|index| !partition.contains(index))
            .collect();

        let (order1, lane_cost1) = best_lane_order(selected, &partition);
        let (order2, lane_cost2) = best_lane_order(selected, &other);

        let avg1 = average_lp_indices(selected, &partition);
        let avg2 = average_lp_indices(selected, &other);

        let cost = AssignmentCost {
            mmr_delta: (avg1 - avg2).abs(),
            autofills: lane_cost1.0 + lane_cost2.0,
            off_primary: lane_cost1.1 + lane_cost2.1,
        };
        let weighted = cost.weighted(config);

        let better = match &best {
            Some((_, _, _, best_weighted)) => weighted < *best_weighted,
            None => true,
        };
        if better {
            best = Some((order1, order2, cost, weighted));
        }
    }

    let (order1, order2, cost, _) = best?;
    let team1 = order1.iter().map(|&i| selected[i].clone()).collect();
    let team2 = order2.iter().map(|&i| selected[i].clone()).collect();
    Some((team1, team2, cost))
}

/// Finds the lane permutation with the fewest autofills, breaking
/// ties by off-primary placements. Returns the player indices in
/// slot order along with `(autofills, off_primary)`
fn best_lane_order(players: &[QueuePlayer], members: &[usize]) -> (Vec<usize>, (u32, u32)) {
    let mut best_order: Option<Vec<usize>> = None;
    let mut best_cost = (u32::MAX, u32::MAX);

    for perm in permutations(members) {
        let mut autofills = 0u32;
        let mut off_primary = 0u32;

        for (slot_index, &player_index) in perm.iter().enumerate() {
            let slot = Lane::SLOTS[slot_index];
            let player = &players[player_index];
            if !player.primary_lane.matches(slot) {
                off_primary += 1;
                if !player.secondary_lane.matches(slot) {
                    autofills += 1;
                }
            }
        }

        let cost = (autofills, off_primary);
        if cost < best_cost {
            best_cost = cost;
            best_order = Some(perm);
        }
    }

    (
        best_order.unwrap_or_else(|| members.to_vec()),
        best_cost,
    )
}

fn average_lp(players: &[QueuePlayer]) -> i32 {
    (players.iter().map(|p| p.custom_lp as i64).sum::<i64>() / players.len() as i64) as i32
}

fn average_lp_indices(players: &[QueuePlayer], members: &[usize]) -> i32 {
    (members.iter().map(|&i| players[i].custom_lp as i64).sum::<i64>() / members.len() as i64)
        as i32
}

/// All `choose(n, k)` index subsets containing index 0. Fixing the
/// first player to team one halves the search without losing any
/// distinct partition (teams are later distinguished only by side)
fn partitions(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut output = Vec::new();
    let mut current = vec![0];
    fill_partitions(n, k, 1, &mut current, &mut output);
    output
}

fn fill_partitions(
    n: usize,
    k: usize,
    start: usize,
    current: &mut Vec<usize>,
    output: &mut Vec<Vec<usize>>,
) {
    if current.len() == k {
        output.push(current.clone());
        return;
    }
    for index in start..n {
        current.push(index);
        fill_partitions(n, k, index + 1, current, output);
        current.pop();
    }
}

/// All orderings of the provided indices in lexicographic order
fn permutations(members: &[usize]) -> Vec<Vec<usize>> {
    let mut output = Vec::new();
    let mut items = members.to_vec();
    items.sort_unstable();
    heap_permute(&mut items, 0, &mut output);
    output.sort_unstable();
    output
}

fn heap_permute(items: &mut Vec<usize>, at: usize, output: &mut Vec<Vec<usize>>) {
    if at == items.len() {
        output.push(items.clone());
        return;
    }
    for index in at..items.len() {
        items.swap(at, index);
        heap_permute(items, at + 1, output);
        items.swap(at, index);
    }
}

#[cfg(test)]
mod test {
    use super::{build_match, AssignmentCost};
    use crate::{
        config::QueueConfig,
        database::entities::{queue_players, AcceptanceStatus, Lane, QueuePlayer},
    };
    use chrono::{Duration, TimeZone, Utc};

    fn queue_player(
        index: i32,
        name: &str,
        lp: i32,
        primary: Lane,
        secondary: Lane,
        joined_offset_secs: i64,
    ) -> QueuePlayer {
        queue_players::Model {
            id: index,
            player_id: index,
            summoner_name: name.to_string(),
            region: None,
            custom_lp: lp,
            primary_lane: primary,
            secondary_lane: secondary,
            join_time: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
                + Duration::seconds(joined_offset_secs),
            active: true,
            acceptance_status: AcceptanceStatus::Pending,
        }
    }

    /// The lane spread from the happy path scenario: every player can
    /// be placed on a declared lane
    fn satisfiable_roster() -> Vec<QueuePlayer> {
        let lanes = [
            (Lane::Top, Lane::Fill),
            (Lane::Jungle, Lane::Top),
            (Lane::Mid, Lane::Fill),
            (Lane::Bot, Lane::Support),
            (Lane::Support, Lane::Bot),
            (Lane::Top, Lane::Mid),
            (Lane::Jungle, Lane::Mid),
            (Lane::Mid, Lane::Top),
            (Lane::Bot, Lane::Fill),
            (Lane::Support, Lane::Fill),
        ];
        lanes
            .iter()
            .enumerate()
            .map(|(i, (primary, secondary))| {
                let name = format!("{}#test", (b'a' + i as u8) as char);
                queue_player(i as i32 + 1, &name, 1000, *primary, *secondary, i as i64)
            })
            .collect()
    }

    #[test]
    fn no_match_below_ten_players() {
        let mut players = satisfiable_roster();
        players.pop();
        assert!(build_match(&players, &QueueConfig::default()).is_none());
    }

    #[test]
    fn happy_path_has_no_autofill() {
        let players = satisfiable_roster();
        let candidate =
            build_match(&players, &QueueConfig::default()).expect("expected a match to form");

        assert_eq!(candidate.average_mmr_team1, 1000);
        assert_eq!(candidate.average_mmr_team2, 1000);
        assert_eq!(
            candidate.cost,
            AssignmentCost {
                mmr_delta: 0,
                autofills: 0,
                off_primary: 0
            }
        );

        // Every assigned slot is one of the player's declared lanes
        for (team, _) in [(&candidate.team1, 1), (&candidate.team2, 2)] {
            assert_eq!(team.len(), 5);
            for (slot_index, player) in team.iter().enumerate() {
                let slot = Lane::SLOTS[slot_index];
                assert!(
                    player.primary_lane.matches(slot) || player.secondary_lane.matches(slot),
                    "{} autofilled into {}",
                    player.summoner_name,
                    slot
                );
            }
        }
    }

    #[test]
    fn rosters_are_disjoint_and_complete() {
        let players = satisfiable_roster();
        let candidate = build_match(&players, &QueueConfig::default()).unwrap();

        let mut names: Vec<&str> = candidate
            .team1
            .iter()
            .chain(candidate.team2.iter())
            .map(|p| p.summoner_name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn unsatisfiable_lanes_still_assign_with_autofill() {
        // Three of everything except bot/support, autofill is forced
        let lanes = [
            Lane::Top,
            Lane::Top,
            Lane::Top,
            Lane::Mid,
            Lane::Mid,
            Lane::Mid,
            Lane::Jungle,
            Lane::Jungle,
            Lane::Jungle,
            Lane::Bot,
        ];
        let players: Vec<QueuePlayer> = lanes
            .iter()
            .enumerate()
            .map(|(i, lane)| {
                let name = format!("{}#test", (b'a' + i as u8) as char);
                queue_player(i as i32 + 1, &name, 1000, *lane, *lane, i as i64)
            })
            .collect();

        let candidate = build_match(&players, &QueueConfig::default())
            .expect("builder must assign even without lane coverage");
        assert!(candidate.cost.autofills > 0);
        assert_eq!(candidate.team1.len(), 5);
        assert_eq!(candidate.team2.len(), 5);
    }

    #[test]
    fn defers_when_balance_exceeds_ceiling() {
        let mut players = satisfiable_roster();
        // One outlier far beyond any balancing reach
        players[0].custom_lp = 10_000;
        assert!(build_match(&players, &QueueConfig::default()).is_none());
    }

    #[test]
    fn identical_inputs_produce_identical_outputs() {
        let players = satisfiable_roster();
        let config = QueueConfig::default();
        let first = build_match(&players, &config).unwrap();
        let second = build_match(&players, &config).unwrap();

        let names = |team: &[QueuePlayer]| -> Vec<String> {
            team.iter().map(|p| p.summoner_name.clone()).collect()
        };
        assert_eq!(names(&first.team1), names(&second.team1));
        assert_eq!(names(&first.team2), names(&second.team2));
    }

    #[test]
    fn input_order_does_not_matter() {
        use rand::{seq::SliceRandom, SeedableRng};

        let config = QueueConfig::default();
        let players = satisfiable_roster();
        let reference = build_match(&players, &config).unwrap();

        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let mut shuffled = players.clone();
            shuffled.shuffle(&mut rng);

            let candidate = build_match(&shuffled, &config).unwrap();
            let names = |team: &[QueuePlayer]| -> Vec<String> {
                team.iter().map(|p| p.summoner_name.clone()).collect()
            };
            assert_eq!(names(&candidate.team1), names(&reference.team1));
            assert_eq!(names(&candidate.team2), names(&reference.team2));
        }
    }

    #[test]
    fn oldest_joins_are_selected_first() {
        let mut players = satisfiable_roster();
        // Two extra latecomers that should be left waiting
        players.push(queue_player(11, "k#test", 1000, Lane::Fill, Lane::Fill, 500));
        players.push(queue_player(12, "l#test", 1000, Lane::Fill, Lane::Fill, 501));

        let candidate = build_match(&players, &QueueConfig::default()).unwrap();
        let selected: Vec<&str> = candidate
            .team1
            .iter()
            .chain(candidate.team2.iter())
            .map(|p| p.summoner_name.as_str())
            .collect();
        assert!(!selected.contains(&"k#test"));
        assert!(!selected.contains(&"l#test"));
    }
}
