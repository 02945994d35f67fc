// Tiebreaker cascade engine.
//
// Given a group of >=2 teams already known to share an identical
// win/loss/tie record, apply an ordered rule cascade and return a strict
// total order plus an audit trail of every rule application. Each rule
// partitions the still-tied group into equal-metric sub-groups; sub-groups
// of one exit with their position fixed, larger sub-groups continue to the
// next rule, and results concatenate. No rule is skipped.

pub mod rules;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use tracing::warn;

use crate::records::{HeadToHeadLedger, TeamId, TeamRecord};
pub use rules::{Rule, DIVISION_CASCADE, DRAFT_CASCADE, WILDCARD_CASCADE};

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// The result of applying exactly one rule to a tied group.
#[derive(Debug, Clone)]
pub struct TiebreakerOutcome {
    pub rule: Rule,
    /// The single team that came out on top of this application, when the
    /// best sub-group was fully separated.
    pub winner: Option<TeamId>,
    /// Teams ranked below the best sub-group by this application.
    pub eliminated: Vec<TeamId>,
    /// Whether this rule fully separated the group it was applied to.
    pub decisive: bool,
}

/// A full tie resolution: the strict order (best to worst for seeding,
/// first pick to last for draft ties) and the trail of rule applications
/// that produced it.
#[derive(Debug, Clone)]
pub struct TieResolution {
    pub order: Vec<TeamId>,
    pub trail: Vec<TiebreakerOutcome>,
}

impl TieResolution {
    /// True when the coin flip was needed anywhere in this resolution —
    /// i.e. the tie was unresolved by every objective measure.
    pub fn used_coin_flip(&self) -> bool {
        self.trail.iter().any(|o| o.rule == Rule::CoinFlip)
    }
}

/// Sort direction for metric rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Higher metric ranks earlier (playoff seeding).
    BestFirst,
    /// Lower metric ranks earlier (draft order: weaker schedule picks first).
    WorstFirst,
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Resolve a tie among teams in the same division, best first.
pub fn resolve_division_tie(
    teams: &[&TeamRecord],
    ledger: &HeadToHeadLedger,
    rng: &mut SmallRng,
) -> TieResolution {
    resolve_with(teams, DIVISION_CASCADE, Direction::BestFirst, ledger, rng)
}

/// Resolve a tie among conference teams competing for a wild-card slot,
/// best first.
pub fn resolve_wildcard_tie(
    teams: &[&TeamRecord],
    ledger: &HeadToHeadLedger,
    rng: &mut SmallRng,
) -> TieResolution {
    resolve_with(teams, WILDCARD_CASCADE, Direction::BestFirst, ledger, rng)
}

/// Resolve a draft-order tie among teams with identical records: the team
/// with the weaker schedule picks first. This is a distinct policy from the
/// seeding cascades, not a reuse of them.
pub fn resolve_draft_tie(
    teams: &[&TeamRecord],
    ledger: &HeadToHeadLedger,
    rng: &mut SmallRng,
) -> TieResolution {
    resolve_with(teams, DRAFT_CASCADE, Direction::WorstFirst, ledger, rng)
}

// ---------------------------------------------------------------------------
// Cascade engine
// ---------------------------------------------------------------------------

fn resolve_with(
    teams: &[&TeamRecord],
    cascade: &[Rule],
    direction: Direction,
    ledger: &HeadToHeadLedger,
    rng: &mut SmallRng,
) -> TieResolution {
    let mut trail = Vec::new();
    let order = apply_cascade(teams, cascade, direction, ledger, rng, &mut trail);
    debug_assert_eq!(order.len(), teams.len());
    TieResolution { order, trail }
}

fn apply_cascade(
    group: &[&TeamRecord],
    remaining: &[Rule],
    direction: Direction,
    ledger: &HeadToHeadLedger,
    rng: &mut SmallRng,
    trail: &mut Vec<TiebreakerOutcome>,
) -> Vec<TeamId> {
    if group.len() <= 1 {
        return group.iter().map(|t| t.team_id).collect();
    }

    let Some((&rule, rest)) = remaining.split_first() else {
        // Every cascade terminates with the always-decisive coin flip, so an
        // exhausted rule list with a still-tied group cannot be reached.
        unreachable!("tiebreaker cascade exhausted with {} teams still tied", group.len());
    };

    match rule {
        Rule::HeadToHeadSweep => apply_sweep(group, rest, direction, ledger, rng, trail),
        Rule::CoinFlip => apply_coin_flip(group, rng, trail),
        metric_rule => apply_metric(group, metric_rule, rest, direction, ledger, rng, trail),
    }
}

/// Two-team case only: a season sweep is decisive, anything else (split
/// series, no games, larger group) falls through.
fn apply_sweep(
    group: &[&TeamRecord],
    rest: &[Rule],
    direction: Direction,
    ledger: &HeadToHeadLedger,
    rng: &mut SmallRng,
    trail: &mut Vec<TiebreakerOutcome>,
) -> Vec<TeamId> {
    if group.len() == 2 {
        let (a, b) = (group[0], group[1]);
        if let Some(series) = ledger.series(a.team_id, b.team_id) {
            let swept = if series.is_sweep_by_a() {
                Some((a.team_id, b.team_id))
            } else if series.is_sweep_by_b() {
                Some((b.team_id, a.team_id))
            } else {
                None
            };
            if let Some((winner, loser)) = swept {
                trail.push(TiebreakerOutcome {
                    rule: Rule::HeadToHeadSweep,
                    winner: Some(winner),
                    eliminated: vec![loser],
                    decisive: true,
                });
                return vec![winner, loser];
            }
        }
    }

    trail.push(TiebreakerOutcome {
        rule: Rule::HeadToHeadSweep,
        winner: None,
        eliminated: vec![],
        decisive: false,
    });
    apply_cascade(group, rest, direction, ledger, rng, trail)
}

/// Always decisive. The shuffle draws from the caller-supplied RNG so tests
/// can seed it; production callers get an entropy-seeded source. Logged
/// because reaching this rule means the tie was unresolved by every
/// objective measure.
fn apply_coin_flip(
    group: &[&TeamRecord],
    rng: &mut SmallRng,
    trail: &mut Vec<TiebreakerOutcome>,
) -> Vec<TeamId> {
    let mut order: Vec<TeamId> = group.iter().map(|t| t.team_id).collect();
    order.shuffle(rng);
    warn!(
        "coin flip used to separate tied teams (unresolved by every objective rule): {:?}",
        order
    );
    trail.push(TiebreakerOutcome {
        rule: Rule::CoinFlip,
        winner: Some(order[0]),
        eliminated: order[1..].to_vec(),
        decisive: true,
    });
    order
}

/// Apply one metric rule: independently evaluate every team's metric,
/// partition into sub-groups of exactly equal value, and recurse into each
/// still-tied sub-group with the remaining rules.
fn apply_metric(
    group: &[&TeamRecord],
    rule: Rule,
    rest: &[Rule],
    direction: Direction,
    ledger: &HeadToHeadLedger,
    rng: &mut SmallRng,
    trail: &mut Vec<TiebreakerOutcome>,
) -> Vec<TeamId> {
    let mut scored: Vec<(f64, &TeamRecord)> = group
        .iter()
        .map(|&t| {
            let metric = rule
                .metric(t)
                .unwrap_or_else(|| unreachable!("{:?} dispatched as metric rule", rule));
            (metric, t)
        })
        .collect();

    scored.sort_by(|a, b| {
        let ord = a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal);
        match direction {
            Direction::BestFirst => ord.reverse(),
            Direction::WorstFirst => ord,
        }
    });

    // Partition into runs of exactly equal metric values. Equality is exact:
    // the metrics derive from identical integer counts, so two tied teams
    // produce bit-identical values.
    let mut partitions: Vec<Vec<&TeamRecord>> = Vec::new();
    for (value, team) in scored {
        match partitions.last_mut() {
            Some(current)
                if rule.metric(current[0]).is_some_and(|v| v == value) =>
            {
                current.push(team);
            }
            _ => partitions.push(vec![team]),
        }
    }

    if partitions.len() == 1 {
        // The rule separated nobody; the whole group stays tied for the next
        // rule. Still recorded: no rule may be skipped.
        trail.push(TiebreakerOutcome {
            rule,
            winner: None,
            eliminated: vec![],
            decisive: false,
        });
        return apply_cascade(group, rest, direction, ledger, rng, trail);
    }

    let decisive = partitions.iter().all(|p| p.len() == 1);
    let winner = (partitions[0].len() == 1).then(|| partitions[0][0].team_id);
    let eliminated: Vec<TeamId> = partitions[1..]
        .iter()
        .flat_map(|p| p.iter().map(|t| t.team_id))
        .collect();
    trail.push(TiebreakerOutcome {
        rule,
        winner,
        eliminated,
        decisive,
    });

    let mut order = Vec::with_capacity(group.len());
    for partition in partitions {
        order.extend(apply_cascade(&partition, rest, direction, ledger, rng, trail));
    }
    order
}

/// Build an entropy-seeded RNG for production use. Tests and reproducible
/// runs construct a seeded `SmallRng` directly.
pub fn entropy_rng() -> SmallRng {
    use rand::SeedableRng;
    SmallRng::from_rng(rand::thread_rng()).unwrap_or_else(|_| SmallRng::seed_from_u64(0))
}

/// Seeded RNG for reproducible resolutions.
pub fn seeded_rng(seed: u64) -> SmallRng {
    use rand::SeedableRng;
    SmallRng::seed_from_u64(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SplitRecord;

    // ------------------------------------------------------------------
    // Test helpers
    // ------------------------------------------------------------------

    fn record(team_id: TeamId, wins: u32, losses: u32, ties: u32) -> TeamRecord {
        TeamRecord {
            team_id,
            conference_id: 1,
            division_id: 1,
            overall: SplitRecord::new(wins, losses, ties),
            division: SplitRecord::new(4, 2, 0),
            conference: SplitRecord::new(8, 4, 0),
            home: SplitRecord::default(),
            away: SplitRecord::default(),
            points_for: 350,
            points_against: 350,
            division_point_diff: 0,
            conference_point_diff: 0,
            strength_of_victory: 0.5,
            strength_of_schedule: Some(0.5),
        }
    }

    fn ids(resolution: &TieResolution) -> Vec<TeamId> {
        resolution.order.clone()
    }

    fn rng() -> SmallRng {
        seeded_rng(42)
    }

    // ------------------------------------------------------------------
    // Head-to-head sweep
    // ------------------------------------------------------------------

    #[test]
    fn two_team_sweep_is_decisive_and_stops_the_cascade() {
        // A and B, identical 10-4-0; A swept B 2-0.
        let a = record(1, 10, 4, 0);
        let b = record(2, 10, 4, 0);
        let mut ledger = HeadToHeadLedger::new();
        ledger.record_game(1, 2, Some(1));
        ledger.record_game(2, 1, Some(1));

        let res = resolve_division_tie(&[&a, &b], &ledger, &mut rng());
        assert_eq!(ids(&res), vec![1, 2]);
        assert_eq!(res.trail.len(), 1);
        assert_eq!(res.trail[0].rule, Rule::HeadToHeadSweep);
        assert!(res.trail[0].decisive);
        assert_eq!(res.trail[0].winner, Some(1));
        assert_eq!(res.trail[0].eliminated, vec![2]);
    }

    #[test]
    fn split_series_falls_through_to_division_record() {
        let mut a = record(1, 10, 4, 0);
        let mut b = record(2, 10, 4, 0);
        a.division = SplitRecord::new(5, 1, 0);
        b.division = SplitRecord::new(4, 2, 0);
        let mut ledger = HeadToHeadLedger::new();
        ledger.record_game(1, 2, Some(1));
        ledger.record_game(2, 1, Some(2));

        let res = resolve_division_tie(&[&b, &a], &ledger, &mut rng());
        assert_eq!(ids(&res), vec![1, 2]);
        assert_eq!(res.trail[0].rule, Rule::HeadToHeadSweep);
        assert!(!res.trail[0].decisive);
        assert_eq!(res.trail[1].rule, Rule::DivisionRecord);
        assert!(res.trail[1].decisive);
    }

    #[test]
    fn no_games_played_is_not_a_sweep() {
        let mut a = record(1, 9, 5, 0);
        let mut b = record(2, 9, 5, 0);
        a.conference = SplitRecord::new(9, 3, 0);
        b.conference = SplitRecord::new(7, 5, 0);
        let ledger = HeadToHeadLedger::new();

        let res = resolve_wildcard_tie(&[&b, &a], &ledger, &mut rng());
        assert_eq!(ids(&res), vec![1, 2]);
        assert!(!res.trail[0].decisive);
    }

    // ------------------------------------------------------------------
    // Multi-team partitioning
    // ------------------------------------------------------------------

    #[test]
    fn three_team_split_series_separates_on_division_record() {
        // Three teams tied 9-7-0 with a split season series among all pairs.
        // Division records: C 5-1, A and B both 4-2. C separates first; A/B
        // fall through to conference record.
        let mut a = record(1, 9, 7, 0);
        let mut b = record(2, 9, 7, 0);
        let mut c = record(3, 9, 7, 0);
        a.division = SplitRecord::new(4, 2, 0);
        b.division = SplitRecord::new(4, 2, 0);
        c.division = SplitRecord::new(5, 1, 0);
        a.conference = SplitRecord::new(8, 4, 0);
        b.conference = SplitRecord::new(7, 5, 0);
        c.conference = SplitRecord::new(7, 5, 0);

        let mut ledger = HeadToHeadLedger::new();
        for (x, y) in [(1, 2), (1, 3), (2, 3)] {
            ledger.record_game(x, y, Some(x));
            ledger.record_game(y, x, Some(y));
        }

        let res = resolve_division_tie(&[&a, &b, &c], &ledger, &mut rng());
        assert_eq!(ids(&res), vec![3, 1, 2]);

        // Head-to-head over three teams is non-decisive.
        assert_eq!(res.trail[0].rule, Rule::HeadToHeadSweep);
        assert!(!res.trail[0].decisive);
        // Division record separates C but leaves A/B tied.
        assert_eq!(res.trail[1].rule, Rule::DivisionRecord);
        assert!(!res.trail[1].decisive);
        assert_eq!(res.trail[1].winner, Some(3));
        // A vs B resolved by conference record, continuing from where the
        // cascade left off.
        assert!(res
            .trail
            .iter()
            .any(|o| o.rule == Rule::ConferenceRecord && o.decisive));
    }

    #[test]
    fn four_team_partial_separation_preserves_remainder_as_subproblem() {
        // Two teams clearly better on conference record, two still tied.
        let mut teams: Vec<TeamRecord> = (1..=4).map(|i| record(i, 10, 6, 1)).collect();
        teams[0].conference = SplitRecord::new(10, 2, 0);
        teams[1].conference = SplitRecord::new(9, 3, 0);
        teams[2].conference = SplitRecord::new(6, 6, 0);
        teams[3].conference = SplitRecord::new(6, 6, 0);
        teams[2].strength_of_victory = 0.55;
        teams[3].strength_of_victory = 0.45;
        let refs: Vec<&TeamRecord> = teams.iter().collect();

        let res = resolve_wildcard_tie(&refs, &HeadToHeadLedger::new(), &mut rng());
        assert_eq!(ids(&res), vec![1, 2, 3, 4]);

        let conf = res
            .trail
            .iter()
            .find(|o| o.rule == Rule::ConferenceRecord)
            .unwrap();
        assert!(!conf.decisive);
        assert_eq!(conf.winner, Some(1));
        // Teams 3 and 4 continue as a sub-problem, separated by strength of
        // victory further down the cascade.
        assert!(res
            .trail
            .iter()
            .any(|o| o.rule == Rule::StrengthOfVictory && o.decisive));
    }

    // ------------------------------------------------------------------
    // Permutation property
    // ------------------------------------------------------------------

    #[test]
    fn resolution_is_always_a_permutation_of_the_input() {
        for n in 2..=8u32 {
            let teams: Vec<TeamRecord> = (1..=n).map(|i| record(i, 8, 8, 1)).collect();
            let refs: Vec<&TeamRecord> = teams.iter().collect();

            type Resolver =
                fn(&[&TeamRecord], &HeadToHeadLedger, &mut SmallRng) -> TieResolution;
            let resolvers: [Resolver; 3] =
                [resolve_division_tie, resolve_wildcard_tie, resolve_draft_tie];
            for resolve in resolvers {
                let res = resolve(&refs, &HeadToHeadLedger::new(), &mut rng());
                let mut sorted = res.order.clone();
                sorted.sort_unstable();
                sorted.dedup();
                assert_eq!(sorted.len(), n as usize, "dropped or duplicated a team");
                assert_eq!(sorted, (1..=n).collect::<Vec<_>>());
            }
        }
    }

    // ------------------------------------------------------------------
    // Coin flip
    // ------------------------------------------------------------------

    #[test]
    fn identical_teams_reach_the_coin_flip() {
        let a = record(1, 8, 8, 1);
        let b = record(2, 8, 8, 1);
        let res = resolve_division_tie(&[&a, &b], &HeadToHeadLedger::new(), &mut rng());
        assert!(res.used_coin_flip());
        assert_eq!(res.trail.last().unwrap().rule, Rule::CoinFlip);
        assert!(res.trail.last().unwrap().decisive);
        // Every objective rule was still evaluated on the way down.
        let evaluated: Vec<Rule> = res.trail.iter().map(|o| o.rule).collect();
        assert_eq!(evaluated, DIVISION_CASCADE.to_vec());
    }

    #[test]
    fn coin_flip_is_reproducible_with_a_fixed_seed() {
        let a = record(1, 8, 8, 1);
        let b = record(2, 8, 8, 1);
        let c = record(3, 8, 8, 1);

        let first = resolve_division_tie(&[&a, &b, &c], &HeadToHeadLedger::new(), &mut seeded_rng(7));
        let second = resolve_division_tie(&[&a, &b, &c], &HeadToHeadLedger::new(), &mut seeded_rng(7));
        assert_eq!(first.order, second.order);
    }

    // ------------------------------------------------------------------
    // Draft tiebreak policy
    // ------------------------------------------------------------------

    #[test]
    fn draft_tie_weaker_schedule_picks_first() {
        let mut a = record(1, 4, 13, 0);
        let mut b = record(2, 4, 13, 0);
        a.strength_of_schedule = Some(0.540);
        b.strength_of_schedule = Some(0.470);

        let res = resolve_draft_tie(&[&a, &b], &HeadToHeadLedger::new(), &mut rng());
        // B has the weaker schedule, so B picks first.
        assert_eq!(ids(&res), vec![2, 1]);
        assert!(!res.used_coin_flip());
        assert_eq!(res.trail[0].rule, Rule::StrengthOfSchedule);
        assert!(res.trail[0].decisive);
    }

    #[test]
    fn draft_tie_equal_sos_falls_to_coin_flip() {
        let a = record(1, 4, 13, 0);
        let b = record(2, 4, 13, 0);
        let res = resolve_draft_tie(&[&a, &b], &HeadToHeadLedger::new(), &mut rng());
        assert!(res.used_coin_flip());
    }

    #[test]
    fn draft_tie_ignores_seeding_rules() {
        // Division record differs wildly but must not influence draft order.
        let mut a = record(1, 6, 11, 0);
        let mut b = record(2, 6, 11, 0);
        a.division = SplitRecord::new(5, 1, 0);
        b.division = SplitRecord::new(0, 6, 0);
        a.strength_of_schedule = Some(0.400);
        b.strength_of_schedule = Some(0.600);

        let res = resolve_draft_tie(&[&b, &a], &HeadToHeadLedger::new(), &mut rng());
        assert_eq!(ids(&res), vec![1, 2]);
        assert!(res.trail.iter().all(|o| o.rule != Rule::DivisionRecord));
    }
}
