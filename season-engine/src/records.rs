// Team season records and the head-to-head ledger.
//
// `TeamRecord` is constructed fresh from the standings store at resolution
// time and is immutable for the duration of a single pass; this engine never
// persists it. The `HeadToHeadLedger` is built once per pass from raw game
// rows and is a read-only input to the tiebreaker cascade.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// League-wide team identifier.
pub type TeamId = u32;

// ---------------------------------------------------------------------------
// SplitRecord
// ---------------------------------------------------------------------------

/// A win/loss/tie triple for one slice of the season (overall, division,
/// conference, home, away).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRecord {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl SplitRecord {
    pub fn new(wins: u32, losses: u32, ties: u32) -> Self {
        SplitRecord { wins, losses, ties }
    }

    pub fn games(&self) -> u32 {
        self.wins + self.losses + self.ties
    }

    /// Win percentage with ties counted as half a win. Returns 0.0 when no
    /// games have been played.
    pub fn pct(&self) -> f64 {
        let games = self.games();
        if games == 0 {
            return 0.0;
        }
        (self.wins as f64 + 0.5 * self.ties as f64) / games as f64
    }

    /// Display form, e.g. "10-4-0".
    pub fn display(&self) -> String {
        format!("{}-{}-{}", self.wins, self.losses, self.ties)
    }
}

// ---------------------------------------------------------------------------
// TeamRecord
// ---------------------------------------------------------------------------

/// One team's accumulated season statistics, as read from the standings
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRecord {
    pub team_id: TeamId,
    pub conference_id: u32,
    pub division_id: u32,
    pub overall: SplitRecord,
    pub division: SplitRecord,
    pub conference: SplitRecord,
    pub home: SplitRecord,
    pub away: SplitRecord,
    pub points_for: i32,
    pub points_against: i32,
    /// Net points in division games only.
    pub division_point_diff: i32,
    /// Net points in conference games only.
    pub conference_point_diff: i32,
    /// Aggregate win percentage of the opponents this team beat.
    pub strength_of_victory: f64,
    /// Aggregate win percentage of all opponents. `None` when the standings
    /// store has not materialized it yet; the draft calculator computes or
    /// defaults it.
    pub strength_of_schedule: Option<f64>,
}

impl TeamRecord {
    pub fn win_pct(&self) -> f64 {
        self.overall.pct()
    }

    pub fn point_diff(&self) -> i32 {
        self.points_for - self.points_against
    }

    /// Exact tie key: two teams are tied iff their win/loss/tie counts are
    /// identical, not merely "close" in derived percentage.
    pub fn record_key(&self) -> (u32, u32, u32) {
        (self.overall.wins, self.overall.losses, self.overall.ties)
    }
}

// ---------------------------------------------------------------------------
// HeadToHeadLedger
// ---------------------------------------------------------------------------

/// Season series result between one pair of teams, oriented to the pair the
/// caller asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesResult {
    pub wins_a: u32,
    pub wins_b: u32,
    pub ties: u32,
}

impl SeriesResult {
    pub fn games(&self) -> u32 {
        self.wins_a + self.wins_b + self.ties
    }

    /// True when team A won every game of the series.
    pub fn is_sweep_by_a(&self) -> bool {
        self.wins_a > 0 && self.wins_b == 0 && self.ties == 0
    }

    pub fn is_sweep_by_b(&self) -> bool {
        self.wins_b > 0 && self.wins_a == 0 && self.ties == 0
    }
}

/// Mapping from an unordered team pair to their season series. Keys are
/// stored as (lower id, higher id); lookups reorient the result.
#[derive(Debug, Clone, Default)]
pub struct HeadToHeadLedger {
    // Value is (wins for the lower id, wins for the higher id, ties).
    series: HashMap<(TeamId, TeamId), (u32, u32, u32)>,
}

impl HeadToHeadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished game between `home` and `away`. A `None` winner
    /// is a tie.
    pub fn record_game(&mut self, home: TeamId, away: TeamId, winner: Option<TeamId>) {
        let key = pair_key(home, away);
        let entry = self.series.entry(key).or_insert((0, 0, 0));
        match winner {
            Some(w) if w == key.0 => entry.0 += 1,
            Some(w) if w == key.1 => entry.1 += 1,
            Some(_) => {} // winner not in this pair; callers validate upstream
            None => entry.2 += 1,
        }
    }

    /// The season series between `a` and `b`, oriented to that order.
    /// `None` when the two teams never played.
    pub fn series(&self, a: TeamId, b: TeamId) -> Option<SeriesResult> {
        let key = pair_key(a, b);
        let &(lo_wins, hi_wins, ties) = self.series.get(&key)?;
        if a <= b {
            Some(SeriesResult {
                wins_a: lo_wins,
                wins_b: hi_wins,
                ties,
            })
        } else {
            Some(SeriesResult {
                wins_a: hi_wins,
                wins_b: lo_wins,
                ties,
            })
        }
    }

    /// Compact result string from `a`'s perspective, e.g. "2-0" or "1-1",
    /// with ties appended when present ("1-0-1").
    pub fn summary(&self, a: TeamId, b: TeamId) -> Option<String> {
        let s = self.series(a, b)?;
        if s.ties > 0 {
            Some(format!("{}-{}-{}", s.wins_a, s.wins_b, s.ties))
        } else {
            Some(format!("{}-{}", s.wins_a, s.wins_b))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

fn pair_key(a: TeamId, b: TeamId) -> (TeamId, TeamId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(team_id: TeamId, wins: u32, losses: u32, ties: u32) -> TeamRecord {
        TeamRecord {
            team_id,
            conference_id: 1,
            division_id: 1,
            overall: SplitRecord::new(wins, losses, ties),
            division: SplitRecord::default(),
            conference: SplitRecord::default(),
            home: SplitRecord::default(),
            away: SplitRecord::default(),
            points_for: 0,
            points_against: 0,
            division_point_diff: 0,
            conference_point_diff: 0,
            strength_of_victory: 0.0,
            strength_of_schedule: Some(0.5),
        }
    }

    // ------------------------------------------------------------------
    // SplitRecord
    // ------------------------------------------------------------------

    #[test]
    fn pct_counts_ties_as_half_wins() {
        let r = SplitRecord::new(8, 8, 1);
        assert!((r.pct() - 8.5 / 17.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pct_zero_games_is_zero() {
        assert_eq!(SplitRecord::default().pct(), 0.0);
    }

    #[test]
    fn display_format() {
        assert_eq!(SplitRecord::new(10, 4, 0).display(), "10-4-0");
    }

    // ------------------------------------------------------------------
    // TeamRecord
    // ------------------------------------------------------------------

    #[test]
    fn record_key_matches_only_identical_counts() {
        // 8-8-1 and 8-8-1 share a key; 9-8-0 has a close pct but differs.
        assert_eq!(record(1, 8, 8, 1).record_key(), record(2, 8, 8, 1).record_key());
        assert_ne!(record(1, 8, 8, 1).record_key(), record(2, 9, 8, 0).record_key());
    }

    #[test]
    fn point_diff() {
        let mut r = record(1, 10, 7, 0);
        r.points_for = 450;
        r.points_against = 390;
        assert_eq!(r.point_diff(), 60);
    }

    // ------------------------------------------------------------------
    // HeadToHeadLedger
    // ------------------------------------------------------------------

    #[test]
    fn series_oriented_to_caller_order() {
        let mut ledger = HeadToHeadLedger::new();
        ledger.record_game(7, 3, Some(7));
        ledger.record_game(3, 7, Some(7));

        let s = ledger.series(7, 3).unwrap();
        assert_eq!((s.wins_a, s.wins_b, s.ties), (2, 0, 0));
        assert!(s.is_sweep_by_a());

        let s = ledger.series(3, 7).unwrap();
        assert_eq!((s.wins_a, s.wins_b, s.ties), (0, 2, 0));
        assert!(s.is_sweep_by_b());
    }

    #[test]
    fn split_series_is_not_a_sweep() {
        let mut ledger = HeadToHeadLedger::new();
        ledger.record_game(1, 2, Some(1));
        ledger.record_game(2, 1, Some(2));

        let s = ledger.series(1, 2).unwrap();
        assert!(!s.is_sweep_by_a());
        assert!(!s.is_sweep_by_b());
        assert_eq!(ledger.summary(1, 2).unwrap(), "1-1");
    }

    #[test]
    fn tie_games_recorded() {
        let mut ledger = HeadToHeadLedger::new();
        ledger.record_game(1, 2, Some(1));
        ledger.record_game(2, 1, None);
        assert_eq!(ledger.summary(1, 2).unwrap(), "1-0-1");
    }

    #[test]
    fn unplayed_pair_is_none() {
        let ledger = HeadToHeadLedger::new();
        assert!(ledger.series(1, 2).is_none());
        assert!(ledger.summary(1, 2).is_none());
    }

    #[test]
    fn sweep_summary() {
        let mut ledger = HeadToHeadLedger::new();
        ledger.record_game(4, 9, Some(4));
        ledger.record_game(9, 4, Some(4));
        assert_eq!(ledger.summary(4, 9).unwrap(), "2-0");
        assert_eq!(ledger.summary(9, 4).unwrap(), "0-2");
    }
}
