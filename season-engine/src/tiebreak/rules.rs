// Individual tiebreaker rules and the official cascade orderings.
//
// Each rule is a small comparator over the current still-tied group. The
// engine in `mod.rs` applies them in order, re-partitioning the group after
// every step. Division and wild-card resolution use different orderings per
// the league's official procedure; the difference is deliberate and must not
// be unified.

use serde::{Deserialize, Serialize};

use crate::records::TeamRecord;

/// One rule in the tiebreaker cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rule {
    /// Two-team case only: a season-series sweep wins outright. A split
    /// series, no games played, or a group larger than two falls through.
    HeadToHeadSweep,
    DivisionRecord,
    ConferenceRecord,
    StrengthOfVictory,
    StrengthOfSchedule,
    /// Net points in division games.
    NetPointsDivision,
    /// Net points in conference games.
    NetPointsConference,
    /// Net points in all games.
    NetPointsAll,
    /// Last resort: always decisive, randomized, logged.
    CoinFlip,
}

/// Division tie cascade: division record and division net points come before
/// the conference-wide measures.
pub const DIVISION_CASCADE: &[Rule] = &[
    Rule::HeadToHeadSweep,
    Rule::DivisionRecord,
    Rule::ConferenceRecord,
    Rule::StrengthOfVictory,
    Rule::StrengthOfSchedule,
    Rule::NetPointsDivision,
    Rule::NetPointsAll,
    Rule::CoinFlip,
];

/// Wild-card tie cascade: conference record is checked early, division
/// record not at all.
pub const WILDCARD_CASCADE: &[Rule] = &[
    Rule::HeadToHeadSweep,
    Rule::ConferenceRecord,
    Rule::StrengthOfVictory,
    Rule::StrengthOfSchedule,
    Rule::NetPointsConference,
    Rule::NetPointsAll,
    Rule::CoinFlip,
];

/// Draft-order tie cascade. A deliberate divergence from the seeding
/// cascades: among teams with identical records the weaker schedule picks
/// first, and the coin flip fires only when strength of schedule is exactly
/// equal.
pub const DRAFT_CASCADE: &[Rule] = &[Rule::StrengthOfSchedule, Rule::CoinFlip];

impl Rule {
    /// The per-team metric this rule compares, higher is better. `None` for
    /// rules the engine handles specially (head-to-head, coin flip).
    pub fn metric(&self, team: &TeamRecord) -> Option<f64> {
        match self {
            Rule::DivisionRecord => Some(team.division.pct()),
            Rule::ConferenceRecord => Some(team.conference.pct()),
            Rule::StrengthOfVictory => Some(team.strength_of_victory),
            Rule::StrengthOfSchedule => Some(team.strength_of_schedule.unwrap_or(0.5)),
            Rule::NetPointsDivision => Some(team.division_point_diff as f64),
            Rule::NetPointsConference => Some(team.conference_point_diff as f64),
            Rule::NetPointsAll => Some(team.point_diff() as f64),
            Rule::HeadToHeadSweep | Rule::CoinFlip => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Rule::HeadToHeadSweep => "head-to-head sweep",
            Rule::DivisionRecord => "division record",
            Rule::ConferenceRecord => "conference record",
            Rule::StrengthOfVictory => "strength of victory",
            Rule::StrengthOfSchedule => "strength of schedule",
            Rule::NetPointsDivision => "net points (division)",
            Rule::NetPointsConference => "net points (conference)",
            Rule::NetPointsAll => "net points (all games)",
            Rule::CoinFlip => "coin flip",
        }
    }
}
