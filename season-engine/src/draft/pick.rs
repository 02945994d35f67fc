// Draft pick types and the elimination-tier reason codes.

use serde::{Deserialize, Serialize};

use crate::records::TeamId;

/// Why a team occupies its slot in the order: the elimination tier it fell
/// into. Tiers pick in this order, worst outcome first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickReason {
    NonPlayoff,
    WildCardLoser,
    DivisionalLoser,
    ConferenceLoser,
    SuperBowlLoser,
    SuperBowlWinner,
}

impl PickReason {
    /// Stable code stored in the `draft_orders` table.
    pub fn as_str(&self) -> &'static str {
        match self {
            PickReason::NonPlayoff => "non_playoff",
            PickReason::WildCardLoser => "wild_card_loser",
            PickReason::DivisionalLoser => "divisional_loser",
            PickReason::ConferenceLoser => "conference_loser",
            PickReason::SuperBowlLoser => "super_bowl_loser",
            PickReason::SuperBowlWinner => "super_bowl_winner",
        }
    }

    pub fn from_str(code: &str) -> Option<Self> {
        match code {
            "non_playoff" => Some(PickReason::NonPlayoff),
            "wild_card_loser" => Some(PickReason::WildCardLoser),
            "divisional_loser" => Some(PickReason::DivisionalLoser),
            "conference_loser" => Some(PickReason::ConferenceLoser),
            "super_bowl_loser" => Some(PickReason::SuperBowlLoser),
            "super_bowl_winner" => Some(PickReason::SuperBowlWinner),
            _ => None,
        }
    }
}

/// One slot in the draft order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPick {
    /// Overall pick number, 1-based and gapless across the whole draft.
    pub overall: u32,
    pub round: u32,
    pub pick_in_round: u32,
    pub team_id: TeamId,
    /// Display record at the time the order was computed, e.g. "4-13-0".
    pub record: String,
    pub reason: PickReason,
    pub strength_of_schedule: f64,
}
