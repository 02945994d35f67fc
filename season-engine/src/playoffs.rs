// Outcome extraction from the playoff portion of the event log.
//
// The event log is append-only and shared across every dynasty in the save
// file, so all queries here go through the compound dynasty/season key.
// Matching playoff games by calendar date is forbidden: concurrent dynasties
// play the same rounds on the same dates and a date query silently returns
// another dynasty's bracket. Round classification happens here, in code, not
// in SQL: every row's label and metadata payload are defensively parsed, and
// a row this crate cannot classify is an explicit error, never a silent
// drop.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::debug;

use crate::db::{Database, GameRow};
use crate::error::EngineError;
use crate::records::TeamId;

// ---------------------------------------------------------------------------
// PlayoffRound
// ---------------------------------------------------------------------------

/// The four playoff rounds, in bracket order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayoffRound {
    WildCard,
    Divisional,
    Conference,
    SuperBowl,
}

impl PlayoffRound {
    pub const ALL: [PlayoffRound; 4] = [
        PlayoffRound::WildCard,
        PlayoffRound::Divisional,
        PlayoffRound::Conference,
        PlayoffRound::SuperBowl,
    ];

    /// Parse a producer-supplied round label. Historical producers disagreed
    /// on spelling, so several aliases map to each round.
    pub fn parse(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace([' ', '-', '_'], "");
        match normalized.as_str() {
            "wildcard" => Some(PlayoffRound::WildCard),
            "divisional" | "division" => Some(PlayoffRound::Divisional),
            "conference" | "championship" | "conferencechampionship" => {
                Some(PlayoffRound::Conference)
            }
            "superbowl" | "final" => Some(PlayoffRound::SuperBowl),
            _ => None,
        }
    }

    /// Finished games a complete round must contain under the 14-team
    /// bracket.
    pub fn expected_games(&self) -> usize {
        match self {
            PlayoffRound::WildCard => 6,
            PlayoffRound::Divisional => 4,
            PlayoffRound::Conference => 2,
            PlayoffRound::SuperBowl => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlayoffRound::WildCard => "wild card",
            PlayoffRound::Divisional => "divisional",
            PlayoffRound::Conference => "conference championship",
            PlayoffRound::SuperBowl => "super bowl",
        }
    }
}

// ---------------------------------------------------------------------------
// Game metadata payload
// ---------------------------------------------------------------------------

/// Current payload shape: `playoff_round` plus optional flags.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CurrentMeta {
    pub playoff_round: String,
    #[serde(default)]
    pub neutral_site: bool,
}

/// Legacy payload shape: bare `round`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyMeta {
    pub round: String,
}

/// Regular-season rows carry an empty object.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmptyMeta {}

/// Semi-structured per-game metadata, versioned by shape. Older producers
/// wrote `round`, current ones write `playoff_round`; both carry the same
/// information and either is accepted. Each variant rejects unknown fields,
/// so a payload matching no known schema is an explicit error, never a
/// silent default.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GameMeta {
    Current(CurrentMeta),
    Legacy(LegacyMeta),
    Empty(EmptyMeta),
}

impl GameMeta {
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        serde_json::from_str(raw)
            .map_err(|e| EngineError::UnrecognizedPayload(format!("{raw}: {e}")))
    }

    pub fn round_label(&self) -> Option<&str> {
        match self {
            GameMeta::Current(meta) => Some(&meta.playoff_round),
            GameMeta::Legacy(meta) => Some(&meta.round),
            GameMeta::Empty(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PlayoffResults
// ---------------------------------------------------------------------------

/// The full bracket outcome: who was eliminated in each round, plus the
/// champion. This is everything the draft calculator needs from the
/// postseason.
#[derive(Debug, Clone, Default)]
pub struct PlayoffResults {
    pub wild_card_losers: Vec<TeamId>,
    pub divisional_losers: Vec<TeamId>,
    pub conference_losers: Vec<TeamId>,
    pub super_bowl_loser: Option<TeamId>,
    pub super_bowl_winner: Option<TeamId>,
}

impl PlayoffResults {
    /// All fourteen playoff participants, losers first in elimination order.
    pub fn all_participants(&self) -> Vec<TeamId> {
        let mut teams = Vec::with_capacity(14);
        teams.extend(&self.wild_card_losers);
        teams.extend(&self.divisional_losers);
        teams.extend(&self.conference_losers);
        teams.extend(self.super_bowl_loser);
        teams.extend(self.super_bowl_winner);
        teams
    }

    /// Enforce the bracket's structural invariants: 6/4/2/1/1 teams per
    /// outcome bucket and no team in two buckets. Violations are fatal.
    pub fn validate(&self) -> Result<(), EngineError> {
        let checks: [(&str, usize, usize); 3] = [
            ("wild card losers", self.wild_card_losers.len(), 6),
            ("divisional losers", self.divisional_losers.len(), 4),
            ("conference losers", self.conference_losers.len(), 2),
        ];
        for (what, found, expected) in checks {
            if found != expected {
                return Err(EngineError::StructuralViolation(format!(
                    "{what}: found {found}, expected {expected}"
                )));
            }
        }
        if self.super_bowl_loser.is_none() || self.super_bowl_winner.is_none() {
            return Err(EngineError::StructuralViolation(
                "super bowl outcome missing".into(),
            ));
        }

        let participants = self.all_participants();
        let distinct: HashSet<TeamId> = participants.iter().copied().collect();
        if distinct.len() != participants.len() {
            return Err(EngineError::StructuralViolation(format!(
                "duplicate team across playoff rounds: {participants:?}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract the full bracket outcome for one dynasty/season from the event
/// log.
///
/// Errors:
/// - [`EngineError::PlayoffsIncomplete`] when a round has fewer finished
///   games than the bracket requires (recoverable; the season is still
///   running).
/// - [`EngineError::UnrecognizedPayload`] when a row's metadata matches no
///   known schema version.
/// - [`EngineError::DataInconsistency`] when a row cannot be classified by
///   round, the label and payload disagree, or a winner is not one of the
///   two teams that played.
/// - [`EngineError::StructuralViolation`] when the assembled bracket breaks
///   the 6/4/2/1/1 shape or a team appears twice.
pub fn get_playoff_results(
    db: &Database,
    dynasty_id: &str,
    season: u16,
) -> Result<PlayoffResults, EngineError> {
    let games = db
        .load_playoff_games(dynasty_id, season)
        .map_err(|e| EngineError::Storage(format!("{e:#}")))?;

    let mut by_round: HashMap<PlayoffRound, Vec<&GameRow>> = HashMap::new();
    for game in &games {
        by_round.entry(classify_game(game)?).or_default().push(game);
    }

    let mut results = PlayoffResults::default();
    for round in PlayoffRound::ALL {
        let rows = by_round.remove(&round).unwrap_or_default();
        let finished = rows.iter().filter(|g| g.winner.is_some()).count();

        debug!(
            dynasty = dynasty_id,
            season,
            round = round.name(),
            games = rows.len(),
            finished,
            "classified playoff round"
        );

        if rows.len() > round.expected_games() {
            return Err(EngineError::StructuralViolation(format!(
                "{} round has {} games, expected {}",
                round.name(),
                rows.len(),
                round.expected_games()
            )));
        }
        if finished < round.expected_games() {
            return Err(EngineError::PlayoffsIncomplete {
                round: round.name(),
                found: finished,
                expected: round.expected_games(),
            });
        }

        // rows fits within the bracket and every expected game is finished,
        // so each row here carries a winner.
        for game in rows {
            let Some(winner) = game.winner else { continue };
            let loser = loser_of(game, winner, round)?;
            match round {
                PlayoffRound::WildCard => results.wild_card_losers.push(loser),
                PlayoffRound::Divisional => results.divisional_losers.push(loser),
                PlayoffRound::Conference => results.conference_losers.push(loser),
                PlayoffRound::SuperBowl => {
                    results.super_bowl_winner = Some(winner);
                    results.super_bowl_loser = Some(loser);
                }
            }
        }
    }

    results.validate()?;
    Ok(results)
}

/// Classify one playoff row by round, reconciling the `round_label` column
/// with the semi-structured payload. Either source alone suffices; when both
/// name a round they must agree.
fn classify_game(game: &GameRow) -> Result<PlayoffRound, EngineError> {
    let meta = GameMeta::parse(&game.meta)?;

    let from_column = parse_round_label(game, game.round_label.as_deref())?;
    let from_meta = parse_round_label(game, meta.round_label())?;

    match (from_column, from_meta) {
        (Some(column), Some(payload)) if column != payload => {
            Err(EngineError::DataInconsistency(format!(
                "game between {} and {} labeled {} but payload says {}",
                game.home_team,
                game.away_team,
                column.name(),
                payload.name()
            )))
        }
        (Some(round), _) | (None, Some(round)) => Ok(round),
        (None, None) => Err(EngineError::DataInconsistency(format!(
            "playoff game between {} and {} carries no round label",
            game.home_team, game.away_team
        ))),
    }
}

fn parse_round_label(
    game: &GameRow,
    label: Option<&str>,
) -> Result<Option<PlayoffRound>, EngineError> {
    label
        .map(|label| {
            PlayoffRound::parse(label).ok_or_else(|| {
                EngineError::DataInconsistency(format!(
                    "unknown round label `{label}` on game between {} and {}",
                    game.home_team, game.away_team
                ))
            })
        })
        .transpose()
}

/// The losing side of a finished playoff game.
fn loser_of(game: &GameRow, winner: TeamId, round: PlayoffRound) -> Result<TeamId, EngineError> {
    if winner == game.home_team {
        Ok(game.away_team)
    } else if winner == game.away_team {
        Ok(game.home_team)
    } else {
        Err(EngineError::DataInconsistency(format!(
            "{} game between {} and {} lists winner {}",
            round.name(),
            game.home_team,
            game.away_team,
            winner
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, GameRow};

    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn playoff_game(
        dynasty: &str,
        label: &str,
        home: TeamId,
        away: TeamId,
        winner: Option<TeamId>,
    ) -> GameRow {
        GameRow {
            dynasty_id: dynasty.to_string(),
            season: 3,
            phase: "playoff".to_string(),
            round_label: Some(label.to_string()),
            played_on: Some("2026-01-10".to_string()),
            home_team: home,
            away_team: away,
            home_score: 27,
            away_score: 20,
            winner,
            meta: "{}".to_string(),
        }
    }

    /// Seed a complete 14-team bracket for dynasty "alpha": wild-card losers
    /// 101-106, divisional losers 107-110, conference losers 111-112, super
    /// bowl 113 over 114. Labels come from the given spelling set.
    fn seed_full_bracket_with(db: &Database, dynasty: &str, labels: [&str; 4]) {
        let [wc, div, conf, sb] = labels;
        for loser in 101..=106u32 {
            db.insert_game(&playoff_game(dynasty, wc, loser + 20, loser, Some(loser + 20)))
                .unwrap();
        }
        for loser in 107..=110u32 {
            db.insert_game(&playoff_game(dynasty, div, loser + 20, loser, Some(loser + 20)))
                .unwrap();
        }
        for loser in 111..=112u32 {
            db.insert_game(&playoff_game(dynasty, conf, loser + 2, loser, Some(loser + 2)))
                .unwrap();
        }
        db.insert_game(&playoff_game(dynasty, sb, 113, 114, Some(113)))
            .unwrap();
    }

    fn seed_full_bracket(db: &Database, dynasty: &str) {
        seed_full_bracket_with(db, dynasty, ["wildcard", "divisional", "conference", "superbowl"]);
    }

    // ------------------------------------------------------------------
    // PlayoffRound
    // ------------------------------------------------------------------

    #[test]
    fn parse_accepts_historical_spellings() {
        for label in ["wildcard", "wild_card", "Wild-Card", "WILD CARD"] {
            assert_eq!(PlayoffRound::parse(label), Some(PlayoffRound::WildCard));
        }
        assert_eq!(PlayoffRound::parse("divisional"), Some(PlayoffRound::Divisional));
        assert_eq!(
            PlayoffRound::parse("conference championship"),
            Some(PlayoffRound::Conference)
        );
        assert_eq!(PlayoffRound::parse("Super Bowl"), Some(PlayoffRound::SuperBowl));
        assert_eq!(PlayoffRound::parse("preseason"), None);
    }

    #[test]
    fn expected_games_sum_to_thirteen() {
        let total: usize = PlayoffRound::ALL.iter().map(|r| r.expected_games()).sum();
        assert_eq!(total, 13);
    }

    // ------------------------------------------------------------------
    // GameMeta
    // ------------------------------------------------------------------

    #[test]
    fn meta_parses_current_shape() {
        let meta = GameMeta::parse(r#"{"playoff_round":"wildcard","neutral_site":false}"#).unwrap();
        assert_eq!(meta.round_label(), Some("wildcard"));
    }

    #[test]
    fn meta_parses_legacy_shape() {
        let meta = GameMeta::parse(r#"{"round":"divisional"}"#).unwrap();
        assert_eq!(meta.round_label(), Some("divisional"));
    }

    #[test]
    fn meta_parses_empty_object() {
        let meta = GameMeta::parse("{}").unwrap();
        assert_eq!(meta.round_label(), None);
    }

    #[test]
    fn meta_rejects_garbage() {
        assert!(matches!(
            GameMeta::parse("not json"),
            Err(EngineError::UnrecognizedPayload(_))
        ));
    }

    #[test]
    fn meta_rejects_unknown_object_shapes() {
        // An object matching no schema version must not fall through to the
        // empty variant.
        assert!(matches!(
            GameMeta::parse(r#"{"stage":"wildcard"}"#),
            Err(EngineError::UnrecognizedPayload(_))
        ));
    }

    // ------------------------------------------------------------------
    // Extraction
    // ------------------------------------------------------------------

    #[test]
    fn full_bracket_extraction() {
        let db = test_db();
        seed_full_bracket(&db, "alpha");

        let results = get_playoff_results(&db, "alpha", 3).unwrap();
        assert_eq!(results.wild_card_losers, vec![101, 102, 103, 104, 105, 106]);
        assert_eq!(results.divisional_losers, vec![107, 108, 109, 110]);
        assert_eq!(results.conference_losers, vec![111, 112]);
        assert_eq!(results.super_bowl_loser, Some(114));
        assert_eq!(results.super_bowl_winner, Some(113));
        assert_eq!(results.all_participants().len(), 14);
    }

    #[test]
    fn display_spellings_classify_like_canonical_ones() {
        // Every label spelling the crate accepts must reach the same bracket,
        // not just the exact strings a particular producer wrote.
        let db = test_db();
        seed_full_bracket_with(
            &db,
            "alpha",
            ["Wild Card", "Divisional", "Conference Championship", "Super Bowl"],
        );

        let results = get_playoff_results(&db, "alpha", 3).unwrap();
        assert_eq!(results.wild_card_losers.len(), 6);
        assert_eq!(results.super_bowl_winner, Some(113));
    }

    #[test]
    fn round_from_payload_when_column_label_missing() {
        let db = test_db();
        let mut game = playoff_game("alpha", "wildcard", 1, 2, Some(1));
        game.round_label = None;
        game.meta = r#"{"playoff_round":"wild_card"}"#.to_string();
        db.insert_game(&game).unwrap();

        // One wild-card game on record, so extraction reports the round as
        // incomplete at one of six, proving the payload-only row was
        // classified rather than dropped.
        let err = get_playoff_results(&db, "alpha", 3).unwrap_err();
        assert!(matches!(
            err,
            EngineError::PlayoffsIncomplete {
                round: "wild card",
                found: 1,
                expected: 6,
            }
        ));
    }

    #[test]
    fn disagreeing_label_and_payload_is_inconsistency() {
        let db = test_db();
        seed_full_bracket(&db, "alpha");
        let mut game = playoff_game("alpha", "divisional", 120, 121, Some(120));
        game.meta = r#"{"round":"conference"}"#.to_string();
        db.insert_game(&game).unwrap();

        let err = get_playoff_results(&db, "alpha", 3).unwrap_err();
        assert!(matches!(err, EngineError::DataInconsistency(_)));
    }

    #[test]
    fn unparseable_payload_surfaces_as_unrecognized() {
        let db = test_db();
        seed_full_bracket(&db, "alpha");
        let mut game = playoff_game("alpha", "superbowl", 113, 114, Some(113));
        game.meta = r#"{"stage":"final"}"#.to_string();
        db.insert_game(&game).unwrap();

        let err = get_playoff_results(&db, "alpha", 3).unwrap_err();
        assert!(matches!(err, EngineError::UnrecognizedPayload(_)));
    }

    #[test]
    fn unknown_round_label_is_inconsistency_not_a_silent_drop() {
        let db = test_db();
        seed_full_bracket(&db, "alpha");
        db.insert_game(&playoff_game("alpha", "preseason", 120, 121, Some(120)))
            .unwrap();

        let err = get_playoff_results(&db, "alpha", 3).unwrap_err();
        assert!(matches!(err, EngineError::DataInconsistency(_)));
    }

    #[test]
    fn same_date_other_dynasty_does_not_leak() {
        let db = test_db();
        seed_full_bracket(&db, "alpha");
        // A second dynasty's entire bracket on the same dates must be
        // invisible to alpha's extraction.
        for loser in 201..=206u32 {
            db.insert_game(&playoff_game("beta", "wildcard", loser + 20, loser, Some(loser + 20)))
                .unwrap();
        }

        let results = get_playoff_results(&db, "alpha", 3).unwrap();
        assert_eq!(results.wild_card_losers, vec![101, 102, 103, 104, 105, 106]);
    }

    #[test]
    fn incomplete_round_is_recoverable_error() {
        let db = test_db();
        for loser in 101..=104u32 {
            db.insert_game(&playoff_game("alpha", "wildcard", loser + 20, loser, Some(loser + 20)))
                .unwrap();
        }

        let err = get_playoff_results(&db, "alpha", 3).unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(
            err,
            EngineError::PlayoffsIncomplete {
                round: "wild card",
                found: 4,
                expected: 6,
            }
        ));
    }

    #[test]
    fn extra_round_game_is_structural() {
        let db = test_db();
        seed_full_bracket(&db, "alpha");
        db.insert_game(&playoff_game("alpha", "superbowl", 113, 114, Some(113)))
            .unwrap();
        // A bracket with two super bowls is structurally broken.
        let err = get_playoff_results(&db, "alpha", 3).unwrap_err();
        assert!(matches!(err, EngineError::StructuralViolation(_)));
    }

    #[test]
    fn unfinished_games_counted_in_incomplete_report() {
        let db = test_db();
        for loser in 101..=105u32 {
            db.insert_game(&playoff_game("alpha", "wildcard", loser + 20, loser, Some(loser + 20)))
                .unwrap();
        }
        db.insert_game(&playoff_game("alpha", "wildcard", 126, 106, None))
            .unwrap();

        // Five of six games finished; the report must say five, not zero.
        let err = get_playoff_results(&db, "alpha", 3).unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(
            err,
            EngineError::PlayoffsIncomplete {
                round: "wild card",
                found: 5,
                expected: 6,
            }
        ));
    }

    #[test]
    fn winner_not_in_game_is_inconsistency() {
        let db = test_db();
        for loser in 101..=105u32 {
            db.insert_game(&playoff_game("alpha", "wildcard", loser + 20, loser, Some(loser + 20)))
                .unwrap();
        }
        db.insert_game(&playoff_game("alpha", "wildcard", 126, 106, Some(999)))
            .unwrap();

        let err = get_playoff_results(&db, "alpha", 3).unwrap_err();
        assert!(matches!(err, EngineError::DataInconsistency(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn duplicate_team_across_rounds_is_structural() {
        let db = test_db();
        seed_full_bracket(&db, "alpha");
        let mut results = get_playoff_results(&db, "alpha", 3).unwrap();
        // Corrupt the bracket: wild-card loser also listed as divisional loser.
        results.divisional_losers[0] = results.wild_card_losers[0];
        assert!(matches!(
            results.validate(),
            Err(EngineError::StructuralViolation(_))
        ));
    }
}
