// Engine error taxonomy.
//
// Three families: missing-data (recoverable by the caller except missing
// standings), structural-invariant violations (always fatal, never silently
// corrected), and storage failures bubbling up from the SQLite layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The standings store returned no rows for this dynasty/season. Fatal:
    /// an empty result set means "not available", never "all-zero records",
    /// and no meaningful order can be computed without standings.
    #[error("no standings found for dynasty `{dynasty}` season {season}")]
    MissingStandings { dynasty: String, season: u16 },

    /// A playoff round has fewer finished games than the bracket requires.
    /// Recoverable: the caller may re-run later or accept a partial order.
    #[error("playoffs incomplete: {round} has {found} finished games, expected {expected}")]
    PlayoffsIncomplete {
        round: &'static str,
        found: usize,
        expected: usize,
    },

    /// A game's declared winner is neither of its two listed teams, or
    /// similarly contradictory event-log data.
    #[error("data inconsistency: {0}")]
    DataInconsistency(String),

    /// Wrong team counts, duplicate teams across playoff rounds, or any
    /// other violation of the engine's structural invariants.
    #[error("structural invariant violated: {0}")]
    StructuralViolation(String),

    /// A game's semi-structured metadata payload matched no known schema
    /// version.
    #[error("unrecognized game payload: {0}")]
    UnrecognizedPayload(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Whether the caller can degrade gracefully (emit a partial result)
    /// instead of failing the whole resolution.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::PlayoffsIncomplete { .. })
    }
}
