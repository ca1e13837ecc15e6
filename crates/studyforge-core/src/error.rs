//! Error types for StudyForge core records.

use thiserror::Error;

/// Errors raised while parsing or validating core records.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unknown quiz mode: {0}")]
    UnknownMode(String),

    #[error("unknown chat role: {0}")]
    UnknownRole(String),

    #[error("session {0} is completed but has no end time or score")]
    IncompleteCompletion(String),

    #[error("session {0} has an end time or score but is not completed")]
    PrematureCompletion(String),

    #[error("score {0} is outside 0..=100")]
    ScoreOutOfRange(u8),
}
