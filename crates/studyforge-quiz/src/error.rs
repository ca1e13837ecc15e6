//! Error types for the quiz engine.

use thiserror::Error;

/// Errors returned by the quiz engine.
///
/// Every variant is a caller bug; store failures never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    /// An attempt is already running.
    #[error("a quiz attempt is already running")]
    AlreadyRunning,

    /// The operation needs a running attempt.
    #[error("no quiz attempt is running")]
    NotRunning,

    /// A quiz cannot start without questions.
    #[error("cannot start a quiz without questions")]
    NoQuestions,

    /// The question is not part of the running attempt.
    #[error("unknown question: {0}")]
    UnknownQuestion(String),
}

/// Result type for quiz operations.
pub type Result<T> = std::result::Result<T, QuizError>;
