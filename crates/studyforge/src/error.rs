//! Error types for the StudyForge facade.

use studyforge_quiz::QuizError;
use studyforge_store::StoreError;
use studyforge_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during StudyForge operations.
#[derive(Debug, Error)]
pub enum StudyforgeError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Quiz engine error.
    #[error("quiz error: {0}")]
    Quiz(#[from] QuizError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The global subscriber could not be installed.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Result type for StudyForge operations.
pub type Result<T> = std::result::Result<T, StudyforgeError>;
