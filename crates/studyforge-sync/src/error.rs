//! Error types for the sync module.

use thiserror::Error;

/// Errors reported by a remote gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The request never got a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The credential was rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// The backend answered with an error.
    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote gateway call failed.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] studyforge_store::StoreError),

    /// A gateway call exceeded the request timeout.
    #[error("timeout: {0}")]
    Timeout(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
