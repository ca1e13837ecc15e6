//! Subscriber setup for binaries and integration tests.

use tracing_subscriber::EnvFilter;

use crate::error::{Result, StudyforgeError};

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set. Fails if a global
/// subscriber is already installed.
pub fn init_logging(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| StudyforgeError::Logging(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| StudyforgeError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_fails() {
        let first = init_logging("studyforge=debug");
        let second = init_logging("info");
        // A parallel test may have installed the subscriber first.
        if first.is_ok() {
            assert!(matches!(second, Err(StudyforgeError::Logging(_))));
        }
    }

    #[test]
    fn test_bad_filter_is_error() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(init_logging("studyforge=notalevel").is_err());
        }
    }
}
