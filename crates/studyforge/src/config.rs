//! Configuration loading.
//!
//! Settings come from a TOML file; every field has a default, so a missing
//! file or a partial one is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use studyforge_quiz::QuizConfig;
use studyforge_store::SqliteStore;
use studyforge_sync::SyncConfig;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "studyforge.toml";

/// Database path selecting an in-memory SQLite database.
pub const MEMORY_DATABASE: &str = ":memory:";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyforgeConfig {
    pub database_path: String,
    /// Default tracing filter; `RUST_LOG` overrides it.
    pub log_filter: String,
    pub sync: SyncSettings,
    pub quiz: QuizSettings,
}

/// `[sync]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub request_timeout_secs: u64,
    pub interval_secs: u64,
    pub sync_after_submit: bool,
}

/// `[quiz]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizSettings {
    pub default_exam_minutes: Option<u32>,
}

impl Default for StudyforgeConfig {
    fn default() -> Self {
        Self {
            database_path: "studyforge.db".into(),
            log_filter: "info".into(),
            sync: SyncSettings::default(),
            quiz: QuizSettings::default(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            interval_secs: 300,
            sync_after_submit: true,
        }
    }
}

impl StudyforgeConfig {
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            request_timeout: Duration::from_secs(self.sync.request_timeout_secs.max(1)),
            interval: Duration::from_secs(self.sync.interval_secs.max(1)),
            sync_after_submit: self.sync.sync_after_submit,
        }
    }

    pub fn quiz_config(&self) -> QuizConfig {
        QuizConfig {
            default_exam_minutes: self.quiz.default_exam_minutes,
        }
    }

    /// Open the configured SQLite database.
    pub fn open_store(&self) -> anyhow::Result<SqliteStore> {
        let store = if self.database_path == MEMORY_DATABASE {
            SqliteStore::open_memory()
        } else {
            SqliteStore::open(&self.database_path)
        };
        store.with_context(|| format!("failed to open database: {}", self.database_path))
    }
}

/// Load configuration from `studyforge.toml` in the working directory, or
/// defaults when there is none.
pub fn load_config() -> anyhow::Result<StudyforgeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default location.
///
/// `STUDYFORGE_DATABASE` overrides `database_path`.
pub fn load_config_from(path: Option<&Path>) -> anyhow::Result<StudyforgeConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => StudyforgeConfig::default(),
    };

    if let Ok(database) = std::env::var("STUDYFORGE_DATABASE") {
        config.database_path = database;
    }

    Ok(config)
}

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> anyhow::Result<StudyforgeConfig> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StudyforgeConfig::default();
        let sync = config.sync_config();
        assert_eq!(sync.request_timeout, Duration::from_secs(30));
        assert_eq!(sync.interval, Duration::from_secs(300));
        assert!(sync.sync_after_submit);
        assert_eq!(config.quiz_config().default_exam_minutes, None);
    }

    #[test]
    fn test_partial_file() {
        let config = parse_config(
            r#"
            database_path = ":memory:"

            [sync]
            interval_secs = 60
            sync_after_submit = false

            [quiz]
            default_exam_minutes = 130
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, MEMORY_DATABASE);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.sync.request_timeout_secs, 30);
        assert_eq!(config.sync_config().interval, Duration::from_secs(60));
        assert!(!config.sync_config().sync_after_submit);
        assert_eq!(config.quiz_config().default_exam_minutes, Some(130));
        assert!(config.open_store().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studyforge.toml");
        std::fs::write(&path, "log_filter = \"debug\"\n").unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.log_filter, "debug");

        let missing = dir.path().join("nope.toml");
        assert!(load_config_from(Some(&missing)).is_err());
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(parse_config("sync = 3").is_err());
    }
}
