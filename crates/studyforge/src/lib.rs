//! # StudyForge
//!
//! Local-first exam progress: run quiz attempts on the device, keep every
//! missed question for review, and reconcile progress with a backend shared
//! by all of a user's devices.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use studyforge::{load_config, Studyforge};
//! use studyforge::core::{Answer, QuizMode};
//! use studyforge::sync::{Credential, MemoryGateway};
//!
//! async fn example(questions: Vec<studyforge::core::Question>) -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let store = Arc::new(config.open_store()?);
//!     let gateway = Arc::new(MemoryGateway::new());
//!
//!     let app = Studyforge::new(store, gateway, &config).await?;
//!     app.login(Credential::new("token")).await;
//!
//!     app.start_quiz(QuizMode::Exam, "saa-c03", questions, Some(130)).await?;
//!     app.quiz().await.answer_question("q1", Answer::single("A"))?;
//!     let result = app.submit_quiz().await?;
//!     println!("score: {}", result.score);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Studyforge                   │
//! ├───────────────┬───────────────┬──────────────┤
//! │  QuizEngine   │  SyncEngine   │  Review/Chat │
//! ├───────────────┴───────┬───────┴──────────────┤
//! │      LocalStore       │    RemoteGateway     │
//! │  (SQLite / Memory)    │  (HTTP / Memory)     │
//! └───────────────────────┴──────────────────────┘
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Records, ids, timestamps, merge rules
//! - [`store`] - Local persistence
//! - [`quiz`] - Quiz state machine and scoring
//! - [`sync`] - Sync engine and gateway contract

pub mod app;
pub mod config;
pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use app::Studyforge;
pub use config::{load_config, load_config_from, parse_config, StudyforgeConfig};
pub use error::{Result, StudyforgeError};
pub use logging::init_logging;

// Re-export component crates
pub use studyforge_core as core;
pub use studyforge_quiz as quiz;
pub use studyforge_store as store;
pub use studyforge_sync as sync;

// Re-export commonly used types
pub use studyforge_core::{Answer, Question, QuizMode, QuizSession, RecordId, Timestamp, WrongAnswer};
pub use studyforge_quiz::{QuizEngine, QuizPhase, QuizResult};
pub use studyforge_store::{LocalStore, MemoryStore, SqliteStore};
pub use studyforge_sync::{Credential, RemoteGateway, SyncReport, SyncState, SyncStatus};
