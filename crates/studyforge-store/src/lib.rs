//! # StudyForge Store
//!
//! Local persistence for the StudyForge progress kernel. Provides a
//! trait-based interface for quiz sessions, wrong answers, chat history and
//! sync metadata, with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The quiz engine and the sync engine both talk to the device through the
//! [`LocalStore`] trait. The primary implementation is [`SqliteStore`], with
//! [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`LocalStore`] - The async trait for all storage operations
//! - [`StoreExt`] - Convenience queries built on top of it
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use studyforge_store::{LocalStore, SqliteStore};
//! use studyforge_core::{QuizMode, QuizSession, Timestamp};
//!
//! async fn example() {
//!     let store = SqliteStore::open("progress.db").unwrap();
//!
//!     let session = QuizSession::start("saa-c03", QuizMode::Exam, vec!["q1".into()], Timestamp::now());
//!     store.insert_session(&session).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Natural keys**: one wrong answer per `(exam_id, question_id)`
//! - **Atomic upserts**: misses and merges are read-modify-write under one
//!   lock or transaction
//! - **Blobs**: answers and question lists are stored as CBOR

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{LocalStore, StoreExt};
