//! # StudyForge Sync
//!
//! Reconciles the on-device store with a remote backend under intermittent
//! connectivity and several devices per user.
//!
//! ## Overview
//!
//! The [`SyncEngine`] pushes completed sessions and wrong answers through a
//! [`RemoteGateway`] and merges remote records back into the local store.
//! There are no transactions spanning both sides; convergence comes from the
//! merge rules being idempotent and monotonic.
//!
//! ## Key Properties
//!
//! - **Idempotent**: Re-pushing or re-pulling the same records changes nothing
//! - **Monotonic**: Wrong answer counts never decrease, completed sessions are
//!   never downgraded
//! - **Exclusive**: One operation at a time; overlapping calls are skipped
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use studyforge_store::SqliteStore;
//! use studyforge_sync::{Credential, MemoryGateway, SyncConfig, SyncEngine};
//!
//! async fn example() {
//!     let store = Arc::new(SqliteStore::open("progress.db").unwrap());
//!     let gateway = Arc::new(MemoryGateway::new());
//!
//!     let engine = SyncEngine::load(store, gateway, SyncConfig::default()).await.unwrap();
//!     engine.set_credential(Some(Credential::new("token")));
//!
//!     let report = engine.full_sync().await;
//!     println!("{:?}", report.status);
//! }
//! ```
//!
//! ## Operation Flow
//!
//! ```text
//! Device                                   Backend
//!   |-------- health_check ----------------->|
//!   |-------- push(sessions, wrong) -------->|   sync_to_backend
//!   |<------- PushResponse ------------------|
//!   |-------- health_check ----------------->|
//!   |-------- pull_sessions ---------------->|   sync_from_backend
//!   |-------- pull_wrong_answers ----------->|
//!   |<------- records (merged locally) ------|
//! ```

pub mod engine;
pub mod error;
pub mod gateway;
pub mod state;

pub use engine::{SyncConfig, SyncEngine, UNAVAILABLE};
pub use error::{GatewayError, Result, SyncError};
pub use gateway::{memory::MemoryGateway, Credential, PushResponse, RemoteGateway};
pub use state::{MergeCounts, SkipReason, SyncReport, SyncState, SyncStatus};
