//! Observable sync state and per-operation reports.

use studyforge_core::{MergeOutcome, Timestamp};

/// Process-wide sync status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Last successful push or pull.
    pub last_sync: Option<Timestamp>,
    /// Set while an operation holds the sync slot.
    pub is_syncing: bool,
    /// Cause of the last failure, cleared when an operation starts.
    pub error: Option<String>,
}

/// Why an operation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadySyncing,
    NoCredential,
    Unreachable,
}

/// How an operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Completed,
    Skipped(SkipReason),
    Failed(String),
}

/// Per-kind tally of merge outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Remote records that failed validation and were not stored.
    pub rejected: usize,
}

impl MergeCounts {
    pub fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Updated => self.updated += 1,
            MergeOutcome::Unchanged => self.unchanged += 1,
            MergeOutcome::Rejected => self.rejected += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged + self.rejected
    }
}

/// Result of a sync operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub status: SyncStatus,
    /// Completed sessions sent to the backend.
    pub sessions_pushed: usize,
    /// Wrong answers sent to the backend.
    pub wrong_answers_pushed: usize,
    /// Remote sessions merged locally.
    pub sessions: MergeCounts,
    /// Remote wrong answers merged locally.
    pub wrong_answers: MergeCounts,
}

impl SyncReport {
    pub(crate) fn new(status: SyncStatus) -> Self {
        Self {
            status,
            sessions_pushed: 0,
            wrong_answers_pushed: 0,
            sessions: MergeCounts::default(),
            wrong_answers: MergeCounts::default(),
        }
    }

    pub fn skipped(reason: SkipReason) -> Self {
        Self::new(SyncStatus::Skipped(reason))
    }

    pub fn is_completed(&self) -> bool {
        self.status == SyncStatus::Completed
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, SyncStatus::Skipped(_))
    }
}
