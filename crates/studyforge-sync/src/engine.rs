//! The sync engine.
//!
//! Pushes completed sessions and wrong answers to the remote gateway and
//! merges remote records back into the local store. Only one operation runs
//! at a time; the others return a skipped report.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use studyforge_core::{Clock, SystemClock, Timestamp};
use studyforge_store::LocalStore;
use tokio::sync::watch;

use crate::error::{GatewayError, Result, SyncError};
use crate::gateway::{Credential, RemoteGateway};
use crate::state::{SkipReason, SyncReport, SyncState, SyncStatus};

/// Error recorded when the health probe fails.
pub const UNAVAILABLE: &str = "remote gateway unavailable";

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Timeout for each gateway call.
    pub request_timeout: Duration,
    /// Period of the background full sync.
    pub interval: Duration,
    /// Push right after a quiz is submitted.
    pub sync_after_submit: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            interval: Duration::from_secs(300),
            sync_after_submit: true,
        }
    }
}

/// Clears `is_syncing` when dropped, on every exit path.
struct SyncGuard<'a> {
    state: &'a watch::Sender<SyncState>,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.is_syncing = false);
    }
}

/// Reconciles a local store with a remote gateway.
pub struct SyncEngine<S: LocalStore, G: RemoteGateway> {
    store: Arc<S>,
    gateway: Arc<G>,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    credential: RwLock<Option<Credential>>,
    state: watch::Sender<SyncState>,
}

impl<S: LocalStore, G: RemoteGateway> SyncEngine<S, G> {
    /// Create an engine, seeding `last_sync` from the store.
    pub async fn load(store: Arc<S>, gateway: Arc<G>, config: SyncConfig) -> Result<Self> {
        Self::load_with_clock(store, gateway, config, Arc::new(SystemClock)).await
    }

    pub async fn load_with_clock(
        store: Arc<S>,
        gateway: Arc<G>,
        config: SyncConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let last_sync = store.get_last_sync().await?;
        let (state, _) = watch::channel(SyncState {
            last_sync,
            ..SyncState::default()
        });

        Ok(Self {
            store,
            gateway,
            config,
            clock,
            credential: RwLock::new(None),
            state,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Install or remove the backend credential.
    pub fn set_credential(&self, credential: Option<Credential>) {
        match self.credential.write() {
            Ok(mut slot) => *slot = credential,
            Err(poisoned) => *poisoned.into_inner() = credential,
        }
    }

    pub fn credential(&self) -> Option<Credential> {
        match self.credential.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Observe every state change.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Push all completed sessions and all wrong answers in one batch.
    ///
    /// Local records are never modified.
    pub async fn sync_to_backend(&self) -> SyncReport {
        let (credential, _guard) = match self.begin().await {
            Ok(slot) => slot,
            Err(reason) => return SyncReport::skipped(reason),
        };

        let mut report = SyncReport::new(SyncStatus::Completed);
        if let Err(e) = self.push(&credential, &mut report).await {
            return self.failed(report, "push", e);
        }

        tracing::info!(
            sessions = report.sessions_pushed,
            wrong_answers = report.wrong_answers_pushed,
            "pushed progress to backend"
        );
        report
    }

    /// Pull remote sessions and wrong answers and merge them locally.
    ///
    /// Each record is merged atomically; on failure the records merged so far
    /// stay merged.
    pub async fn sync_from_backend(&self) -> SyncReport {
        let (credential, _guard) = match self.begin().await {
            Ok(slot) => slot,
            Err(reason) => return SyncReport::skipped(reason),
        };

        let mut report = SyncReport::new(SyncStatus::Completed);
        if let Err(e) = self.pull(&credential, &mut report).await {
            return self.failed(report, "pull", e);
        }

        tracing::info!(
            sessions_inserted = report.sessions.inserted,
            sessions_updated = report.sessions.updated,
            sessions_rejected = report.sessions.rejected,
            wrong_inserted = report.wrong_answers.inserted,
            wrong_updated = report.wrong_answers.updated,
            "merged progress from backend"
        );
        report
    }

    /// Push, then pull.
    ///
    /// The pull runs even when the push failed, so remote progress still
    /// arrives while the backend rejects uploads. It is skipped only when the
    /// push found no credential or another operation holding the slot. The
    /// first outcome that did not complete becomes the report status, and a
    /// push failure stays in `SyncState::error` after a successful pull.
    pub async fn full_sync(&self) -> SyncReport {
        let pushed = self.sync_to_backend().await;
        if matches!(
            pushed.status,
            SyncStatus::Skipped(SkipReason::NoCredential | SkipReason::AlreadySyncing)
        ) {
            return pushed;
        }

        let mut report = self.sync_from_backend().await;
        report.sessions_pushed = pushed.sessions_pushed;
        report.wrong_answers_pushed = pushed.wrong_answers_pushed;
        if pushed.is_completed() {
            return report;
        }

        if let (SyncStatus::Failed(cause), true) = (&pushed.status, report.is_completed()) {
            self.state.send_modify(|s| s.error = Some(cause.clone()));
        }
        report.status = pushed.status;
        report
    }

    /// Forget the last sync time and error. Local records are untouched.
    pub async fn clear_sync(&self) -> Result<()> {
        self.state.send_modify(|s| {
            s.last_sync = None;
            s.error = None;
        });
        self.store.clear_last_sync().await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Check the preconditions in order and take the sync slot.
    async fn begin(&self) -> std::result::Result<(Credential, SyncGuard<'_>), SkipReason> {
        if self.state.borrow().is_syncing {
            tracing::debug!("sync already in progress");
            return Err(SkipReason::AlreadySyncing);
        }

        let Some(credential) = self.credential() else {
            tracing::debug!("no credential, skipping sync");
            return Err(SkipReason::NoCredential);
        };

        if !self.probe(&credential).await {
            tracing::warn!("remote gateway unavailable, skipping sync");
            self.state.send_modify(|s| s.error = Some(UNAVAILABLE.to_string()));
            return Err(SkipReason::Unreachable);
        }

        let acquired = self.state.send_if_modified(|s| {
            if s.is_syncing {
                return false;
            }
            s.is_syncing = true;
            s.error = None;
            true
        });
        if !acquired {
            return Err(SkipReason::AlreadySyncing);
        }

        Ok((credential, SyncGuard { state: &self.state }))
    }

    async fn probe(&self, credential: &Credential) -> bool {
        tokio::time::timeout(
            self.config.request_timeout,
            self.gateway.health_check(credential),
        )
        .await
        .unwrap_or(false)
    }

    /// Run one gateway call under the request timeout.
    async fn call<T, F>(&self, what: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, GatewayError>>,
    {
        match tokio::time::timeout(self.config.request_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SyncError::Timeout(format!(
                "{} exceeded {:?}",
                what, self.config.request_timeout
            ))),
        }
    }

    async fn push(&self, credential: &Credential, report: &mut SyncReport) -> Result<()> {
        let sessions: Vec<_> = self
            .store
            .list_sessions()
            .await?
            .into_iter()
            .filter(|s| s.completed)
            .collect();
        let wrong_answers = self.store.list_wrong_answers().await?;

        let response = self
            .call(
                "push",
                self.gateway.push(credential, &sessions, &wrong_answers),
            )
            .await?;

        let last_sync = response.last_sync.unwrap_or_else(|| self.clock.now());
        self.commit(credential, last_sync).await?;

        report.sessions_pushed = sessions.len();
        report.wrong_answers_pushed = wrong_answers.len();
        Ok(())
    }

    async fn pull(&self, credential: &Credential, report: &mut SyncReport) -> Result<()> {
        let (sessions, wrong_answers) = tokio::try_join!(
            self.call("pull sessions", self.gateway.pull_sessions(credential)),
            self.call(
                "pull wrong answers",
                self.gateway.pull_wrong_answers(credential)
            ),
        )?;

        for remote in &sessions {
            let outcome = self.store.merge_session(remote).await?;
            tracing::debug!(session = %remote.id, ?outcome, "merged session");
            report.sessions.record(outcome);
        }

        for remote in &wrong_answers {
            let outcome = self.store.merge_wrong_answer(remote).await?;
            tracing::debug!(
                exam = %remote.exam_id,
                question = %remote.question_id,
                ?outcome,
                "merged wrong answer"
            );
            report.wrong_answers.record(outcome);
        }

        self.commit(credential, self.clock.now()).await
    }

    /// Record a successful exchange. Nothing is written when the credential
    /// the operation started with has been replaced or removed meanwhile.
    async fn commit(&self, credential: &Credential, last_sync: Timestamp) -> Result<()> {
        if self.credential().as_ref() != Some(credential) {
            tracing::debug!("credential changed during sync, last sync not recorded");
            return Ok(());
        }

        self.store.set_last_sync(last_sync).await?;
        self.state.send_modify(|s| {
            s.last_sync = Some(last_sync);
            s.error = None;
        });
        Ok(())
    }

    fn failed(&self, mut report: SyncReport, op: &str, error: SyncError) -> SyncReport {
        let cause = error.to_string();
        tracing::warn!(op, error = %cause, "sync failed");
        self.state.send_modify(|s| s.error = Some(cause.clone()));
        report.status = SyncStatus::Failed(cause);
        report
    }
}
