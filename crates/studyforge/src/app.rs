//! The Studyforge service object.
//!
//! Brings together the local store, the quiz engine and the sync engine
//! behind one explicitly passed handle. There is no global state: an
//! application creates one `Studyforge` and shares it.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use studyforge_core::{
    ChatMessage, ChatRole, ChatSession, Clock, Question, QuizMode, QuizSession, RecordId,
    SystemClock, WrongAnswer,
};
use studyforge_quiz::{QuizEngine, QuizResult};
use studyforge_store::{LocalStore, StoreExt};
use studyforge_sync::{Credential, RemoteGateway, SyncEngine, SyncReport, SyncState};
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::StudyforgeConfig;
use crate::error::Result;

/// Lower bound on the periodic sync interval.
const MIN_SYNC_INTERVAL: Duration = Duration::from_millis(1);

/// The main Studyforge struct.
///
/// Provides a unified API for:
/// - Running quiz attempts
/// - Reviewing wrong answers
/// - Keeping chat history
/// - Syncing progress with the backend
pub struct Studyforge<S: LocalStore + 'static, G: RemoteGateway + 'static> {
    store: Arc<S>,
    quiz: Mutex<QuizEngine<S>>,
    sync: Arc<SyncEngine<S, G>>,
    clock: Arc<dyn Clock>,
    /// Push started by the last submission, if still tracked.
    background_push: StdMutex<Option<JoinHandle<SyncReport>>>,
}

impl<S: LocalStore + 'static, G: RemoteGateway + 'static> Studyforge<S, G> {
    /// Create a new instance reading time from the system clock.
    pub async fn new(store: Arc<S>, gateway: Arc<G>, config: &StudyforgeConfig) -> Result<Self> {
        Self::with_clock(store, gateway, config, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(
        store: Arc<S>,
        gateway: Arc<G>,
        config: &StudyforgeConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let sync = SyncEngine::load_with_clock(
            Arc::clone(&store),
            gateway,
            config.sync_config(),
            Arc::clone(&clock),
        )
        .await?;
        let quiz = QuizEngine::with_clock(Arc::clone(&store), Arc::clone(&clock))
            .with_config(config.quiz_config());

        Ok(Self {
            store,
            quiz: Mutex::new(quiz),
            sync: Arc::new(sync),
            clock,
            background_push: StdMutex::new(None),
        })
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sync_engine(&self) -> &Arc<SyncEngine<S, G>> {
        &self.sync
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Quiz
    // ─────────────────────────────────────────────────────────────────────────

    /// Exclusive access to the quiz engine for answering and navigation.
    pub async fn quiz(&self) -> MutexGuard<'_, QuizEngine<S>> {
        self.quiz.lock().await
    }

    pub async fn start_quiz(
        &self,
        mode: QuizMode,
        exam_id: &str,
        questions: Vec<Question>,
        time_limit_minutes: Option<u32>,
    ) -> Result<()> {
        let mut quiz = self.quiz.lock().await;
        quiz.start_quiz(mode, exam_id, questions, time_limit_minutes)
            .await?;
        Ok(())
    }

    /// Submit the running attempt.
    ///
    /// With `sync_after_submit` and a credential installed, a push to the
    /// backend starts in the background.
    pub async fn submit_quiz(&self) -> Result<QuizResult> {
        let result = self.quiz.lock().await.submit_quiz().await?;

        if self.sync.config().sync_after_submit && self.sync.credential().is_some() {
            let sync = Arc::clone(&self.sync);
            let handle = tokio::spawn(async move { sync.sync_to_backend().await });
            self.track_background_push(handle);
        }

        Ok(result)
    }

    /// Wait for the push started by the last submission.
    pub async fn join_background_push(&self) -> Option<SyncReport> {
        let handle = match self.background_push.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }?;

        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(error = %e, "background push task failed");
                None
            }
        }
    }

    fn track_background_push(&self, handle: JoinHandle<SyncReport>) {
        let mut slot = match self.background_push.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(handle);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Review
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn sessions(&self, exam_id: &str) -> Result<Vec<QuizSession>> {
        Ok(self.store.list_sessions_by_exam(exam_id).await?)
    }

    pub async fn wrong_answers(&self, exam_id: &str) -> Result<Vec<WrongAnswer>> {
        Ok(self.store.list_wrong_answers_by_exam(exam_id).await?)
    }

    pub async fn unmastered_wrong_answers(&self, exam_id: &str) -> Result<Vec<WrongAnswer>> {
        Ok(self.store.unmastered_wrong_answers(exam_id).await?)
    }

    pub async fn mark_mastered(&self, id: &RecordId) -> Result<()> {
        Ok(self.store.mark_mastered(id).await?)
    }

    pub async fn delete_wrong_answer(&self, id: &RecordId) -> Result<bool> {
        Ok(self.store.delete_wrong_answer(id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chat History
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn new_chat(&self, title: &str, page_context: Option<String>) -> Result<ChatSession> {
        let session = ChatSession::new(title, page_context, self.clock.now());
        self.store.insert_chat_session(&session).await?;
        Ok(session)
    }

    pub async fn append_chat_message(
        &self,
        session_id: &RecordId,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage> {
        let message = ChatMessage::new(session_id.clone(), role, content, self.clock.now());
        self.store.add_chat_message(&message).await?;
        Ok(message)
    }

    pub async fn chat_history(&self, session_id: &RecordId) -> Result<Vec<ChatMessage>> {
        Ok(self.store.list_chat_messages(session_id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Install the credential and run a full sync.
    pub async fn login(&self, credential: Credential) -> SyncReport {
        self.sync.set_credential(Some(credential));
        self.sync.full_sync().await
    }

    /// Remove the credential and forget sync state.
    pub async fn logout(&self) -> Result<()> {
        self.sync.set_credential(None);
        self.sync.clear_sync().await?;
        Ok(())
    }

    pub async fn full_sync(&self) -> SyncReport {
        self.sync.full_sync().await
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn subscribe_sync(&self) -> watch::Receiver<SyncState> {
        self.sync.subscribe()
    }

    /// Run a full sync every `sync.interval` until the handle is aborted.
    ///
    /// The first run happens immediately.
    pub fn spawn_periodic_sync(&self) -> JoinHandle<()> {
        let sync = Arc::clone(&self.sync);
        let period = sync.config().interval.max(MIN_SYNC_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let report = sync.full_sync().await;
                tracing::debug!(status = ?report.status, "periodic sync");
            }
        })
    }
}
