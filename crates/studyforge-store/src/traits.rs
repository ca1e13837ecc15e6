//! LocalStore trait: the abstract interface for on-device persistence.
//!
//! The quiz engine and the sync engine are both written against this trait.
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use studyforge_core::{
    ChatMessage, ChatSession, MergeOutcome, MissRecord, QuizSession, RecordId, SessionUpdate,
    Timestamp, WrongAnswer, WrongAnswerKey, WrongAnswerUpdate,
};

use crate::error::Result;

/// The LocalStore trait: keyed tables for sessions, wrong answers and chat
/// history, plus a small sync metadata slot.
///
/// # Design Notes
///
/// - **No cross-table transactions**: callers must not assume two calls are
///   applied together.
/// - **Atomic per-record upserts**: [`record_wrong_answer`],
///   [`merge_wrong_answer`] and [`merge_session`] run their
///   read-modify-write under one lock or transaction, so the quiz engine and
///   the sync engine can write the same record concurrently.
/// - **One wrong answer per key**: at most one record exists per
///   `(exam_id, question_id)`.
///
/// [`record_wrong_answer`]: LocalStore::record_wrong_answer
/// [`merge_wrong_answer`]: LocalStore::merge_wrong_answer
/// [`merge_session`]: LocalStore::merge_session
#[async_trait]
pub trait LocalStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Quiz Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new session. Fails with `AlreadyExists` on a duplicate id.
    async fn insert_session(&self, session: &QuizSession) -> Result<()>;

    async fn get_session(&self, id: &RecordId) -> Result<Option<QuizSession>>;

    /// Apply a field-level update. Fails with `NotFound` if absent.
    async fn update_session(&self, id: &RecordId, update: &SessionUpdate) -> Result<()>;

    /// All sessions, ordered by start time.
    async fn list_sessions(&self) -> Result<Vec<QuizSession>>;

    async fn list_sessions_by_exam(&self, exam_id: &str) -> Result<Vec<QuizSession>>;

    /// Delete a session. Returns whether it existed.
    async fn delete_session(&self, id: &RecordId) -> Result<bool>;

    /// Reconcile a remote session with the local copy sharing its id.
    ///
    /// Absent locally: inserted verbatim. Otherwise see
    /// [`studyforge_core::merge_session`]. A remote copy failing
    /// `QuizSession::validate` is not written and yields
    /// [`MergeOutcome::Rejected`].
    async fn merge_session(&self, remote: &QuizSession) -> Result<MergeOutcome>;

    // ─────────────────────────────────────────────────────────────────────────
    // Wrong Answers
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new wrong answer.
    ///
    /// Fails with `AlreadyExists` if the id or the `(exam_id, question_id)`
    /// key is already present.
    async fn insert_wrong_answer(&self, wrong: &WrongAnswer) -> Result<()>;

    async fn get_wrong_answer(&self, id: &RecordId) -> Result<Option<WrongAnswer>>;

    /// Look a wrong answer up by its natural key.
    async fn find_wrong_answer(&self, key: &WrongAnswerKey) -> Result<Option<WrongAnswer>>;

    /// Apply a field-level update. Fails with `NotFound` if absent.
    async fn update_wrong_answer(&self, id: &RecordId, update: &WrongAnswerUpdate) -> Result<()>;

    /// All wrong answers, ordered by `(exam_id, question_id)`.
    async fn list_wrong_answers(&self) -> Result<Vec<WrongAnswer>>;

    async fn list_wrong_answers_by_exam(&self, exam_id: &str) -> Result<Vec<WrongAnswer>>;

    /// Delete a wrong answer. Returns whether it existed.
    async fn delete_wrong_answer(&self, id: &RecordId) -> Result<bool>;

    /// Record a miss.
    ///
    /// If a record exists for the miss's key its `wrong_count` is
    /// incremented, `last_wrong_at` and `user_answer` are refreshed from
    /// `miss`; otherwise `miss` is inserted as given.
    async fn record_wrong_answer(&self, miss: &WrongAnswer) -> Result<MissRecord>;

    /// Reconcile a remote wrong answer with the local record sharing its
    /// `(exam_id, question_id)` key.
    ///
    /// Absent locally: inserted verbatim. Otherwise see
    /// [`studyforge_core::merge_wrong_answer`].
    async fn merge_wrong_answer(&self, remote: &WrongAnswer) -> Result<MergeOutcome>;

    // ─────────────────────────────────────────────────────────────────────────
    // Chat History
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_chat_session(&self, session: &ChatSession) -> Result<()>;

    async fn get_chat_session(&self, id: &RecordId) -> Result<Option<ChatSession>>;

    /// All chat sessions, most recently updated first.
    async fn list_chat_sessions(&self) -> Result<Vec<ChatSession>>;

    async fn update_chat_title(&self, id: &RecordId, title: &str, at: Timestamp) -> Result<()>;

    /// Delete a chat session and all of its messages.
    async fn delete_chat_session(&self, id: &RecordId) -> Result<bool>;

    /// Append a message and bump the session's `updated_at`.
    async fn add_chat_message(&self, message: &ChatMessage) -> Result<()>;

    /// Messages of a session, oldest first.
    async fn list_chat_messages(&self, session_id: &RecordId) -> Result<Vec<ChatMessage>>;

    async fn delete_chat_message(&self, id: &RecordId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Metadata
    // ─────────────────────────────────────────────────────────────────────────

    /// Timestamp of the last successful sync, if any.
    async fn get_last_sync(&self) -> Result<Option<Timestamp>>;

    async fn set_last_sync(&self, at: Timestamp) -> Result<()>;

    async fn clear_last_sync(&self) -> Result<()>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: LocalStore {
    /// Sessions that have been submitted.
    fn completed_sessions(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<QuizSession>>> + Send;

    /// Wrong answers of an exam the user has not mastered yet.
    fn unmastered_wrong_answers(
        &self,
        exam_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<WrongAnswer>>> + Send;

    /// Acknowledge mastery of a wrong answer.
    fn mark_mastered(
        &self,
        id: &RecordId,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

impl<S: LocalStore + ?Sized> StoreExt for S {
    async fn completed_sessions(&self) -> Result<Vec<QuizSession>> {
        let sessions = self.list_sessions().await?;
        Ok(sessions.into_iter().filter(|s| s.completed).collect())
    }

    async fn unmastered_wrong_answers(&self, exam_id: &str) -> Result<Vec<WrongAnswer>> {
        let wrongs = self.list_wrong_answers_by_exam(exam_id).await?;
        Ok(wrongs.into_iter().filter(|w| !w.mastered).collect())
    }

    async fn mark_mastered(&self, id: &RecordId) -> Result<()> {
        self.update_wrong_answer(id, &WrongAnswerUpdate::mastered(true))
            .await
    }
}
