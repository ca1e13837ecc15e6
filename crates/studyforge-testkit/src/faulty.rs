//! A store wrapper that fails on demand.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use studyforge_core::{
    ChatMessage, ChatSession, MergeOutcome, MissRecord, QuizSession, RecordId, SessionUpdate,
    Timestamp, WrongAnswer, WrongAnswerKey, WrongAnswerUpdate,
};
use studyforge_store::{LocalStore, Result, StoreError};

/// Wraps any [`LocalStore`] and rejects reads or writes while the matching
/// switch is on. Everything else is delegated untouched.
pub struct FaultyStore<S> {
    inner: S,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    rejected: AtomicUsize,
}

impl<S: LocalStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            rejected: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Number of calls rejected so far.
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }

    fn check_write(&self, op: &str) -> Result<()> {
        self.check(&self.fail_writes, op)
    }

    fn check_read(&self, op: &str) -> Result<()> {
        self.check(&self.fail_reads, op)
    }

    fn check(&self, switch: &AtomicBool, op: &str) -> Result<()> {
        if switch.load(Ordering::SeqCst) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::WriteRejected(format!("injected failure in {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: LocalStore> LocalStore for FaultyStore<S> {
    async fn insert_session(&self, session: &QuizSession) -> Result<()> {
        self.check_write("insert_session")?;
        self.inner.insert_session(session).await
    }

    async fn get_session(&self, id: &RecordId) -> Result<Option<QuizSession>> {
        self.check_read("get_session")?;
        self.inner.get_session(id).await
    }

    async fn update_session(&self, id: &RecordId, update: &SessionUpdate) -> Result<()> {
        self.check_write("update_session")?;
        self.inner.update_session(id, update).await
    }

    async fn list_sessions(&self) -> Result<Vec<QuizSession>> {
        self.check_read("list_sessions")?;
        self.inner.list_sessions().await
    }

    async fn list_sessions_by_exam(&self, exam_id: &str) -> Result<Vec<QuizSession>> {
        self.check_read("list_sessions_by_exam")?;
        self.inner.list_sessions_by_exam(exam_id).await
    }

    async fn delete_session(&self, id: &RecordId) -> Result<bool> {
        self.check_write("delete_session")?;
        self.inner.delete_session(id).await
    }

    async fn merge_session(&self, remote: &QuizSession) -> Result<MergeOutcome> {
        self.check_write("merge_session")?;
        self.inner.merge_session(remote).await
    }

    async fn insert_wrong_answer(&self, wrong: &WrongAnswer) -> Result<()> {
        self.check_write("insert_wrong_answer")?;
        self.inner.insert_wrong_answer(wrong).await
    }

    async fn get_wrong_answer(&self, id: &RecordId) -> Result<Option<WrongAnswer>> {
        self.check_read("get_wrong_answer")?;
        self.inner.get_wrong_answer(id).await
    }

    async fn find_wrong_answer(&self, key: &WrongAnswerKey) -> Result<Option<WrongAnswer>> {
        self.check_read("find_wrong_answer")?;
        self.inner.find_wrong_answer(key).await
    }

    async fn update_wrong_answer(&self, id: &RecordId, update: &WrongAnswerUpdate) -> Result<()> {
        self.check_write("update_wrong_answer")?;
        self.inner.update_wrong_answer(id, update).await
    }

    async fn list_wrong_answers(&self) -> Result<Vec<WrongAnswer>> {
        self.check_read("list_wrong_answers")?;
        self.inner.list_wrong_answers().await
    }

    async fn list_wrong_answers_by_exam(&self, exam_id: &str) -> Result<Vec<WrongAnswer>> {
        self.check_read("list_wrong_answers_by_exam")?;
        self.inner.list_wrong_answers_by_exam(exam_id).await
    }

    async fn delete_wrong_answer(&self, id: &RecordId) -> Result<bool> {
        self.check_write("delete_wrong_answer")?;
        self.inner.delete_wrong_answer(id).await
    }

    async fn record_wrong_answer(&self, miss: &WrongAnswer) -> Result<MissRecord> {
        self.check_write("record_wrong_answer")?;
        self.inner.record_wrong_answer(miss).await
    }

    async fn merge_wrong_answer(&self, remote: &WrongAnswer) -> Result<MergeOutcome> {
        self.check_write("merge_wrong_answer")?;
        self.inner.merge_wrong_answer(remote).await
    }

    async fn insert_chat_session(&self, session: &ChatSession) -> Result<()> {
        self.check_write("insert_chat_session")?;
        self.inner.insert_chat_session(session).await
    }

    async fn get_chat_session(&self, id: &RecordId) -> Result<Option<ChatSession>> {
        self.check_read("get_chat_session")?;
        self.inner.get_chat_session(id).await
    }

    async fn list_chat_sessions(&self) -> Result<Vec<ChatSession>> {
        self.check_read("list_chat_sessions")?;
        self.inner.list_chat_sessions().await
    }

    async fn update_chat_title(&self, id: &RecordId, title: &str, at: Timestamp) -> Result<()> {
        self.check_write("update_chat_title")?;
        self.inner.update_chat_title(id, title, at).await
    }

    async fn delete_chat_session(&self, id: &RecordId) -> Result<bool> {
        self.check_write("delete_chat_session")?;
        self.inner.delete_chat_session(id).await
    }

    async fn add_chat_message(&self, message: &ChatMessage) -> Result<()> {
        self.check_write("add_chat_message")?;
        self.inner.add_chat_message(message).await
    }

    async fn list_chat_messages(&self, session_id: &RecordId) -> Result<Vec<ChatMessage>> {
        self.check_read("list_chat_messages")?;
        self.inner.list_chat_messages(session_id).await
    }

    async fn delete_chat_message(&self, id: &RecordId) -> Result<bool> {
        self.check_write("delete_chat_message")?;
        self.inner.delete_chat_message(id).await
    }

    async fn get_last_sync(&self) -> Result<Option<Timestamp>> {
        self.check_read("get_last_sync")?;
        self.inner.get_last_sync().await
    }

    async fn set_last_sync(&self, at: Timestamp) -> Result<()> {
        self.check_write("set_last_sync")?;
        self.inner.set_last_sync(at).await
    }

    async fn clear_last_sync(&self) -> Result<()> {
        self.check_write("clear_last_sync")?;
        self.inner.clear_last_sync().await
    }
}
