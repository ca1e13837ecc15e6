//! In-memory implementation of the LocalStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use studyforge_core::{
    merge_session, merge_wrong_answer, ChatMessage, ChatSession, MergeOutcome, MissRecord,
    QuizSession, RecordId, SessionUpdate, Timestamp, WrongAnswer, WrongAnswerKey,
    WrongAnswerUpdate,
};

use crate::error::{Result, StoreError};
use crate::traits::LocalStore;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; every
/// read-modify-write happens under a single write guard.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    sessions: HashMap<RecordId, QuizSession>,

    wrong_answers: HashMap<RecordId, WrongAnswer>,

    /// Natural key index: (exam_id, question_id) -> wrong answer id.
    wrong_by_key: HashMap<WrongAnswerKey, RecordId>,

    chat_sessions: HashMap<RecordId, ChatSession>,

    chat_messages: HashMap<RecordId, ChatMessage>,

    last_sync: Option<Timestamp>,
}

impl MemoryStoreInner {
    fn insert_wrong(&mut self, wrong: &WrongAnswer) -> Result<()> {
        if self.wrong_answers.contains_key(&wrong.id) {
            return Err(StoreError::already_exists("wrong answer", &wrong.id));
        }
        let key = wrong.key();
        if self.wrong_by_key.contains_key(&key) {
            return Err(StoreError::already_exists(
                "wrong answer",
                format!("{}/{}", key.exam_id, key.question_id),
            ));
        }
        self.wrong_by_key.insert(key, wrong.id.clone());
        self.wrong_answers.insert(wrong.id.clone(), wrong.clone());
        Ok(())
    }

    fn wrong_by_key_mut(&mut self, key: &WrongAnswerKey) -> Option<&mut WrongAnswer> {
        let id = self.wrong_by_key.get(key)?;
        self.wrong_answers.get_mut(id)
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn insert_session(&self, session: &QuizSession) -> Result<()> {
        let mut inner = self.write()?;
        if inner.sessions.contains_key(&session.id) {
            return Err(StoreError::already_exists("session", &session.id));
        }
        inner.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &RecordId) -> Result<Option<QuizSession>> {
        let inner = self.read()?;
        Ok(inner.sessions.get(id).cloned())
    }

    async fn update_session(&self, id: &RecordId, update: &SessionUpdate) -> Result<()> {
        let mut inner = self.write()?;
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("session", id))?;
        session.apply(update);
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<QuizSession>> {
        let inner = self.read()?;
        let mut sessions: Vec<QuizSession> = inner.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| (a.start_time, &a.id).cmp(&(b.start_time, &b.id)));
        Ok(sessions)
    }

    async fn list_sessions_by_exam(&self, exam_id: &str) -> Result<Vec<QuizSession>> {
        let mut sessions = self.list_sessions().await?;
        sessions.retain(|s| s.exam_id == exam_id);
        Ok(sessions)
    }

    async fn delete_session(&self, id: &RecordId) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner.sessions.remove(id).is_some())
    }

    async fn merge_session(&self, remote: &QuizSession) -> Result<MergeOutcome> {
        if let Err(e) = remote.validate() {
            tracing::warn!(session = %remote.id, error = %e, "rejected remote session");
            return Ok(MergeOutcome::Rejected);
        }

        let mut inner = self.write()?;
        match inner.sessions.get_mut(&remote.id) {
            None => {
                inner.sessions.insert(remote.id.clone(), remote.clone());
                Ok(MergeOutcome::Inserted)
            }
            Some(local) => match merge_session(local, remote) {
                Some(update) => {
                    local.apply(&update);
                    Ok(MergeOutcome::Updated)
                }
                None => Ok(MergeOutcome::Unchanged),
            },
        }
    }

    async fn insert_wrong_answer(&self, wrong: &WrongAnswer) -> Result<()> {
        let mut inner = self.write()?;
        inner.insert_wrong(wrong)
    }

    async fn get_wrong_answer(&self, id: &RecordId) -> Result<Option<WrongAnswer>> {
        let inner = self.read()?;
        Ok(inner.wrong_answers.get(id).cloned())
    }

    async fn find_wrong_answer(&self, key: &WrongAnswerKey) -> Result<Option<WrongAnswer>> {
        let inner = self.read()?;
        Ok(inner
            .wrong_by_key
            .get(key)
            .and_then(|id| inner.wrong_answers.get(id))
            .cloned())
    }

    async fn update_wrong_answer(&self, id: &RecordId, update: &WrongAnswerUpdate) -> Result<()> {
        let mut inner = self.write()?;
        let wrong = inner
            .wrong_answers
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("wrong answer", id))?;
        wrong.apply(update);
        Ok(())
    }

    async fn list_wrong_answers(&self) -> Result<Vec<WrongAnswer>> {
        let inner = self.read()?;
        let mut wrongs: Vec<WrongAnswer> = inner.wrong_answers.values().cloned().collect();
        wrongs.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(wrongs)
    }

    async fn list_wrong_answers_by_exam(&self, exam_id: &str) -> Result<Vec<WrongAnswer>> {
        let mut wrongs = self.list_wrong_answers().await?;
        wrongs.retain(|w| w.exam_id == exam_id);
        Ok(wrongs)
    }

    async fn delete_wrong_answer(&self, id: &RecordId) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.wrong_answers.remove(id) {
            Some(wrong) => {
                inner.wrong_by_key.remove(&wrong.key());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_wrong_answer(&self, miss: &WrongAnswer) -> Result<MissRecord> {
        let mut inner = self.write()?;
        match inner.wrong_by_key_mut(&miss.key()) {
            Some(existing) => {
                let update = existing.repeat_miss(miss.user_answer.clone(), miss.last_wrong_at);
                existing.apply(&update);
                Ok(MissRecord::Incremented {
                    wrong_count: existing.wrong_count,
                })
            }
            None => {
                inner.insert_wrong(miss)?;
                Ok(MissRecord::Inserted)
            }
        }
    }

    async fn merge_wrong_answer(&self, remote: &WrongAnswer) -> Result<MergeOutcome> {
        let mut inner = self.write()?;
        match inner.wrong_by_key_mut(&remote.key()) {
            Some(local) => match merge_wrong_answer(local, remote) {
                Some(update) => {
                    local.apply(&update);
                    Ok(MergeOutcome::Updated)
                }
                None => Ok(MergeOutcome::Unchanged),
            },
            None => {
                inner.insert_wrong(remote)?;
                Ok(MergeOutcome::Inserted)
            }
        }
    }

    async fn insert_chat_session(&self, session: &ChatSession) -> Result<()> {
        let mut inner = self.write()?;
        if inner.chat_sessions.contains_key(&session.id) {
            return Err(StoreError::already_exists("chat session", &session.id));
        }
        inner.chat_sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_chat_session(&self, id: &RecordId) -> Result<Option<ChatSession>> {
        let inner = self.read()?;
        Ok(inner.chat_sessions.get(id).cloned())
    }

    async fn list_chat_sessions(&self) -> Result<Vec<ChatSession>> {
        let inner = self.read()?;
        let mut sessions: Vec<ChatSession> = inner.chat_sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    async fn update_chat_title(&self, id: &RecordId, title: &str, at: Timestamp) -> Result<()> {
        let mut inner = self.write()?;
        let session = inner
            .chat_sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("chat session", id))?;
        session.title = title.to_string();
        session.updated_at = at;
        Ok(())
    }

    async fn delete_chat_session(&self, id: &RecordId) -> Result<bool> {
        let mut inner = self.write()?;
        let existed = inner.chat_sessions.remove(id).is_some();
        inner.chat_messages.retain(|_, m| &m.session_id != id);
        Ok(existed)
    }

    async fn add_chat_message(&self, message: &ChatMessage) -> Result<()> {
        let mut inner = self.write()?;
        if inner.chat_messages.contains_key(&message.id) {
            return Err(StoreError::already_exists("chat message", &message.id));
        }
        let session = inner
            .chat_sessions
            .get_mut(&message.session_id)
            .ok_or_else(|| StoreError::not_found("chat session", &message.session_id))?;
        session.updated_at = message.timestamp;
        inner
            .chat_messages
            .insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn list_chat_messages(&self, session_id: &RecordId) -> Result<Vec<ChatMessage>> {
        let inner = self.read()?;
        let mut messages: Vec<ChatMessage> = inner
            .chat_messages
            .values()
            .filter(|m| &m.session_id == session_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
        Ok(messages)
    }

    async fn delete_chat_message(&self, id: &RecordId) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner.chat_messages.remove(id).is_some())
    }

    async fn get_last_sync(&self) -> Result<Option<Timestamp>> {
        let inner = self.read()?;
        Ok(inner.last_sync)
    }

    async fn set_last_sync(&self, at: Timestamp) -> Result<()> {
        let mut inner = self.write()?;
        inner.last_sync = Some(at);
        Ok(())
    }

    async fn clear_last_sync(&self) -> Result<()> {
        let mut inner = self.write()?;
        inner.last_sync = None;
        Ok(())
    }
}
