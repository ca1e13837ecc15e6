//! SQLite implementation of the LocalStore trait.
//!
//! This is the primary on-device backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;

use studyforge_core::{
    merge_session, merge_wrong_answer, ChatMessage, ChatRole, ChatSession, GlobalId,
    MergeOutcome, MissRecord, QuizMode, QuizSession, RecordId, SessionUpdate, Timestamp,
    WrongAnswer, WrongAnswerKey, WrongAnswerUpdate,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::LocalStore;

const LAST_SYNC_KEY: &str = "last_sync";

const SESSION_COLUMNS: &str = "id, global_id, exam_id, mode, question_ids, answers, \
     start_time, end_time, score, completed";

const WRONG_COLUMNS: &str = "id, global_id, exam_id, question_id, user_answer, correct_answer, \
     wrong_count, last_wrong_at, mastered";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime. Read-modify-write operations run
/// inside a transaction.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Run a blocking operation inside a transaction, committing on success.
    async fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding helpers
// ─────────────────────────────────────────────────────────────────────────────

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode<T: DeserializeOwned>(bytes: &[u8], idx: usize) -> rusqlite::Result<T> {
    ciborium::from_reader(bytes).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, e.to_string().into())
    })
}

fn parse_text<T>(text: &str, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    text.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.to_string().into())
    })
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuizSession> {
    let mode: String = row.get(3)?;
    let question_ids: Vec<u8> = row.get(4)?;
    let answers: Vec<u8> = row.get(5)?;
    let end_time: Option<i64> = row.get(7)?;
    let score: Option<i64> = row.get(8)?;

    Ok(QuizSession {
        id: RecordId::new(row.get::<_, String>(0)?),
        global_id: GlobalId::new(row.get::<_, String>(1)?),
        exam_id: row.get(2)?,
        mode: parse_text::<QuizMode>(&mode, 3)?,
        question_ids: decode(&question_ids, 4)?,
        answers: decode(&answers, 5)?,
        start_time: Timestamp::from_millis(row.get(6)?),
        end_time: end_time.map(Timestamp::from_millis),
        score: score.map(|s| s.clamp(0, 100) as u8),
        completed: row.get(9)?,
    })
}

fn row_to_wrong_answer(row: &rusqlite::Row<'_>) -> rusqlite::Result<WrongAnswer> {
    let user_answer: Vec<u8> = row.get(4)?;
    let correct_answer: Vec<u8> = row.get(5)?;
    let wrong_count: i64 = row.get(6)?;

    Ok(WrongAnswer {
        id: RecordId::new(row.get::<_, String>(0)?),
        global_id: GlobalId::new(row.get::<_, String>(1)?),
        exam_id: row.get(2)?,
        question_id: row.get(3)?,
        user_answer: decode(&user_answer, 4)?,
        correct_answer: decode(&correct_answer, 5)?,
        wrong_count: wrong_count.clamp(0, u32::MAX as i64) as u32,
        last_wrong_at: Timestamp::from_millis(row.get(7)?),
        mastered: row.get(8)?,
    })
}

fn row_to_chat_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatSession> {
    Ok(ChatSession {
        id: RecordId::new(row.get::<_, String>(0)?),
        title: row.get(1)?,
        page_context: row.get(2)?,
        created_at: Timestamp::from_millis(row.get(3)?),
        updated_at: Timestamp::from_millis(row.get(4)?),
    })
}

fn row_to_chat_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    let role: String = row.get(2)?;
    Ok(ChatMessage {
        id: RecordId::new(row.get::<_, String>(0)?),
        session_id: RecordId::new(row.get::<_, String>(1)?),
        role: parse_text::<ChatRole>(&role, 2)?,
        content: row.get(3)?,
        timestamp: Timestamp::from_millis(row.get(4)?),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Statement helpers (run on the blocking thread)
// ─────────────────────────────────────────────────────────────────────────────

fn select_session(conn: &Connection, id: &RecordId) -> Result<Option<QuizSession>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM quiz_sessions WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id.as_str()], row_to_session)
        .optional()?)
}

fn insert_session_row(conn: &Connection, session: &QuizSession) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM quiz_sessions WHERE id = ?1)",
        params![session.id.as_str()],
        |row| row.get(0),
    )?;
    if exists {
        return Err(StoreError::already_exists("session", &session.id));
    }

    conn.execute(
        "INSERT INTO quiz_sessions (
            id, global_id, exam_id, mode, question_ids, answers,
            start_time, end_time, score, completed
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            session.id.as_str(),
            session.global_id.as_str(),
            session.exam_id,
            session.mode.as_str(),
            encode(&session.question_ids)?,
            encode(&session.answers)?,
            session.start_time.as_millis(),
            session.end_time.map(|t| t.as_millis()),
            session.score.map(i64::from),
            session.completed,
        ],
    )?;
    Ok(())
}

/// Write back the mutable columns of a session.
fn write_session_progress(conn: &Connection, session: &QuizSession) -> Result<()> {
    conn.execute(
        "UPDATE quiz_sessions
         SET answers = ?2, end_time = ?3, score = ?4, completed = ?5
         WHERE id = ?1",
        params![
            session.id.as_str(),
            encode(&session.answers)?,
            session.end_time.map(|t| t.as_millis()),
            session.score.map(i64::from),
            session.completed,
        ],
    )?;
    Ok(())
}

fn select_sessions(conn: &Connection, exam_id: Option<&str>) -> Result<Vec<QuizSession>> {
    let sessions = match exam_id {
        Some(exam_id) => {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM quiz_sessions WHERE exam_id = ?1 ORDER BY start_time, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![exam_id], row_to_session)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM quiz_sessions ORDER BY start_time, id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_session)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(sessions)
}

fn select_wrong_by_id(conn: &Connection, id: &RecordId) -> Result<Option<WrongAnswer>> {
    let sql = format!("SELECT {WRONG_COLUMNS} FROM wrong_answers WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id.as_str()], row_to_wrong_answer)
        .optional()?)
}

fn select_wrong_by_key(conn: &Connection, key: &WrongAnswerKey) -> Result<Option<WrongAnswer>> {
    let sql = format!(
        "SELECT {WRONG_COLUMNS} FROM wrong_answers WHERE exam_id = ?1 AND question_id = ?2"
    );
    Ok(conn
        .query_row(
            &sql,
            params![key.exam_id, key.question_id],
            row_to_wrong_answer,
        )
        .optional()?)
}

fn insert_wrong_row(conn: &Connection, wrong: &WrongAnswer) -> Result<()> {
    if select_wrong_by_id(conn, &wrong.id)?.is_some() {
        return Err(StoreError::already_exists("wrong answer", &wrong.id));
    }
    if select_wrong_by_key(conn, &wrong.key())?.is_some() {
        return Err(StoreError::already_exists(
            "wrong answer",
            format!("{}/{}", wrong.exam_id, wrong.question_id),
        ));
    }

    conn.execute(
        "INSERT INTO wrong_answers (
            id, global_id, exam_id, question_id, user_answer, correct_answer,
            wrong_count, last_wrong_at, mastered
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            wrong.id.as_str(),
            wrong.global_id.as_str(),
            wrong.exam_id,
            wrong.question_id,
            encode(&wrong.user_answer)?,
            encode(&wrong.correct_answer)?,
            i64::from(wrong.wrong_count),
            wrong.last_wrong_at.as_millis(),
            wrong.mastered,
        ],
    )?;
    Ok(())
}

/// Write back the mutable columns of a wrong answer.
fn write_wrong_progress(conn: &Connection, wrong: &WrongAnswer) -> Result<()> {
    conn.execute(
        "UPDATE wrong_answers
         SET user_answer = ?2, wrong_count = ?3, last_wrong_at = ?4, mastered = ?5
         WHERE id = ?1",
        params![
            wrong.id.as_str(),
            encode(&wrong.user_answer)?,
            i64::from(wrong.wrong_count),
            wrong.last_wrong_at.as_millis(),
            wrong.mastered,
        ],
    )?;
    Ok(())
}

fn select_wrongs(conn: &Connection, exam_id: Option<&str>) -> Result<Vec<WrongAnswer>> {
    let wrongs = match exam_id {
        Some(exam_id) => {
            let sql = format!(
                "SELECT {WRONG_COLUMNS} FROM wrong_answers WHERE exam_id = ?1 ORDER BY exam_id, question_id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![exam_id], row_to_wrong_answer)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            let sql = format!("SELECT {WRONG_COLUMNS} FROM wrong_answers ORDER BY exam_id, question_id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_wrong_answer)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(wrongs)
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn insert_session(&self, session: &QuizSession) -> Result<()> {
        let session = session.clone();
        self.with_tx(move |tx| insert_session_row(tx, &session)).await
    }

    async fn get_session(&self, id: &RecordId) -> Result<Option<QuizSession>> {
        let id = id.clone();
        self.with_conn(move |conn| select_session(conn, &id)).await
    }

    async fn update_session(&self, id: &RecordId, update: &SessionUpdate) -> Result<()> {
        let id = id.clone();
        let update = update.clone();

        self.with_tx(move |tx| {
            let mut session =
                select_session(tx, &id)?.ok_or_else(|| StoreError::not_found("session", &id))?;
            session.apply(&update);
            write_session_progress(tx, &session)
        })
        .await
    }

    async fn list_sessions(&self) -> Result<Vec<QuizSession>> {
        self.with_conn(|conn| select_sessions(conn, None)).await
    }

    async fn list_sessions_by_exam(&self, exam_id: &str) -> Result<Vec<QuizSession>> {
        let exam_id = exam_id.to_string();
        self.with_conn(move |conn| select_sessions(conn, Some(&exam_id)))
            .await
    }

    async fn delete_session(&self, id: &RecordId) -> Result<bool> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let n = conn.execute(
                "DELETE FROM quiz_sessions WHERE id = ?1",
                params![id.as_str()],
            )?;
            Ok(n > 0)
        })
        .await
    }

    async fn merge_session(&self, remote: &QuizSession) -> Result<MergeOutcome> {
        if let Err(e) = remote.validate() {
            tracing::warn!(session = %remote.id, error = %e, "rejected remote session");
            return Ok(MergeOutcome::Rejected);
        }
        let remote = remote.clone();

        self.with_tx(move |tx| match select_session(tx, &remote.id)? {
            None => {
                insert_session_row(tx, &remote)?;
                Ok(MergeOutcome::Inserted)
            }
            Some(mut local) => match merge_session(&local, &remote) {
                Some(update) => {
                    local.apply(&update);
                    write_session_progress(tx, &local)?;
                    Ok(MergeOutcome::Updated)
                }
                None => Ok(MergeOutcome::Unchanged),
            },
        })
        .await
    }

    async fn insert_wrong_answer(&self, wrong: &WrongAnswer) -> Result<()> {
        let wrong = wrong.clone();
        self.with_tx(move |tx| insert_wrong_row(tx, &wrong)).await
    }

    async fn get_wrong_answer(&self, id: &RecordId) -> Result<Option<WrongAnswer>> {
        let id = id.clone();
        self.with_conn(move |conn| select_wrong_by_id(conn, &id)).await
    }

    async fn find_wrong_answer(&self, key: &WrongAnswerKey) -> Result<Option<WrongAnswer>> {
        let key = key.clone();
        self.with_conn(move |conn| select_wrong_by_key(conn, &key)).await
    }

    async fn update_wrong_answer(&self, id: &RecordId, update: &WrongAnswerUpdate) -> Result<()> {
        let id = id.clone();
        let update = update.clone();

        self.with_tx(move |tx| {
            let mut wrong = select_wrong_by_id(tx, &id)?
                .ok_or_else(|| StoreError::not_found("wrong answer", &id))?;
            wrong.apply(&update);
            write_wrong_progress(tx, &wrong)
        })
        .await
    }

    async fn list_wrong_answers(&self) -> Result<Vec<WrongAnswer>> {
        self.with_conn(|conn| select_wrongs(conn, None)).await
    }

    async fn list_wrong_answers_by_exam(&self, exam_id: &str) -> Result<Vec<WrongAnswer>> {
        let exam_id = exam_id.to_string();
        self.with_conn(move |conn| select_wrongs(conn, Some(&exam_id)))
            .await
    }

    async fn delete_wrong_answer(&self, id: &RecordId) -> Result<bool> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let n = conn.execute(
                "DELETE FROM wrong_answers WHERE id = ?1",
                params![id.as_str()],
            )?;
            Ok(n > 0)
        })
        .await
    }

    async fn record_wrong_answer(&self, miss: &WrongAnswer) -> Result<MissRecord> {
        let miss = miss.clone();

        self.with_tx(move |tx| match select_wrong_by_key(tx, &miss.key())? {
            Some(mut existing) => {
                let update = existing.repeat_miss(miss.user_answer.clone(), miss.last_wrong_at);
                existing.apply(&update);
                write_wrong_progress(tx, &existing)?;
                Ok(MissRecord::Incremented {
                    wrong_count: existing.wrong_count,
                })
            }
            None => {
                insert_wrong_row(tx, &miss)?;
                Ok(MissRecord::Inserted)
            }
        })
        .await
    }

    async fn merge_wrong_answer(&self, remote: &WrongAnswer) -> Result<MergeOutcome> {
        let remote = remote.clone();

        self.with_tx(move |tx| match select_wrong_by_key(tx, &remote.key())? {
            Some(mut local) => match merge_wrong_answer(&local, &remote) {
                Some(update) => {
                    local.apply(&update);
                    write_wrong_progress(tx, &local)?;
                    Ok(MergeOutcome::Updated)
                }
                None => Ok(MergeOutcome::Unchanged),
            },
            None => {
                insert_wrong_row(tx, &remote)?;
                Ok(MergeOutcome::Inserted)
            }
        })
        .await
    }

    async fn insert_chat_session(&self, session: &ChatSession) -> Result<()> {
        let session = session.clone();

        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO chat_sessions (id, title, page_context, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    session.id.as_str(),
                    session.title,
                    session.page_context,
                    session.created_at.as_millis(),
                    session.updated_at.as_millis(),
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::already_exists("chat session", &session.id));
            }
            Ok(())
        })
        .await
    }

    async fn get_chat_session(&self, id: &RecordId) -> Result<Option<ChatSession>> {
        let id = id.clone();

        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, title, page_context, created_at, updated_at
                     FROM chat_sessions WHERE id = ?1",
                    params![id.as_str()],
                    row_to_chat_session,
                )
                .optional()?)
        })
        .await
    }

    async fn list_chat_sessions(&self) -> Result<Vec<ChatSession>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, page_context, created_at, updated_at
                 FROM chat_sessions ORDER BY updated_at DESC, id",
            )?;
            let sessions = stmt
                .query_map([], row_to_chat_session)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(sessions)
        })
        .await
    }

    async fn update_chat_title(&self, id: &RecordId, title: &str, at: Timestamp) -> Result<()> {
        let id = id.clone();
        let title = title.to_string();

        self.with_conn(move |conn| {
            let n = conn.execute(
                "UPDATE chat_sessions SET title = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.as_str(), title, at.as_millis()],
            )?;
            if n == 0 {
                return Err(StoreError::not_found("chat session", &id));
            }
            Ok(())
        })
        .await
    }

    async fn delete_chat_session(&self, id: &RecordId) -> Result<bool> {
        let id = id.clone();

        self.with_tx(move |tx| {
            tx.execute(
                "DELETE FROM chat_messages WHERE session_id = ?1",
                params![id.as_str()],
            )?;
            let n = tx.execute(
                "DELETE FROM chat_sessions WHERE id = ?1",
                params![id.as_str()],
            )?;
            Ok(n > 0)
        })
        .await
    }

    async fn add_chat_message(&self, message: &ChatMessage) -> Result<()> {
        let message = message.clone();

        self.with_tx(move |tx| {
            let touched = tx.execute(
                "UPDATE chat_sessions SET updated_at = ?2 WHERE id = ?1",
                params![message.session_id.as_str(), message.timestamp.as_millis()],
            )?;
            if touched == 0 {
                return Err(StoreError::not_found("chat session", &message.session_id));
            }
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO chat_messages (id, session_id, role, content, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id.as_str(),
                    message.session_id.as_str(),
                    message.role.as_str(),
                    message.content,
                    message.timestamp.as_millis(),
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::already_exists("chat message", &message.id));
            }
            Ok(())
        })
        .await
    }

    async fn list_chat_messages(&self, session_id: &RecordId) -> Result<Vec<ChatMessage>> {
        let session_id = session_id.clone();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, role, content, timestamp
                 FROM chat_messages WHERE session_id = ?1 ORDER BY timestamp, id",
            )?;
            let messages = stmt
                .query_map(params![session_id.as_str()], row_to_chat_message)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(messages)
        })
        .await
    }

    async fn delete_chat_message(&self, id: &RecordId) -> Result<bool> {
        let id = id.clone();

        self.with_conn(move |conn| {
            let n = conn.execute(
                "DELETE FROM chat_messages WHERE id = ?1",
                params![id.as_str()],
            )?;
            Ok(n > 0)
        })
        .await
    }

    async fn get_last_sync(&self) -> Result<Option<Timestamp>> {
        self.with_conn(|conn| {
            let value: Option<i64> = conn
                .query_row(
                    "SELECT value FROM sync_meta WHERE key = ?1",
                    params![LAST_SYNC_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.map(Timestamp::from_millis))
        })
        .await
    }

    async fn set_last_sync(&self, at: Timestamp) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sync_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![LAST_SYNC_KEY, at.as_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn clear_last_sync(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM sync_meta WHERE key = ?1",
                params![LAST_SYNC_KEY],
            )?;
            Ok(())
        })
        .await
    }
}
