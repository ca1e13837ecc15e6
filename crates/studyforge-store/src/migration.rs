//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;
use studyforge_core::Timestamp;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, Timestamp::now().as_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: quiz progress tables.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per attempt
        CREATE TABLE quiz_sessions (
            id TEXT PRIMARY KEY,              -- device-local id
            global_id TEXT NOT NULL,          -- cross-device id
            exam_id TEXT NOT NULL,
            mode TEXT NOT NULL,               -- 'practice' | 'exam'
            question_ids BLOB NOT NULL,       -- CBOR array, presentation order
            answers BLOB NOT NULL,            -- CBOR map question_id -> answer
            start_time INTEGER NOT NULL,      -- Unix ms
            end_time INTEGER,                 -- Unix ms, set on completion
            score INTEGER,                    -- 0..=100, set on completion
            completed INTEGER NOT NULL DEFAULT 0
        );

        -- At most one row per (exam_id, question_id)
        CREATE TABLE wrong_answers (
            id TEXT PRIMARY KEY,
            global_id TEXT NOT NULL,
            exam_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            user_answer BLOB NOT NULL,        -- CBOR answer
            correct_answer BLOB NOT NULL,     -- CBOR answer
            wrong_count INTEGER NOT NULL,
            last_wrong_at INTEGER NOT NULL,   -- Unix ms
            mastered INTEGER NOT NULL DEFAULT 0,

            UNIQUE(exam_id, question_id)
        );

        -- Sync bookkeeping (last successful sync, ...)
        CREATE TABLE sync_meta (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );

        CREATE INDEX idx_sessions_exam ON quiz_sessions(exam_id);
        CREATE INDEX idx_sessions_global ON quiz_sessions(global_id);
        CREATE INDEX idx_sessions_start ON quiz_sessions(start_time);
        CREATE INDEX idx_wrong_global ON wrong_answers(global_id);
        "#,
    )?;

    Ok(())
}

/// Migration v2: assistant chat history.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE chat_sessions (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            page_context TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE chat_messages (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            role TEXT NOT NULL,               -- 'user' | 'assistant' | 'system'
            content TEXT NOT NULL,
            timestamp INTEGER NOT NULL
        );

        CREATE INDEX idx_chat_sessions_updated ON chat_sessions(updated_at);
        CREATE INDEX idx_chat_messages_session ON chat_messages(session_id, timestamp);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"quiz_sessions".to_string()));
        assert!(tables.contains(&"wrong_answers".to_string()));
        assert!(tables.contains(&"sync_meta".to_string()));
        assert!(tables.contains(&"chat_sessions".to_string()));
        assert!(tables.contains(&"chat_messages".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row(
                "SELECT MAX(version) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }
}
