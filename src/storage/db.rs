//! Connection pool and schema management.

use std::sync::Arc;
use std::time::Duration;

use log::info;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::core::error::{AppError, AppResult};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Creates the connection pool and brings the schema up to date.
pub fn create_pool(database_path: &str) -> AppResult<Arc<DbPool>> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = Pool::builder()
        .max_size(10)
        .connection_timeout(Duration::from_secs(10))
        .build(manager)?;

    let conn = pool.get()?;
    init_schema(&conn)?;
    info!("Database ready at {}", database_path);

    Ok(Arc::new(pool))
}

/// Checks out a connection from the pool.
pub fn get_connection(pool: &Arc<DbPool>) -> AppResult<DbConnection> {
    pool.get().map_err(AppError::from)
}

/// Creates all tables and indexes. Safe to run on every start.
pub fn init_schema(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS employees (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            telegram_id       INTEGER NOT NULL UNIQUE,
            telegram_username TEXT,
            first_name        TEXT,
            last_name         TEXT,
            start_date        TEXT NOT NULL,
            branch            TEXT,
            department        TEXT,
            position          TEXT,
            language          TEXT NOT NULL DEFAULT 'ru',
            is_active         INTEGER NOT NULL DEFAULT 1,
            created_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS surveys (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            title            TEXT NOT NULL,
            description      TEXT,
            days_after_start INTEGER NOT NULL DEFAULT 90,
            is_active        INTEGER NOT NULL DEFAULT 1,
            created_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS questions (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            survey_id     INTEGER NOT NULL REFERENCES surveys(id) ON DELETE CASCADE,
            question_text TEXT NOT NULL,
            question_type TEXT NOT NULL,
            order_index   INTEGER NOT NULL DEFAULT 0,
            is_required   INTEGER NOT NULL DEFAULT 1
        );

        CREATE INDEX IF NOT EXISTS idx_questions_survey
            ON questions(survey_id, order_index);

        CREATE TABLE IF NOT EXISTS question_options (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            option_text TEXT NOT NULL,
            order_index INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_options_question
            ON question_options(question_id, order_index);

        CREATE TABLE IF NOT EXISTS survey_responses (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            survey_id    INTEGER NOT NULL REFERENCES surveys(id) ON DELETE CASCADE,
            employee_id  INTEGER NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
            status       TEXT NOT NULL DEFAULT 'pending',
            started_at   TEXT NOT NULL DEFAULT (datetime('now')),
            completed_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_responses_survey
            ON survey_responses(survey_id);
        CREATE INDEX IF NOT EXISTS idx_responses_employee
            ON survey_responses(employee_id);

        CREATE TABLE IF NOT EXISTS answers (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            response_id    INTEGER NOT NULL REFERENCES survey_responses(id) ON DELETE CASCADE,
            question_id    INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            answer_text    TEXT,
            answer_options TEXT,
            created_at     TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_answers_response
            ON answers(response_id);

        CREATE TABLE IF NOT EXISTS conversation_state (
            chat_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            bot_id  INTEGER NOT NULL,
            state   TEXT,
            data    TEXT NOT NULL DEFAULT '{}',
            PRIMARY KEY (chat_id, user_id, bot_id)
        );",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn schema_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();

        // Re-running the DDL against a populated database must be a no-op.
        let conn = pool.get().unwrap();
        init_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('employees','surveys','questions','question_options',
                  'survey_responses','answers','conversation_state')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 7);
    }
}
