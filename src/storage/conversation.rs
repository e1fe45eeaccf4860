//! Durable per-user conversation rows.
//!
//! One row per (chat, user, bot); `state` holds the state tag (NULL when
//! idle), `data` a JSON object. Writes are single atomic upserts so the
//! untouched column always survives, and busy/locked errors are retried with
//! capped exponential backoff. Rows are never deleted: `clear` overwrites the
//! whole row with the idle shape.

use std::sync::Arc;

use log::warn;
use rusqlite::{params, OptionalExtension};
use serde_json::{Map, Value};

use crate::core::config::storage_retry;
use crate::core::error::{AppError, AppResult};
use crate::storage::db::{get_connection, DbPool};

/// Identity of one conversation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub chat_id: i64,
    pub user_id: i64,
    pub bot_id: i64,
}

impl ConversationKey {
    pub fn new(chat_id: i64, user_id: i64, bot_id: i64) -> Self {
        Self { chat_id, user_id, bot_id }
    }
}

/// Pool-backed store for conversation rows.
#[derive(Clone)]
pub struct ConversationStore {
    pool: Arc<DbPool>,
}

impl ConversationStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Current state tag, `None` when the row is absent or idle.
    pub async fn get_state(&self, key: &ConversationKey) -> AppResult<Option<String>> {
        let key = *key;
        self.with_retry(move |store| {
            let conn = get_connection(&store.pool)?;
            let state: Option<Option<String>> = conn
                .query_row(
                    "SELECT state FROM conversation_state
                     WHERE chat_id = ?1 AND user_id = ?2 AND bot_id = ?3",
                    params![key.chat_id, key.user_id, key.bot_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(state.flatten())
        })
        .await
    }

    /// Sets the state tag, leaving `data` untouched.
    pub async fn set_state(&self, key: &ConversationKey, state: Option<&str>) -> AppResult<()> {
        let key = *key;
        let state = state.map(str::to_owned);
        self.with_retry(move |store| {
            let conn = get_connection(&store.pool)?;
            conn.execute(
                "INSERT INTO conversation_state (chat_id, user_id, bot_id, state)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(chat_id, user_id, bot_id) DO UPDATE SET state = excluded.state",
                params![key.chat_id, key.user_id, key.bot_id, state],
            )?;
            Ok(())
        })
        .await
    }

    /// The JSON data blob; `{}` when the row is absent.
    pub async fn get_data(&self, key: &ConversationKey) -> AppResult<Value> {
        let key = *key;
        self.with_retry(move |store| {
            let conn = get_connection(&store.pool)?;
            let raw: Option<String> = conn
                .query_row(
                    "SELECT data FROM conversation_state
                     WHERE chat_id = ?1 AND user_id = ?2 AND bot_id = ?3",
                    params![key.chat_id, key.user_id, key.bot_id],
                    |row| row.get(0),
                )
                .optional()?;

            match raw {
                Some(json) => Ok(serde_json::from_str(&json)?),
                None => Ok(Value::Object(Map::new())),
            }
        })
        .await
    }

    /// Replaces the data blob, leaving `state` untouched.
    pub async fn set_data(&self, key: &ConversationKey, data: &Value) -> AppResult<()> {
        let key = *key;
        let json = serde_json::to_string(data)?;
        self.with_retry(move |store| {
            let conn = get_connection(&store.pool)?;
            conn.execute(
                "INSERT INTO conversation_state (chat_id, user_id, bot_id, data)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(chat_id, user_id, bot_id) DO UPDATE SET data = excluded.data",
                params![key.chat_id, key.user_id, key.bot_id, json],
            )?;
            Ok(())
        })
        .await
    }

    /// Shallow-merges `patch` into the stored blob and returns the merged
    /// object. Read and write happen inside one transaction.
    pub async fn update_data(&self, key: &ConversationKey, patch: &Map<String, Value>) -> AppResult<Value> {
        let key = *key;
        let patch = patch.clone();
        self.with_retry(move |store| {
            let mut conn = get_connection(&store.pool)?;
            let tx = conn.transaction()?;

            let raw: Option<String> = tx
                .query_row(
                    "SELECT data FROM conversation_state
                     WHERE chat_id = ?1 AND user_id = ?2 AND bot_id = ?3",
                    params![key.chat_id, key.user_id, key.bot_id],
                    |row| row.get(0),
                )
                .optional()?;

            let mut merged: Map<String, Value> = match raw {
                Some(json) => serde_json::from_str(&json)?,
                None => Map::new(),
            };
            for (k, v) in patch.iter() {
                merged.insert(k.clone(), v.clone());
            }

            let json = serde_json::to_string(&Value::Object(merged.clone()))?;
            tx.execute(
                "INSERT INTO conversation_state (chat_id, user_id, bot_id, data)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(chat_id, user_id, bot_id) DO UPDATE SET data = excluded.data",
                params![key.chat_id, key.user_id, key.bot_id, json],
            )?;
            tx.commit()?;

            Ok(Value::Object(merged))
        })
        .await
    }

    /// Resets the row to the idle shape (state NULL, data `{}`), keeping the
    /// row itself.
    pub async fn clear(&self, key: &ConversationKey) -> AppResult<()> {
        let key = *key;
        self.with_retry(move |store| {
            let conn = get_connection(&store.pool)?;
            conn.execute(
                "INSERT INTO conversation_state (chat_id, user_id, bot_id, state, data)
                 VALUES (?1, ?2, ?3, NULL, '{}')
                 ON CONFLICT(chat_id, user_id, bot_id)
                 DO UPDATE SET state = NULL, data = '{}'",
                params![key.chat_id, key.user_id, key.bot_id],
            )?;
            Ok(())
        })
        .await
    }

    /// Runs `op`, retrying on SQLITE_BUSY / SQLITE_LOCKED with backoff.
    async fn with_retry<T, F>(&self, op: F) -> AppResult<T>
    where
        F: Fn(&Self) -> AppResult<T>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op(self) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_contention() => {
                    attempt += 1;
                    if attempt >= storage_retry::MAX_ATTEMPTS {
                        return Err(AppError::StorageContention { attempts: attempt });
                    }
                    let delay = storage_retry::delay_for_attempt(attempt);
                    warn!("conversation store busy (attempt {}), retrying in {:?}", attempt, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::create_pool;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn test_store() -> (tempfile::TempDir, ConversationStore) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fsm.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        (dir, ConversationStore::new(pool))
    }

    fn key() -> ConversationKey {
        ConversationKey::new(10, 10, 1)
    }

    #[tokio::test]
    async fn missing_row_reads_as_idle() {
        let (_dir, store) = test_store();

        assert_eq!(store.get_state(&key()).await.unwrap(), None);
        assert_eq!(store.get_data(&key()).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn set_state_preserves_data() {
        let (_dir, store) = test_store();

        store.set_data(&key(), &json!({"survey_id": 5})).await.unwrap();
        store.set_state(&key(), Some("awaiting_text_answer")).await.unwrap();

        assert_eq!(store.get_state(&key()).await.unwrap().as_deref(), Some("awaiting_text_answer"));
        assert_eq!(store.get_data(&key()).await.unwrap(), json!({"survey_id": 5}));
    }

    #[tokio::test]
    async fn set_data_preserves_state() {
        let (_dir, store) = test_store();

        store.set_state(&key(), Some("selecting_multiple_options")).await.unwrap();
        store.set_data(&key(), &json!({"selected_option_ids": [1, 2]})).await.unwrap();

        assert_eq!(
            store.get_state(&key()).await.unwrap().as_deref(),
            Some("selecting_multiple_options")
        );
    }

    #[tokio::test]
    async fn update_data_merges_shallowly() {
        let (_dir, store) = test_store();

        store
            .set_data(&key(), &json!({"survey_id": 5, "current_question_index": 0}))
            .await
            .unwrap();

        let mut patch = Map::new();
        patch.insert("current_question_index".to_string(), json!(1));
        patch.insert("selected_option_ids".to_string(), json!([7]));
        let merged = store.update_data(&key(), &patch).await.unwrap();

        assert_eq!(
            merged,
            json!({"survey_id": 5, "current_question_index": 1, "selected_option_ids": [7]})
        );
        assert_eq!(store.get_data(&key()).await.unwrap(), merged);
    }

    #[tokio::test]
    async fn clear_resets_row_without_deleting_it() {
        let (_dir, store) = test_store();

        store.set_state(&key(), Some("awaiting_single_choice")).await.unwrap();
        store.set_data(&key(), &json!({"survey_id": 5})).await.unwrap();
        store.clear(&key()).await.unwrap();

        assert_eq!(store.get_state(&key()).await.unwrap(), None);
        assert_eq!(store.get_data(&key()).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let (_dir, store) = test_store();
        let other = ConversationKey::new(20, 20, 1);

        store.set_state(&key(), Some("awaiting_text_answer")).await.unwrap();

        assert_eq!(store.get_state(&other).await.unwrap(), None);
    }
}
