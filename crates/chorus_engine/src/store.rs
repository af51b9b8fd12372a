//! Conversation persistence.
//!
//! One row per conversation, whole transcript as a JSON payload. SQLite
//! work runs on the blocking pool; the connection sits behind an async
//! mutex so saves from concurrent requests serialize cleanly.

use async_trait::async_trait;
use chorus_common::error::ChorusError;
use chorus_common::message::Conversation;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn save(&self, conversation: &Conversation) -> Result<(), ChorusError>;

    /// `Ok(None)` means the conversation was never saved; an `Err` means
    /// the store has it but cannot return it.
    async fn load(&self, id: &str) -> Result<Option<Conversation>, ChorusError>;
}

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ChorusError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, ChorusError> {
            let conn = Connection::open(&path)
                .map_err(|e| ChorusError::Store(format!("failed to open database: {e}")))?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| ChorusError::Store(format!("failed to set journal mode: {e}")))?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(|e| ChorusError::Store(format!("failed to set synchronous: {e}")))?;
            Ok(conn)
        })
        .await
        .map_err(|e| ChorusError::Store(format!("database open task failed: {e}")))??;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema().await?;
        info!("conversation store ready");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ChorusError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<(), ChorusError> {
            let conn = conn.blocking_lock();
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS conversations (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    started_at TEXT NOT NULL,
                    payload TEXT NOT NULL
                )",
            )
            .map_err(|e| ChorusError::Store(format!("failed to create schema: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| ChorusError::Store(format!("schema task failed: {e}")))?
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn save(&self, conversation: &Conversation) -> Result<(), ChorusError> {
        let id = conversation.id.clone();
        let title = conversation.title.clone();
        let started_at = conversation.started_at.to_rfc3339();
        let payload = serde_json::to_string(conversation)?;

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<(), ChorusError> {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT OR REPLACE INTO conversations (id, title, started_at, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, title, started_at, payload],
            )
            .map_err(|e| ChorusError::Store(format!("failed to save conversation: {e}")))?;
            debug!(conversation = %id, "conversation saved");
            Ok(())
        })
        .await
        .map_err(|e| ChorusError::Store(format!("save task failed: {e}")))?
    }

    async fn load(&self, id: &str) -> Result<Option<Conversation>, ChorusError> {
        let id = id.to_string();
        let conn = self.conn.clone();
        let payload = tokio::task::spawn_blocking(move || -> Result<Option<String>, ChorusError> {
            let conn = conn.blocking_lock();
            conn.query_row(
                "SELECT payload FROM conversations WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ChorusError::Store(format!("failed to load conversation: {e}")))
        })
        .await
        .map_err(|e| ChorusError::Store(format!("load task failed: {e}")))??;

        match payload {
            Some(payload) => {
                let conversation = serde_json::from_str(&payload).map_err(|e| {
                    ChorusError::Store(format!("corrupt conversation payload: {e}"))
                })?;
                Ok(Some(conversation))
            }
            None => Ok(None),
        }
    }
}

/// In-memory store for tests and ephemeral sessions. Payloads go through
/// the same serialization as the SQLite store.
#[derive(Default)]
pub struct MemoryStore {
    conversations: Arc<std::sync::Mutex<HashMap<String, String>>>,
    fail_saves: bool,
    fail_loads: bool,
    save_count: Arc<std::sync::Mutex<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_saves() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn failing_loads() -> Self {
        Self {
            fail_loads: true,
            ..Self::default()
        }
    }

    pub fn save_count(&self) -> u64 {
        *self.save_count.lock().unwrap()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.conversations.lock().unwrap().contains_key(id)
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn save(&self, conversation: &Conversation) -> Result<(), ChorusError> {
        *self.save_count.lock().unwrap() += 1;
        if self.fail_saves {
            return Err(ChorusError::Store("memory store save disabled".to_string()));
        }
        let payload = serde_json::to_string(conversation)?;
        self.conversations
            .lock()
            .unwrap()
            .insert(conversation.id.clone(), payload);
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Conversation>, ChorusError> {
        if self.fail_loads {
            return Err(ChorusError::Store("memory store load disabled".to_string()));
        }
        let payload = self.conversations.lock().unwrap().get(id).cloned();
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}
