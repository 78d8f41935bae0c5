//! Persistence boundary.
//!
//! The orchestrator consumes this trait only: append a message, list a
//! chat's messages ordered by creation, touch a project's last-used
//! timestamp. Schema and migrations live elsewhere; [`MemoryStore`] backs
//! tests and single-process deployments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;

use stackforge_core::ids::{ChatId, ProjectId};
use stackforge_core::messages::ChatMessage;

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Chat message and project persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message, returning it with its assigned ID.
    async fn append_message(&self, chat_id: ChatId, message: ChatMessage)
    -> StoreResult<ChatMessage>;

    /// All messages for a chat, ordered by creation time.
    async fn list_messages(&self, chat_id: ChatId) -> StoreResult<Vec<ChatMessage>>;

    /// Record that the project's sandbox was just used.
    async fn touch_project(&self, project_id: ProjectId) -> StoreResult<()>;
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<HashMap<ChatId, Vec<ChatMessage>>>,
    last_used: Mutex<HashMap<ProjectId, DateTime<Utc>>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-used timestamp recorded for a project, if any.
    pub fn last_used(&self, project_id: ProjectId) -> Option<DateTime<Utc>> {
        self.last_used.lock().get(&project_id).copied()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append_message(
        &self,
        chat_id: ChatId,
        mut message: ChatMessage,
    ) -> StoreResult<ChatMessage> {
        message.id = Some(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.messages
            .lock()
            .entry(chat_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, chat_id: ChatId) -> StoreResult<Vec<ChatMessage>> {
        Ok(self
            .messages
            .lock()
            .get(&chat_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn touch_project(&self, project_id: ProjectId) -> StoreResult<()> {
        let _ = self.last_used.lock().insert(project_id, Utc::now());
        Ok(())
    }
}
