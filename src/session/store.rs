//! Session store contract
//!
//! Persistence of sessions and message trees belongs to the surrounding
//! session layer; the core consumes this trait for child creation,
//! resumption, and transcript retrieval. `InMemorySessionStore` is the
//! reference implementation used by embedders and tests; it publishes
//! part updates to the event bus the way the real store does.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::core::error::{CoreError, CoreResult};
use crate::core::id;
use crate::runtime::bus::{BusEvent, EventBus};

use super::model::{MessageInfo, MessageWithParts, NewSession, Part, SessionInfo};

/// External collaborator owning session and message persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session
    async fn create(&self, new: NewSession) -> CoreResult<SessionInfo>;

    /// Fetch a session by id
    async fn get(&self, id: &str) -> CoreResult<SessionInfo>;

    /// Replace a session record (workspace pointer writes)
    async fn update(&self, session: SessionInfo) -> CoreResult<()>;

    /// Full transcript of a session, oldest first
    async fn messages(&self, session_id: &str) -> CoreResult<Vec<MessageWithParts>>;

    /// Append a message envelope
    async fn append_message(&self, info: MessageInfo) -> CoreResult<()>;

    /// Create or update a part within a message
    async fn upsert_part(
        &self,
        session_id: &str,
        message_id: &str,
        part: Part,
    ) -> CoreResult<()>;
}

/// In-memory store backed by the event bus
pub struct InMemorySessionStore {
    directory: PathBuf,
    bus: Arc<EventBus>,
    sessions: RwLock<HashMap<String, SessionInfo>>,
    messages: RwLock<HashMap<String, Vec<MessageWithParts>>>,
}

impl InMemorySessionStore {
    pub fn new(directory: impl Into<PathBuf>, bus: Arc<EventBus>) -> Self {
        Self {
            directory: directory.into(),
            bus,
            sessions: RwLock::new(HashMap::new()),
            messages: RwLock::new(HashMap::new()),
        }
    }

    /// Number of sessions ever created (used to assert fail-before-create)
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, new: NewSession) -> CoreResult<SessionInfo> {
        let session = SessionInfo {
            id: id::ascending("session"),
            parent_id: new.parent_id,
            title: new.title,
            directory: new.directory.unwrap_or_else(|| self.directory.clone()),
            permission: new.permission,
            workspace: new.workspace,
            created: Utc::now().timestamp_millis(),
        };
        tracing::debug!(id = %session.id, parent = ?session.parent_id, "session created");
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, id: &str) -> CoreResult<SessionInfo> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::SessionNotFound(id.to_string()))
    }

    async fn update(&self, session: SessionInfo) -> CoreResult<()> {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(&session.id) {
            return Err(CoreError::SessionNotFound(session.id));
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn messages(&self, session_id: &str) -> CoreResult<Vec<MessageWithParts>> {
        Ok(self
            .messages
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_message(&self, info: MessageInfo) -> CoreResult<()> {
        self.messages
            .write()
            .await
            .entry(info.session_id.clone())
            .or_default()
            .push(MessageWithParts {
                info,
                parts: Vec::new(),
            });
        Ok(())
    }

    async fn upsert_part(
        &self,
        session_id: &str,
        message_id: &str,
        part: Part,
    ) -> CoreResult<()> {
        {
            let mut messages = self.messages.write().await;
            let transcript = messages
                .get_mut(session_id)
                .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;
            let message = transcript
                .iter_mut()
                .find(|m| m.info.id == message_id)
                .ok_or_else(|| CoreError::other(format!("message not found: {message_id}")))?;
            match message.parts.iter_mut().find(|p| p.id() == part.id()) {
                Some(existing) => *existing = part.clone(),
                None => message.parts.push(part.clone()),
            }
        }
        self.bus.publish(BusEvent::PartUpdated {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
            part,
        });
        Ok(())
    }
}
