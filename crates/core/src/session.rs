//! Session context boundary: conversation history, route and preferences
//!
//! The orchestrator only reads and writes session state through
//! [`SessionStore`]. Persistence lives behind the trait; this crate ships an
//! in-memory implementation used by the server and tests.

use crate::entities::Preference;
use crate::error::Result;
use crate::route::RouteState;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Who authored a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// One entry in a session's append-only history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub created_at_ms: u64,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>, created_at_ms: u64) -> Self {
        Self {
            role,
            content: content.into(),
            created_at_ms,
        }
    }
}

/// Read/write operations the orchestrator needs from session persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The last `limit` turns, oldest first
    async fn recent_history(&self, session_id: &str, limit: usize)
        -> Result<Vec<ConversationTurn>>;

    /// Append turns to the end of the history
    async fn append_turns(&self, session_id: &str, turns: Vec<ConversationTurn>) -> Result<()>;

    /// Current route, empty for a new session
    async fn load_route(&self, session_id: &str) -> Result<RouteState>;

    async fn save_route(&self, session_id: &str, route: &RouteState) -> Result<()>;

    /// Record a preference, replacing any earlier value for the same key
    async fn record_preference(&self, session_id: &str, preference: Preference) -> Result<()>;

    async fn preferences(&self, session_id: &str) -> Result<Vec<Preference>>;
}

#[derive(Debug, Default, Clone)]
struct SessionRecord {
    history: Vec<ConversationTurn>,
    route: RouteState,
    preferences: Vec<Preference>,
}

/// Process-local session store backed by a sharded map
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionRecord>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn recent_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|record| {
                let start = record.history.len().saturating_sub(limit);
                record.history[start..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn append_turns(&self, session_id: &str, turns: Vec<ConversationTurn>) -> Result<()> {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .history
            .extend(turns);
        Ok(())
    }

    async fn load_route(&self, session_id: &str) -> Result<RouteState> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|record| record.route.clone())
            .unwrap_or_default())
    }

    async fn save_route(&self, session_id: &str, route: &RouteState) -> Result<()> {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .route = route.clone();
        Ok(())
    }

    async fn record_preference(&self, session_id: &str, preference: Preference) -> Result<()> {
        let mut record = self.sessions.entry(session_id.to_string()).or_default();
        record.preferences.retain(|p| p.key != preference.key);
        record.preferences.push(preference);
        Ok(())
    }

    async fn preferences(&self, session_id: &str) -> Result<Vec<Preference>> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|record| record.preferences.clone())
            .unwrap_or_default())
    }
}
