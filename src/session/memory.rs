//! In-memory [`SessionStore`] used by the session-contract tests and local
//! tooling that runs without PostgreSQL.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::SessionStore;
use crate::shared::models::Session;

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: Uuid) -> Option<Session> {
        self.sessions.read().await.get(&session_id).cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: Session) -> Result<Session> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_by_refresh_token(&self, refresh_token: &str) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .find(|s| s.refresh_token == refresh_token && !s.is_revoked)
            .cloned())
    }

    async fn rotate_tokens(
        &self,
        session_id: Uuid,
        access_token: &str,
        refresh_token: &str,
        expired_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(&session_id) {
            session.access_token = access_token.to_string();
            session.refresh_token = refresh_token.to_string();
            session.expired_at = expired_at;
            session.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn revoke(&self, session_id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(&session_id) {
            session.is_revoked = true;
            session.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values_mut().filter(|s| s.user_id == user_id) {
            session.is_revoked = true;
            session.updated_at = Utc::now();
        }
        Ok(())
    }
}
