//! Server-side session records backing the refresh-token flow.
//!
//! A session is valid only while it is unrevoked and its `expired_at` lies
//! in the future. Revocation and expiry are checked on every refresh.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::shared::models::Session;
use crate::shared::schema::sessions;
use crate::shared::utils::DbPool;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: Session) -> Result<Session>;

    /// Looks up an unrevoked session by its current refresh-token value.
    /// Revoked rows are invisible here by design.
    async fn find_by_refresh_token(&self, refresh_token: &str) -> Result<Option<Session>>;

    /// Persists a rotated token pair and pushes the expiry forward.
    async fn rotate_tokens(
        &self,
        session_id: Uuid,
        access_token: &str,
        refresh_token: &str,
        expired_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn revoke(&self, session_id: Uuid) -> Result<()>;

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<()>;
}

/// Diesel-backed store used in production.
pub struct DbSessionStore {
    pool: DbPool,
}

impl DbSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for DbSessionStore {
    async fn create(&self, session: Session) -> Result<Session> {
        let mut conn = self.pool.get()?;
        diesel::insert_into(sessions::table)
            .values(&session)
            .execute(&mut conn)?;
        Ok(session)
    }

    async fn find_by_refresh_token(&self, refresh_token: &str) -> Result<Option<Session>> {
        let mut conn = self.pool.get()?;
        let session = sessions::table
            .filter(sessions::refresh_token.eq(refresh_token))
            .filter(sessions::is_revoked.eq(false))
            .first::<Session>(&mut conn)
            .optional()?;
        Ok(session)
    }

    async fn rotate_tokens(
        &self,
        session_id: Uuid,
        access_token: &str,
        refresh_token: &str,
        expired_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.pool.get()?;
        diesel::update(sessions::table.filter(sessions::id.eq(session_id)))
            .set((
                sessions::access_token.eq(access_token),
                sessions::refresh_token.eq(refresh_token),
                sessions::expired_at.eq(expired_at),
                sessions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    async fn revoke(&self, session_id: Uuid) -> Result<()> {
        let mut conn = self.pool.get()?;
        diesel::update(sessions::table.filter(sessions::id.eq(session_id)))
            .set((
                sessions::is_revoked.eq(true),
                sessions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<()> {
        let mut conn = self.pool.get()?;
        diesel::update(sessions::table.filter(sessions::user_id.eq(user_id)))
            .set((
                sessions::is_revoked.eq(true),
                sessions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }
}
