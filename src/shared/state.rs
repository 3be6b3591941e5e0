use std::sync::Arc;

use crate::config::AppConfig;
use crate::security::jwt::JwtManager;
use crate::session::SessionStore;
use crate::shared::utils::DbPool;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub jwt: Arc<JwtManager>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            config: self.config.clone(),
            jwt: Arc::clone(&self.jwt),
            sessions: Arc::clone(&self.sessions),
        }
    }
}
