//! Login, logout and explicit token refresh.

pub mod cookies;
pub mod guard;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_cookies::Cookies;
use tracing::info;
use uuid::Uuid;

use crate::security::jwt::Identity;
use crate::security::password::verify_password;
use crate::shared::error::ApiError;
use crate::shared::models::{status, Session, User, UserResponse};
use crate::shared::schema::users;
use crate::shared::state::AppState;
use crate::shared::utils::db_conn;

use cookies::{clear_auth_cookies, set_token_pair, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use guard::refresh_session;

/// Deliberately identical for unknown usernames and wrong passwords.
const BAD_CREDENTIALS: &str = "The credentials you entered are incorrect. Please try again.";
const INACTIVE_ACCOUNT: &str =
    "The account is not active. Please contact the administrator if you think this is an error.";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session/refresh", post(refresh))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let mut conn = db_conn(&state.conn)?;

    let user: User = users::table
        .filter(users::username.eq(&payload.username))
        .first(&mut conn)
        .optional()?
        .ok_or(ApiError::Unauthorized(BAD_CREDENTIALS))?;

    if user.status != status::ACTIVE {
        return Err(ApiError::Forbidden(INACTIVE_ACCOUNT));
    }
    if !verify_password(&payload.password, &user.password) {
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
    }

    let session_id = Uuid::new_v4();
    let identity = Identity {
        user_id: user.id,
        username: user.username.clone(),
        role: user.role.clone(),
        session_id,
    };
    let pair = state
        .jwt
        .generate_token_pair(&identity)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let now = Utc::now();
    state
        .sessions
        .create(Session {
            id: session_id,
            user_id: user.id,
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            user_agent,
            expired_at: now + Duration::seconds(pair.refresh_expires_in),
            is_revoked: false,
            created_at: now,
            updated_at: now,
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    set_token_pair(&cookies, &pair, state.config.secure_cookies());
    info!(user_id = %user.id, "user {} logged in", user.username);

    Ok(Json(LoginResponse {
        success: true,
        user: user.into(),
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// Revokes the current session when the access token still decodes, then
/// clears both cookies. Always succeeds so a broken cookie can't strand
/// the client in a logged-in UI state.
async fn logout(State(state): State<Arc<AppState>>, cookies: Cookies) -> Json<Value> {
    if let Some(cookie) = cookies.get(ACCESS_TOKEN_COOKIE) {
        if let Ok(claims) = state.jwt.decode_without_validation(cookie.value()) {
            if let Ok(session_id) = claims.session_id() {
                if state.sessions.revoke(session_id).await.is_ok() {
                    info!(%session_id, "session revoked on logout");
                }
            }
        }
    }
    clear_auth_cookies(&cookies, state.config.secure_cookies());
    Json(json!({ "success": true }))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub access_token: String,
    pub refresh_token: String,
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<Json<RefreshResponse>, ApiError> {
    let token = cookies
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::Unauthorized("Refresh token not found"))?;

    match refresh_session(&state.jwt, state.sessions.as_ref(), &token).await {
        Ok((_, pair)) => {
            set_token_pair(&cookies, &pair, state.config.secure_cookies());
            Ok(Json(RefreshResponse {
                success: true,
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            }))
        }
        Err(err) => {
            clear_auth_cookies(&cookies, state.config.secure_cookies());
            Err(err.into())
        }
    }
}
