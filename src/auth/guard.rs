//! Session middleware: authenticates every request from the token cookies
//! and silently rotates the pair when the access token has lapsed but the
//! refresh token still maps to a live session.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::{Duration, Utc};
use thiserror::Error;
use tower_cookies::Cookies;
use tracing::{debug, warn};
use uuid::Uuid;

use super::cookies::{clear_auth_cookies, set_token_pair, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::security::jwt::{Identity, JwtManager, TokenPair};
use crate::session::SessionStore;
use crate::shared::error::ApiError;

/// Everything the middleware needs, detached from [`AppState`] so the
/// session contract can be exercised against an in-memory store.
///
/// [`AppState`]: crate::shared::state::AppState
#[derive(Clone)]
pub struct AuthGuard {
    pub jwt: Arc<JwtManager>,
    pub sessions: Arc<dyn SessionStore>,
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Reachable with or without a session.
    Public,
    /// Login and signup pages; authenticated visitors get bounced to /main.
    Auth,
    /// Requires a valid session.
    Protected,
}

const PUBLIC_ROUTES: &[&str] = &[
    "/health",
    "/api/auth/login",
    "/api/auth/session/refresh",
    "/api/users/check-username",
];

const AUTH_ROUTES: &[&str] = &["/login", "/create-account"];

pub fn classify_route(path: &str) -> RouteClass {
    if PUBLIC_ROUTES.contains(&path) {
        return RouteClass::Public;
    }
    if AUTH_ROUTES.iter().any(|route| path.starts_with(route)) {
        return RouteClass::Auth;
    }
    if path.starts_with("/api") || path.starts_with("/main") {
        return RouteClass::Protected;
    }
    RouteClass::Public
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Invalid refresh token")]
    InvalidToken,
    #[error("Session not found or revoked")]
    SessionNotFound,
    #[error("Session expired")]
    SessionExpired,
    #[error("{0}")]
    Internal(String),
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::InvalidToken => ApiError::Unauthorized("Invalid refresh token"),
            RefreshError::SessionNotFound => {
                ApiError::Unauthorized("Session not found or revoked")
            }
            RefreshError::SessionExpired => ApiError::Unauthorized("Session expired"),
            RefreshError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

/// The refresh contract, shared by the middleware and the explicit
/// `/api/auth/session/refresh` endpoint.
///
/// A refresh token is honored only when its signature verifies, an
/// unrevoked session row still holds that exact token value, and the
/// session itself has not passed its expiry. The new pair carries the
/// same identity claims as the old one.
pub async fn refresh_session(
    jwt: &JwtManager,
    sessions: &dyn SessionStore,
    refresh_token: &str,
) -> Result<(Identity, TokenPair), RefreshError> {
    let claims = jwt
        .validate_refresh_token(refresh_token)
        .map_err(|_| RefreshError::InvalidToken)?;

    let session = sessions
        .find_by_refresh_token(refresh_token)
        .await
        .map_err(|e| RefreshError::Internal(e.to_string()))?
        .ok_or(RefreshError::SessionNotFound)?;

    if session.expired_at <= Utc::now() {
        return Err(RefreshError::SessionExpired);
    }

    let identity = claims
        .identity()
        .map_err(|_| RefreshError::InvalidToken)?;
    let pair = jwt
        .generate_token_pair(&identity)
        .map_err(|e| RefreshError::Internal(e.to_string()))?;

    sessions
        .rotate_tokens(
            session.id,
            &pair.access_token,
            &pair.refresh_token,
            Utc::now() + Duration::seconds(pair.refresh_expires_in),
        )
        .await
        .map_err(|e| RefreshError::Internal(e.to_string()))?;

    Ok((identity, pair))
}

pub async fn session_middleware(
    State(guard): State<AuthGuard>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let class = classify_route(&path);

    let access_token = cookies
        .get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_string());
    let refresh_token = cookies
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string());

    let mut identity: Option<Identity> = None;
    // Session id recovered from a stale access token, revoked on rejection
    // so the orphaned row cannot be replayed later.
    let mut stale_session: Option<Uuid> = None;

    if let Some(token) = access_token.as_deref() {
        match guard.jwt.validate_access_token(token) {
            Ok(claims) => identity = claims.identity().ok(),
            Err(_) => {
                stale_session = guard
                    .jwt
                    .decode_without_validation(token)
                    .ok()
                    .and_then(|claims| claims.session_id().ok());
            }
        }
    }

    if identity.is_none() {
        if let Some(token) = refresh_token.as_deref() {
            match refresh_session(&guard.jwt, guard.sessions.as_ref(), token).await {
                Ok((refreshed, pair)) => {
                    debug!(
                        session_id = %refreshed.session_id,
                        "rotated token pair for {}", refreshed.username
                    );
                    set_token_pair(&cookies, &pair, guard.secure_cookies);
                    identity = Some(refreshed);
                }
                Err(err) => {
                    warn!("token refresh rejected: {err}");
                    clear_auth_cookies(&cookies, guard.secure_cookies);
                    if let Some(session_id) = stale_session {
                        if let Err(e) = guard.sessions.revoke(session_id).await {
                            warn!("failed to revoke stale session {session_id}: {e}");
                        }
                    }
                }
            }
        } else if access_token.is_some() {
            // Broken access token and nothing to refresh with.
            clear_auth_cookies(&cookies, guard.secure_cookies);
        }
    }

    if let Some(identity) = identity.clone() {
        request.extensions_mut().insert(identity);
    }

    match (class, identity.is_some()) {
        (RouteClass::Protected, false) => deny(&path),
        (RouteClass::Auth, true) => Redirect::to("/main").into_response(),
        _ => next.run(request).await,
    }
}

/// API callers get a 401 body; page navigations get a 303 to the login page.
fn deny(path: &str) -> Response {
    if path.starts_with("/api") {
        ApiError::Unauthorized("Authentication required").into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}

/// Authenticated identity for the current request, inserted by
/// [`session_middleware`]. Rejects with 401 when the middleware did not run
/// or did not authenticate.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or(ApiError::Unauthorized("Authentication required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::jwt::JwtConfig;
    use crate::session::memory::MemorySessionStore;
    use crate::shared::models::Session;

    const ACCESS_SECRET: &str = "access-secret-for-testing-0123456789abcdef";
    const REFRESH_SECRET: &str = "refresh-secret-for-testing-0123456789abcdef";

    fn manager() -> JwtManager {
        JwtManager::new(JwtConfig::default(), ACCESS_SECRET, REFRESH_SECRET)
            .expect("Failed to create manager")
    }

    fn identity(session_id: Uuid) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            username: "jdoe".into(),
            role: "admin".into(),
            session_id,
        }
    }

    fn session_row(session_id: Uuid, identity: &Identity, refresh_token: &str) -> Session {
        let now = Utc::now();
        Session {
            id: session_id,
            user_id: identity.user_id,
            access_token: "stale".into(),
            refresh_token: refresh_token.to_string(),
            user_agent: "tests".into(),
            expired_at: now + Duration::days(7),
            is_revoked: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_route_classification() {
        assert_eq!(classify_route("/health"), RouteClass::Public);
        assert_eq!(classify_route("/api/auth/login"), RouteClass::Public);
        assert_eq!(classify_route("/api/auth/session/refresh"), RouteClass::Public);
        assert_eq!(classify_route("/login"), RouteClass::Auth);
        assert_eq!(classify_route("/create-account"), RouteClass::Auth);
        assert_eq!(classify_route("/main"), RouteClass::Protected);
        assert_eq!(classify_route("/main/tickets"), RouteClass::Protected);
        assert_eq!(classify_route("/api/tickets"), RouteClass::Protected);
        assert_eq!(classify_route("/api/users/check-username"), RouteClass::Public);
        assert_eq!(classify_route("/"), RouteClass::Public);
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_preserves_identity() {
        let jwt = manager();
        let store = MemorySessionStore::new();
        let session_id = Uuid::new_v4();
        let identity = identity(session_id);

        let pair = jwt.generate_token_pair(&identity).expect("Failed to generate");
        store
            .create(session_row(session_id, &identity, &pair.refresh_token))
            .await
            .expect("Failed to create session");

        let (refreshed, new_pair) = refresh_session(&jwt, &store, &pair.refresh_token)
            .await
            .expect("Refresh failed");

        assert_eq!(refreshed, identity);
        let stored = store.get(session_id).await.expect("Session missing");
        assert_eq!(stored.refresh_token, new_pair.refresh_token);
        assert_eq!(stored.access_token, new_pair.access_token);
    }

    #[tokio::test]
    async fn test_refresh_rejects_revoked_session() {
        let jwt = manager();
        let store = MemorySessionStore::new();
        let session_id = Uuid::new_v4();
        let identity = identity(session_id);

        let pair = jwt.generate_token_pair(&identity).expect("Failed to generate");
        store
            .create(session_row(session_id, &identity, &pair.refresh_token))
            .await
            .expect("Failed to create session");
        store.revoke(session_id).await.expect("Failed to revoke");

        let err = refresh_session(&jwt, &store, &pair.refresh_token)
            .await
            .expect_err("Revoked session must not refresh");
        assert!(matches!(err, RefreshError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_refresh_rejects_expired_session_row() {
        let jwt = manager();
        let store = MemorySessionStore::new();
        let session_id = Uuid::new_v4();
        let identity = identity(session_id);

        let pair = jwt.generate_token_pair(&identity).expect("Failed to generate");
        let mut row = session_row(session_id, &identity, &pair.refresh_token);
        row.expired_at = Utc::now() - Duration::minutes(1);
        store.create(row).await.expect("Failed to create session");

        let err = refresh_session(&jwt, &store, &pair.refresh_token)
            .await
            .expect_err("Expired session must not refresh");
        assert!(matches!(err, RefreshError::SessionExpired));
    }

    #[tokio::test]
    async fn test_refresh_rejects_unknown_token() {
        let jwt = manager();
        let store = MemorySessionStore::new();
        let identity = identity(Uuid::new_v4());

        // Signed correctly, but no session row holds this value.
        let pair = jwt.generate_token_pair(&identity).expect("Failed to generate");
        let err = refresh_session(&jwt, &store, &pair.refresh_token)
            .await
            .expect_err("Unknown token must not refresh");
        assert!(matches!(err, RefreshError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_refresh_rejects_forged_token() {
        let jwt = manager();
        let store = MemorySessionStore::new();
        let err = refresh_session(&jwt, &store, "not.a.jwt")
            .await
            .expect_err("Garbage must not refresh");
        assert!(matches!(err, RefreshError::InvalidToken));
    }
}
