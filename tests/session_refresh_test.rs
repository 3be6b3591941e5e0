//! End-to-end coverage of the cookie/session contract, run against an
//! in-memory session store so no database is needed.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::get;
use axum::{middleware, Router};
use chrono::{Duration, Utc};
use tower::ServiceExt;
use tower_cookies::CookieManagerLayer;
use uuid::Uuid;

use deskserver::auth::guard::{session_middleware, AuthGuard};
use deskserver::security::jwt::{Identity, JwtConfig, JwtManager, TokenPair};
use deskserver::session::memory::MemorySessionStore;
use deskserver::session::SessionStore;
use deskserver::shared::models::Session;

const ACCESS_SECRET: &str = "access-secret-for-testing-0123456789abcdef";
const REFRESH_SECRET: &str = "refresh-secret-for-testing-0123456789abcdef";

struct Harness {
    router: Router,
    jwt: Arc<JwtManager>,
    store: Arc<MemorySessionStore>,
}

fn harness() -> Harness {
    let jwt = Arc::new(
        JwtManager::new(JwtConfig::default(), ACCESS_SECRET, REFRESH_SECRET)
            .expect("Failed to create manager"),
    );
    let store = Arc::new(MemorySessionStore::new());
    let guard = AuthGuard {
        jwt: Arc::clone(&jwt),
        sessions: store.clone(),
        secure_cookies: false,
    };

    let router = Router::new()
        .route("/api/protected", get(|| async { "ok" }))
        .route("/main", get(|| async { "main" }))
        .route("/login", get(|| async { "login" }))
        .layer(middleware::from_fn_with_state(guard, session_middleware))
        .layer(CookieManagerLayer::new());

    Harness { router, jwt, store }
}

fn identity(session_id: Uuid) -> Identity {
    Identity {
        user_id: Uuid::new_v4(),
        username: "jdoe".into(),
        role: "admin".into(),
        session_id,
    }
}

async fn seed_session(store: &MemorySessionStore, identity: &Identity, pair: &TokenPair) {
    let now = Utc::now();
    store
        .create(Session {
            id: identity.session_id,
            user_id: identity.user_id,
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            user_agent: "tests".into(),
            expired_at: now + Duration::days(7),
            is_revoked: false,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("Failed to seed session");
}

/// Signs an already-expired access token with the real access secret.
fn expired_access_token(identity: &Identity) -> String {
    let config = JwtConfig {
        access_token_expiry_minutes: -5,
        leeway_seconds: 0,
        ..JwtConfig::default()
    };
    JwtManager::new(config, ACCESS_SECRET, REFRESH_SECRET)
        .expect("Failed to create manager")
        .generate_access_token(identity)
        .expect("Failed to generate")
}

fn request(uri: &str, cookies: &str) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if !cookies.is_empty() {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::empty()).expect("Failed to build request")
}

fn set_cookie_values(response: &axum::response::Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().expect("Invalid header").to_string())
        .collect()
}

fn cookie_value<'a>(set_cookies: &'a [String], name: &str) -> Option<&'a str> {
    set_cookies
        .iter()
        .find(|c| c.starts_with(&format!("{name}=")))
        .and_then(|c| c.split(';').next())
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value)
}

#[tokio::test]
async fn valid_access_token_passes_without_rotation() {
    let h = harness();
    let identity = identity(Uuid::new_v4());
    let pair = h.jwt.generate_token_pair(&identity).expect("Failed to generate");
    seed_session(&h.store, &identity, &pair).await;

    let response = h
        .router
        .oneshot(request(
            "/api/protected",
            &format!("access_token={}", pair.access_token),
        ))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        set_cookie_values(&response).is_empty(),
        "a valid access token must not trigger rotation"
    );
}

#[tokio::test]
async fn expired_access_token_is_silently_refreshed() {
    let h = harness();
    let identity = identity(Uuid::new_v4());
    let pair = h.jwt.generate_token_pair(&identity).expect("Failed to generate");
    seed_session(&h.store, &identity, &pair).await;

    let stale = expired_access_token(&identity);
    let response = h
        .router
        .oneshot(request(
            "/api/protected",
            &format!(
                "access_token={stale}; refresh_token={}",
                pair.refresh_token
            ),
        ))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookie_values(&response);
    let new_access = cookie_value(&cookies, "access_token").expect("Missing access cookie");
    let new_refresh = cookie_value(&cookies, "refresh_token").expect("Missing refresh cookie");
    assert_ne!(new_refresh, pair.refresh_token, "refresh token must rotate");

    // Identity claims survive the rotation.
    let claims = h
        .jwt
        .validate_access_token(new_access)
        .expect("New token invalid");
    assert_eq!(claims.identity().expect("Bad claims"), identity);

    // The session row now holds the rotated pair, so the old refresh
    // token can no longer be replayed.
    let stored = h.store.get(identity.session_id).await.expect("Session gone");
    assert_eq!(stored.refresh_token, new_refresh);
}

#[tokio::test]
async fn revoked_session_is_rejected_and_cookies_cleared() {
    let h = harness();
    let identity = identity(Uuid::new_v4());
    let pair = h.jwt.generate_token_pair(&identity).expect("Failed to generate");
    seed_session(&h.store, &identity, &pair).await;
    h.store.revoke(identity.session_id).await.expect("Failed to revoke");

    let stale = expired_access_token(&identity);
    let response = h
        .router
        .oneshot(request(
            "/api/protected",
            &format!(
                "access_token={stale}; refresh_token={}",
                pair.refresh_token
            ),
        ))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookies = set_cookie_values(&response);
    assert_eq!(cookie_value(&cookies, "access_token"), Some(""));
    assert_eq!(cookie_value(&cookies, "refresh_token"), Some(""));
}

#[tokio::test]
async fn expired_session_row_is_rejected() {
    let h = harness();
    let identity = identity(Uuid::new_v4());
    let pair = h.jwt.generate_token_pair(&identity).expect("Failed to generate");

    let now = Utc::now();
    h.store
        .create(Session {
            id: identity.session_id,
            user_id: identity.user_id,
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            user_agent: "tests".into(),
            expired_at: now - Duration::minutes(1),
            is_revoked: false,
            created_at: now - Duration::days(8),
            updated_at: now - Duration::days(8),
        })
        .await
        .expect("Failed to seed session");

    let response = h
        .router
        .oneshot(request(
            "/api/protected",
            &format!("refresh_token={}", pair.refresh_token),
        ))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stale_session_is_revoked_after_failed_refresh() {
    let h = harness();
    let identity = identity(Uuid::new_v4());
    let pair = h.jwt.generate_token_pair(&identity).expect("Failed to generate");
    seed_session(&h.store, &identity, &pair).await;

    // The refresh token is garbage, but the expired access token still
    // names the session; the orphaned row must be revoked.
    let stale = expired_access_token(&identity);
    let response = h
        .router
        .oneshot(request(
            "/api/protected",
            &format!("access_token={stale}; refresh_token=not.a.jwt"),
        ))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let stored = h.store.get(identity.session_id).await.expect("Session gone");
    assert!(stored.is_revoked);
}

#[tokio::test]
async fn anonymous_api_request_gets_401() {
    let h = harness();
    let response = h
        .router
        .oneshot(request("/api/protected", ""))
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn anonymous_page_request_redirects_to_login() {
    let h = harness();
    let response = h
        .router
        .oneshot(request("/main", ""))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok()),
        Some("/login")
    );
}

#[tokio::test]
async fn authenticated_visit_to_login_bounces_to_main() {
    let h = harness();
    let identity = identity(Uuid::new_v4());
    let pair = h.jwt.generate_token_pair(&identity).expect("Failed to generate");
    seed_session(&h.store, &identity, &pair).await;

    let response = h
        .router
        .oneshot(request(
            "/login",
            &format!("access_token={}", pair.access_token),
        ))
        .await
        .expect("Request failed");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok()),
        Some("/main")
    );
}
