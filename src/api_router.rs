//! Composes the HTTP surface: public auth endpoints, the protected API
//! modules, and the session middleware that guards them.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::guard::{session_middleware, AuthGuard};
use crate::shared::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let guard = AuthGuard {
        jwt: Arc::clone(&state.jwt),
        sessions: Arc::clone(&state.sessions),
        secure_cookies: state.config.secure_cookies(),
    };

    Router::new()
        .route("/health", get(health))
        .merge(crate::auth::routes())
        .merge(crate::tickets::routes())
        .merge(crate::departments::routes())
        .merge(crate::users::routes())
        .layer(middleware::from_fn_with_state(guard, session_middleware))
        // CookieManagerLayer must wrap the session middleware so the jar
        // exists before the guard runs.
        .layer(CookieManagerLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
