use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use deskserver::api_router::build_router;
use deskserver::config::AppConfig;
use deskserver::security::jwt::{JwtConfig, JwtManager};
use deskserver::session::DbSessionStore;
use deskserver::shared::state::AppState;
use deskserver::shared::utils::{create_conn, run_migrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let pool = create_conn(&config.database_url)?;
    run_migrations(&pool)?;
    info!("database ready");

    let jwt = JwtManager::new(
        JwtConfig::default(),
        &config.auth.access_secret,
        &config.auth.refresh_secret,
    )?;

    let state = Arc::new(AppState {
        conn: pool.clone(),
        jwt: Arc::new(jwt),
        sessions: Arc::new(DbSessionStore::new(pool)),
        config,
    });

    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
