//! Auth service: registration, login, logout over cookie-bound sessions.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

use tradeboard_backend::auth::api::{auth_router, AuthApiState, SessionCookieSettings};
use tradeboard_backend::auth::service::AuthService;
use tradeboard_backend::auth::session::RedisSessionStore;
use tradeboard_backend::auth::storage::SqliteAuthStore;
use tradeboard_backend::config::AuthServiceConfig;
use tradeboard_backend::logging::init_tracing;
use tradeboard_backend::store::init_schema;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing("tradeboard_backend=info,tower_http=info");

    let config = AuthServiceConfig::from_env()?;
    init_schema(&config.db_path)?;

    let client =
        redis::Client::open(config.redis_url.as_str()).context("invalid redis url")?;
    let conn = redis::aio::ConnectionManager::new(client)
        .await
        .context("connecting to redis")?;
    let sessions = Arc::new(RedisSessionStore::new(
        conn,
        Duration::minutes(config.session_ttl_minutes),
    ));

    let store = Arc::new(SqliteAuthStore::new(config.db_path.clone()));
    let service = Arc::new(AuthService::new(
        store.clone(),
        store,
        sessions,
        config.starting_balance,
        config.base_currency.clone(),
    ));
    service
        .ensure_seed_user(&config.default_user_email, &config.default_user_password)
        .await
        .context("seeding default user")?;

    let state = AuthApiState {
        service,
        cookies: SessionCookieSettings {
            name: config.session_cookie_name.clone(),
            secure: config.secure_cookies,
            domain: config.session_cookie_domain.clone(),
            ttl_minutes: config.session_ttl_minutes,
        },
    };
    let app = auth_router(state, &config.cors_origins).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.http_host, config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding auth api to {addr}"))?;
    info!(%addr, "auth service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("auth server failed")?;
    Ok(())
}
