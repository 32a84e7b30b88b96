//! Trading service: session-authenticated order submission.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

use tradeboard_backend::auth::session::RedisSessionStore;
use tradeboard_backend::clock::SystemClock;
use tradeboard_backend::config::TradingServiceConfig;
use tradeboard_backend::logging::init_tracing;
use tradeboard_backend::store::init_schema;
use tradeboard_backend::trading::api::{trading_router, TradingApiState};
use tradeboard_backend::trading::events::RedisExecutionPublisher;
use tradeboard_backend::trading::market_data::RedisBookCacheGateway;
use tradeboard_backend::trading::matching::MatchingEngine;
use tradeboard_backend::trading::order_service::OrderService;
use tradeboard_backend::trading::uow::SqliteUowFactory;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing("tradeboard_backend=info,tower_http=info");

    let config = TradingServiceConfig::from_env()?;
    init_schema(&config.db_path)?;

    let client =
        redis::Client::open(config.redis_url.as_str()).context("invalid redis url")?;
    let conn = redis::aio::ConnectionManager::new(client)
        .await
        .context("connecting to redis")?;

    let order_service = Arc::new(OrderService::new(
        Arc::new(SqliteUowFactory::new(config.db_path.clone())),
        MatchingEngine,
        Arc::new(RedisExecutionPublisher::new(
            conn.clone(),
            config.execution_stream.clone(),
        )),
        Arc::new(SystemClock),
    ));

    let state = TradingApiState {
        order_service,
        market_data: Arc::new(RedisBookCacheGateway::new(
            conn.clone(),
            config.book_prefix.clone(),
        )),
        sessions: Arc::new(RedisSessionStore::new(
            conn,
            Duration::minutes(config.session_ttl_minutes),
        )),
        session_cookie_name: config.session_cookie_name.clone(),
    };
    let app = trading_router(state, &config.cors_origins).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.http_host, config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding trading api to {addr}"))?;
    info!(%addr, "trading service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("trading server failed")?;
    Ok(())
}
