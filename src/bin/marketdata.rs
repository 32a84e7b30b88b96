//! Market data service: pump loop plus management API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use tradeboard_backend::clock::SystemClock;
use tradeboard_backend::config::MarketDataServiceConfig;
use tradeboard_backend::logging::init_tracing;
use tradeboard_backend::marketdata::instruments::{load_instrument_configs, preset_scenarios};
use tradeboard_backend::marketdata::management::{management_router, ManagementState};
use tradeboard_backend::marketdata::persistence::SqliteMarketStore;
use tradeboard_backend::marketdata::publisher::{
    RedisDealerQuotePublisher, RedisOrderBookPublisher, RedisTickPublisher,
};
use tradeboard_backend::marketdata::retry::RetryPolicy;
use tradeboard_backend::marketdata::runner::MarketDataRunner;
use tradeboard_backend::marketdata::service::MarketDataService;
use tradeboard_backend::store::init_schema;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing("tradeboard_backend=info,tower_http=info");

    let config = MarketDataServiceConfig::from_env()?;
    init_schema(&config.db_path)?;

    let client =
        redis::Client::open(config.redis_url.as_str()).context("invalid redis url")?;
    let conn = redis::aio::ConnectionManager::new(client)
        .await
        .context("connecting to redis")?;

    let instrument_configs = load_instrument_configs(config.instruments_json.as_deref())?;
    let feeds = instrument_configs
        .iter()
        .map(|instrument| instrument.build_feed())
        .collect::<Result<Vec<_>>>()?;
    info!(instruments = feeds.len(), "feeds configured");

    let store = Arc::new(SqliteMarketStore::new(config.db_path.clone()));
    let service = MarketDataService::new(
        feeds,
        Arc::new(RedisTickPublisher::new(conn.clone(), config.tick_stream.clone())),
        store.clone(),
        Arc::new(SystemClock),
    )
    .with_order_books(
        store.clone(),
        Arc::new(RedisOrderBookPublisher::new(
            conn.clone(),
            config.book_stream.clone(),
            config.book_prefix.clone(),
        )),
    )
    .with_dealer_quotes(
        store,
        Arc::new(RedisDealerQuotePublisher::new(
            conn,
            config.quote_stream.clone(),
        )),
    )
    .with_retry_policy(RetryPolicy::new(
        config.retry_attempts,
        Duration::from_millis(config.retry_base_delay_ms),
    ));

    let management_state = ManagementState::new(
        service.tick_cache(),
        service.feed_infos(),
        preset_scenarios(),
    );
    let app = management_router(management_state, &config.cors_origins);

    let addr = format!("{}:{}", config.management_host, config.management_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding management api to {addr}"))?;
    info!(%addr, "management api listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut runner = MarketDataRunner::new(
        service,
        Duration::from_millis(config.pump_interval_ms),
    )?;
    let pump = tokio::spawn(async move { runner.run_until_shutdown(shutdown_rx).await });

    let mut server_shutdown = shutdown_tx.subscribe();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    pump.await.context("joining pump loop")?;
    server.await.context("joining management server")??;
    Ok(())
}
