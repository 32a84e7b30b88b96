//! Read-only management surface for the market data service.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::instruments::ScenarioSettings;
use super::models::TickEvent;
use super::service::{FeedInfo, LastTickCache};

#[derive(Clone)]
pub struct ManagementState {
    tick_cache: LastTickCache,
    feeds: Arc<Vec<FeedInfo>>,
    scenarios: Arc<HashMap<String, ScenarioSettings>>,
}

impl ManagementState {
    pub fn new(
        tick_cache: LastTickCache,
        feeds: Vec<FeedInfo>,
        scenarios: HashMap<String, ScenarioSettings>,
    ) -> Self {
        Self {
            tick_cache,
            feeds: Arc::new(feeds),
            scenarios: Arc::new(scenarios),
        }
    }
}

pub fn management_router(state: ManagementState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(cors)
        .with_state(state)
}

fn serialize_tick(tick: &TickEvent) -> Value {
    json!({
        "timestamp": tick.timestamp.to_rfc3339(),
        "bid": tick.bid,
        "ask": tick.ask,
        "mid": tick.mid,
        "liquidity_regime": tick.liquidity_regime,
    })
}

async fn health(State(state): State<ManagementState>) -> Json<Value> {
    let cache = state.tick_cache.read();
    let mut instruments = serde_json::Map::new();
    for feed in state.feeds.iter() {
        let last_tick = cache
            .get(&feed.instrument_id)
            .map(serialize_tick)
            .unwrap_or(Value::Null);
        instruments.insert(
            feed.instrument_id.clone(),
            json!({
                "last_tick": last_tick,
                "liquidity_regime": feed.liquidity_regime,
            }),
        );
    }
    Json(json!({
        "status": "ok",
        "instruments": instruments,
    }))
}

async fn metrics(State(state): State<ManagementState>) -> Json<Value> {
    let mut instruments = serde_json::Map::new();
    for feed in state.feeds.iter() {
        instruments.insert(
            feed.instrument_id.clone(),
            json!({
                "update_interval_seconds": feed.update_interval_seconds,
                "tick_size": feed.tick_size,
                "liquidity_regime": feed.liquidity_regime,
            }),
        );
    }
    Json(json!({
        "instruments": instruments,
        "scenarios": *state.scenarios,
    }))
}
