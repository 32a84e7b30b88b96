//! Trading HTTP surface: session-authenticated order submission.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info};

use crate::auth::session::{AuthenticatedSession, SessionStore, SessionToken};

use super::errors::TradingError;
use super::market_data::MarketDataGateway;
use super::models::{OrderRecord, OrderRequest, OrderSide, OrderStatus, OrderType};
use super::order_service::OrderService;

#[derive(Clone)]
pub struct TradingApiState {
    pub order_service: Arc<OrderService>,
    pub market_data: Arc<dyn MarketDataGateway>,
    pub sessions: Arc<dyn SessionStore>,
    pub session_cookie_name: String,
}

pub fn trading_router(state: TradingApiState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/orders", post(create_order))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

/// Order submission body. The user is taken from the session cookie, never
/// from the payload.
#[derive(Debug, Deserialize)]
struct OrderCreatePayload {
    instrument_id: String,
    side: OrderSide,
    quantity: i64,
    order_type: OrderType,
    limit_price: Option<f64>,
    time_in_force: Option<String>,
}

#[derive(Debug, Serialize)]
struct OrderResponse {
    order_id: String,
    instrument_id: String,
    side: OrderSide,
    quantity: i64,
    filled_quantity: i64,
    status: OrderStatus,
    average_price: Option<f64>,
}

impl OrderResponse {
    fn from_record(record: &OrderRecord) -> Self {
        Self {
            order_id: record.order_id.clone(),
            instrument_id: record.instrument_id.clone(),
            side: record.side,
            quantity: record.quantity,
            filled_quantity: record.filled_quantity,
            status: record.status,
            average_price: record.average_price,
        }
    }
}

async fn resolve_session(
    state: &TradingApiState,
    jar: &CookieJar,
) -> Result<AuthenticatedSession, OrderApiError> {
    let cookie = jar
        .get(&state.session_cookie_name)
        .ok_or(OrderApiError::Unauthorized)?;
    let token = SessionToken::new(cookie.value().to_string());
    let session = state
        .sessions
        .get(&token)
        .await
        .map_err(|error| {
            error!(error = %error, "session store unavailable");
            OrderApiError::Internal
        })?
        .ok_or(OrderApiError::Unauthorized)?;
    Ok(session)
}

fn to_domain_request(
    payload: &OrderCreatePayload,
    user_id: &str,
) -> Result<OrderRequest, TradingError> {
    match payload.order_type {
        OrderType::Market => OrderRequest::market(
            user_id,
            payload.instrument_id.clone(),
            payload.side,
            payload.quantity,
        ),
        OrderType::Limit => {
            let limit_price = payload.limit_price.ok_or_else(|| {
                TradingError::Validation("limit_price required for limit orders".into())
            })?;
            OrderRequest::limit(
                user_id,
                payload.instrument_id.clone(),
                payload.side,
                payload.quantity,
                limit_price,
                payload.time_in_force.clone(),
            )
        }
    }
}

async fn create_order(
    State(state): State<TradingApiState>,
    jar: CookieJar,
    Json(payload): Json<OrderCreatePayload>,
) -> Result<(StatusCode, Json<OrderResponse>), OrderApiError> {
    let session = resolve_session(&state, &jar).await?;
    let request = to_domain_request(&payload, &session.user_id)?;

    let book = state.market_data.get_order_book(&request.instrument_id).await?;
    let record = state.order_service.submit(&request, &book).await?;

    info!(
        order_id = %record.order_id,
        instrument_id = %record.instrument_id,
        side = record.side.as_str(),
        status = record.status.as_str(),
        filled_quantity = record.filled_quantity,
        "order created"
    );
    Ok((StatusCode::CREATED, Json(OrderResponse::from_record(&record))))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Debug)]
pub enum OrderApiError {
    Unauthorized,
    InstrumentNotFound,
    DomainRejection(String),
    Validation(String),
    Internal,
}

impl From<TradingError> for OrderApiError {
    fn from(error: TradingError) -> Self {
        match error {
            TradingError::Validation(message) => OrderApiError::Validation(message),
            TradingError::InsufficientBalance | TradingError::InsufficientPosition => {
                OrderApiError::DomainRejection(error.to_string())
            }
            TradingError::InstrumentNotFound(_) => OrderApiError::InstrumentNotFound,
            TradingError::Infra(cause) => {
                error!(error = %cause, "trading infrastructure failure");
                OrderApiError::Internal
            }
        }
    }
}

impl IntoResponse for OrderApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            OrderApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
            }
            OrderApiError::InstrumentNotFound => {
                (StatusCode::NOT_FOUND, "instrument not found".to_string())
            }
            OrderApiError::DomainRejection(message) => (StatusCode::BAD_REQUEST, message),
            OrderApiError::Validation(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            OrderApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::InMemorySessionStore;
    use crate::clock::test_support::FrozenClock;
    use crate::store::init_schema;
    use crate::trading::matching::MatchingEngine;
    use crate::trading::models::{ExecutionEvent, ListedInstrumentBook};
    use crate::trading::events::ExecutionPublisher;
    use crate::trading::uow::SqliteUowFactory;
    use anyhow::Result;
    use async_trait::async_trait;
    use axum_extra::extract::cookie::Cookie;
    use chrono::{Duration, TimeZone, Utc};
    use parking_lot::Mutex;
    use rusqlite::Connection;
    use tempfile::NamedTempFile;

    fn ts() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[derive(Clone, Default)]
    struct StaticGateway {
        books: Arc<Mutex<Vec<ListedInstrumentBook>>>,
    }

    #[async_trait]
    impl MarketDataGateway for StaticGateway {
        async fn get_order_book(
            &self,
            instrument_id: &str,
        ) -> Result<ListedInstrumentBook, TradingError> {
            self.books
                .lock()
                .iter()
                .find(|book| book.instrument_id == instrument_id)
                .cloned()
                .ok_or_else(|| TradingError::InstrumentNotFound(instrument_id.to_string()))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingExecutions {
        events: Arc<Mutex<Vec<ExecutionEvent>>>,
    }

    #[async_trait]
    impl ExecutionPublisher for RecordingExecutions {
        async fn publish(&self, event: &ExecutionEvent) -> Result<()> {
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    struct Fixture {
        state: TradingApiState,
        sessions: Arc<InMemorySessionStore>,
        _db: NamedTempFile,
    }

    async fn fixture() -> Fixture {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        init_schema(&path).unwrap();

        // Seed a user and account for user u-1.
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES ('u-1', 'u-1@example.com', 'hash', ?1)",
            rusqlite::params![ts().to_rfc3339()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO accounts (user_id, cash_balance, base_currency, margin_allowed, created_at, updated_at)
             VALUES ('u-1', 1000000.0, 'USD', 0, ?1, ?1)",
            rusqlite::params![ts().to_rfc3339()],
        )
        .unwrap();

        let gateway = StaticGateway::default();
        gateway.books.lock().push(
            ListedInstrumentBook::new(
                "EQ-1",
                vec![(99.5, 100), (99.0, 200)],
                vec![(100.5, 150), (101.0, 100)],
                ts(),
            )
            .unwrap(),
        );

        let sessions = Arc::new(InMemorySessionStore::new(Duration::minutes(30)));
        let order_service = Arc::new(OrderService::new(
            Arc::new(SqliteUowFactory::new(path)),
            MatchingEngine,
            Arc::new(RecordingExecutions::default()),
            Arc::new(FrozenClock(ts())),
        ));

        Fixture {
            state: TradingApiState {
                order_service,
                market_data: Arc::new(gateway),
                sessions: sessions.clone(),
                session_cookie_name: "tradeboard_session".to_string(),
            },
            sessions,
            _db: file,
        }
    }

    fn payload(instrument_id: &str) -> Json<OrderCreatePayload> {
        Json(OrderCreatePayload {
            instrument_id: instrument_id.to_string(),
            side: OrderSide::Buy,
            quantity: 10,
            order_type: OrderType::Limit,
            limit_price: Some(101.0),
            time_in_force: None,
        })
    }

    async fn jar_with_session(fixture: &Fixture, user_id: &str) -> CookieJar {
        let session = fixture.sessions.issue(user_id).await.unwrap();
        CookieJar::new().add(Cookie::new(
            "tradeboard_session",
            session.token.value().to_string(),
        ))
    }

    #[tokio::test]
    async fn order_is_attributed_to_the_session_user() {
        let fixture = fixture().await;
        let jar = jar_with_session(&fixture, "u-1").await;

        let (status, Json(response)) =
            create_order(State(fixture.state.clone()), jar, payload("EQ-1"))
                .await
                .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response.instrument_id, "EQ-1");
        assert_eq!(response.filled_quantity, 10);
        assert_eq!(response.status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn missing_cookie_is_unauthorized() {
        let fixture = fixture().await;
        let error = create_order(State(fixture.state.clone()), CookieJar::new(), payload("EQ-1"))
            .await
            .unwrap_err();
        assert!(matches!(error, OrderApiError::Unauthorized));
    }

    #[tokio::test]
    async fn bogus_token_is_unauthorized() {
        let fixture = fixture().await;
        let jar = CookieJar::new().add(Cookie::new("tradeboard_session", "deadbeef"));
        let error = create_order(State(fixture.state.clone()), jar, payload("EQ-1"))
            .await
            .unwrap_err();
        assert!(matches!(error, OrderApiError::Unauthorized));
    }

    #[tokio::test]
    async fn unknown_instrument_maps_to_not_found() {
        let fixture = fixture().await;
        let jar = jar_with_session(&fixture, "u-1").await;
        let error = create_order(State(fixture.state.clone()), jar, payload("EQ-MISSING"))
            .await
            .unwrap_err();
        assert!(matches!(error, OrderApiError::InstrumentNotFound));
    }

    #[tokio::test]
    async fn limit_order_without_price_is_a_validation_error() {
        let fixture = fixture().await;
        let jar = jar_with_session(&fixture, "u-1").await;

        let body = Json(OrderCreatePayload {
            instrument_id: "EQ-1".to_string(),
            side: OrderSide::Buy,
            quantity: 10,
            order_type: OrderType::Limit,
            limit_price: None,
            time_in_force: None,
        });
        let error = create_order(State(fixture.state.clone()), jar, body)
            .await
            .unwrap_err();
        assert!(matches!(error, OrderApiError::Validation(_)));
    }

    #[tokio::test]
    async fn sell_without_position_maps_to_bad_request() {
        let fixture = fixture().await;
        let jar = jar_with_session(&fixture, "u-1").await;

        let body = Json(OrderCreatePayload {
            instrument_id: "EQ-1".to_string(),
            side: OrderSide::Sell,
            quantity: 10,
            order_type: OrderType::Market,
            limit_price: None,
            time_in_force: None,
        });
        let error = create_order(State(fixture.state.clone()), jar, body)
            .await
            .unwrap_err();
        assert!(matches!(error, OrderApiError::DomainRejection(_)));
    }

    #[test]
    fn api_errors_map_onto_the_contract_statuses() {
        assert_eq!(
            OrderApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            OrderApiError::InstrumentNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            OrderApiError::DomainRejection("x".into())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OrderApiError::Validation("x".into()).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
