//! Read side of the book cache populated by the market data publisher.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;

use super::errors::TradingError;
use super::models::ListedInstrumentBook;

#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    async fn get_order_book(
        &self,
        instrument_id: &str,
    ) -> Result<ListedInstrumentBook, TradingError>;
}

/// Reads the per-instrument hash written by the order book publisher.
pub struct RedisBookCacheGateway {
    conn: ConnectionManager,
    book_prefix: String,
}

impl RedisBookCacheGateway {
    pub fn new(conn: ConnectionManager, book_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            book_prefix: book_prefix.into(),
        }
    }
}

#[async_trait]
impl MarketDataGateway for RedisBookCacheGateway {
    async fn get_order_book(
        &self,
        instrument_id: &str,
    ) -> Result<ListedInstrumentBook, TradingError> {
        let key = format!("{}:{}", self.book_prefix, instrument_id);
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(&key)
            .await
            .context("reading book cache hash")?;
        if fields.is_empty() {
            return Err(TradingError::InstrumentNotFound(instrument_id.to_string()));
        }

        let field = |name: &str| -> Result<&String, TradingError> {
            fields.get(name).ok_or_else(|| {
                TradingError::InstrumentNotFound(format!(
                    "{instrument_id} (missing field {name})"
                ))
            })
        };

        let bids: Vec<(f64, i64)> =
            serde_json::from_str(field("bids")?).context("parsing cached bids")?;
        let asks: Vec<(f64, i64)> =
            serde_json::from_str(field("asks")?).context("parsing cached asks")?;
        let last_updated: DateTime<Utc> = DateTime::parse_from_rfc3339(field("last_updated")?)
            .map_err(|error| anyhow!("invalid last_updated in book cache: {error}"))?
            .with_timezone(&Utc);

        ListedInstrumentBook::new(instrument_id, bids, asks, last_updated)
    }
}
