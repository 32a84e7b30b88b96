//! Redis Streams publishers.
//!
//! Every stream message carries a single `payload` field with the event
//! serialized as JSON. The order book publisher additionally maintains the
//! per-instrument book-cache hash the trading service reads.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::models::{DealerQuoteEvent, OrderBookSnapshot, TickEvent};
use super::service::{DealerQuotePublisher, OrderBookPublisher, TickPublisher};

pub struct RedisTickPublisher {
    conn: ConnectionManager,
    stream: String,
}

impl RedisTickPublisher {
    pub fn new(conn: ConnectionManager, stream: impl Into<String>) -> Self {
        Self {
            conn,
            stream: stream.into(),
        }
    }
}

#[async_trait]
impl TickPublisher for RedisTickPublisher {
    async fn publish_tick(&self, event: &TickEvent) -> Result<()> {
        let payload = serde_json::to_string(event).context("serializing tick event")?;
        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd(&self.stream, "*", &[("payload", payload.as_str())])
            .await
            .context("appending tick to stream")?;
        Ok(())
    }
}

pub struct RedisOrderBookPublisher {
    conn: ConnectionManager,
    stream: String,
    book_prefix: String,
}

impl RedisOrderBookPublisher {
    pub fn new(
        conn: ConnectionManager,
        stream: impl Into<String>,
        book_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            stream: stream.into(),
            book_prefix: book_prefix.into(),
        }
    }
}

#[async_trait]
impl OrderBookPublisher for RedisOrderBookPublisher {
    async fn publish_order_book(&self, snapshot: &OrderBookSnapshot) -> Result<()> {
        let payload = serde_json::to_string(snapshot).context("serializing book snapshot")?;
        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd(&self.stream, "*", &[("payload", payload.as_str())])
            .await
            .context("appending book snapshot to stream")?;

        // Side channel the trading service reads: last published depth per
        // instrument, quantities truncated to whole units.
        let bids: Vec<(f64, i64)> = snapshot
            .bids
            .iter()
            .map(|level| (level.price, level.quantity as i64))
            .collect();
        let asks: Vec<(f64, i64)> = snapshot
            .asks
            .iter()
            .map(|level| (level.price, level.quantity as i64))
            .collect();

        let key = format!("{}:{}", self.book_prefix, snapshot.instrument_id);
        let fields = [
            ("bids", serde_json::to_string(&bids)?),
            ("asks", serde_json::to_string(&asks)?),
            ("last_updated", snapshot.timestamp.to_rfc3339()),
        ];
        let _: () = conn
            .hset_multiple(&key, &fields)
            .await
            .context("updating book cache hash")?;
        Ok(())
    }
}

pub struct RedisDealerQuotePublisher {
    conn: ConnectionManager,
    stream: String,
}

impl RedisDealerQuotePublisher {
    pub fn new(conn: ConnectionManager, stream: impl Into<String>) -> Self {
        Self {
            conn,
            stream: stream.into(),
        }
    }
}

#[async_trait]
impl DealerQuotePublisher for RedisDealerQuotePublisher {
    async fn publish_dealer_quote(&self, quote: &DealerQuoteEvent) -> Result<()> {
        let payload = serde_json::to_string(quote).context("serializing dealer quote")?;
        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd(&self.stream, "*", &[("payload", payload.as_str())])
            .await
            .context("appending dealer quote to stream")?;
        Ok(())
    }
}
