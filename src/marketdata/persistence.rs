//! Durable market data storage over SQLite.
//!
//! Ticks and dealer quotes share the `market_ticks` table; quotes carry a
//! `dealer_id` and a synthetic mid. Book snapshots land in `order_books`
//! with the full ladder as a JSON `levels` column.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;

use super::models::{DealerQuoteEvent, OrderBookSnapshot, TickEvent};
use super::service::{DealerQuoteRepository, OrderBookRepository, TickRepository};

/// One store implements all three repository capabilities. A connection is
/// opened per operation so the store can be shared freely across tasks.
pub struct SqliteMarketStore {
    db_path: String,
}

impl SqliteMarketStore {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .with_context(|| format!("failed to open sqlite database at {}", self.db_path))
    }
}

#[async_trait]
impl TickRepository for SqliteMarketStore {
    async fn persist_tick(&self, event: &TickEvent) -> Result<()> {
        let metadata = event
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO market_ticks (instrument_id, timestamp, bid, ask, mid, dealer_id, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
            params![
                event.instrument_id,
                event.timestamp.to_rfc3339(),
                event.bid,
                event.ask,
                event.mid,
                metadata,
            ],
        )
        .context("inserting market tick")?;
        Ok(())
    }
}

#[async_trait]
impl OrderBookRepository for SqliteMarketStore {
    async fn persist_order_book(&self, snapshot: &OrderBookSnapshot) -> Result<()> {
        let levels = json!({
            "bids": snapshot.bids,
            "asks": snapshot.asks,
        });
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO order_books (instrument_id, timestamp, levels) VALUES (?1, ?2, ?3)",
            params![
                snapshot.instrument_id,
                snapshot.timestamp.to_rfc3339(),
                levels.to_string(),
            ],
        )
        .context("inserting order book snapshot")?;
        Ok(())
    }
}

#[async_trait]
impl DealerQuoteRepository for SqliteMarketStore {
    async fn persist_dealer_quote(&self, quote: &DealerQuoteEvent) -> Result<()> {
        let metadata = quote
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let mid = (quote.bid + quote.ask) / 2.0;
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO market_ticks (instrument_id, timestamp, bid, ask, mid, dealer_id, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                quote.instrument_id,
                quote.timestamp.to_rfc3339(),
                quote.bid,
                quote.ask,
                mid,
                quote.dealer_id,
                metadata,
            ],
        )
        .context("inserting dealer quote")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketdata::models::OrderBookLevel;
    use crate::store::init_schema;
    use chrono::{TimeZone, Utc};
    use tempfile::NamedTempFile;

    fn store() -> (SqliteMarketStore, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        init_schema(&path).unwrap();
        (SqliteMarketStore::new(path), file)
    }

    fn ts() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn persists_ticks_without_dealer_attribution() {
        let (store, file) = store();
        let tick = TickEvent::new("EQ-1", ts(), 99.995, 100.005, 100.0, "HIGH", None).unwrap();
        store.persist_tick(&tick).await.unwrap();

        let conn = Connection::open(file.path()).unwrap();
        let (mid, dealer_id): (f64, Option<String>) = conn
            .query_row(
                "SELECT mid, dealer_id FROM market_ticks WHERE instrument_id = 'EQ-1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(mid, 100.0);
        assert!(dealer_id.is_none());
    }

    #[tokio::test]
    async fn dealer_quotes_share_the_tick_table_with_synthetic_mid() {
        let (store, file) = store();
        let quote = DealerQuoteEvent::new("SWAP-1", "DEALER-A", ts(), 0.018, 0.022).unwrap();
        store.persist_dealer_quote(&quote).await.unwrap();

        let conn = Connection::open(file.path()).unwrap();
        let (mid, dealer_id): (f64, String) = conn
            .query_row(
                "SELECT mid, dealer_id FROM market_ticks WHERE instrument_id = 'SWAP-1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!((mid - 0.02).abs() < 1e-12);
        assert_eq!(dealer_id, "DEALER-A");
    }

    #[tokio::test]
    async fn book_levels_round_trip_through_json() {
        let (store, file) = store();
        let snapshot = OrderBookSnapshot::new(
            "EQ-1",
            ts(),
            vec![OrderBookLevel {
                price: 99.99,
                quantity: 500.0,
            }],
            vec![OrderBookLevel {
                price: 100.01,
                quantity: 500.0,
            }],
        )
        .unwrap();
        store.persist_order_book(&snapshot).await.unwrap();

        let conn = Connection::open(file.path()).unwrap();
        let levels: String = conn
            .query_row(
                "SELECT levels FROM order_books WHERE instrument_id = 'EQ-1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&levels).unwrap();
        assert_eq!(parsed["bids"][0]["price"], 99.99);
        assert_eq!(parsed["asks"][0]["quantity"], 500.0);
    }
}
