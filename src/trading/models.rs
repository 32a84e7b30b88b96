//! Trading domain types: orders, accounts, positions, executions, and the
//! book snapshot the matching engine crosses against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::TradingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "BUY" => Some(OrderSide::Buy),
            "SELL" => Some(OrderSide::Sell),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "MARKET" => Some(OrderType::Market),
            "LIMIT" => Some(OrderType::Limit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "NEW" => Some(OrderStatus::New),
            "PARTIALLY_FILLED" => Some(OrderStatus::PartiallyFilled),
            "FILLED" => Some(OrderStatus::Filled),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// A validated order submission. `user_id` always comes from the resolved
/// session, never from client input.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub user_id: String,
    pub instrument_id: String,
    pub side: OrderSide,
    pub quantity: i64,
    pub order_type: OrderType,
    pub limit_price: Option<f64>,
    pub time_in_force: String,
}

impl OrderRequest {
    pub fn market(
        user_id: impl Into<String>,
        instrument_id: impl Into<String>,
        side: OrderSide,
        quantity: i64,
    ) -> Result<Self, TradingError> {
        if quantity <= 0 {
            return Err(TradingError::Validation("quantity must be positive".into()));
        }
        Ok(Self {
            user_id: user_id.into(),
            instrument_id: instrument_id.into(),
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            time_in_force: "GTC".to_string(),
        })
    }

    pub fn limit(
        user_id: impl Into<String>,
        instrument_id: impl Into<String>,
        side: OrderSide,
        quantity: i64,
        limit_price: f64,
        time_in_force: Option<String>,
    ) -> Result<Self, TradingError> {
        if quantity <= 0 {
            return Err(TradingError::Validation("quantity must be positive".into()));
        }
        if limit_price <= 0.0 {
            return Err(TradingError::Validation(
                "limit_price must be positive".into(),
            ));
        }
        Ok(Self {
            user_id: user_id.into(),
            instrument_id: instrument_id.into(),
            side,
            quantity,
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            time_in_force: time_in_force.unwrap_or_else(|| "GTC".to_string()),
        })
    }
}

/// Immutable view of the best N levels, as published by market data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedInstrumentBook {
    pub instrument_id: String,
    pub bids: Vec<(f64, i64)>,
    pub asks: Vec<(f64, i64)>,
    pub last_updated: DateTime<Utc>,
}

impl ListedInstrumentBook {
    pub fn new(
        instrument_id: impl Into<String>,
        bids: Vec<(f64, i64)>,
        asks: Vec<(f64, i64)>,
        last_updated: DateTime<Utc>,
    ) -> Result<Self, TradingError> {
        validate_depth(&bids, true)?;
        validate_depth(&asks, false)?;
        Ok(Self {
            instrument_id: instrument_id.into(),
            bids,
            asks,
            last_updated,
        })
    }

    pub fn best_bid(&self) -> Option<(f64, i64)> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<(f64, i64)> {
        self.asks.first().copied()
    }
}

fn validate_depth(levels: &[(f64, i64)], descending: bool) -> Result<(), TradingError> {
    let mut previous: Option<f64> = None;
    for (price, quantity) in levels {
        if *price <= 0.0 {
            return Err(TradingError::Validation(
                "price levels must be positive".into(),
            ));
        }
        if *quantity <= 0 {
            return Err(TradingError::Validation("quantities must be positive".into()));
        }
        if let Some(previous) = previous {
            if descending && *price > previous {
                return Err(TradingError::Validation(
                    "bid levels must be sorted in descending price order".into(),
                ));
            }
            if !descending && *price < previous {
                return Err(TradingError::Validation(
                    "ask levels must be sorted in ascending price order".into(),
                ));
            }
        }
        previous = Some(*price);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub user_id: String,
    pub cash_balance: f64,
    pub base_currency: String,
    pub margin_allowed: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub user_id: String,
    pub instrument_id: String,
    pub quantity: i64,
    pub average_price: f64,
    pub updated_at: DateTime<Utc>,
}

impl PositionRecord {
    pub fn notional(&self, current_price: f64) -> f64 {
        current_price * self.quantity as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub user_id: String,
    pub instrument_id: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: i64,
    pub filled_quantity: i64,
    pub limit_price: Option<f64>,
    pub average_price: Option<f64>,
    pub status: OrderStatus,
    pub time_in_force: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn remaining_quantity(&self) -> i64 {
        self.quantity - self.filled_quantity
    }
}

/// One execution per order with fills, priced at the volume-weighted average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub execution_id: String,
    pub order_id: String,
    pub user_id: String,
    pub instrument_id: String,
    pub side: OrderSide,
    pub quantity: i64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn enums_round_trip_through_strings() {
        assert_eq!(OrderSide::from_str("BUY"), Some(OrderSide::Buy));
        assert_eq!(OrderSide::Sell.as_str(), "SELL");
        assert_eq!(OrderType::from_str("LIMIT"), Some(OrderType::Limit));
        assert_eq!(
            OrderStatus::from_str("PARTIALLY_FILLED"),
            Some(OrderStatus::PartiallyFilled)
        );
        assert_eq!(OrderStatus::from_str("bogus"), None);
    }

    #[test]
    fn enums_serialize_in_wire_case() {
        assert_eq!(serde_json::to_string(&OrderSide::Buy).unwrap(), r#""BUY""#);
        assert_eq!(
            serde_json::to_string(&OrderStatus::PartiallyFilled).unwrap(),
            r#""PARTIALLY_FILLED""#
        );
    }

    #[test]
    fn market_order_rejects_non_positive_quantity() {
        assert!(OrderRequest::market("u", "EQ-1", OrderSide::Buy, 0).is_err());
        assert!(OrderRequest::market("u", "EQ-1", OrderSide::Buy, -5).is_err());
    }

    #[test]
    fn limit_order_requires_positive_limit_price() {
        assert!(OrderRequest::limit("u", "EQ-1", OrderSide::Buy, 10, 0.0, None).is_err());
        let order = OrderRequest::limit("u", "EQ-1", OrderSide::Buy, 10, 99.5, None).unwrap();
        assert_eq!(order.limit_price, Some(99.5));
        assert_eq!(order.time_in_force, "GTC");
    }

    #[test]
    fn book_validates_depth_ordering() {
        assert!(ListedInstrumentBook::new(
            "EQ-1",
            vec![(99.5, 100), (99.0, 200)],
            vec![(100.5, 150), (101.0, 100)],
            ts(),
        )
        .is_ok());

        assert!(ListedInstrumentBook::new(
            "EQ-1",
            vec![(99.0, 100), (99.5, 200)],
            vec![],
            ts(),
        )
        .is_err());

        assert!(ListedInstrumentBook::new("EQ-1", vec![(99.5, 0)], vec![], ts()).is_err());
    }

    #[test]
    fn order_record_tracks_remaining_quantity() {
        let record = OrderRecord {
            order_id: "o-1".into(),
            user_id: "u-1".into(),
            instrument_id: "EQ-1".into(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            quantity: 100,
            filled_quantity: 40,
            limit_price: Some(100.0),
            average_price: Some(99.9),
            status: OrderStatus::PartiallyFilled,
            time_in_force: "GTC".into(),
            created_at: ts(),
            updated_at: ts(),
        };
        assert_eq!(record.remaining_quantity(), 60);
    }
}
