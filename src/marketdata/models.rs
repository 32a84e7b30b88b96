//! Market data event types.
//!
//! Constructors enforce the wire invariants so every event that reaches the
//! pipeline is already well-formed: `bid <= mid <= ask` for ticks, strictly
//! sorted depth for book snapshots, `ask > bid` for dealer quotes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub type Metadata = Map<String, Value>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("bid-mid-ask relationship must satisfy bid <= mid <= ask")]
    InvalidTickPrices,
    #[error("bid levels must be sorted strictly descending by price")]
    BidsNotDescending,
    #[error("ask levels must be sorted strictly ascending by price")]
    AsksNotAscending,
    #[error("best bid must be strictly below best ask")]
    CrossedBook,
    #[error("price levels must be positive")]
    NonPositivePrice,
    #[error("quantities must be positive")]
    NonPositiveQuantity,
    #[error("dealer ask must be strictly greater than bid")]
    InvertedQuote,
    #[error("mid price must be positive")]
    NonPositiveMid,
    #[error("{0}")]
    InvalidParameter(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickEvent {
    pub instrument_id: String,
    pub timestamp: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    pub mid: f64,
    pub liquidity_regime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl TickEvent {
    pub fn new(
        instrument_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        bid: f64,
        ask: f64,
        mid: f64,
        liquidity_regime: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> Result<Self, ModelError> {
        if bid > mid || mid > ask {
            return Err(ModelError::InvalidTickPrices);
        }
        Ok(Self {
            instrument_id: instrument_id.into(),
            timestamp,
            bid,
            ask,
            mid,
            liquidity_regime: liquidity_regime.into(),
            metadata,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub instrument_id: String,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

impl OrderBookSnapshot {
    pub fn new(
        instrument_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        bids: Vec<OrderBookLevel>,
        asks: Vec<OrderBookLevel>,
    ) -> Result<Self, ModelError> {
        for level in bids.iter().chain(asks.iter()) {
            if level.price <= 0.0 {
                return Err(ModelError::NonPositivePrice);
            }
            if level.quantity <= 0.0 {
                return Err(ModelError::NonPositiveQuantity);
            }
        }
        if !bids.windows(2).all(|pair| pair[0].price > pair[1].price) {
            return Err(ModelError::BidsNotDescending);
        }
        if !asks.windows(2).all(|pair| pair[0].price < pair[1].price) {
            return Err(ModelError::AsksNotAscending);
        }
        if let (Some(best_bid), Some(best_ask)) = (bids.first(), asks.first()) {
            if best_bid.price >= best_ask.price {
                return Err(ModelError::CrossedBook);
            }
        }
        Ok(Self {
            instrument_id: instrument_id.into(),
            timestamp,
            bids,
            asks,
        })
    }

    pub fn best_bid(&self) -> Option<&OrderBookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&OrderBookLevel> {
        self.asks.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealerQuoteEvent {
    pub instrument_id: String,
    pub dealer_id: String,
    pub timestamp: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl DealerQuoteEvent {
    pub fn new(
        instrument_id: impl Into<String>,
        dealer_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        bid: f64,
        ask: f64,
    ) -> Result<Self, ModelError> {
        if ask <= bid {
            return Err(ModelError::InvertedQuote);
        }
        Ok(Self {
            instrument_id: instrument_id.into(),
            dealer_id: dealer_id.into(),
            timestamp,
            bid,
            ask,
            metadata: None,
        })
    }
}
