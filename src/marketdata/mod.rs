//! Market data simulation and emission pipeline.

pub mod dealers;
pub mod feed;
pub mod instruments;
pub mod ladder;
pub mod management;
pub mod metadata;
pub mod models;
pub mod persistence;
pub mod publisher;
pub mod retry;
pub mod runner;
pub mod service;
pub mod simulation;

pub use feed::InstrumentFeed;
pub use models::{DealerQuoteEvent, OrderBookLevel, OrderBookSnapshot, TickEvent};
pub use service::MarketDataService;
