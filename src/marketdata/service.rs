//! The emission pipeline: due-feed selection, tick generation, and the
//! persist-then-publish sequence for ticks, books, and dealer quotes.
//!
//! Ordering contract per feed and pump: tick persist, tick publish, book
//! persist, book publish, quote persists, quote publishes. `next_due`
//! advances when a feed is selected, before any I/O runs, so a feed stuck in
//! retries cannot monopolise subsequent pumps.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::clock::Clock;

use super::feed::InstrumentFeed;
use super::models::{DealerQuoteEvent, OrderBookSnapshot, TickEvent};
use super::retry::{retry_async, RetryPolicy};

#[async_trait]
pub trait TickPublisher: Send + Sync {
    async fn publish_tick(&self, event: &TickEvent) -> Result<()>;
}

#[async_trait]
pub trait TickRepository: Send + Sync {
    async fn persist_tick(&self, event: &TickEvent) -> Result<()>;
}

#[async_trait]
pub trait OrderBookPublisher: Send + Sync {
    async fn publish_order_book(&self, snapshot: &OrderBookSnapshot) -> Result<()>;
}

#[async_trait]
pub trait OrderBookRepository: Send + Sync {
    async fn persist_order_book(&self, snapshot: &OrderBookSnapshot) -> Result<()>;
}

#[async_trait]
pub trait DealerQuotePublisher: Send + Sync {
    async fn publish_dealer_quote(&self, quote: &DealerQuoteEvent) -> Result<()>;
}

#[async_trait]
pub trait DealerQuoteRepository: Send + Sync {
    async fn persist_dealer_quote(&self, quote: &DealerQuoteEvent) -> Result<()>;
}

/// Last successfully emitted tick per instrument, shared with the management
/// API. Single writer: the pump loop.
pub type LastTickCache = Arc<RwLock<HashMap<String, TickEvent>>>;

/// Static feed facts surfaced by the management endpoints.
#[derive(Debug, Clone)]
pub struct FeedInfo {
    pub instrument_id: String,
    pub tick_size: f64,
    pub liquidity_regime: String,
    pub update_interval_seconds: f64,
}

pub struct MarketDataService {
    feeds: Vec<InstrumentFeed>,
    publisher: Arc<dyn TickPublisher>,
    repository: Arc<dyn TickRepository>,
    clock: Arc<dyn Clock>,
    book_publisher: Option<Arc<dyn OrderBookPublisher>>,
    book_repository: Option<Arc<dyn OrderBookRepository>>,
    quote_publisher: Option<Arc<dyn DealerQuotePublisher>>,
    quote_repository: Option<Arc<dyn DealerQuoteRepository>>,
    retry: RetryPolicy,
    last_emitted: LastTickCache,
    next_emission: HashMap<String, DateTime<Utc>>,
}

impl MarketDataService {
    pub fn new(
        feeds: Vec<InstrumentFeed>,
        publisher: Arc<dyn TickPublisher>,
        repository: Arc<dyn TickRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            feeds,
            publisher,
            repository,
            clock,
            book_publisher: None,
            book_repository: None,
            quote_publisher: None,
            quote_repository: None,
            retry: RetryPolicy::default(),
            last_emitted: Arc::new(RwLock::new(HashMap::new())),
            next_emission: HashMap::new(),
        }
    }

    pub fn with_order_books(
        mut self,
        repository: Arc<dyn OrderBookRepository>,
        publisher: Arc<dyn OrderBookPublisher>,
    ) -> Self {
        self.book_repository = Some(repository);
        self.book_publisher = Some(publisher);
        self
    }

    pub fn with_dealer_quotes(
        mut self,
        repository: Arc<dyn DealerQuoteRepository>,
        publisher: Arc<dyn DealerQuotePublisher>,
    ) -> Self {
        self.quote_repository = Some(repository);
        self.quote_publisher = Some(publisher);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Shared handle onto the last-tick cache for the management API.
    pub fn tick_cache(&self) -> LastTickCache {
        self.last_emitted.clone()
    }

    pub fn feed_infos(&self) -> Vec<FeedInfo> {
        self.feeds
            .iter()
            .map(|feed| FeedInfo {
                instrument_id: feed.instrument_id().to_string(),
                tick_size: feed.tick_size(),
                liquidity_regime: feed.liquidity_regime().to_string(),
                update_interval_seconds: feed.update_interval().num_milliseconds() as f64 / 1e3,
            })
            .collect()
    }

    pub fn last_tick(&self, instrument_id: &str) -> Option<TickEvent> {
        self.last_emitted.read().get(instrument_id).cloned()
    }

    /// Generate events for every due feed and push them downstream. A retry
    /// exhaustion aborts the remainder of this pump; already-scheduled feeds
    /// keep their advanced `next_due`.
    pub async fn pump_once(&mut self) -> Result<()> {
        let timestamp = self.clock.now();

        let mut emissions: Vec<(usize, TickEvent)> = Vec::new();
        for (index, feed) in self.feeds.iter_mut().enumerate() {
            if let Some(next_due) = self.next_emission.get(feed.instrument_id()) {
                if timestamp < *next_due {
                    continue;
                }
            }
            let tick = feed.next_tick(timestamp);
            self.next_emission
                .insert(feed.instrument_id().to_string(), timestamp + feed.update_interval());
            emissions.push((index, tick));
        }
        if !emissions.is_empty() {
            debug!(due = emissions.len(), "pumping due feeds");
        }

        let publisher = self.publisher.clone();
        let repository = self.repository.clone();
        let book_publisher = self.book_publisher.clone();
        let book_repository = self.book_repository.clone();
        let quote_publisher = self.quote_publisher.clone();
        let quote_repository = self.quote_repository.clone();
        let retry = self.retry;

        for (index, tick) in emissions {
            retry_async(&retry, "tick persist", || repository.persist_tick(&tick))
                .await
                .with_context(|| format!("persisting tick for {}", tick.instrument_id))?;
            retry_async(&retry, "tick publish", || publisher.publish_tick(&tick))
                .await
                .with_context(|| format!("publishing tick for {}", tick.instrument_id))?;
            self.last_emitted
                .write()
                .insert(tick.instrument_id.clone(), tick.clone());

            let snapshot = self.feeds[index].build_order_book(tick.mid, timestamp)?;
            if let Some(snapshot) = snapshot {
                if let Some(repo) = &book_repository {
                    retry_async(&retry, "book persist", || repo.persist_order_book(&snapshot))
                        .await
                        .with_context(|| format!("persisting book for {}", tick.instrument_id))?;
                }
                if let Some(publisher) = &book_publisher {
                    retry_async(&retry, "book publish", || {
                        publisher.publish_order_book(&snapshot)
                    })
                    .await
                    .with_context(|| format!("publishing book for {}", tick.instrument_id))?;
                }
            }

            let quotes = self.feeds[index].build_dealer_quotes(tick.mid, timestamp)?;
            if !quotes.is_empty() {
                if let Some(repo) = &quote_repository {
                    for quote in &quotes {
                        retry_async(&retry, "quote persist", || repo.persist_dealer_quote(quote))
                            .await
                            .with_context(|| {
                                format!("persisting dealer quote for {}", quote.instrument_id)
                            })?;
                    }
                }
                if let Some(publisher) = &quote_publisher {
                    for quote in &quotes {
                        retry_async(&retry, "quote publish", || {
                            publisher.publish_dealer_quote(quote)
                        })
                        .await
                        .with_context(|| {
                            format!("publishing dealer quote for {}", quote.instrument_id)
                        })?;
                    }
                }
                info!(
                    instrument_id = %tick.instrument_id,
                    quotes = quotes.len(),
                    "dealer quotes emitted"
                );
            }
        }

        Ok(())
    }
}
