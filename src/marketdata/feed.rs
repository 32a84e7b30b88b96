//! A feed bundles the capabilities of one simulated instrument: a price
//! simulator (required), a ladder book builder, and a dealer quote builder.

use chrono::{DateTime, Duration, Utc};

use super::dealers::DealerQuoteBuilder;
use super::ladder::LadderBookBuilder;
use super::metadata::MetadataFactory;
use super::models::{DealerQuoteEvent, ModelError, OrderBookSnapshot, TickEvent};
use super::simulation::PriceSimulator;

pub struct InstrumentFeed {
    instrument_id: String,
    simulator: Box<dyn PriceSimulator>,
    tick_size: f64,
    liquidity_regime: String,
    update_interval: Duration,
    metadata_factory: Option<MetadataFactory>,
    book_builder: Option<LadderBookBuilder>,
    quote_builder: Option<DealerQuoteBuilder>,
}

impl InstrumentFeed {
    pub fn new(
        simulator: Box<dyn PriceSimulator>,
        tick_size: f64,
        liquidity_regime: impl Into<String>,
        update_interval: Duration,
    ) -> Result<Self, ModelError> {
        if tick_size <= 0.0 {
            return Err(ModelError::InvalidParameter(
                "tick_size must be strictly positive".into(),
            ));
        }
        if update_interval <= Duration::zero() {
            return Err(ModelError::InvalidParameter(
                "update_interval must be positive".into(),
            ));
        }
        Ok(Self {
            instrument_id: simulator.instrument_id().to_string(),
            simulator,
            tick_size,
            liquidity_regime: liquidity_regime.into(),
            update_interval,
            metadata_factory: None,
            book_builder: None,
            quote_builder: None,
        })
    }

    pub fn with_metadata_factory(mut self, factory: MetadataFactory) -> Self {
        self.metadata_factory = Some(factory);
        self
    }

    pub fn with_book_builder(mut self, builder: LadderBookBuilder) -> Self {
        self.book_builder = Some(builder);
        self
    }

    pub fn with_quote_builder(mut self, builder: DealerQuoteBuilder) -> Self {
        self.quote_builder = Some(builder);
        self
    }

    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    pub fn tick_size(&self) -> f64 {
        self.tick_size
    }

    pub fn liquidity_regime(&self) -> &str {
        &self.liquidity_regime
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Advance the simulator and derive the observable bid/ask around the mid.
    pub fn next_tick(&mut self, timestamp: DateTime<Utc>) -> TickEvent {
        let mid = self.simulator.next_value();
        let half_spread = self.tick_size / 2.0;
        let metadata = self.metadata_factory.as_ref().map(|factory| factory(mid));
        TickEvent {
            instrument_id: self.instrument_id.clone(),
            timestamp,
            bid: mid - half_spread,
            ask: mid + half_spread,
            mid,
            liquidity_regime: self.liquidity_regime.clone(),
            metadata,
        }
    }

    pub fn build_order_book(
        &mut self,
        mid_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<OrderBookSnapshot>, ModelError> {
        match &mut self.book_builder {
            Some(builder) => builder.build(mid_price, timestamp).map(Some),
            None => Ok(None),
        }
    }

    pub fn build_dealer_quotes(
        &mut self,
        mid_rate: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<DealerQuoteEvent>, ModelError> {
        match &mut self.quote_builder {
            Some(builder) => builder.generate(mid_rate, timestamp),
            None => Ok(Vec::new()),
        }
    }
}
