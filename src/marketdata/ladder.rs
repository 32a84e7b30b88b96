//! Ladder-style order book construction around a mid price.

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;

use super::models::{ModelError, OrderBookLevel, OrderBookSnapshot};

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Builds symmetric depth ladders with geometric quantity decay and optional
/// per-level price noise.
pub struct LadderBookBuilder {
    instrument_id: String,
    levels: usize,
    tick_size: f64,
    base_quantity: f64,
    quantity_decay: f64,
    price_noise: f64,
    rng: ChaCha8Rng,
}

impl LadderBookBuilder {
    pub fn new(
        instrument_id: impl Into<String>,
        levels: usize,
        tick_size: f64,
        base_quantity: f64,
        quantity_decay: f64,
        price_noise: f64,
        seed: Option<u64>,
    ) -> Result<Self, ModelError> {
        if levels == 0 {
            return Err(ModelError::InvalidParameter("levels must be positive".into()));
        }
        if tick_size <= 0.0 {
            return Err(ModelError::InvalidParameter(
                "tick_size must be positive".into(),
            ));
        }
        if base_quantity <= 0.0 {
            return Err(ModelError::InvalidParameter(
                "base_quantity must be positive".into(),
            ));
        }
        if quantity_decay <= 0.0 || quantity_decay > 1.0 {
            return Err(ModelError::InvalidParameter(
                "quantity_decay must lie in (0, 1]".into(),
            ));
        }
        if price_noise < 0.0 {
            return Err(ModelError::InvalidParameter(
                "price_noise must be non-negative".into(),
            ));
        }
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(Self {
            instrument_id: instrument_id.into(),
            levels,
            tick_size,
            base_quantity,
            quantity_decay,
            price_noise,
            rng,
        })
    }

    pub fn build(
        &mut self,
        mid_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<OrderBookSnapshot, ModelError> {
        if mid_price <= 0.0 {
            return Err(ModelError::NonPositiveMid);
        }

        // Noise larger than half a tick could reorder adjacent levels; clamp
        // so each offset stays within its own tick-wide band and the sorted
        // invariants hold for any draw.
        let noise_bound = 0.49 * self.tick_size;
        let noise_dist = if self.price_noise > 0.0 {
            Some(Normal::new(0.0, self.price_noise).expect("validated std deviation"))
        } else {
            None
        };

        let mut bids = Vec::with_capacity(self.levels);
        let mut asks = Vec::with_capacity(self.levels);

        for level in 0..self.levels {
            let price_offset = self.tick_size * (level as f64 + 1.0);
            let noise = match &noise_dist {
                Some(dist) => {
                    let draw: f64 = self.rng.sample(*dist);
                    draw.clamp(-noise_bound, noise_bound)
                }
                None => 0.0,
            };

            let bid_price = mid_price - price_offset - noise;
            let ask_price = mid_price + price_offset + noise;
            let quantity = self.base_quantity * self.quantity_decay.powi(level as i32);

            bids.push(OrderBookLevel {
                price: round6(bid_price),
                quantity: round6(quantity),
            });
            asks.push(OrderBookLevel {
                price: round6(ask_price),
                quantity: round6(quantity),
            });
        }

        OrderBookSnapshot::new(self.instrument_id.clone(), timestamp, bids, asks)
    }
}
