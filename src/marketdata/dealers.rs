//! OTC dealer quote fanout with jittered spreads.

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;

use super::models::{DealerQuoteEvent, ModelError};

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

pub struct DealerQuoteBuilder {
    instrument_id: String,
    dealers: Vec<String>,
    base_spread: f64,
    spread_volatility: f64,
    min_spread: f64,
    rng: ChaCha8Rng,
}

impl DealerQuoteBuilder {
    pub fn new(
        instrument_id: impl Into<String>,
        dealers: Vec<String>,
        base_spread: f64,
        spread_volatility: f64,
        min_spread: f64,
        seed: Option<u64>,
    ) -> Result<Self, ModelError> {
        if dealers.is_empty() {
            return Err(ModelError::InvalidParameter(
                "dealers must contain at least one dealer id".into(),
            ));
        }
        if base_spread <= 0.0 {
            return Err(ModelError::InvalidParameter(
                "base_spread must be positive".into(),
            ));
        }
        if spread_volatility < 0.0 {
            return Err(ModelError::InvalidParameter(
                "spread_volatility must be non-negative".into(),
            ));
        }
        if min_spread <= 0.0 {
            return Err(ModelError::InvalidParameter(
                "min_spread must be positive".into(),
            ));
        }
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(Self {
            instrument_id: instrument_id.into(),
            dealers,
            base_spread,
            spread_volatility,
            min_spread,
            rng,
        })
    }

    /// One quote per configured dealer around the given mid.
    pub fn generate(
        &mut self,
        mid_rate: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<DealerQuoteEvent>, ModelError> {
        if mid_rate <= 0.0 {
            return Err(ModelError::NonPositiveMid);
        }

        let jitter = if self.spread_volatility > 0.0 {
            Some(Normal::new(0.0, self.spread_volatility).expect("validated std deviation"))
        } else {
            None
        };

        let mut quotes = Vec::with_capacity(self.dealers.len());
        for dealer_id in &self.dealers {
            let mut spread = self.base_spread;
            if let Some(dist) = &jitter {
                let draw: f64 = self.rng.sample(*dist);
                spread += draw;
            }
            spread = spread.max(self.min_spread);

            let half_spread = spread / 2.0;
            quotes.push(DealerQuoteEvent::new(
                self.instrument_id.clone(),
                dealer_id.clone(),
                timestamp,
                round6(mid_rate - half_spread),
                round6(mid_rate + half_spread),
            )?);
        }
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn builder_rejects_empty_dealer_list() {
        assert!(DealerQuoteBuilder::new("SWAP-1", vec![], 0.01, 0.0, 1e-5, Some(1)).is_err());
    }

    #[test]
    fn generates_one_quote_per_dealer() {
        let mut builder = DealerQuoteBuilder::new(
            "SWAP-1",
            vec!["DEALER-A".into(), "DEALER-B".into(), "DEALER-C".into()],
            0.0004,
            0.0001,
            1e-5,
            Some(5),
        )
        .unwrap();

        let quotes = builder.generate(0.02, ts()).unwrap();
        assert_eq!(quotes.len(), 3);
        for quote in &quotes {
            assert!(quote.ask > quote.bid);
            assert_eq!(quote.instrument_id, "SWAP-1");
        }
        let dealer_ids: Vec<&str> = quotes.iter().map(|q| q.dealer_id.as_str()).collect();
        assert_eq!(dealer_ids, vec!["DEALER-A", "DEALER-B", "DEALER-C"]);
    }

    #[test]
    fn spread_floor_is_enforced() {
        // Huge negative jitter pulls the spread below the floor; min_spread wins.
        let mut builder = DealerQuoteBuilder::new(
            "SWAP-1",
            vec!["DEALER-A".into()],
            0.0001,
            10.0,
            0.0001,
            Some(2),
        )
        .unwrap();

        for _ in 0..20 {
            let quotes = builder.generate(100.0, ts()).unwrap();
            let spread = quotes[0].ask - quotes[0].bid;
            assert!(spread >= 0.0001 - 1e-9);
        }
    }

    #[test]
    fn zero_volatility_is_deterministic_without_rng_draws() {
        let mut builder = DealerQuoteBuilder::new(
            "SWAP-1",
            vec!["DEALER-A".into()],
            0.5,
            0.0,
            1e-5,
            Some(9),
        )
        .unwrap();

        let quotes = builder.generate(100.0, ts()).unwrap();
        assert_eq!(quotes[0].bid, 99.75);
        assert_eq!(quotes[0].ask, 100.25);
    }

    #[test]
    fn rejects_non_positive_mid() {
        let mut builder =
            DealerQuoteBuilder::new("SWAP-1", vec!["DEALER-A".into()], 0.01, 0.0, 1e-5, Some(1))
                .unwrap();
        assert!(builder.generate(0.0, ts()).is_err());
    }
}
