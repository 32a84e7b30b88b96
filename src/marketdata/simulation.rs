//! Seeded stochastic price processes.
//!
//! Both simulators wrap a `ChaCha8Rng` so that a fixed `(seed, parameters)`
//! pair replays the exact same mark sequence, including after `reset()`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use super::models::ModelError;

/// Capability interface consumed by the emission pipeline.
pub trait PriceSimulator: Send {
    fn instrument_id(&self) -> &str;

    /// Advance the process by one time step and return the new mark.
    fn next_value(&mut self) -> f64;

    /// Restore initial state and re-seed the generator for replay.
    fn reset(&mut self);
}

fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Geometric Brownian motion path for equities, options, and futures.
pub struct GbmSimulator {
    instrument_id: String,
    start_price: f64,
    price: f64,
    drift: f64,
    volatility: f64,
    step_seconds: f64,
    seed: Option<u64>,
    rng: ChaCha8Rng,
}

impl GbmSimulator {
    pub fn new(
        instrument_id: impl Into<String>,
        start_price: f64,
        drift: f64,
        volatility: f64,
        step_seconds: f64,
        seed: Option<u64>,
    ) -> Result<Self, ModelError> {
        if start_price <= 0.0 {
            return Err(ModelError::InvalidParameter(
                "start_price must be positive".into(),
            ));
        }
        if volatility < 0.0 {
            return Err(ModelError::InvalidParameter(
                "volatility must be non-negative".into(),
            ));
        }
        if step_seconds <= 0.0 {
            return Err(ModelError::InvalidParameter(
                "step_seconds must be positive".into(),
            ));
        }
        Ok(Self {
            instrument_id: instrument_id.into(),
            start_price,
            price: start_price,
            drift,
            volatility,
            step_seconds,
            seed,
            rng: seeded_rng(seed),
        })
    }
}

impl PriceSimulator for GbmSimulator {
    fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    fn next_value(&mut self) -> f64 {
        let shock: f64 = self.rng.sample(StandardNormal);
        let dt = self.step_seconds;
        let drift_term = (self.drift - 0.5 * self.volatility * self.volatility) * dt;
        let diffusion_term = self.volatility * dt.sqrt() * shock;
        self.price *= (drift_term + diffusion_term).exp();
        self.price
    }

    fn reset(&mut self) {
        self.price = self.start_price;
        self.rng = seeded_rng(self.seed);
    }
}

/// Ornstein-Uhlenbeck mean-reverting process for rates and swaps. Rates may
/// go negative.
pub struct OuSimulator {
    instrument_id: String,
    start_rate: f64,
    rate: f64,
    mean_reversion: f64,
    long_run_mean: f64,
    volatility: f64,
    step_seconds: f64,
    seed: Option<u64>,
    rng: ChaCha8Rng,
}

impl OuSimulator {
    pub fn new(
        instrument_id: impl Into<String>,
        start_rate: f64,
        mean_reversion: f64,
        long_run_mean: f64,
        volatility: f64,
        step_seconds: f64,
        seed: Option<u64>,
    ) -> Result<Self, ModelError> {
        if mean_reversion < 0.0 {
            return Err(ModelError::InvalidParameter(
                "mean_reversion must be non-negative".into(),
            ));
        }
        if volatility < 0.0 {
            return Err(ModelError::InvalidParameter(
                "volatility must be non-negative".into(),
            ));
        }
        if step_seconds <= 0.0 {
            return Err(ModelError::InvalidParameter(
                "step_seconds must be positive".into(),
            ));
        }
        Ok(Self {
            instrument_id: instrument_id.into(),
            start_rate,
            rate: start_rate,
            mean_reversion,
            long_run_mean,
            volatility,
            step_seconds,
            seed,
            rng: seeded_rng(seed),
        })
    }
}

impl PriceSimulator for OuSimulator {
    fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    fn next_value(&mut self) -> f64 {
        let shock: f64 = self.rng.sample(StandardNormal);
        let dt = self.step_seconds;
        let drift_component = self.mean_reversion * (self.long_run_mean - self.rate) * dt;
        let diffusion_component = self.volatility * dt.sqrt() * shock;
        self.rate += drift_component + diffusion_component;
        self.rate
    }

    fn reset(&mut self) {
        self.rate = self.start_rate;
        self.rng = seeded_rng(self.seed);
    }
}
