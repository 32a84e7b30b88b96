//! Pump loop driver: pump all due feeds, sleep, repeat.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};

use super::service::MarketDataService;

pub struct MarketDataRunner {
    service: MarketDataService,
    interval: Duration,
}

impl MarketDataRunner {
    pub fn new(service: MarketDataService, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            anyhow::bail!("pump interval must be positive");
        }
        Ok(Self { service, interval })
    }

    /// Pump for a bounded number of iterations. A failed pump is logged and
    /// the loop continues on the next tick.
    pub async fn run_iterations(&mut self, iterations: u64) -> Result<()> {
        for _ in 0..iterations {
            self.pump_and_sleep().await;
        }
        Ok(())
    }

    /// Pump until the shutdown signal flips. Cancellation is honoured between
    /// iterations only; an in-flight pump always completes its retry sequence.
    pub async fn run_until_shutdown(&mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                info!("market data runner stopping");
                return;
            }
            if let Err(error) = self.service.pump_once().await {
                error!(error = %error, "pump iteration failed, continuing");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("market data runner stopping");
                        return;
                    }
                }
            }
        }
    }

    async fn pump_and_sleep(&mut self) {
        if let Err(error) = self.service.pump_once().await {
            error!(error = %error, "pump iteration failed, continuing");
        }
        tokio::time::sleep(self.interval).await;
    }
}
