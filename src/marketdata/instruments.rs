//! Instrument configuration: the JSON shapes accepted from the environment
//! and the wiring that turns one entry into a runnable feed.
//!
//! Scenario overrides are applied here, at construction time, so the
//! simulators themselves stay ignorant of scenario policy.

use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::dealers::DealerQuoteBuilder;
use super::feed::InstrumentFeed;
use super::ladder::LadderBookBuilder;
use super::metadata::{
    future_contract_metadata_factory, swap_curve_metadata_factory, MetadataFactory,
};
use super::simulation::{GbmSimulator, OuSimulator, PriceSimulator};

/// A halted feed is pushed out by at least one day.
const HALT_INTERVAL_MS: u64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentType {
    #[default]
    Equity,
    Rate,
    Option,
    Future,
    Swap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSettings {
    pub levels: usize,
    pub tick_size: f64,
    pub base_quantity: f64,
    #[serde(default = "default_quantity_decay")]
    pub quantity_decay: f64,
    #[serde(default)]
    pub price_noise: f64,
}

fn default_quantity_decay() -> f64 {
    0.7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealerQuoteSettings {
    pub dealers: Vec<String>,
    pub base_spread: f64,
    #[serde(default)]
    pub spread_volatility: f64,
    #[serde(default = "default_min_spread")]
    pub min_spread: f64,
}

fn default_min_spread() -> f64 {
    1e-5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioSettings {
    pub volatility_scale: Option<f64>,
    pub drift_shift: Option<f64>,
    pub long_run_mean_shift: Option<f64>,
    pub liquidity_regime: Option<String>,
    pub update_interval_ms_override: Option<u64>,
    #[serde(default)]
    pub halted: bool,
}

/// Named scenario presets selectable by `scenario_name`.
pub fn preset_scenarios() -> HashMap<String, ScenarioSettings> {
    HashMap::from([
        (
            "volatile".to_string(),
            ScenarioSettings {
                volatility_scale: Some(1.5),
                liquidity_regime: Some("LOW".to_string()),
                update_interval_ms_override: Some(1_500),
                ..Default::default()
            },
        ),
        (
            "halted".to_string(),
            ScenarioSettings {
                halted: true,
                update_interval_ms_override: Some(HALT_INTERVAL_MS),
                ..Default::default()
            },
        ),
        (
            "rally".to_string(),
            ScenarioSettings {
                drift_shift: Some(0.01),
                liquidity_regime: Some("HIGH".to_string()),
                ..Default::default()
            },
        ),
    ])
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstrumentConfig {
    pub instrument_id: String,
    pub instrument_type: InstrumentType,
    pub start_price: f64,
    pub tick_size: f64,
    pub step_seconds: f64,
    pub update_interval_ms: u64,
    #[serde(default = "default_regime")]
    pub liquidity_regime: String,
    pub seed: Option<u64>,
    pub drift: Option<f64>,
    pub volatility: Option<f64>,
    pub mean_reversion: Option<f64>,
    pub long_run_mean: Option<f64>,
    pub tenor: Option<String>,
    pub contract_month: Option<String>,
    pub curve_points: Option<BTreeMap<String, f64>>,
    pub dv01_per_million: Option<f64>,
    pub tick_value: Option<f64>,
    pub multiplier: Option<f64>,
    pub order_book: Option<OrderBookSettings>,
    pub dealer_quotes: Option<DealerQuoteSettings>,
    pub scenario: Option<ScenarioSettings>,
    pub scenario_name: Option<String>,
}

fn default_regime() -> String {
    "MEDIUM".to_string()
}

impl InstrumentConfig {
    /// Resolve the effective scenario: explicit settings win over a named
    /// preset; neither means no overrides.
    fn effective_scenario(&self) -> Result<ScenarioSettings> {
        if let Some(scenario) = &self.scenario {
            return Ok(scenario.clone());
        }
        if let Some(name) = &self.scenario_name {
            return preset_scenarios()
                .remove(name)
                .with_context(|| format!("unknown scenario preset '{name}'"));
        }
        Ok(ScenarioSettings::default())
    }

    fn build_simulator(&self, scenario: &ScenarioSettings) -> Result<Box<dyn PriceSimulator>> {
        match self.instrument_type {
            InstrumentType::Equity | InstrumentType::Option | InstrumentType::Future => {
                let (Some(drift), Some(volatility)) = (self.drift, self.volatility) else {
                    bail!(
                        "instrument {} requires drift and volatility",
                        self.instrument_id
                    );
                };
                let drift = drift + scenario.drift_shift.unwrap_or(0.0);
                let volatility = volatility * scenario.volatility_scale.unwrap_or(1.0);
                Ok(Box::new(GbmSimulator::new(
                    self.instrument_id.clone(),
                    self.start_price,
                    drift,
                    volatility,
                    self.step_seconds,
                    self.seed,
                )?))
            }
            InstrumentType::Rate | InstrumentType::Swap => {
                let (Some(mean_reversion), Some(long_run_mean), Some(volatility)) =
                    (self.mean_reversion, self.long_run_mean, self.volatility)
                else {
                    bail!(
                        "instrument {} requires mean_reversion, long_run_mean, and volatility",
                        self.instrument_id
                    );
                };
                let long_run_mean = long_run_mean + scenario.long_run_mean_shift.unwrap_or(0.0);
                let volatility = volatility * scenario.volatility_scale.unwrap_or(1.0);
                Ok(Box::new(OuSimulator::new(
                    self.instrument_id.clone(),
                    self.start_price,
                    mean_reversion,
                    long_run_mean,
                    volatility,
                    self.step_seconds,
                    self.seed,
                )?))
            }
        }
    }

    fn choose_metadata_factory(&self) -> Option<MetadataFactory> {
        match self.instrument_type {
            InstrumentType::Swap | InstrumentType::Rate => {
                let tenor = self.tenor.clone()?;
                let curve_points = self.curve_points.clone()?;
                let dv01 = self.dv01_per_million?;
                Some(swap_curve_metadata_factory(tenor, curve_points, dv01))
            }
            InstrumentType::Future | InstrumentType::Option => {
                let contract_month = self.contract_month.clone()?;
                let tick_value = self.tick_value?;
                let multiplier = self.multiplier?;
                let expiry = contract_month_to_date(&contract_month)?;
                Some(future_contract_metadata_factory(
                    self.instrument_id.clone(),
                    contract_month,
                    expiry,
                    tick_value,
                    multiplier,
                ))
            }
            InstrumentType::Equity => None,
        }
    }

    pub fn build_feed(&self) -> Result<InstrumentFeed> {
        let scenario = self.effective_scenario()?;
        let simulator = self.build_simulator(&scenario)?;

        let liquidity_regime = scenario
            .liquidity_regime
            .clone()
            .unwrap_or_else(|| self.liquidity_regime.clone());
        let mut update_interval_ms = scenario
            .update_interval_ms_override
            .unwrap_or(self.update_interval_ms);
        if scenario.halted {
            update_interval_ms = update_interval_ms.max(HALT_INTERVAL_MS);
        }

        let mut feed = InstrumentFeed::new(
            simulator,
            self.tick_size,
            liquidity_regime,
            Duration::milliseconds(update_interval_ms as i64),
        )
        .with_context(|| format!("building feed for {}", self.instrument_id))?;

        if let Some(factory) = self.choose_metadata_factory() {
            feed = feed.with_metadata_factory(factory);
        }
        if let Some(settings) = &self.order_book {
            feed = feed.with_book_builder(LadderBookBuilder::new(
                self.instrument_id.clone(),
                settings.levels,
                settings.tick_size,
                settings.base_quantity,
                settings.quantity_decay,
                settings.price_noise,
                self.seed,
            )?);
        }
        if let Some(settings) = &self.dealer_quotes {
            feed = feed.with_quote_builder(DealerQuoteBuilder::new(
                self.instrument_id.clone(),
                settings.dealers.clone(),
                settings.base_spread,
                settings.spread_volatility,
                settings.min_spread,
                self.seed,
            )?);
        }
        Ok(feed)
    }
}

fn contract_month_to_date(contract_month: &str) -> Option<NaiveDate> {
    let (year, month) = contract_month.split_once('-')?;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

/// Instruments served when `MARKET_DATA_INSTRUMENTS` is unset: one equity
/// with a ladder book, one rate with dealer quotes, one future.
pub fn default_instruments() -> Vec<InstrumentConfig> {
    vec![
        InstrumentConfig {
            instrument_id: "EQ-ACME".to_string(),
            instrument_type: InstrumentType::Equity,
            start_price: 100.0,
            tick_size: 0.01,
            step_seconds: 1.0,
            update_interval_ms: 500,
            liquidity_regime: "HIGH".to_string(),
            seed: Some(1),
            drift: Some(0.05),
            volatility: Some(0.2),
            order_book: Some(OrderBookSettings {
                levels: 3,
                tick_size: 0.01,
                base_quantity: 500.0,
                quantity_decay: 0.6,
                price_noise: 0.0,
            }),
            ..Default::default()
        },
        InstrumentConfig {
            instrument_id: "BOND-5Y".to_string(),
            instrument_type: InstrumentType::Rate,
            start_price: 0.015,
            tick_size: 0.0001,
            step_seconds: 1.0,
            update_interval_ms: 1_000,
            liquidity_regime: "MEDIUM".to_string(),
            seed: Some(2),
            volatility: Some(0.0008),
            mean_reversion: Some(0.6),
            long_run_mean: Some(0.018),
            tenor: Some("5Y".to_string()),
            curve_points: Some(BTreeMap::from([
                ("1Y".to_string(), 0.012),
                ("3Y".to_string(), 0.014),
                ("5Y".to_string(), 0.016),
            ])),
            dv01_per_million: Some(540.0),
            dealer_quotes: Some(DealerQuoteSettings {
                dealers: vec!["DEALER-A".to_string(), "DEALER-B".to_string()],
                base_spread: 0.0004,
                spread_volatility: 0.0001,
                min_spread: 1e-5,
            }),
            ..Default::default()
        },
        InstrumentConfig {
            instrument_id: "FUT-ES".to_string(),
            instrument_type: InstrumentType::Future,
            start_price: 4_300.0,
            tick_size: 0.25,
            step_seconds: 1.0,
            update_interval_ms: 250,
            liquidity_regime: "HIGH".to_string(),
            seed: Some(3),
            drift: Some(0.01),
            volatility: Some(0.18),
            contract_month: Some("2024-06".to_string()),
            tick_value: Some(12.5),
            multiplier: Some(50.0),
            ..Default::default()
        },
    ]
}

/// Parse the env-provided JSON list, falling back to the defaults.
pub fn load_instrument_configs(raw: Option<&str>) -> Result<Vec<InstrumentConfig>> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => {
            serde_json::from_str(raw).context("MARKET_DATA_INSTRUMENTS must be a JSON list")
        }
        _ => Ok(default_instruments()),
    }
}
