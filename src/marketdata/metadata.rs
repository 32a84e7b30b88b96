//! Per-instrument metadata attached to emitted ticks.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::{json, Value};

use super::models::Metadata;

/// Closure producing tick metadata from the current mark.
pub type MetadataFactory = Box<dyn Fn(f64) -> Metadata + Send + Sync>;

fn to_map(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("metadata factories always build objects"),
    }
}

/// Swap curve context: tenor, curve points, and DV01 per million notional.
pub fn swap_curve_metadata_factory(
    tenor: String,
    curve_points: BTreeMap<String, f64>,
    dv01_per_million: f64,
) -> MetadataFactory {
    Box::new(move |mark| {
        to_map(json!({
            "instrument_type": "SWAP",
            "tenor": tenor,
            "curve": curve_points,
            "dv01_per_million": dv01_per_million,
            "mark": mark,
        }))
    })
}

/// Listed future contract context, including the mark-derived notional.
pub fn future_contract_metadata_factory(
    symbol: String,
    contract_month: String,
    expiry: NaiveDate,
    tick_value: f64,
    multiplier: f64,
) -> MetadataFactory {
    Box::new(move |mark| {
        to_map(json!({
            "instrument_type": "FUTURE",
            "symbol": symbol,
            "contract_month": contract_month,
            "expiry": expiry.format("%Y-%m-%d").to_string(),
            "tick_value": tick_value,
            "multiplier": multiplier,
            "notional": mark * multiplier,
        }))
    })
}
