use std::collections::BTreeMap;

use tracing::debug;

use super::types::Allocation;
use crate::error::{ForecastError, Result};

/// Weight each currency by its share of total absolute forecasted cashflow.
///
/// When every forecast is exactly zero the allocation falls back to `1/n` per
/// currency. Near-zero totals are divided normally.
pub fn allocate<S: AsRef<[f64]>>(forecasts: &BTreeMap<String, S>) -> Result<Allocation> {
    if forecasts.is_empty() {
        return Err(ForecastError::invalid_input("cannot allocate over an empty forecast map"));
    }

    let mut magnitudes = BTreeMap::new();
    for (ccy, forecast) in forecasts {
        let values = forecast.as_ref();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::invalid_input(format!(
                "forecast for {} contains non-finite values",
                ccy
            )));
        }
        magnitudes.insert(ccy.clone(), values.iter().map(|v| v.abs()).sum::<f64>());
    }

    let grand_total: f64 = magnitudes.values().sum();
    if !grand_total.is_finite() {
        return Err(ForecastError::invalid_input("total forecast magnitude overflows"));
    }

    if grand_total == 0.0 {
        let equal = 1.0 / magnitudes.len() as f64;
        debug!(currencies = magnitudes.len(), "All forecasts are zero; allocating equally");
        let weights = magnitudes.keys().map(|c| (c.clone(), equal)).collect();
        return Ok(Allocation::new(weights, magnitudes, true));
    }

    let weights = magnitudes
        .iter()
        .map(|(c, m)| (c.clone(), m / grand_total))
        .collect();
    Ok(Allocation::new(weights, magnitudes, false))
}
