use chrono::NaiveDate;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{debug, instrument};

use super::table::CashflowTable;
use crate::error::{ForecastError, Result};

pub const DEFAULT_CURRENCIES: [&str; 6] = ["EUR", "USD", "JPY", "BRL", "INR", "AUD"];

/// Parameters of the simulated cumulative cashflow generator.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub start: NaiveDate,
    /// Inclusive
    pub end: NaiveDate,
    pub currencies: Vec<String>,
    pub seed: u64,
    /// Standard deviation of the daily cashflow
    pub daily_scale: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            currencies: DEFAULT_CURRENCIES.iter().map(|c| c.to_string()).collect(),
            seed: 42,
            daily_scale: 100.0,
        }
    }
}

/// Generate a random-walk table: each currency is the running sum of normal
/// daily cashflows. The generator owns its RNG, so no global state is touched.
#[instrument(skip(config), fields(start = %config.start, end = %config.end, seed = config.seed))]
pub fn simulate_cashflows(config: &SimulationConfig) -> Result<CashflowTable> {
    if config.end < config.start {
        return Err(ForecastError::invalid_input(format!(
            "simulation end {} is before start {}",
            config.end, config.start
        )));
    }
    if config.currencies.is_empty() {
        return Err(ForecastError::invalid_input("simulation needs at least one currency"));
    }

    let dates: Vec<NaiveDate> = config
        .start
        .iter_days()
        .take_while(|d| *d <= config.end)
        .collect();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut values = Array2::zeros((dates.len(), config.currencies.len()));
    for mut column in values.columns_mut() {
        let mut running = 0.0;
        for v in column.iter_mut() {
            let shock: f64 = rng.sample(StandardNormal);
            running += shock * config.daily_scale;
            *v = running;
        }
    }
    debug!(rows = dates.len(), currencies = config.currencies.len(), "Simulated cashflow table");

    CashflowTable::new(dates, config.currencies.clone(), values)
}
