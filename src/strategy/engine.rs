use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use super::{
    allocator, forecaster,
    strategy_constants::DEFAULT_HORIZON_DAYS,
    types::{Forecast, ForecastRun},
};
use crate::data::CashflowTable;
use crate::error::Result;
use crate::model::{ArimaOrder, Sarima, SeasonalOrder, SolverSettings};

/// Settings for one forecast-and-allocate run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub horizon: usize,
    pub order: ArimaOrder,
    pub seasonal: SeasonalOrder,
    pub solver: SolverSettings,
    /// Retry a failed fit once without seasonal terms
    pub relax_on_failure: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON_DAYS,
            order: ArimaOrder::default(),
            seasonal: SeasonalOrder::default(),
            solver: SolverSettings::default(),
            relax_on_failure: false,
        }
    }
}

/// Forecast every currency of `table` and allocate across the forecasts.
///
/// Currencies are fitted in parallel; the first failure (in column order) is
/// returned and no partial allocation is produced.
#[instrument(name = "strategy_engine", skip(table, config), fields(on_close = true, currencies = table.currencies().len(), horizon = config.horizon))]
pub fn run_strategy_engine(table: &CashflowTable, config: &EngineConfig) -> Result<ForecastRun> {
    info!("Starting strategy engine...");

    let model = Sarima::new(config.order, config.seasonal)?.with_settings(config.solver);
    let relaxed_model = if config.relax_on_failure && config.seasonal.has_terms() {
        Some(Sarima::new(config.order, SeasonalOrder::none())?.with_settings(config.solver))
    } else {
        None
    };

    // Run models on each currency in parallel - results come back in column order
    let results: Vec<(String, Result<(Forecast, bool)>)> = table
        .currencies()
        .par_iter()
        .map(|ccy| {
            let outcome = forecast_one(table, ccy, config.horizon, &model, relaxed_model.as_ref());
            (ccy.clone(), outcome)
        })
        .collect();

    let mut forecasts = BTreeMap::new();
    let mut relaxed = Vec::new();
    for (ccy, outcome) in results {
        let (forecast, was_relaxed) = outcome?;
        if was_relaxed {
            relaxed.push(ccy.clone());
        }
        forecasts.insert(ccy, forecast);
    }
    debug!("Currency forecasts calculated");

    let allocation = allocator::allocate(&forecasts)?;
    debug!("Allocation weights calculated");

    Ok(ForecastRun {
        currencies: table.currencies().to_vec(),
        forecasts,
        allocation,
        relaxed,
    })
}

fn forecast_one(
    table: &CashflowTable,
    currency: &str,
    horizon: usize,
    model: &Sarima,
    relaxed_model: Option<&Sarima>,
) -> Result<(Forecast, bool)> {
    match forecaster::forecast_with_model(table, currency, horizon, model) {
        Ok(forecast) => Ok((forecast, false)),
        Err(e) if e.is_model_fit() => match relaxed_model {
            Some(relaxed) => {
                warn!(currency, error = %e, "Seasonal fit failed, retrying without seasonal terms");
                let forecast = forecaster::forecast_with_model(table, currency, horizon, relaxed)?;
                Ok((forecast, true))
            }
            None => Err(e),
        },
        Err(e) => Err(e),
    }
}
