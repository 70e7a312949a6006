use chrono::Duration;
use tracing::{debug, instrument};

use super::types::Forecast;
use crate::data::CashflowTable;
use crate::error::{ForecastError, Result};
use crate::model::{ArimaOrder, Sarima, SeasonalOrder};

/// Fit a seasonal ARIMA model to one currency column and forecast `periods` days.
pub fn forecast_currency(
    table: &CashflowTable,
    currency: &str,
    periods: usize,
    order: ArimaOrder,
    seasonal: SeasonalOrder,
) -> Result<Forecast> {
    let model = Sarima::new(order, seasonal)?;
    forecast_with_model(table, currency, periods, &model)
}

/// Same as [`forecast_currency`] with a preconfigured model (solver limits included).
#[instrument(skip(table, model), fields(on_close = true))]
pub fn forecast_with_model(
    table: &CashflowTable,
    currency: &str,
    periods: usize,
    model: &Sarima,
) -> Result<Forecast> {
    if periods == 0 {
        return Err(ForecastError::invalid_input("forecast horizon must be positive"));
    }
    let series = table.series(currency)?;
    if series.iter().any(|v| v.is_nan()) {
        return Err(ForecastError::invalid_input(format!(
            "{} has missing values; forward-fill the table first",
            currency
        )));
    }

    let fitted = model.fit(&series)?;
    let values = fitted.forecast(periods);
    if values.len() != periods || values.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::model_fit(format!(
            "forecast for {} is not finite",
            currency
        )));
    }
    debug!(currency, aic = fitted.aic(), "\n{}", fitted.summary());

    let first_date = table
        .last_date()
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| ForecastError::invalid_input("last date has no successor"))?;

    Forecast::new(currency, first_date, values)
}
