use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::error::{ForecastError, Result};

/// Point forecast for one currency, dated from the day after the last observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    currency: String,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl Forecast {
    /// Dates run daily from `first_date`; fails if the calendar runs out first.
    pub fn new(currency: impl Into<String>, first_date: NaiveDate, values: Vec<f64>) -> Result<Self> {
        let currency = currency.into();
        let mut dates = Vec::with_capacity(values.len());
        let mut next = Some(first_date);
        for _ in 0..values.len() {
            let date = next.ok_or_else(|| {
                ForecastError::invalid_input(format!(
                    "forecast for {} runs past the last representable date",
                    currency
                ))
            })?;
            dates.push(date);
            next = date.succ_opt();
        }
        Ok(Self {
            currency,
            dates,
            values,
        })
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sum of absolute forecasted values.
    pub fn magnitude(&self) -> f64 {
        self.values.iter().map(|v| v.abs()).sum()
    }
}

impl AsRef<[f64]> for Forecast {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

/// Allocation weight per currency, summing to one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    weights: BTreeMap<String, f64>,
    magnitudes: BTreeMap<String, f64>,
    degenerate: bool,
}

impl Allocation {
    pub(crate) fn new(weights: BTreeMap<String, f64>, magnitudes: BTreeMap<String, f64>, degenerate: bool) -> Self {
        Self {
            weights,
            magnitudes,
            degenerate,
        }
    }

    pub fn weight(&self, currency: &str) -> Option<f64> {
        self.weights.get(currency).copied()
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn magnitude(&self, currency: &str) -> Option<f64> {
        self.magnitudes.get(currency).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.weights.iter()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    /// True when every forecast was zero and weights fell back to `1/n`.
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Weights scaled to percent.
    pub fn percentages(&self) -> BTreeMap<String, f64> {
        self.weights.iter().map(|(c, w)| (c.clone(), w * 100.0)).collect()
    }

    pub fn log_allocation(&self) {
        let mut rows: Vec<(&String, f64, f64)> = self
            .weights
            .iter()
            .map(|(ccy, &w)| (ccy, w, self.magnitudes.get(ccy).copied().unwrap_or(0.0)))
            .collect();

        // Sort by weight (descending)
        rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let summary = rows
            .iter()
            .map(|(ccy, weight, magnitude)| {
                format!("{}: Weight={:.2}%, Magnitude={:.2}", ccy, weight * 100.0, magnitude)
            })
            .collect::<Vec<_>>()
            .join("\n  ");

        info!(
            "Cashflow Allocation (sorted by weight):\n  {}\n\nAllocation Summary:\n  Currencies: {}\n  Total Weight: {:.2}%\n  Equal-weight fallback: {}",
            summary,
            self.len(),
            self.total_weight() * 100.0,
            self.degenerate
        );
    }
}

/// Output of one engine run.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastRun {
    pub currencies: Vec<String>,
    pub forecasts: BTreeMap<String, Forecast>,
    pub allocation: Allocation,
    /// Currencies whose forecast came from the non-seasonal retry
    pub relaxed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_dates_follow_start() {
        let start = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        let fc = Forecast::new("EUR", start, vec![1.0, -2.0, 3.0]).unwrap();
        assert_eq!(fc.len(), 3);
        assert_eq!(fc.dates()[2], NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(fc.magnitude(), 6.0);
    }

    #[test]
    fn test_forecast_past_calendar_end_is_rejected() {
        let err = Forecast::new("EUR", NaiveDate::MAX, vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidInput(_)));

        let last_day = Forecast::new("EUR", NaiveDate::MAX, vec![1.0]).unwrap();
        assert_eq!(last_day.dates(), &[NaiveDate::MAX]);
    }

    #[test]
    fn test_percentages() {
        let weights = BTreeMap::from([("EUR".to_string(), 0.25), ("USD".to_string(), 0.75)]);
        let alloc = Allocation::new(weights.clone(), weights, false);
        assert_eq!(alloc.percentages()["USD"], 75.0);
        assert_eq!(alloc.total_weight(), 1.0);
    }
}
