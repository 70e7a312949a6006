use chrono::{Duration, NaiveDate};
use ndarray::{Array2, Axis};

use crate::error::{ForecastError, Result};

/// Daily cashflow history: one row per date, one column per currency.
///
/// Missing observations are stored as `NaN`. Dates are strictly increasing and
/// contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct CashflowTable {
    dates: Vec<NaiveDate>,
    currencies: Vec<String>,
    values: Array2<f64>,
}

impl CashflowTable {
    pub fn new(dates: Vec<NaiveDate>, currencies: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if currencies.is_empty() {
            return Err(ForecastError::invalid_input("table has no currency columns"));
        }
        if dates.is_empty() {
            return Err(ForecastError::invalid_input("table has no rows"));
        }
        if values.nrows() != dates.len() || values.ncols() != currencies.len() {
            return Err(ForecastError::invalid_input(format!(
                "value matrix is {}x{} but table has {} dates and {} currencies",
                values.nrows(),
                values.ncols(),
                dates.len(),
                currencies.len()
            )));
        }
        for (i, ccy) in currencies.iter().enumerate() {
            if ccy.trim().is_empty() {
                return Err(ForecastError::invalid_input(format!("currency column {} has no name", i)));
            }
            if currencies[..i].contains(ccy) {
                return Err(ForecastError::invalid_input(format!("duplicate currency column {}", ccy)));
            }
        }
        for pair in dates.windows(2) {
            if pair[1] - pair[0] != Duration::days(1) {
                return Err(ForecastError::invalid_input(format!(
                    "dates must be contiguous and increasing by one day, found {} followed by {}",
                    pair[0], pair[1]
                )));
            }
        }

        Ok(Self {
            dates,
            currencies,
            values,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn currencies(&self) -> &[String] {
        &self.currencies
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    pub fn column_index(&self, currency: &str) -> Option<usize> {
        self.currencies.iter().position(|c| c == currency)
    }

    /// Copy of one currency column.
    pub fn series(&self, currency: &str) -> Result<Vec<f64>> {
        let idx = self
            .column_index(currency)
            .ok_or_else(|| ForecastError::invalid_input(format!("unknown currency {}", currency)))?;
        Ok(self.values.column(idx).to_vec())
    }

    /// Table restricted to `currencies`, in the requested order.
    pub fn select(&self, currencies: &[String]) -> Result<Self> {
        let mut indices = Vec::with_capacity(currencies.len());
        for ccy in currencies {
            let idx = self
                .column_index(ccy)
                .ok_or_else(|| ForecastError::invalid_input(format!("unknown currency {}", ccy)))?;
            indices.push(idx);
        }
        Self::new(
            self.dates.clone(),
            currencies.to_vec(),
            self.values.select(Axis(1), &indices),
        )
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// Replace each missing value with the previous valid value of its column.
    ///
    /// Leading gaps have nothing to carry forward and stay missing.
    pub fn forward_fill(&self) -> Self {
        let mut values = self.values.clone();
        for mut column in values.columns_mut() {
            let mut last = f64::NAN;
            for v in column.iter_mut() {
                if v.is_nan() {
                    *v = last;
                } else {
                    last = *v;
                }
            }
        }
        Self {
            dates: self.dates.clone(),
            currencies: self.currencies.clone(),
            values,
        }
    }
}
