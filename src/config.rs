use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use dotenvy::dotenv;
use eyre::{Result, WrapErr, eyre};

use crate::data::simulation::SimulationConfig;
use crate::model::{ArimaOrder, SeasonalOrder, SolverSettings};
use crate::strategy::engine::EngineConfig;
use crate::strategy::strategy_constants::{
    DEFAULT_FIT_MAX_ITERS, DEFAULT_FIT_TIMEOUT_SECS, DEFAULT_HORIZON_DAYS, DEFAULT_OUTPUT_PATH,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub horizon: usize,
    pub order: ArimaOrder,
    pub seasonal: SeasonalOrder,
    /// Subset of currencies to forecast; empty means every column
    pub currencies: Vec<String>,
    /// CSV to load; simulated data is used when unset
    pub input_path: Option<PathBuf>,
    pub output_path: PathBuf,
    pub simulation: SimulationConfig,
    pub fit_timeout: Option<Duration>,
    pub fit_max_iters: u64,
    pub relax_on_failure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON_DAYS,
            order: ArimaOrder::default(),
            seasonal: SeasonalOrder::default(),
            currencies: Vec::new(),
            input_path: None,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            simulation: SimulationConfig::default(),
            fit_timeout: Some(Duration::from_secs(DEFAULT_FIT_TIMEOUT_SECS)),
            fit_max_iters: DEFAULT_FIT_MAX_ITERS,
            relax_on_failure: false,
        }
    }
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("FORECAST_HORIZON") {
            cfg.horizon = parse_var("FORECAST_HORIZON", &v)?;
            if cfg.horizon == 0 {
                return Err(eyre!("FORECAST_HORIZON must be positive"));
            }
        }
        if let Some(v) = get("SARIMA_ORDER") {
            cfg.order = parse_var("SARIMA_ORDER", &v)?;
        }
        if let Some(v) = get("SEASONAL_ORDER") {
            cfg.seasonal = parse_var("SEASONAL_ORDER", &v)?;
        }
        if let Some(v) = get("CURRENCIES") {
            cfg.currencies = parse_list(&v);
        }
        cfg.input_path = get("INPUT_PATH").map(PathBuf::from);
        if let Some(v) = get("OUTPUT_PATH") {
            cfg.output_path = PathBuf::from(v);
        }
        if let Some(v) = get("SIM_START") {
            cfg.simulation.start = parse_date("SIM_START", &v)?;
        }
        if let Some(v) = get("SIM_END") {
            cfg.simulation.end = parse_date("SIM_END", &v)?;
        }
        if let Some(v) = get("SIM_SEED") {
            cfg.simulation.seed = parse_var("SIM_SEED", &v)?;
        }
        if let Some(v) = get("FIT_TIMEOUT_SECS") {
            let secs: u64 = parse_var("FIT_TIMEOUT_SECS", &v)?;
            // 0 disables the wall-clock bound
            cfg.fit_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(v) = get("FIT_MAX_ITERS") {
            cfg.fit_max_iters = parse_var("FIT_MAX_ITERS", &v)?;
        }
        if let Some(v) = get("RELAX_ON_FAILURE") {
            cfg.relax_on_failure = parse_var("RELAX_ON_FAILURE", &v.to_lowercase())?;
        }

        Ok(cfg)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            horizon: self.horizon,
            order: self.order,
            seasonal: self.seasonal,
            solver: SolverSettings {
                max_iters: self.fit_max_iters,
                timeout: self.fit_timeout,
                ..SolverSettings::default()
            },
            relax_on_failure: self.relax_on_failure,
        }
    }
}

pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect()
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| eyre!("{}", e))
        .wrap_err_with(|| format!("Invalid {} value '{}'", key, raw))
}

fn parse_date(key: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").wrap_err_with(|| format!("Invalid {} value '{}'", key, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.horizon, 30);
        assert_eq!(cfg.seasonal, SeasonalOrder::new(1, 1, 1, 7));
    }

    #[test]
    fn test_reads_values() {
        let cfg = Config::from_lookup(lookup(&[
            ("FORECAST_HORIZON", "14"),
            ("SARIMA_ORDER", "2,1,0"),
            ("SEASONAL_ORDER", "0,0,0,0"),
            ("CURRENCIES", "eur, usd,"),
            ("SIM_SEED", "7"),
            ("FIT_TIMEOUT_SECS", "0"),
            ("RELAX_ON_FAILURE", "TRUE"),
        ]))
        .unwrap();
        assert_eq!(cfg.horizon, 14);
        assert_eq!(cfg.order, ArimaOrder::new(2, 1, 0));
        assert!(!cfg.seasonal.has_terms());
        assert_eq!(cfg.currencies, vec!["EUR", "USD"]);
        assert_eq!(cfg.simulation.seed, 7);
        assert_eq!(cfg.fit_timeout, None);
        assert!(cfg.relax_on_failure);
        assert_eq!(cfg.engine_config().solver.timeout, None);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[("FORECAST_HORIZON", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("FORECAST_HORIZON", "-3")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SEASONAL_ORDER", "1,1,1")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SIM_START", "01/01/2022")])).is_err());
    }
}
