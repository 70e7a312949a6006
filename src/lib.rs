pub mod chart;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod report;
pub mod strategy;

pub use error::{ForecastError, Result};
