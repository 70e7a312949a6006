use thiserror::Error;

/// Errors raised by the forecasting and allocation core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    /// Malformed or empty input, non-positive horizon, unresolved missing values
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Optimizer non-convergence or not enough data for the requested orders
    #[error("model fit failed: {0}")]
    ModelFit(String),
}

impl ForecastError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn model_fit(msg: impl Into<String>) -> Self {
        Self::ModelFit(msg.into())
    }

    pub fn is_model_fit(&self) -> bool {
        matches!(self, Self::ModelFit(_))
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
