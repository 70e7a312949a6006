//! Seasonal ARIMA model fitted by maximum likelihood.
//!
//! The model is the multiplicative form
//!
//! ```text
//! phi(B) Phi(B^s) (1 - B)^d (1 - B^s)^D y_t = theta(B) Theta(B^s) e_t
//! ```
//!
//! with Gaussian innovations. The likelihood is conditioned on the first
//! observations of the differenced series and the innovation variance is
//! concentrated out, leaving only the lag coefficients for a Nelder-Mead search.
//! Coefficients are optimized in an unconstrained space and mapped through partial
//! autocorrelations, so every candidate is stationary and invertible.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use argmin::core::{Executor, State, TerminationReason};
use argmin::solver::neldermead::NelderMead;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::likelihood::{Coefficients, ConditionalLikelihood, ParamLayout, innovations};
use super::polynomial::{apply_differencing, differencing_polynomial, integrate};
use crate::error::{ForecastError, Result};
use crate::strategy::strategy_constants::{DEFAULT_FIT_MAX_ITERS, DEFAULT_FIT_TIMEOUT_SECS};

/// Non-seasonal `(p, d, q)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

/// Seasonal `(P, D, Q, s)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub period: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl SeasonalOrder {
    pub fn new(p: usize, d: usize, q: usize, period: usize) -> Self {
        Self { p, d, q, period }
    }

    /// No seasonal component.
    pub fn none() -> Self {
        Self::new(0, 0, 0, 0)
    }

    pub fn has_terms(&self) -> bool {
        self.p + self.d + self.q > 0
    }
}

impl Default for SeasonalOrder {
    fn default() -> Self {
        Self::new(1, 1, 1, 7)
    }
}

fn parse_components<const N: usize>(s: &str) -> Result<[usize; N]> {
    let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
    let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(ForecastError::invalid_input(format!(
            "expected {} comma separated integers, got '{}'",
            N, s
        )));
    }
    let mut out = [0usize; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part.parse().map_err(|_| {
            ForecastError::invalid_input(format!("'{}' is not a non-negative integer", part))
        })?;
    }
    Ok(out)
}

impl FromStr for ArimaOrder {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let [p, d, q] = parse_components::<3>(s)?;
        Ok(Self::new(p, d, q))
    }
}

impl FromStr for SeasonalOrder {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let [p, d, q, period] = parse_components::<4>(s)?;
        Ok(Self::new(p, d, q, period))
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

impl fmt::Display for SeasonalOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{},{})", self.p, self.d, self.q, self.period)
    }
}

/// Optimizer limits applied to every fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    pub max_iters: u64,
    /// Wall-clock bound per fit
    pub timeout: Option<Duration>,
    /// Convergence threshold on the spread of simplex costs
    pub sd_tolerance: f64,
    /// Size of the initial simplex edges in unconstrained space
    pub initial_step: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iters: DEFAULT_FIT_MAX_ITERS,
            timeout: Some(Duration::from_secs(DEFAULT_FIT_TIMEOUT_SECS)),
            sd_tolerance: 1e-8,
            initial_step: 0.5,
        }
    }
}

/// Unfitted model: orders plus solver limits.
#[derive(Debug, Clone, PartialEq)]
pub struct Sarima {
    order: ArimaOrder,
    seasonal: SeasonalOrder,
    settings: SolverSettings,
}

impl Sarima {
    pub fn new(order: ArimaOrder, seasonal: SeasonalOrder) -> Result<Self> {
        if seasonal.has_terms() && seasonal.period < 2 {
            return Err(ForecastError::invalid_input(format!(
                "seasonal order {} needs a period of at least 2",
                seasonal
            )));
        }
        Ok(Self {
            order,
            seasonal,
            settings: SolverSettings::default(),
        })
    }

    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn seasonal(&self) -> SeasonalOrder {
        self.seasonal
    }

    fn layout(&self) -> ParamLayout {
        ParamLayout {
            p: self.order.p,
            q: self.order.q,
            seasonal_p: self.seasonal.p,
            seasonal_q: self.seasonal.q,
            period: self.seasonal.period,
        }
    }

    /// Number of estimated lag coefficients.
    pub fn n_params(&self) -> usize {
        self.layout().len()
    }

    /// Shortest series the model accepts.
    pub fn min_observations(&self) -> usize {
        let s = self.seasonal.period;
        self.order.d
            + s * self.seasonal.d
            + self.order.p
            + s * self.seasonal.p
            + self.order.q
            + s * self.seasonal.q
            + self.n_params()
            + 1
    }

    #[instrument(name = "sarima_fit", skip(self, data), fields(on_close = true, nobs = data.len(), order = %self.order, seasonal = %self.seasonal))]
    pub fn fit(&self, data: &[f64]) -> Result<FittedSarima> {
        if data.iter().any(|x| !x.is_finite()) {
            return Err(ForecastError::invalid_input(
                "series contains missing or infinite values",
            ));
        }
        let required = self.min_observations();
        if data.len() < required {
            return Err(ForecastError::model_fit(format!(
                "insufficient data for SARIMA{}x{}: need {} observations, got {}",
                self.order,
                self.seasonal,
                required,
                data.len()
            )));
        }

        let diff_poly = differencing_polynomial(self.order.d, self.seasonal.d, self.seasonal.period);
        let differenced = apply_differencing(data, &diff_poly);
        check_variation(&differenced)?;

        let layout = self.layout();
        let problem = ConditionalLikelihood {
            differenced: differenced.clone(),
            layout,
        };

        let (params, iterations) = if layout.len() == 0 {
            (Vec::new(), 0)
        } else {
            self.optimize(problem.clone(), layout.len())?
        };

        let (nll, sigma2) = problem.evaluate(&params);
        if !nll.is_finite() {
            return Err(ForecastError::model_fit("likelihood is not finite at the optimum"));
        }

        let coefficients = layout.coefficients(&params);
        let (ar_weights, ma_weights) = coefficients.lag_weights(self.seasonal.period);
        let residuals = innovations(&differenced, &ar_weights, &ma_weights);

        debug!(iterations, log_likelihood = -nll, sigma2, "SARIMA fit converged");

        Ok(FittedSarima {
            order: self.order,
            seasonal: self.seasonal,
            coefficients,
            ar_weights,
            ma_weights,
            diff_poly,
            history: data.to_vec(),
            differenced,
            residuals,
            sigma2,
            log_likelihood: -nll,
            iterations,
        })
    }

    fn optimize(&self, problem: ConditionalLikelihood, n_params: usize) -> Result<(Vec<f64>, u64)> {
        let origin = vec![0.0; n_params];
        let mut simplex = vec![origin.clone()];
        for i in 0..n_params {
            let mut vertex = origin.clone();
            vertex[i] += self.settings.initial_step;
            simplex.push(vertex);
        }

        let solver = NelderMead::new(simplex)
            .with_sd_tolerance(self.settings.sd_tolerance)
            .map_err(|e| ForecastError::model_fit(format!("invalid solver settings: {}", e)))?;

        let max_iters = self.settings.max_iters;
        let mut executor = Executor::new(problem, solver).configure(|state| state.max_iters(max_iters));
        if let Some(timeout) = self.settings.timeout {
            executor = executor.timeout(timeout);
        }

        let result = executor
            .run()
            .map_err(|e| ForecastError::model_fit(format!("optimizer failed: {}", e)))?;
        let state = result.state();

        match state.get_termination_reason() {
            Some(TerminationReason::SolverConverged) | Some(TerminationReason::TargetCostReached) => {}
            Some(reason) => {
                return Err(ForecastError::model_fit(format!(
                    "optimizer did not converge after {} iterations: {:?}",
                    state.get_iter(),
                    reason
                )));
            }
            None => return Err(ForecastError::model_fit("optimizer stopped without a result")),
        }

        if !state.get_best_cost().is_finite() {
            return Err(ForecastError::model_fit("optimizer found no finite likelihood"));
        }
        let params = state
            .get_best_param()
            .cloned()
            .ok_or_else(|| ForecastError::model_fit("optimizer returned no parameters"))?;

        Ok((params, state.get_iter()))
    }
}

fn check_variation(differenced: &[f64]) -> Result<()> {
    let first = differenced.first().copied().unwrap_or(0.0);
    let n = differenced.len() as f64;
    let mean = differenced.iter().sum::<f64>() / n;
    let var = differenced.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let max_abs = differenced.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    // Only a constant series is rejected; the bound is relative to the level
    if differenced.iter().all(|x| *x == first) || var <= (f64::EPSILON * max_abs).powi(2) {
        return Err(ForecastError::model_fit(
            "series has no variation after differencing",
        ));
    }
    Ok(())
}

/// A fitted model, able to produce point forecasts.
#[derive(Debug, Clone)]
pub struct FittedSarima {
    order: ArimaOrder,
    seasonal: SeasonalOrder,
    coefficients: Coefficients,
    ar_weights: Vec<f64>,
    ma_weights: Vec<f64>,
    diff_poly: Vec<f64>,
    history: Vec<f64>,
    differenced: Vec<f64>,
    residuals: Vec<f64>,
    sigma2: f64,
    log_likelihood: f64,
    iterations: u64,
}

impl FittedSarima {
    /// Point forecasts (conditional means) for the next `steps` observations.
    pub fn forecast(&self, steps: usize) -> Vec<f64> {
        let mut w = self.differenced.clone();
        let mut e = self.residuals.clone();
        let start = w.len();

        for _ in 0..steps {
            let t = w.len();
            let ar: f64 = self
                .ar_weights
                .iter()
                .enumerate()
                .map(|(j, a)| a * w[t - j - 1])
                .sum();
            let ma: f64 = self
                .ma_weights
                .iter()
                .enumerate()
                .take(t)
                .map(|(j, b)| b * e[t - j - 1])
                .sum();
            w.push(ar + ma);
            e.push(0.0);
        }

        integrate(&self.history, &w[start..], &self.diff_poly)
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn seasonal(&self) -> SeasonalOrder {
        self.seasonal
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.coefficients.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.coefficients.ma
    }

    pub fn seasonal_ar_coefficients(&self) -> &[f64] {
        &self.coefficients.seasonal_ar
    }

    pub fn seasonal_ma_coefficients(&self) -> &[f64] {
        &self.coefficients.seasonal_ma
    }

    /// Innovation variance estimate.
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Akaike information criterion, counting the variance as a parameter.
    pub fn aic(&self) -> f64 {
        let k = (self.coefficients.ar.len()
            + self.coefficients.ma.len()
            + self.coefficients.seasonal_ar.len()
            + self.coefficients.seasonal_ma.len()
            + 1) as f64;
        -2.0 * self.log_likelihood + 2.0 * k
    }

    /// Observations entering the conditional likelihood.
    pub fn nobs(&self) -> usize {
        self.differenced.len() - self.ar_weights.len()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn summary(&self) -> String {
        let mut s = format!("SARIMA{}x{} Model Summary\n", self.order, self.seasonal);
        s.push_str(&"=".repeat(40));
        s.push('\n');
        let blocks = [
            ("AR", "phi", &self.coefficients.ar),
            ("MA", "theta", &self.coefficients.ma),
            ("Seasonal AR", "Phi", &self.coefficients.seasonal_ar),
            ("Seasonal MA", "Theta", &self.coefficients.seasonal_ma),
        ];
        for (title, symbol, coeffs) in blocks {
            if coeffs.is_empty() {
                continue;
            }
            s.push_str(&format!("{} Coefficients:\n", title));
            for (i, c) in coeffs.iter().enumerate() {
                s.push_str(&format!("  {}{} = {:.6}\n", symbol, i + 1, c));
            }
        }
        s.push_str(&format!("Sigma2: {:.6}\n", self.sigma2));
        s.push_str(&format!("Log likelihood: {:.3}\n", self.log_likelihood));
        s.push_str(&format!("AIC: {:.2}\n", self.aic()));
        s.push_str(&format!("Observations: {}\n", self.nobs()));
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn simulate_ar1(phi: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut out = Vec::with_capacity(n);
        let mut prev = 0.0;
        for _ in 0..n {
            prev = phi * prev + normal.sample(&mut rng);
            out.push(prev);
        }
        out
    }

    #[test]
    fn test_order_parsing() {
        assert_eq!("1,1,1".parse::<ArimaOrder>().unwrap(), ArimaOrder::new(1, 1, 1));
        assert_eq!("(2, 0, 1)".parse::<ArimaOrder>().unwrap(), ArimaOrder::new(2, 0, 1));
        assert_eq!(
            "1,1,1,7".parse::<SeasonalOrder>().unwrap(),
            SeasonalOrder::default()
        );
        assert!("1,1".parse::<ArimaOrder>().is_err());
        assert!("1,-1,1,7".parse::<SeasonalOrder>().is_err());
    }

    #[test]
    fn test_seasonal_terms_need_period() {
        let err = Sarima::new(ArimaOrder::default(), SeasonalOrder::new(1, 0, 0, 1)).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidInput(_)));
        assert!(Sarima::new(ArimaOrder::default(), SeasonalOrder::none()).is_ok());
    }

    #[test]
    fn test_min_observations_default_orders() {
        let model = Sarima::new(ArimaOrder::default(), SeasonalOrder::default()).unwrap();
        assert_eq!(model.n_params(), 4);
        assert_eq!(model.min_observations(), 29);
    }

    #[test]
    fn test_short_series_is_model_fit_error() {
        let model = Sarima::new(ArimaOrder::default(), SeasonalOrder::default()).unwrap();
        let data: Vec<f64> = (0..20).map(|x| (x as f64).sin()).collect();
        let err = model.fit(&data).unwrap_err();
        assert!(err.is_model_fit());
    }

    #[test]
    fn test_nan_is_invalid_input() {
        let model = Sarima::new(ArimaOrder::new(1, 0, 0), SeasonalOrder::none()).unwrap();
        let mut data = simulate_ar1(0.5, 100, 1);
        data[50] = f64::NAN;
        let err = model.fit(&data).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidInput(_)));
    }

    #[test]
    fn test_constant_series_is_model_fit_error() {
        let model = Sarima::new(ArimaOrder::new(1, 0, 0), SeasonalOrder::none()).unwrap();
        let err = model.fit(&vec![3.0; 100]).unwrap_err();
        assert!(err.is_model_fit());
    }

    #[test]
    fn test_large_level_series_with_noise_fits() {
        let data: Vec<f64> = (0..500)
            .map(|t| 1e9 + 10.0 * (1.3 * t as f64).sin() + ((t * 7919) % 13) as f64)
            .collect();
        let model = Sarima::new(ArimaOrder::new(1, 0, 0), SeasonalOrder::none()).unwrap();
        let fitted = model.fit(&data).unwrap();
        assert!(fitted.forecast(5).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_iteration_cap_is_model_fit_error() {
        let data = simulate_ar1(0.6, 300, 9);
        let settings = SolverSettings {
            max_iters: 3,
            ..SolverSettings::default()
        };
        let model = Sarima::new(ArimaOrder::new(1, 0, 1), SeasonalOrder::none())
            .unwrap()
            .with_settings(settings);
        let err = model.fit(&data).unwrap_err();
        assert!(err.is_model_fit());
        assert!(err.to_string().contains("MaxItersReached"));
    }

    #[test]
    fn test_timeout_is_model_fit_error() {
        let data = simulate_ar1(0.6, 300, 9);
        let settings = SolverSettings {
            timeout: Some(std::time::Duration::from_nanos(1)),
            ..SolverSettings::default()
        };
        let model = Sarima::new(ArimaOrder::default(), SeasonalOrder::default())
            .unwrap()
            .with_settings(settings);
        let err = model.fit(&data).unwrap_err();
        assert!(err.is_model_fit());
    }

    #[test]
    fn test_recovers_ar1_coefficient() {
        let data = simulate_ar1(0.7, 2000, 7);
        let model = Sarima::new(ArimaOrder::new(1, 0, 0), SeasonalOrder::none()).unwrap();
        let fitted = model.fit(&data).unwrap();
        assert_abs_diff_eq!(fitted.ar_coefficients()[0], 0.7, epsilon = 0.06);
        assert_abs_diff_eq!(fitted.sigma2(), 1.0, epsilon = 0.1);
    }

    #[test]
    fn test_random_walk_forecast_is_flat() {
        let model = Sarima::new(ArimaOrder::new(0, 1, 0), SeasonalOrder::none()).unwrap();
        let data: Vec<f64> = simulate_ar1(1.0, 50, 3);
        let fitted = model.fit(&data).unwrap();
        let forecast = fitted.forecast(5);
        let last = *data.last().unwrap();
        for v in forecast {
            assert_abs_diff_eq!(v, last, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_seasonal_fit_forecast_length_and_finite() {
        let mut rng = StdRng::seed_from_u64(11);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let data: Vec<f64> = (0..400)
            .map(|t| 10.0 * ((t % 7) as f64) + normal.sample(&mut rng))
            .collect();
        let model = Sarima::new(ArimaOrder::default(), SeasonalOrder::default()).unwrap();
        let fitted = model.fit(&data).unwrap();
        let forecast = fitted.forecast(21);
        assert_eq!(forecast.len(), 21);
        assert!(forecast.iter().all(|v| v.is_finite()));
        // step 5 lands on the weekly peak, step 6 on the trough
        assert!(forecast[5] - forecast[6] > 30.0);
        assert!(fitted.summary().contains("Seasonal MA"));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let data = simulate_ar1(0.4, 300, 5);
        let model = Sarima::new(ArimaOrder::new(1, 0, 1), SeasonalOrder::none()).unwrap();
        let a = model.fit(&data).unwrap().forecast(10);
        let b = model.fit(&data).unwrap().forecast(10);
        for (x, y) in a.iter().zip(&b) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-9);
        }
    }
}
