use argmin::core::{CostFunction, Error};

use super::polynomial::{constrain_stationary, lag_polynomial, multiply};

/// Position of each coefficient block inside the optimizer's parameter vector:
/// `[ar (p), ma (q), seasonal ar (P), seasonal ma (Q)]`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ParamLayout {
    pub p: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

/// Constrained model coefficients in the conventional sign layout
/// `phi(B) = 1 - sum phi_j B^j`, `theta(B) = 1 + sum theta_j B^j`.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Coefficients {
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
}

impl ParamLayout {
    pub fn len(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    pub fn coefficients(&self, params: &[f64]) -> Coefficients {
        let (ar, rest) = params.split_at(self.p);
        let (ma, rest) = rest.split_at(self.q);
        let (sar, sma) = rest.split_at(self.seasonal_p);
        let negate = |v: Vec<f64>| v.into_iter().map(|x| -x).collect::<Vec<_>>();
        Coefficients {
            ar: constrain_stationary(ar),
            ma: negate(constrain_stationary(ma)),
            seasonal_ar: constrain_stationary(sar),
            seasonal_ma: negate(constrain_stationary(sma)),
        }
    }
}

impl Coefficients {
    /// Expanded lag weights `(a, b)` so that
    /// `w_t = sum a_j w_{t-j} + e_t + sum b_j e_{t-j}`.
    pub fn lag_weights(&self, period: usize) -> (Vec<f64>, Vec<f64>) {
        let ar_poly = multiply(
            &lag_polynomial(&self.ar, 1, -1.0),
            &lag_polynomial(&self.seasonal_ar, period.max(1), -1.0),
        );
        let ma_poly = multiply(
            &lag_polynomial(&self.ma, 1, 1.0),
            &lag_polynomial(&self.seasonal_ma, period.max(1), 1.0),
        );
        let a = ar_poly.iter().skip(1).map(|c| -c).collect();
        let b = ma_poly.iter().skip(1).copied().collect();
        (a, b)
    }
}

/// One-step innovations of the differenced series, conditional on the first
/// `a.len()` observations and on zero pre-sample innovations.
pub(crate) fn innovations(w: &[f64], a: &[f64], b: &[f64]) -> Vec<f64> {
    let start = a.len();
    let mut e = vec![0.0; w.len()];
    for t in start..w.len() {
        let mut value = w[t];
        for (j, &aj) in a.iter().enumerate() {
            value -= aj * w[t - j - 1];
        }
        for (j, &bj) in b.iter().enumerate().take(t) {
            value -= bj * e[t - j - 1];
        }
        e[t] = value;
    }
    e
}

/// Concentrated Gaussian negative log-likelihood given innovations `e[start..]`.
pub(crate) fn negative_log_likelihood(residuals: &[f64]) -> (f64, f64) {
    let n = residuals.len() as f64;
    let sse: f64 = residuals.iter().map(|e| e * e).sum();
    let sigma2 = (sse / n).max(f64::MIN_POSITIVE);
    let nll = 0.5 * n * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
    (nll, sigma2)
}

/// Optimization problem: minimize the conditional negative log-likelihood over the
/// unconstrained parameter vector.
#[derive(Debug, Clone)]
pub(crate) struct ConditionalLikelihood {
    pub differenced: Vec<f64>,
    pub layout: ParamLayout,
}

impl ConditionalLikelihood {
    pub fn evaluate(&self, params: &[f64]) -> (f64, f64) {
        let (a, b) = self.layout.coefficients(params).lag_weights(self.layout.period);
        let e = innovations(&self.differenced, &a, &b);
        negative_log_likelihood(&e[a.len()..])
    }
}

impl CostFunction for ConditionalLikelihood {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> Result<Self::Output, Error> {
        let (nll, _) = self.evaluate(params);
        if nll.is_finite() {
            Ok(nll)
        } else {
            Ok(f64::INFINITY)
        }
    }
}
