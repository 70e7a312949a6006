//! Lag polynomial helpers shared by fitting and forecasting.
//!
//! Polynomials are stored as coefficient vectors indexed by lag, with the
//! zero-lag coefficient always equal to 1.

/// Multiply two lag polynomials.
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `1 + sign * (c_1 B^step + c_2 B^{2 step} + ...)`
pub fn lag_polynomial(coeffs: &[f64], step: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coeffs.len() * step + 1];
    poly[0] = 1.0;
    for (i, &c) in coeffs.iter().enumerate() {
        poly[(i + 1) * step] = sign * c;
    }
    poly
}

/// Expanded `(1 - B)^d (1 - B^s)^D`.
pub fn differencing_polynomial(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = multiply(&poly, &[1.0, -1.0]);
    }
    for _ in 0..seasonal_d {
        poly = multiply(&poly, &lag_polynomial(&[1.0], period, -1.0));
    }
    poly
}

/// Apply a differencing polynomial; the output is shorter by `poly.len() - 1`.
pub fn apply_differencing(data: &[f64], poly: &[f64]) -> Vec<f64> {
    let lags = poly.len().saturating_sub(1);
    if data.len() <= lags {
        return Vec::new();
    }
    (lags..data.len())
        .map(|t| poly.iter().enumerate().map(|(j, &c)| c * data[t - j]).sum())
        .collect()
}

/// Undo `apply_differencing` for values following `history`.
///
/// `history` must hold at least `poly.len() - 1` observations on the original scale.
pub fn integrate(history: &[f64], differenced: &[f64], poly: &[f64]) -> Vec<f64> {
    let mut extended = history.to_vec();
    let start = extended.len();
    for &w in differenced {
        let t = extended.len();
        let carried: f64 = poly
            .iter()
            .enumerate()
            .skip(1)
            .map(|(j, &c)| c * extended[t - j])
            .sum();
        extended.push(w - carried);
    }
    extended.split_off(start)
}

/// Map unconstrained values to the coefficients of a stationary AR polynomial.
///
/// Each value becomes a partial autocorrelation in (-1, 1), then Durbin-Levinson
/// turns the partial autocorrelations into `phi_1..phi_n` for `1 - sum phi_j B^j`.
pub fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    const BOUND: f64 = 1.0 - 1e-6;
    let mut phi: Vec<f64> = Vec::with_capacity(unconstrained.len());
    for &x in unconstrained {
        let r = x.tanh().clamp(-BOUND, BOUND);
        let prev = phi.clone();
        let k = prev.len();
        for j in 0..k {
            phi[j] = prev[j] - r * prev[k - 1 - j];
        }
        phi.push(r);
    }
    phi
}
