use nalgebra::DMatrix;

use crate::params::ModelParams;
use crate::types::ModelOrder;

/// Polynomial multiplication (convolution): c[k] = sum_i a[i]*b[k-i].
pub fn polymul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return vec![];
    }
    let mut r = vec![0.0; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        for (j, &bj) in b.iter().enumerate() {
            r[i + j] += ai * bj;
        }
    }
    r
}

/// AR polynomial: 1 - phi_1*L - phi_2*L^2 - ...
/// `coeffs` = [phi_1, phi_2, ...], `max_lag` = p.
pub fn make_ar_poly(coeffs: &[f64], max_lag: usize) -> Vec<f64> {
    let mut p = vec![0.0; max_lag + 1];
    p[0] = 1.0;
    for (i, &c) in coeffs.iter().enumerate() {
        if i + 1 <= max_lag {
            p[i + 1] = -c;
        }
    }
    p
}

/// Seasonal AR polynomial: 1 - Phi_1*L^s - Phi_2*L^(2s) - ...
pub fn make_seasonal_ar_poly(coeffs: &[f64], s: usize) -> Vec<f64> {
    if coeffs.is_empty() {
        return vec![1.0];
    }
    let mut p = vec![0.0; coeffs.len() * s + 1];
    p[0] = 1.0;
    for (i, &c) in coeffs.iter().enumerate() {
        p[(i + 1) * s] = -c;
    }
    p
}

/// MA polynomial: 1 + theta_1*L + theta_2*L^2 + ...
/// `coeffs` = [theta_1, theta_2, ...], `max_lag` = q.
pub fn make_ma_poly(coeffs: &[f64], max_lag: usize) -> Vec<f64> {
    let mut p = vec![0.0; max_lag + 1];
    p[0] = 1.0;
    for (i, &c) in coeffs.iter().enumerate() {
        if i + 1 <= max_lag {
            p[i + 1] = c;
        }
    }
    p
}

/// Seasonal MA polynomial: 1 + Theta_1*L^s + Theta_2*L^(2s) + ...
pub fn make_seasonal_ma_poly(coeffs: &[f64], s: usize) -> Vec<f64> {
    if coeffs.is_empty() {
        return vec![1.0];
    }
    let mut p = vec![0.0; coeffs.len() * s + 1];
    p[0] = 1.0;
    for (i, &c) in coeffs.iter().enumerate() {
        p[(i + 1) * s] = c;
    }
    p
}

/// Reduced (expanded) AR polynomial = polymul(non-seasonal AR, seasonal AR).
pub fn reduced_ar(params: &ModelParams, order: &ModelOrder) -> Vec<f64> {
    polymul(
        &make_ar_poly(&params.ar_coeffs, order.p),
        &make_seasonal_ar_poly(&params.sar_coeffs, order.s),
    )
}

/// Reduced (expanded) MA polynomial = polymul(non-seasonal MA, seasonal MA).
pub fn reduced_ma(params: &ModelParams, order: &ModelOrder) -> Vec<f64> {
    polymul(
        &make_ma_poly(&params.ma_coeffs, order.q),
        &make_seasonal_ma_poly(&params.sma_coeffs, order.s),
    )
}

/// Linear filter `a(L) y_t = b(L) x_t`, normalised so that `a[0] = 1`.
///
/// y[t] = (sum_i b[i]*x[t-i] - sum_{j>=1} a[j]*y[t-j]) / a[0]
///
/// Pre-sample values of both x and y are taken as zero.
pub fn lfilter(b: &[f64], a: &[f64], x: &[f64]) -> Vec<f64> {
    let a0 = a.first().copied().unwrap_or(1.0);
    let mut y = vec![0.0; x.len()];
    for t in 0..x.len() {
        let mut acc = 0.0;
        for (i, &bi) in b.iter().enumerate().take(t + 1) {
            acc += bi * x[t - i];
        }
        for (j, &aj) in a.iter().enumerate().skip(1).take(t) {
            acc -= aj * y[t - j];
        }
        y[t] = acc / a0;
    }
    y
}

/// Moduli of the roots of `c[0] + c[1]*z + ... + c[k]*z^k`.
///
/// Trailing zero coefficients are dropped first. Roots are the reciprocals
/// of the companion-matrix eigenvalues of the reversed polynomial, so a
/// zero eigenvalue maps to an infinite modulus.
pub fn root_moduli(coeffs: &[f64]) -> Vec<f64> {
    let degree = match coeffs.iter().rposition(|&c| c.abs() > 1e-14) {
        Some(k) => k,
        None => return vec![],
    };
    if degree == 0 || coeffs[0].abs() < 1e-14 {
        return vec![];
    }

    // Lag polynomial normalised by c[0]: 1 + a_1 L + ... + a_k L^k.
    // Its roots are 1/lambda for eigenvalues lambda of the companion matrix.
    let k = degree;
    let mut companion = DMatrix::<f64>::zeros(k, k);
    for j in 0..k {
        companion[(0, j)] = -coeffs[j + 1] / coeffs[0];
    }
    for i in 1..k {
        companion[(i, i - 1)] = 1.0;
    }

    companion
        .complex_eigenvalues()
        .iter()
        .map(|lambda| {
            let m = lambda.norm();
            if m < 1e-300 {
                f64::INFINITY
            } else {
                1.0 / m
            }
        })
        .collect()
}

/// True when every root modulus lies strictly outside the unit circle
/// (stationary for AR, invertible for MA). No roots counts as outside.
pub fn outside_unit_circle(moduli: &[f64]) -> bool {
    moduli.iter().all(|&m| m > 1.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
