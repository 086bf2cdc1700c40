//! Starting values for the likelihood optimizer.
//!
//! The series is differenced down to its ARMA part. AR terms come from
//! Burg's method with Yule-Walker as fallback, MA terms from the
//! innovations algorithm on the AR residuals. Seasonal terms reuse the same
//! estimators at multiples of the period. Anything that cannot be estimated
//! starts at zero.

use crate::error::{ArimaError, Result};
use crate::process::difference;
use crate::types::{ModelConfig, Trend};

const TINY: f64 = 1e-15;

/// MA starts stay strictly inside the invertible region.
const MA_BOUND: f64 = 0.99;

/// Seasonal differencing `y_t - y_{t-s}`, applied `d` times.
fn seasonal_difference(y: &[f64], d: usize, s: usize) -> Vec<f64> {
    if s == 0 {
        return y.to_vec();
    }
    let mut out = y.to_vec();
    for _ in 0..d {
        if out.len() <= s {
            return vec![];
        }
        out = out.iter().skip(s).zip(&out).map(|(a, b)| a - b).collect();
    }
    out
}

/// Sample autocovariances at lags `0, step, 2 * step, ..., max * step`.
fn autocovariances(y: &[f64], step: usize, max: usize) -> Vec<f64> {
    let n = y.len();
    if n == 0 {
        return vec![0.0; max + 1];
    }
    let mean = y.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = y.iter().map(|v| v - mean).collect();
    (0..=max)
        .map(|k| {
            let lag = k * step;
            if lag >= n {
                return 0.0;
            }
            centered[..n - lag]
                .iter()
                .zip(&centered[lag..])
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / n as f64
        })
        .collect()
}

/// Levinson-Durbin solve of the Toeplitz system built from
/// `gammas = [g0, g1, ..., gp]`. Returns `[phi_1, ..., phi_p]`.
fn levinson_durbin(gammas: &[f64]) -> Option<Vec<f64>> {
    let p = gammas.len().saturating_sub(1);
    let mut phi = vec![0.0; p];
    let mut var = *gammas.first()?;

    for k in 0..p {
        if var.abs() < TINY {
            return None;
        }
        let num = gammas[k + 1] - (0..k).map(|j| phi[j] * gammas[k - j]).sum::<f64>();
        let lambda = num / var;

        let prev = phi[..k].to_vec();
        phi[k] = lambda;
        for j in 0..k {
            phi[j] = prev[j] - lambda * prev[k - 1 - j];
        }
        var *= 1.0 - lambda * lambda;
    }

    Some(phi)
}

/// Burg's method. Less small-sample bias than Yule-Walker and every stage
/// is stationary.
fn burg_ar(y: &[f64], p: usize) -> Option<Vec<f64>> {
    if p == 0 {
        return Some(vec![]);
    }
    let n = y.len();
    if n <= p {
        return None;
    }

    let mean = y.iter().sum::<f64>() / n as f64;
    let mut ef: Vec<f64> = y.iter().map(|v| v - mean).collect();
    let mut eb = ef.clone();
    let mut a = vec![0.0; p];

    for k in 0..p {
        let (num, den) = ((k + 1)..n).fold((0.0, 0.0), |(num, den), t| {
            (
                num + ef[t] * eb[t - 1],
                den + ef[t] * ef[t] + eb[t - 1] * eb[t - 1],
            )
        });
        if den.abs() < TINY {
            return None;
        }
        let kk = 2.0 * num / den;
        if kk.is_nan() || kk.abs() >= 1.0 {
            return None;
        }

        let prev = a[..k].to_vec();
        a[k] = kk;
        for j in 0..k {
            a[j] = prev[j] - kk * prev[k - 1 - j];
        }

        // Backwards so eb[t - 1] still holds the previous stage when read
        for t in ((k + 1)..n).rev() {
            let f = ef[t];
            ef[t] = f - kk * eb[t - 1];
            eb[t] = eb[t - 1] - kk * f;
        }
    }

    Some(a)
}

fn yule_walker(y: &[f64], p: usize) -> Option<Vec<f64>> {
    if p == 0 {
        return Some(vec![]);
    }
    if y.len() <= p {
        return None;
    }
    levinson_durbin(&autocovariances(y, 1, p))
}

/// Innovations algorithm (Brockwell & Davis 5.2) on `gamma = [g0, ..., gq]`.
/// Lags may be seasonal multiples; they are treated as consecutive.
fn innovations_ma(gamma: &[f64]) -> Vec<f64> {
    let q = gamma.len().saturating_sub(1);
    if q == 0 || gamma[0].abs() < TINY {
        return vec![0.0; q];
    }

    let mut theta = vec![vec![0.0; q]; q + 1];
    let mut v = vec![0.0; q + 1];
    v[0] = gamma[0];

    for i in 1..=q {
        for k in 0..i {
            let sum = gamma[i - k]
                - (0..k)
                    .map(|j| theta[k][k - 1 - j] * theta[i][i - 1 - j] * v[j])
                    .sum::<f64>();
            theta[i][i - 1 - k] = if v[k].abs() > TINY { sum / v[k] } else { 0.0 };
        }
        let explained: f64 = (0..i).map(|j| theta[i][i - 1 - j].powi(2) * v[j]).sum();
        v[i] = (gamma[0] - explained).max(TINY);
    }

    theta[q].iter().map(|t| t.clamp(-MA_BOUND, MA_BOUND)).collect()
}

/// MA start of order `q` at lag spacing `step` (1, or the seasonal period).
fn ma_start(residuals: &[f64], q: usize, step: usize) -> Vec<f64> {
    if q == 0 || step == 0 || residuals.len() <= q * step {
        return vec![0.0; q];
    }
    innovations_ma(&autocovariances(residuals, step, q))
}

/// `y_t - sum_j c_j * y_{t - (j + 1) * step}` for every `t` with a full lag
/// window.
fn lagged_residuals(y: &[f64], coeffs: &[f64], step: usize) -> Vec<f64> {
    if coeffs.is_empty() || step == 0 {
        return y.to_vec();
    }
    let start = coeffs.len() * step;
    (start..y.len())
        .map(|t| {
            let fitted: f64 = coeffs
                .iter()
                .enumerate()
                .map(|(j, c)| c * y[t - (j + 1) * step])
                .sum();
            y[t] - fitted
        })
        .collect()
}

/// Starting parameters in the `ModelParams::from_flat` layout:
/// `[trend | ar(p) | ma(q) | sar(P) | sma(Q) | sigma2?]`, with sigma2 only
/// when the scale is not concentrated out.
///
/// Always finite. Strongly explosive input can overflow the moment
/// estimates; those entries fall back to zero.
pub fn compute_start_params(endog: &[f64], config: &ModelConfig) -> Result<Vec<f64>> {
    let order = &config.order;
    let (p, q, pp, qq, s) = (order.p, order.q, order.pp, order.qq, order.s);
    let n_params = config.param_len();

    let diffed = seasonal_difference(&difference(endog, order.d), order.dd, s);
    if diffed.len() < 3 {
        return Ok(vec![0.0; n_params]);
    }

    let ar = burg_ar(&diffed, p)
        .or_else(|| yule_walker(&diffed, p))
        .unwrap_or_else(|| vec![0.0; p]);

    // Intercept c = mean * (1 - sum(phi)); the slope starts at zero
    let mean = diffed.iter().sum::<f64>() / diffed.len() as f64;
    let intercept = mean * (1.0 - ar.iter().sum::<f64>());
    let mut params = match config.trend {
        Trend::None => vec![],
        Trend::Constant => vec![intercept],
        Trend::Linear => vec![0.0],
        Trend::Both => vec![intercept, 0.0],
    };
    params.extend_from_slice(&ar);

    let ar_resid = lagged_residuals(&diffed, &ar, 1);
    params.extend(ma_start(&ar_resid, q, 1));

    let sar = if pp > 0 && s > 0 && diffed.len() > pp * s {
        levinson_durbin(&autocovariances(&diffed, s, pp)).unwrap_or_else(|| vec![0.0; pp])
    } else {
        vec![0.0; pp]
    };
    params.extend_from_slice(&sar);

    let sma = if pp > 0 {
        ma_start(&lagged_residuals(&diffed, &sar, s), qq, s)
    } else {
        ma_start(&ar_resid, qq, s)
    };
    params.extend(sma);

    for v in params.iter_mut().filter(|v| !v.is_finite()) {
        *v = 0.0;
    }

    if !config.concentrate_scale {
        let var = autocovariances(&diffed, 1, 0)[0];
        params.push(if var.is_finite() { var.max(1e-6) } else { 1.0 });
    }

    if params.len() != n_params {
        return Err(ArimaError::DataError(format!(
            "failed to build start params: expected length {}, got {}",
            n_params,
            params.len()
        )));
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{generate, ProcessSpec};
    use crate::types::ModelOrder;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn make_config(
        p: usize,
        d: usize,
        q: usize,
        pp: usize,
        dd: usize,
        qq: usize,
        s: usize,
        concentrate: bool,
    ) -> ModelConfig {
        ModelConfig {
            order: ModelOrder::new(p, d, q, pp, dd, qq, s),
            concentrate_scale: concentrate,
            ..Default::default()
        }
    }

    fn ar_series(ar: &[f64], n: usize, seed: u64) -> Vec<f64> {
        let spec = ProcessSpec {
            ar: ar.to_vec(),
            ..Default::default()
        };
        generate(&spec, n, &mut StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_seasonal_difference() {
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(seasonal_difference(&y, 1, 4), vec![4.0, 4.0, 4.0, 4.0]);
        assert!(seasonal_difference(&y, 2, 4).iter().all(|&v| v == 0.0));
        assert!(seasonal_difference(&y[..4], 1, 4).is_empty());
        assert_eq!(seasonal_difference(&y, 1, 0), y);
    }

    #[test]
    fn test_autocovariances_at_seasonal_lags() {
        let y = vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let g = autocovariances(&y, 2, 2);
        assert!((g[0] - 1.0).abs() < 1e-12);
        assert!((g[1] - 4.0 / 6.0).abs() < 1e-12);
        assert!((g[2] - 2.0 / 6.0).abs() < 1e-12);
        assert_eq!(autocovariances(&y, 10, 1)[1], 0.0);
    }

    #[test]
    fn test_levinson_recovers_ar_from_exact_autocovariances() {
        // AR(1) with phi = 0.5: gamma_k proportional to 0.5^k
        let phi = levinson_durbin(&[1.0, 0.5, 0.25]).unwrap();
        assert!((phi[0] - 0.5).abs() < 1e-12);
        assert!(phi[1].abs() < 1e-12);
        assert!(levinson_durbin(&[0.0, 0.0]).is_none());
        assert_eq!(levinson_durbin(&[2.0]), Some(vec![]));
    }

    #[test]
    fn test_burg_ar1() {
        let y = ar_series(&[0.7], 500, 42);
        let ar = burg_ar(&y, 1).unwrap();
        assert!((ar[0] - 0.7).abs() < 0.15, "Burg AR(1) estimate: {}", ar[0]);
    }

    #[test]
    fn test_burg_high_order_succeeds() {
        let y = ar_series(&[0.95], 200, 123);
        assert!(burg_ar(&y, 8).is_some());
    }

    #[test]
    fn test_yule_walker_ar1() {
        let y = ar_series(&[0.7], 500, 42);
        let ar = yule_walker(&y, 1).unwrap();
        assert!((ar[0] - 0.7).abs() < 0.15, "Yule-Walker AR(1) estimate: {}", ar[0]);
    }

    #[test]
    fn test_innovations_ma_single_lag() {
        // MA(1) autocovariances: g0 = 1 + theta^2, g1 = theta
        let theta = 0.4;
        let est = innovations_ma(&[1.0 + theta * theta, theta]);
        assert!((est[0] - theta / (1.0 + theta * theta)).abs() < 1e-12);
        assert_eq!(innovations_ma(&[0.0, 1.0]), vec![0.0]);
        assert!(innovations_ma(&[5.0, 50.0])[0] <= MA_BOUND);
    }

    #[test]
    fn test_lagged_residuals() {
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(lagged_residuals(&y, &[1.0], 1), vec![1.0, 1.0, 1.0, 1.0]);
        assert_eq!(lagged_residuals(&y, &[1.0], 2), vec![2.0, 2.0, 2.0]);
        assert_eq!(lagged_residuals(&y, &[], 1), y);
        assert!(lagged_residuals(&y, &[0.5, 0.5], 3).is_empty());
    }

    #[test]
    fn test_start_params_length_ar1() {
        let config = make_config(1, 0, 0, 0, 0, 0, 0, true);
        let y: Vec<f64> = (0..100).map(|i| (i as f64).sin()).collect();
        assert_eq!(compute_start_params(&y, &config).unwrap().len(), 1);
    }

    #[test]
    fn test_start_params_length_sarima() {
        let config = make_config(1, 1, 1, 1, 1, 1, 12, true);
        let y: Vec<f64> = (0..300)
            .map(|i| (i as f64 * 0.1).sin() + (i as f64 * 0.01).cos())
            .collect();
        // ar(1) + ma(1) + sar(1) + sma(1)
        assert_eq!(compute_start_params(&y, &config).unwrap().len(), 4);
    }

    #[test]
    fn test_start_params_with_sigma2() {
        let config = make_config(1, 0, 0, 0, 0, 0, 0, false);
        let y: Vec<f64> = (0..100).map(|i| (i as f64).sin()).collect();
        let params = compute_start_params(&y, &config).unwrap();
        assert_eq!(params.len(), 2);
        assert!(params[1] > 0.0);
    }

    #[test]
    fn test_fallback_short_series() {
        let config = make_config(1, 1, 1, 0, 0, 0, 0, true);
        let params = compute_start_params(&[1.0, 2.0], &config).unwrap();
        assert_eq!(params, vec![0.0, 0.0]);
    }

    #[test]
    fn test_start_params_finite() {
        let config = make_config(2, 1, 1, 0, 0, 0, 0, true);
        let y: Vec<f64> = (0..200).map(|i| (i as f64 * 0.05).sin()).collect();
        let params = compute_start_params(&y, &config).unwrap();
        assert!(params.iter().all(|x| x.is_finite()), "{:?}", params);
    }

    #[test]
    fn test_overflowing_series_gives_finite_start() {
        let y: Vec<f64> = (0..60).map(|i| 10f64.powi(5 * i)).collect();
        let config = make_config(1, 0, 1, 0, 0, 0, 0, false);
        let params = compute_start_params(&y, &config).unwrap();
        assert_eq!(params.len(), 3);
        assert!(params.iter().all(|x| x.is_finite()), "{:?}", params);
        assert!(params[2] > 0.0);
    }

    #[test]
    fn test_start_params_constant_trend() {
        let config = ModelConfig {
            order: ModelOrder::arima(1, 0, 0),
            trend: Trend::Constant,
            ..Default::default()
        };
        let y: Vec<f64> = (0..200).map(|i| 5.0 + (i as f64 * 0.3).sin()).collect();
        let params = compute_start_params(&y, &config).unwrap();
        assert_eq!(params.len(), 2);
        // Intercept carries the level through (1 - phi)
        let implied_mean = params[0] / (1.0 - params[1]);
        assert!((implied_mean - 5.0).abs() < 0.5, "implied mean {}", implied_mean);
    }
}
