use crate::error::{ArimaError, Result};
use crate::types::{ModelConfig, Trend};

/// Unpacked SARIMA parameters.
///
/// Flat layout: `[trend(k_trend) | ar(p) | ma(q) | sar(P) | sma(Q) | sigma2?]`
///
/// With `concentrate_scale=true` sigma2 is not part of the optimization
/// vector but still counts towards AIC's k.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelParams {
    pub trend_coeffs: Vec<f64>,
    pub ar_coeffs: Vec<f64>,
    pub ma_coeffs: Vec<f64>,
    pub sar_coeffs: Vec<f64>,
    pub sma_coeffs: Vec<f64>,
    pub sigma2: Option<f64>,
}

impl ModelParams {
    /// Plain ARMA parameters with no trend, seasonal terms or explicit scale.
    pub fn arma(ar: &[f64], ma: &[f64]) -> Self {
        Self {
            ar_coeffs: ar.to_vec(),
            ma_coeffs: ma.to_vec(),
            ..Default::default()
        }
    }

    /// Unpack a flat parameter vector into structured fields.
    pub fn from_flat(flat: &[f64], config: &ModelConfig) -> Result<Self> {
        let kt = config.trend.k_trend();
        let p = config.order.p;
        let q = config.order.q;
        let pp = config.order.pp;
        let qq = config.order.qq;

        let expected = config.param_len();
        if flat.len() != expected {
            return Err(ArimaError::ParamLengthMismatch {
                expected,
                got: flat.len(),
            });
        }

        let mut i = 0;
        let trend_coeffs = flat[i..i + kt].to_vec();
        i += kt;
        let ar_coeffs = flat[i..i + p].to_vec();
        i += p;
        let ma_coeffs = flat[i..i + q].to_vec();
        i += q;
        let sar_coeffs = flat[i..i + pp].to_vec();
        i += pp;
        let sma_coeffs = flat[i..i + qq].to_vec();
        i += qq;
        let sigma2 = if !config.concentrate_scale {
            Some(flat[i])
        } else {
            None
        };

        Ok(Self {
            trend_coeffs,
            ar_coeffs,
            ma_coeffs,
            sar_coeffs,
            sma_coeffs,
            sigma2,
        })
    }

    /// Number of estimated parameters for AIC/BIC.
    /// sigma2 is always counted even when concentrated.
    pub fn n_estimated_params(config: &ModelConfig) -> usize {
        config.trend.k_trend()
            + config.order.p
            + config.order.q
            + config.order.pp
            + config.order.qq
            + 1 // sigma2 always counted
    }

    /// Labels in flat-vector order, with a trailing `sigma2` even when the
    /// scale is concentrated out.
    pub fn names(config: &ModelConfig) -> Vec<String> {
        let order = &config.order;
        let mut names: Vec<String> = match config.trend {
            Trend::None => vec![],
            Trend::Constant => vec!["intercept".into()],
            Trend::Linear => vec!["drift".into()],
            Trend::Both => vec!["intercept".into(), "drift".into()],
        };
        names.extend((1..=order.p).map(|i| format!("ar.L{}", i)));
        names.extend((1..=order.q).map(|i| format!("ma.L{}", i)));
        names.extend((1..=order.pp).map(|i| format!("ar.S.L{}", i * order.s)));
        names.extend((1..=order.qq).map(|i| format!("ma.S.L{}", i * order.s)));
        names.push("sigma2".into());
        names
    }
}

// ---------------------------------------------------------------------------
// Monahan (1984) / Jones (1980) parameter transformations
// ---------------------------------------------------------------------------

/// Transform unconstrained parameters to stationary AR coefficients.
///
/// Algorithm:
/// 1. Map each x[k] to PACF via `r[k] = x[k] / sqrt(1 + x[k]^2)`
/// 2. Apply Levinson-Durbin recursion to get AR coefficients
/// 3. Negate final row: `constrained = -y[n-1][:]`
pub fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let n = unconstrained.len();
    if n == 0 {
        return vec![];
    }

    // Step 1: unconstrained → PACF
    let pacf: Vec<f64> = unconstrained
        .iter()
        .map(|&x| x / (1.0 + x * x).sqrt())
        .collect();

    // Step 2: Levinson-Durbin recursion
    let mut y = vec![vec![0.0; n]; n];
    for k in 0..n {
        for i in 0..k {
            y[k][i] = y[k - 1][i] + pacf[k] * y[k - 1][k - i - 1];
        }
        y[k][k] = pacf[k];
    }

    // Step 3: negate
    y[n - 1].iter().map(|&v| -v).collect()
}

/// Inverse transform: stationary AR coefficients → unconstrained parameters.
pub fn unconstrain_stationary(constrained: &[f64]) -> Vec<f64> {
    let n = constrained.len();
    if n == 0 {
        return vec![];
    }

    let mut y = vec![vec![0.0; n]; n];
    // Initialize last row from constrained (negate back)
    for i in 0..n {
        y[n - 1][i] = -constrained[i];
    }

    // Reverse Levinson-Durbin
    for k in (1..n).rev() {
        let rk = y[k][k];
        let denom = (1.0 - rk * rk).max(1e-15);
        for i in 0..k {
            y[k - 1][i] = (y[k][i] - rk * y[k][k - i - 1]) / denom;
        }
    }

    // PACF → unconstrained
    (0..n)
        .map(|k| {
            let r = y[k][k];
            r / (1.0 - r * r).max(1e-15).sqrt()
        })
        .collect()
}

/// Transform unconstrained parameters to invertible MA coefficients.
/// Same as stationary transform but with sign flip.
pub fn constrain_invertible(unconstrained: &[f64]) -> Vec<f64> {
    constrain_stationary(unconstrained)
        .iter()
        .map(|&x| -x)
        .collect()
}

/// Inverse: invertible MA coefficients → unconstrained parameters.
pub fn unconstrain_invertible(constrained: &[f64]) -> Vec<f64> {
    let negated: Vec<f64> = constrained.iter().map(|&x| -x).collect();
    unconstrain_stationary(&negated)
}

/// Constrain variance: unconstrained → positive (x^2).
pub fn constrain_variance(x: f64) -> f64 {
    x * x
}

/// Unconstrain variance: positive → unconstrained (sqrt).
/// Returns error if s <= 0.
pub fn unconstrain_variance(s: f64) -> Result<f64> {
    if s <= 0.0 {
        return Err(ArimaError::DataError(format!(
            "variance sigma2 must be positive, got {}",
            s
        )));
    }
    Ok(s.sqrt())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ModelOrder, Trend};

    fn make_config(p: usize, q: usize, pp: usize, qq: usize, concentrate: bool) -> ModelConfig {
        ModelConfig {
            order: ModelOrder::new(p, 0, q, pp, 0, qq, 12),
            concentrate_scale: concentrate,
            ..Default::default()
        }
    }

    #[test]
    fn test_from_flat_splits_seasonal_blocks() {
        let config = make_config(2, 1, 1, 1, true);
        let flat = vec![0.5, -0.3, 0.2, 0.4, -0.1];
        let params = ModelParams::from_flat(&flat, &config).unwrap();
        assert_eq!(params.ar_coeffs, vec![0.5, -0.3]);
        assert_eq!(params.ma_coeffs, vec![0.2]);
        assert_eq!(params.sar_coeffs, vec![0.4]);
        assert_eq!(params.sma_coeffs, vec![-0.1]);
        assert!(params.sigma2.is_none());
    }

    #[test]
    fn test_from_flat_with_sigma2() {
        let config = make_config(1, 0, 0, 0, false);
        let params = ModelParams::from_flat(&[0.7, 1.5], &config).unwrap();
        assert_eq!(params.ar_coeffs, vec![0.7]);
        assert_eq!(params.sigma2, Some(1.5));
    }

    #[test]
    fn test_from_flat_with_trend() {
        let config = ModelConfig {
            order: ModelOrder::arima(1, 0, 1),
            trend: Trend::Both,
            ..Default::default()
        };
        let params = ModelParams::from_flat(&[0.1, 0.02, 0.5, -0.3], &config).unwrap();
        assert_eq!(params.trend_coeffs, vec![0.1, 0.02]);
        assert_eq!(params.ar_coeffs, vec![0.5]);
        assert_eq!(params.ma_coeffs, vec![-0.3]);
    }

    #[test]
    fn test_from_flat_length_mismatch() {
        let config = make_config(1, 0, 0, 0, true);
        match ModelParams::from_flat(&[0.5, 0.3], &config) {
            Err(ArimaError::ParamLengthMismatch { expected, got }) => {
                assert_eq!(expected, 1);
                assert_eq!(got, 2);
            }
            other => panic!("expected length mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_arma_constructor() {
        let params = ModelParams::arma(&[0.5], &[0.2, 0.1]);
        assert_eq!(params.ar_coeffs, vec![0.5]);
        assert_eq!(params.ma_coeffs, vec![0.2, 0.1]);
        assert!(params.trend_coeffs.is_empty() && params.sigma2.is_none());
    }

    #[test]
    fn test_n_estimated_params() {
        // SARIMA(1,1,1)(1,1,1,12) with trend='c': 1+1+1+1+1+1 = 6
        let config = ModelConfig {
            order: ModelOrder::new(1, 1, 1, 1, 1, 1, 12),
            trend: Trend::Constant,
            ..Default::default()
        };
        assert_eq!(ModelParams::n_estimated_params(&config), 6);
    }

    #[test]
    fn test_constrained_ar_is_stationary() {
        // Any unconstrained input maps to coefficients with |phi| < 1 for AR(1)
        for &x in &[-50.0, -1.0, 0.0, 3.0, 1e3] {
            let c = constrain_stationary(&[x]);
            assert!(c[0].abs() < 1.0, "constrained AR(1) {} out of range", c[0]);
        }
    }

    #[test]
    fn test_monahan_inverse_ar3() {
        let original = vec![1.0, -0.5, 0.2];
        let unconstrained = unconstrain_stationary(&constrain_stationary(&original));
        for (a, b) in original.iter().zip(unconstrained.iter()) {
            assert!((a - b).abs() < 1e-10, "inverse failed: {} vs {}", a, b);
        }
    }

    #[test]
    fn test_constrain_stationary_empty() {
        let empty: Vec<f64> = vec![];
        assert_eq!(constrain_stationary(&[]), empty);
        assert_eq!(unconstrain_stationary(&[]), empty);
    }

    #[test]
    fn test_invertible_inverse() {
        let original = vec![0.4, -0.2];
        let unconstrained = unconstrain_invertible(&constrain_invertible(&original));
        for (a, b) in original.iter().zip(unconstrained.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_unconstrain_variance_rejects_non_positive() {
        assert!(unconstrain_variance(0.0).is_err());
        assert!((unconstrain_variance(6.25).unwrap() - 2.5).abs() < 1e-12);
        assert!((constrain_variance(2.5) - 6.25).abs() < 1e-12);
    }

    #[test]
    fn test_param_names() {
        let config = ModelConfig {
            order: ModelOrder::new(2, 1, 1, 1, 0, 0, 12),
            trend: Trend::Constant,
            ..Default::default()
        };
        assert_eq!(
            ModelParams::names(&config),
            vec!["intercept", "ar.L1", "ar.L2", "ma.L1", "ar.S.L12", "sigma2"]
        );
    }
}
