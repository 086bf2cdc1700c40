use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{ArimaError, Result};
use crate::initialization::KalmanInit;
use crate::kalman::{kalman_filter, KalmanFilterOutput};
use crate::params::ModelParams;
use crate::state_space::StateSpace;
use crate::types::ModelConfig;

/// H-step ahead forecast result.
#[derive(Debug, Clone, Default)]
pub struct ForecastResult {
    /// Forecast means E[y_{n+h}] for h = 1..steps.
    pub mean: Vec<f64>,
    /// Forecast variances Var[y_{n+h}].
    pub variance: Vec<f64>,
    /// Lower confidence interval bounds.
    pub ci_lower: Vec<f64>,
    /// Upper confidence interval bounds.
    pub ci_upper: Vec<f64>,
}

/// Predictions over `start..start + mean.len()`, in-sample one-step-ahead
/// followed by out-of-sample forecasts.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// Time index of the first prediction.
    pub start: usize,
    /// First index that is a true forecast (the training length).
    pub forecast_start: usize,
    pub alpha: f64,
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    pub ci_lower: Vec<f64>,
    pub ci_upper: Vec<f64>,
}

impl Prediction {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// One past the last predicted index.
    pub fn end(&self) -> usize {
        self.start + self.mean.len()
    }

    /// Interval width at each predicted index.
    pub fn widths(&self) -> Vec<f64> {
        self.ci_upper
            .iter()
            .zip(&self.ci_lower)
            .map(|(u, l)| u - l)
            .collect()
    }
}

/// Residual diagnostics output.
#[derive(Debug, Clone)]
pub struct ResidualOutput {
    /// Raw innovations v_t.
    pub residuals: Vec<f64>,
    /// Standardized residuals v_t / sqrt(F_t * scale).
    pub standardized_residuals: Vec<f64>,
}

/// Two-sided critical value z_{1 - alpha/2}.
pub fn critical_value(alpha: f64) -> Result<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(ArimaError::InvalidConfig(format!(
            "alpha must lie in (0, 1), got {}",
            alpha
        )));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| ArimaError::DataError(e.to_string()))?;
    Ok(normal.inverse_cdf(1.0 - alpha / 2.0))
}

/// Compute h-step ahead forecast from the final Kalman filter state.
///
/// Uses state-space forward propagation:
///   y_hat_h = Z' * a_h
///   F_h     = Z' * P_h * Z * scale
///   a_{h+1} = T * a_h + c_{n+h}
///   P_{h+1} = T * P_h * T' + R * Q * R'
pub fn forecast(
    ss: &StateSpace,
    filter_output: &KalmanFilterOutput,
    steps: usize,
    alpha: f64,
) -> Result<ForecastResult> {
    let z_alpha = critical_value(alpha)?;
    if steps == 0 {
        return Ok(ForecastResult::default());
    }

    let z = &ss.design;
    let t_mat = &ss.transition;
    let rqr = ss.rqr();
    let scale = filter_output.scale;
    let n = filter_output.innovations.len();

    // Start from predicted state a_{n+1|n}, P_{n+1|n}
    let mut a = filter_output.predicted_state.clone();
    let mut p = filter_output.predicted_cov.clone();

    let mut out = ForecastResult {
        mean: Vec::with_capacity(steps),
        variance: Vec::with_capacity(steps),
        ci_lower: Vec::with_capacity(steps),
        ci_upper: Vec::with_capacity(steps),
    };

    for h in 0..steps {
        let y_hat = z.dot(&a);
        let p_z = &p * z;
        let f_h = (z.dot(&p_z) * scale).max(0.0);
        let se = f_h.sqrt();

        out.mean.push(y_hat);
        out.variance.push(f_h);
        out.ci_lower.push(y_hat - z_alpha * se);
        out.ci_upper.push(y_hat + z_alpha * se);

        a = ss.propagate_state(&a, n + h);
        p = t_mat * &p * t_mat.transpose() + &rqr;
    }

    Ok(out)
}

/// One-step-ahead predictions from `start` through the sample, followed by
/// forecasts up to and including index `end`.
pub fn predict(
    ss: &StateSpace,
    filter_output: &KalmanFilterOutput,
    start: usize,
    end: usize,
    alpha: f64,
) -> Result<Prediction> {
    let z_alpha = critical_value(alpha)?;
    let n = filter_output.predicted_means.len();
    if start > end {
        return Err(ArimaError::InvalidConfig(format!(
            "prediction start {} is after end {}",
            start, end
        )));
    }
    if start > n {
        return Err(ArimaError::InvalidConfig(format!(
            "prediction start {} is past the sample end {}",
            start, n
        )));
    }

    let scale = filter_output.scale;
    let mut pred = Prediction {
        start,
        forecast_start: n,
        alpha,
        mean: Vec::with_capacity(end + 1 - start),
        variance: Vec::with_capacity(end + 1 - start),
        ci_lower: Vec::with_capacity(end + 1 - start),
        ci_upper: Vec::with_capacity(end + 1 - start),
    };

    for t in start..n.min(end + 1) {
        let y_hat = filter_output.predicted_means[t];
        let var = (filter_output.innovation_vars[t] * scale).max(0.0);
        let se = var.sqrt();
        pred.mean.push(y_hat);
        pred.variance.push(var);
        pred.ci_lower.push(y_hat - z_alpha * se);
        pred.ci_upper.push(y_hat + z_alpha * se);
    }

    if end >= n {
        let fc = forecast(ss, filter_output, end + 1 - n, alpha)?;
        pred.mean.extend(fc.mean);
        pred.variance.extend(fc.variance);
        pred.ci_lower.extend(fc.ci_lower);
        pred.ci_upper.extend(fc.ci_upper);
    }

    Ok(pred)
}

/// `observed - predicted` where both are defined.
pub fn prediction_residuals(observed: &[f64], prediction: &Prediction) -> Vec<f64> {
    let end = prediction.end().min(observed.len());
    (prediction.start..end)
        .map(|t| observed[t] - prediction.mean[t - prediction.start])
        .collect()
}

/// Compute residuals and standardized residuals from Kalman filter output.
pub fn compute_residuals(filter_output: &KalmanFilterOutput) -> ResidualOutput {
    let scale = filter_output.scale;

    let standardized = filter_output
        .innovations
        .iter()
        .zip(&filter_output.innovation_vars)
        .map(|(&v, &f)| {
            if f * scale > 0.0 {
                v / (f * scale).sqrt()
            } else {
                0.0
            }
        })
        .collect();

    ResidualOutput {
        residuals: filter_output.innovations.clone(),
        standardized_residuals: standardized,
    }
}

fn filter(
    endog: &[f64],
    config: &ModelConfig,
    params: &ModelParams,
) -> Result<(StateSpace, KalmanFilterOutput)> {
    let ss = StateSpace::new(config, params)?;
    let init = KalmanInit::from_config(&ss, config, KalmanInit::default_kappa());
    let fo = kalman_filter(endog, &ss, &init, config.concentrate_scale)?;
    Ok((ss, fo))
}

/// Run forecast pipeline: build state space → filter → forecast.
pub fn forecast_pipeline(
    endog: &[f64],
    config: &ModelConfig,
    params: &ModelParams,
    steps: usize,
    alpha: f64,
) -> Result<ForecastResult> {
    let (ss, fo) = filter(endog, config, params)?;
    forecast(&ss, &fo, steps, alpha)
}

/// Run prediction pipeline: filter, then predict from the likelihood burn-in
/// offset through `horizon` steps past the sample.
pub fn predict_pipeline(
    endog: &[f64],
    config: &ModelConfig,
    params: &ModelParams,
    horizon: usize,
    alpha: f64,
) -> Result<(Prediction, ResidualOutput)> {
    let (ss, fo) = filter(endog, config, params)?;
    let start = fo.loglikelihood_burn;
    // With horizon 0 the prediction stops at the last observation
    let end = (endog.len() + horizon).saturating_sub(1);
    let prediction = predict(&ss, &fo, start, end, alpha)?;
    Ok((prediction, compute_residuals(&fo)))
}
