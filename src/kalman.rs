use nalgebra::{DMatrix, DVector};

use crate::error::{ArimaError, Result};
use crate::initialization::KalmanInit;
use crate::state_space::StateSpace;

/// Full output of a Kalman filter pass.
#[derive(Debug, Clone)]
pub struct KalmanFilterOutput {
    /// Log-likelihood value.
    pub loglike: f64,
    /// Multiplier applied to P and F when reporting variances.
    /// sigma2_hat for a concentrated likelihood, 1.0 otherwise.
    pub scale: f64,
    /// Innovation variance sigma2 (estimated or taken from Q).
    pub sigma2: f64,
    /// Innovation sequence v_t.
    pub innovations: Vec<f64>,
    /// Unscaled innovation variances F_t.
    pub innovation_vars: Vec<f64>,
    /// One-step-ahead predictions Z' * a_{t|t-1}.
    pub predicted_means: Vec<f64>,
    /// a_{n|n-1}: predicted state one step past the sample.
    pub predicted_state: DVector<f64>,
    /// P_{n|n-1}: its covariance (unscaled).
    pub predicted_cov: DMatrix<f64>,
    /// Observations skipped in the likelihood.
    pub loglikelihood_burn: usize,
    /// Effective number of observations (n - burn).
    pub n_obs_effective: usize,
}

/// Output of the log-likelihood evaluation only.
#[derive(Debug, Clone)]
pub struct KalmanOutput {
    pub loglike: f64,
    pub scale: f64,
    pub n_obs_effective: usize,
}

/// Run the Kalman filter over `endog`, recording everything needed for
/// prediction and diagnostics.
///
/// Harvey-form recursion:
///   - Innovation: v_t = y_t - Z' * a_{t|t-1}
///   - Update: a_{t|t} = a_{t|t-1} + K * v_t (Joseph-form covariance)
///   - Predict: a_{t+1|t} = T * a_{t|t} + c_t
///
/// For concentrated scale:
///   sigma2_hat = (1/n_eff) * sum(v_t^2 / F_t)
///   loglike = -n_eff/2 * ln(2pi) - n_eff/2 * ln(sigma2_hat) - n_eff/2 - 0.5 * sum(ln F_t)
pub fn kalman_filter(
    endog: &[f64],
    ss: &StateSpace,
    init: &KalmanInit,
    concentrate_scale: bool,
) -> Result<KalmanFilterOutput> {
    let n = endog.len();
    let k = ss.k_states;
    let burn = init.loglikelihood_burn;

    if n <= burn {
        return Err(ArimaError::DataError(format!(
            "Not enough observations: n={} <= burn={}",
            n, burn
        )));
    }

    let n_eff = n - burn;

    let mut a = init.initial_state.clone();
    let mut p = init.initial_state_cov.clone();

    let t_mat = &ss.transition;
    let z = &ss.design;
    let rqr = ss.rqr();
    let eye = DMatrix::<f64>::identity(k, k);

    let mut sum_log_f = 0.0;
    let mut sum_v2_f = 0.0;
    let mut innovations = Vec::with_capacity(n);
    let mut innovation_vars = Vec::with_capacity(n);
    let mut predicted_means = Vec::with_capacity(n);
    let mut degenerate = false;

    for (t, &y_t) in endog.iter().enumerate() {
        let y_hat = z.dot(&a);
        let v_t = y_t - y_hat;

        // F_t = Z' * P_{t|t-1} * Z (scalar, univariate)
        let p_z = &p * z;
        let f_t: f64 = z.dot(&p_z);

        predicted_means.push(y_hat);
        innovations.push(v_t);
        innovation_vars.push(f_t);

        // NaN fails `f_t > 0.0` below and would silently skip every update
        if !(v_t.is_finite() && f_t.is_finite()) {
            degenerate = true;
        }

        if f_t > 0.0 {
            let k_gain = &p_z / f_t;
            let a_updated = &a + &k_gain * v_t;

            // Joseph form: P_{t|t} = (I - K*Z') * P_{t|t-1} * (I - K*Z')'
            let i_kz = &eye - &k_gain * z.transpose();
            let p_updated = &i_kz * &p * i_kz.transpose();

            a = ss.propagate_state(&a_updated, t);
            p = t_mat * &p_updated * t_mat.transpose() + &rqr;

            if t >= burn {
                sum_log_f += f_t.ln();
                sum_v2_f += v_t * v_t / f_t;
            }
        } else {
            // F_t <= 0: skip update, predict from current state
            a = ss.propagate_state(&a, t);
            p = t_mat * &p * t_mat.transpose() + &rqr;
        }
    }

    let n_eff_f = n_eff as f64;
    let (loglike, scale, sigma2) = if concentrate_scale {
        let sigma2_hat = sum_v2_f / n_eff_f;
        let sigma2_safe = sigma2_hat.max(1e-300);
        let ll = -0.5 * n_eff_f * (2.0 * std::f64::consts::PI).ln()
            - 0.5 * n_eff_f * sigma2_safe.ln()
            - 0.5 * n_eff_f
            - 0.5 * sum_log_f;
        (ll, sigma2_hat, sigma2_hat)
    } else {
        // sigma2 already sits in Q
        let ll = -0.5 * n_eff_f * (2.0 * std::f64::consts::PI).ln()
            - 0.5 * sum_log_f
            - 0.5 * sum_v2_f;
        (ll, 1.0, ss.state_cov[(0, 0)])
    };
    let loglike = if degenerate { f64::NAN } else { loglike };

    Ok(KalmanFilterOutput {
        loglike,
        scale,
        sigma2,
        innovations,
        innovation_vars,
        predicted_means,
        predicted_state: a,
        predicted_cov: p,
        loglikelihood_burn: burn,
        n_obs_effective: n_eff,
    })
}

/// Compute the (optionally concentrated) log-likelihood.
pub fn kalman_loglike(
    endog: &[f64],
    ss: &StateSpace,
    init: &KalmanInit,
    concentrate_scale: bool,
) -> Result<KalmanOutput> {
    let out = kalman_filter(endog, ss, init, concentrate_scale)?;
    Ok(KalmanOutput {
        loglike: out.loglike,
        scale: out.sigma2,
        n_obs_effective: out.n_obs_effective,
    })
}
