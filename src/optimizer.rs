//! ARIMA parameter optimization via L-BFGS with Nelder-Mead fallback.
//!
//! This module provides:
//! - Parameter space transformations (constrained ↔ unconstrained)
//! - Negative log-likelihood objective function for argmin
//! - `fit()` function: the main entry point for model fitting

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;

use crate::error::{ArimaError, Result};
use crate::initialization::KalmanInit;
use crate::kalman::kalman_loglike;
use crate::params::{self, ModelParams};
use crate::start_params::compute_start_params;
use crate::state_space::StateSpace;
use crate::types::{FitResult, ModelConfig};

/// Cost returned for parameter points where the likelihood cannot be evaluated.
const PENALTY: f64 = f64::MAX / 2.0;

/// Default iteration budget for a fit.
pub const DEFAULT_MAXITER: u64 = 500;

// ---------------------------------------------------------------------------
// Parameter transformations (constrained ↔ unconstrained)
// ---------------------------------------------------------------------------

/// Which way a block of parameters is mapped.
#[derive(Clone, Copy)]
enum Direction {
    Constrain,
    Unconstrain,
}

fn map_params(values: &[f64], config: &ModelConfig, dir: Direction) -> Result<Vec<f64>> {
    let expected = config.param_len();
    if values.len() != expected {
        return Err(ArimaError::ParamLengthMismatch {
            expected,
            got: values.len(),
        });
    }

    let order = &config.order;
    let mut out = Vec::with_capacity(values.len());
    let mut i = 0;

    // Trend: pass through
    let kt = config.trend.k_trend();
    out.extend_from_slice(&values[..kt]);
    i += kt;

    let blocks = [
        (order.p, config.enforce_stationarity, true),
        (order.q, config.enforce_invertibility, false),
        (order.pp, config.enforce_stationarity, true),
        (order.qq, config.enforce_invertibility, false),
    ];
    for (len, enforce, is_ar) in blocks {
        let block = &values[i..i + len];
        if enforce && len > 0 {
            out.extend(match (dir, is_ar) {
                (Direction::Constrain, true) => params::constrain_stationary(block),
                (Direction::Constrain, false) => params::constrain_invertible(block),
                (Direction::Unconstrain, true) => params::unconstrain_stationary(block),
                (Direction::Unconstrain, false) => params::unconstrain_invertible(block),
            });
        } else {
            out.extend_from_slice(block);
        }
        i += len;
    }

    // sigma2
    if !config.concentrate_scale {
        out.push(match dir {
            Direction::Constrain => params::constrain_variance(values[i]),
            Direction::Unconstrain => params::unconstrain_variance(values[i])?,
        });
    }

    Ok(out)
}

/// Transform constrained parameters to unconstrained space for optimization.
///
/// Layout: `[trend | ar(p) | ma(q) | sar(P) | sma(Q) | sigma2?]`
pub fn untransform_params(constrained: &[f64], config: &ModelConfig) -> Result<Vec<f64>> {
    map_params(constrained, config, Direction::Unconstrain)
}

/// Transform unconstrained parameters back to constrained space.
pub fn transform_params(unconstrained: &[f64], config: &ModelConfig) -> Result<Vec<f64>> {
    map_params(unconstrained, config, Direction::Constrain)
}

// ---------------------------------------------------------------------------
// Objective function for argmin
// ---------------------------------------------------------------------------

/// Negative log-likelihood objective for optimizer.
#[derive(Clone)]
struct ArimaObjective {
    endog: Vec<f64>,
    config: ModelConfig,
}

impl ArimaObjective {
    /// Evaluate log-likelihood for given unconstrained parameters.
    fn eval_loglike(&self, unconstrained: &[f64]) -> Result<f64> {
        let constrained = transform_params(unconstrained, &self.config)?;
        let mparams = ModelParams::from_flat(&constrained, &self.config)?;
        let ss = StateSpace::new(&self.config, &mparams)?;
        let init = KalmanInit::from_config(&ss, &self.config, KalmanInit::default_kappa());
        let output = kalman_loglike(&self.endog, &ss, &init, self.config.concentrate_scale)?;

        if output.loglike.is_finite() {
            Ok(output.loglike)
        } else {
            Err(ArimaError::OptimizationFailed(
                "non-finite log-likelihood".to_string(),
            ))
        }
    }
}

impl CostFunction for ArimaObjective {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Vec<f64>) -> std::result::Result<f64, argmin::core::Error> {
        match self.eval_loglike(param) {
            Ok(ll) => Ok(-ll),  // minimize negative log-likelihood
            Err(_) => Ok(PENALTY),
        }
    }
}

impl Gradient for ArimaObjective {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    /// Central differences, dropping to a forward difference next to
    /// penalized points and to zero when neither side is usable.
    fn gradient(&self, param: &Vec<f64>) -> std::result::Result<Vec<f64>, argmin::core::Error> {
        let n = param.len();
        let mut grad = vec![0.0; n];
        let f0 = self.cost(param)?;
        let mut p_work = param.clone();

        for i in 0..n {
            let orig = p_work[i];
            let eps = f64::EPSILON.cbrt() * orig.abs().max(1.0);

            p_work[i] = orig + eps;
            let fp = self.cost(&p_work)?;
            p_work[i] = orig - eps;
            let fm = self.cost(&p_work)?;
            p_work[i] = orig;

            grad[i] = if fp < PENALTY && fm < PENALTY {
                (fp - fm) / (2.0 * eps)
            } else if fp < PENALTY && f0 < PENALTY {
                (fp - f0) / eps
            } else if fm < PENALTY && f0 < PENALTY {
                (f0 - fm) / eps
            } else {
                0.0
            };
            if !grad[i].is_finite() {
                grad[i] = 0.0;
            }
        }

        Ok(grad)
    }
}

// ---------------------------------------------------------------------------
// Solvers
// ---------------------------------------------------------------------------

/// Best parameters, best cost, iterations used, converged flag.
type SolverOutcome = (Vec<f64>, f64, u64, bool);

fn converged(reason: Option<&TerminationReason>) -> bool {
    matches!(
        reason,
        Some(TerminationReason::SolverConverged) | Some(TerminationReason::TargetCostReached)
    )
}

/// A solver result is usable only at finite parameters with an unpenalized cost.
fn admissible(params: &[f64], cost: f64) -> bool {
    cost.is_finite() && cost < PENALTY && params.iter().all(|p| p.is_finite())
}

fn run_lbfgs(
    objective: ArimaObjective,
    init_params: Vec<f64>,
    maxiter: u64,
) -> std::result::Result<SolverOutcome, String> {
    let linesearch = MoreThuenteLineSearch::new();
    let solver = LBFGS::new(linesearch, 10)
        .with_tolerance_grad(1e-5)
        .map_err(|e| e.to_string())?
        .with_tolerance_cost(1e-9)
        .map_err(|e| e.to_string())?;

    let result = Executor::new(objective, solver)
        .configure(
            |state: argmin::core::IterState<Vec<f64>, Vec<f64>, (), (), (), f64>| {
                state.param(init_params).max_iters(maxiter)
            },
        )
        .run()
        .map_err(|e| format!("L-BFGS failed: {}", e))?;

    let state = result.state();
    let best_param = state
        .get_best_param()
        .ok_or("L-BFGS: no best parameter found")?
        .clone();
    let best_cost = state.get_best_cost();
    if !admissible(&best_param, best_cost) {
        return Err("L-BFGS: no admissible parameter point".to_string());
    }

    Ok((
        best_param,
        best_cost,
        state.get_iter(),
        converged(state.get_termination_reason()),
    ))
}

fn run_nelder_mead(
    objective: ArimaObjective,
    init_params: Vec<f64>,
    maxiter: u64,
) -> std::result::Result<SolverOutcome, String> {
    let n = init_params.len();

    // Build simplex: n+1 vertices
    let mut simplex = vec![init_params.clone()];
    for i in 0..n {
        let mut vertex = init_params.clone();
        let delta = if vertex[i].abs() > 1e-8 {
            vertex[i] * 0.05
        } else {
            0.00025
        };
        vertex[i] += delta;
        simplex.push(vertex);
    }

    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(1e-6)
        .map_err(|e| e.to_string())?;

    let result = Executor::new(objective, solver)
        .configure(
            |state: argmin::core::IterState<Vec<f64>, (), (), (), (), f64>| {
                state.max_iters(maxiter)
            },
        )
        .run()
        .map_err(|e| format!("Nelder-Mead failed: {}", e))?;

    let state = result.state();
    let best_param = state
        .get_best_param()
        .ok_or("Nelder-Mead: no best parameter found")?
        .clone();
    let best_cost = state.get_best_cost();
    if !admissible(&best_param, best_cost) {
        return Err("Nelder-Mead: no admissible parameter point".to_string());
    }

    Ok((
        best_param,
        best_cost,
        state.get_iter(),
        converged(state.get_termination_reason()),
    ))
}

// ---------------------------------------------------------------------------
// Public fit() entry point
// ---------------------------------------------------------------------------

/// Fit an ARIMA-family model by maximum likelihood.
///
/// # Arguments
/// * `endog` - Observed time series
/// * `config` - Model configuration (order, trend, constraint flags)
/// * `start_params` - Optional initial parameter values (constrained space)
/// * `method` - "lbfgs" (default, Nelder-Mead fallback) or "nelder-mead"
/// * `maxiter` - Maximum iterations (default: 500)
pub fn fit(
    endog: &[f64],
    config: &ModelConfig,
    start_params: Option<&[f64]>,
    method: Option<&str>,
    maxiter: Option<u64>,
) -> Result<FitResult> {
    let maxiter = maxiter.unwrap_or(DEFAULT_MAXITER);
    let method = method.unwrap_or("lbfgs");
    if !matches!(method, "lbfgs" | "nelder-mead" | "nm") {
        return Err(ArimaError::OptimizationFailed(format!(
            "unknown method: '{}'. Use 'lbfgs' or 'nelder-mead'",
            method
        )));
    }

    let min_obs = config
        .param_len()
        .max(config.order.k_states().saturating_add(1));
    if endog.len() <= min_obs {
        return Err(ArimaError::DataError(format!(
            "Not enough observations: n={} <= minimum required {} for model order",
            endog.len(),
            min_obs
        )));
    }
    if endog.iter().any(|v| !v.is_finite()) {
        return Err(ArimaError::DataError(
            "series contains non-finite values".to_string(),
        ));
    }

    // 1. Starting parameters
    let constrained_start = match start_params {
        Some(sp) => {
            if sp.len() != config.param_len() {
                return Err(ArimaError::ParamLengthMismatch {
                    expected: config.param_len(),
                    got: sp.len(),
                });
            }
            sp.to_vec()
        }
        None => compute_start_params(endog, config)?,
    };
    tracing::debug!(order = %config.order, start = ?constrained_start, "starting fit");

    let objective = ArimaObjective {
        endog: endog.to_vec(),
        config: config.clone(),
    };

    // 2. Optimize in unconstrained space
    let (final_constrained, n_iter, converged, used_method) = if maxiter == 0 {
        (constrained_start, 0, false, method.to_string())
    } else {
        let unconstrained_start = untransform_params(&constrained_start, config)?;
        let (best, _cost, n_iter, conv, used) = match method {
            "nelder-mead" | "nm" => {
                let (p, c, n, conv) =
                    run_nelder_mead(objective.clone(), unconstrained_start, maxiter)
                        .map_err(ArimaError::OptimizationFailed)?;
                (p, c, n, conv, "nelder-mead".to_string())
            }
            _ => match run_lbfgs(objective.clone(), unconstrained_start.clone(), maxiter) {
                Ok((p, c, n, conv)) => (p, c, n, conv, "lbfgs".to_string()),
                Err(reason) => {
                    tracing::warn!(%reason, "L-BFGS failed, falling back to Nelder-Mead");
                    let (p, c, n, conv) =
                        run_nelder_mead(objective.clone(), unconstrained_start, maxiter)
                            .map_err(ArimaError::OptimizationFailed)?;
                    (p, c, n, conv, "nelder-mead (fallback)".to_string())
                }
            },
        };
        (transform_params(&best, config)?, n_iter, conv, used)
    };

    // 3. Final log-likelihood at the estimate
    let final_params = ModelParams::from_flat(&final_constrained, config)?;
    let ss = StateSpace::new(config, &final_params)?;
    let init = KalmanInit::from_config(&ss, config, KalmanInit::default_kappa());
    let output = kalman_loglike(endog, &ss, &init, config.concentrate_scale)?;
    if !output.loglike.is_finite() {
        return Err(ArimaError::OptimizationFailed(
            "log-likelihood at the estimate is not finite".to_string(),
        ));
    }

    let result = FitResult {
        params: final_constrained,
        loglike: output.loglike,
        scale: output.scale,
        n_obs: endog.len(),
        n_params: ModelParams::n_estimated_params(config),
        n_iter,
        converged,
        method: used_method,
        aic: 0.0,
        bic: 0.0,
    }
    .with_information_criteria();

    tracing::debug!(
        loglike = result.loglike,
        n_iter = result.n_iter,
        converged = result.converged,
        method = %result.method,
        "fit finished"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
