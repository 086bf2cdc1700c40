use nalgebra::{DMatrix, DVector};

use crate::state_space::StateSpace;
use crate::types::ModelConfig;

/// Kalman filter initial state and covariance.
pub struct KalmanInit {
    /// Initial state vector a_0 (zeros).
    pub initial_state: DVector<f64>,
    /// Initial state covariance P_0.
    pub initial_state_cov: DMatrix<f64>,
    /// Number of initial observations to skip in loglikelihood (burn-in).
    pub loglikelihood_burn: usize,
}

impl KalmanInit {
    /// Approximate diffuse initialization.
    ///
    /// - a_0 = 0
    /// - P_0 = kappa * I_{k_states}
    /// - burn = k_states (skip all diffuse-affected observations)
    pub fn approximate_diffuse(k_states: usize, kappa: f64) -> Self {
        Self {
            initial_state: DVector::zeros(k_states),
            initial_state_cov: DMatrix::identity(k_states, k_states) * kappa,
            loglikelihood_burn: k_states,
        }
    }

    /// Stationary ARMA block with diffuse differencing states.
    ///
    /// The ARMA block covariance solves P = T_a P T_a' + R_a Q R_a'.
    /// Returns `None` when that system is singular (unit or explosive roots).
    pub fn stationary(ss: &StateSpace, kappa: f64) -> Option<Self> {
        let k = ss.k_states;
        let sd = ss.k_states_diff;
        let ko = k - sd;

        let t_arma = ss.transition.view((sd, sd), (ko, ko)).into_owned();
        let rqr = ss.rqr();
        let rqr_arma = rqr.view((sd, sd), (ko, ko)).into_owned();

        let p_arma = solve_discrete_lyapunov(&t_arma, &rqr_arma)?;

        let mut cov = DMatrix::<f64>::zeros(k, k);
        for i in 0..sd {
            cov[(i, i)] = kappa;
        }
        cov.view_mut((sd, sd), (ko, ko)).copy_from(&p_arma);

        Some(Self {
            initial_state: DVector::zeros(k),
            initial_state_cov: cov,
            loglikelihood_burn: sd,
        })
    }

    /// Pick the initialization the model configuration asks for.
    ///
    /// Stationary initialization is only used with `enforce_stationarity`;
    /// relaxed models always start approximately diffuse.
    pub fn from_config(ss: &StateSpace, config: &ModelConfig, kappa: f64) -> Self {
        if config.enforce_stationarity {
            if let Some(init) = Self::stationary(ss, kappa) {
                return init;
            }
        }
        Self::approximate_diffuse(ss.k_states, kappa)
    }

    /// Default kappa value matching statsmodels.
    pub fn default_kappa() -> f64 {
        1e6
    }
}

/// Solve P = A P A' + B via vec(P) = (I - A⊗A)^{-1} vec(B).
fn solve_discrete_lyapunov(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let n = a.nrows();
    let lhs = DMatrix::<f64>::identity(n * n, n * n) - a.kronecker(a);
    let rhs = DVector::from_column_slice(b.as_slice());
    let sol = lhs.lu().solve(&rhs)?;
    if sol.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let p = DMatrix::from_column_slice(n, n, sol.as_slice());
    // Explosive roots still give a solvable system, but not a covariance
    if (0..n).any(|i| p[(i, i)] <= 0.0) {
        return None;
    }
    // Symmetrize against round-off
    Some((&p + p.transpose()) * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ModelParams;
    use crate::types::ModelOrder;

    fn state_space(p: usize, d: usize, q: usize, ar: &[f64], ma: &[f64]) -> (StateSpace, ModelConfig) {
        let config = ModelConfig {
            order: ModelOrder::arima(p, d, q),
            enforce_stationarity: true,
            ..Default::default()
        };
        let ss = StateSpace::new(&config, &ModelParams::arma(ar, ma)).unwrap();
        (ss, config)
    }

    #[test]
    fn test_approximate_diffuse_basic() {
        let init = KalmanInit::approximate_diffuse(2, 1e6);

        assert_eq!(init.initial_state.len(), 2);
        assert!(init.initial_state.iter().all(|v| v.abs() < 1e-15));

        assert!((init.initial_state_cov[(0, 0)] - 1e6).abs() < 1e-4);
        assert!((init.initial_state_cov[(0, 1)]).abs() < 1e-15);
        assert!((init.initial_state_cov[(1, 1)] - 1e6).abs() < 1e-4);

        assert_eq!(init.loglikelihood_burn, 2);
    }

    #[test]
    fn test_stationary_ar1_variance() {
        // Var = 1 / (1 - phi^2)
        let (ss, _) = state_space(1, 0, 0, &[0.6], &[]);
        let init = KalmanInit::stationary(&ss, 1e6).unwrap();
        assert!((init.initial_state_cov[(0, 0)] - 1.0 / (1.0 - 0.36)).abs() < 1e-10);
        assert_eq!(init.loglikelihood_burn, 0);
    }

    #[test]
    fn test_stationary_keeps_diff_states_diffuse() {
        let (ss, _) = state_space(1, 1, 0, &[0.5], &[]);
        let init = KalmanInit::stationary(&ss, 1e6).unwrap();
        assert!((init.initial_state_cov[(0, 0)] - 1e6).abs() < 1e-6);
        assert!((init.initial_state_cov[(1, 1)] - 1.0 / 0.75).abs() < 1e-10);
        assert_eq!(init.loglikelihood_burn, 1);
    }

    #[test]
    fn test_unit_root_falls_back_to_diffuse() {
        let (ss, config) = state_space(1, 0, 0, &[1.0], &[]);
        assert!(KalmanInit::stationary(&ss, 1e6).is_none());
        let (explosive, _) = state_space(1, 0, 0, &[1.2], &[]);
        assert!(KalmanInit::stationary(&explosive, 1e6).is_none());
        let init = KalmanInit::from_config(&ss, &config, KalmanInit::default_kappa());
        assert_eq!(init.loglikelihood_burn, ss.k_states);
    }

    #[test]
    fn test_relaxed_config_is_diffuse() {
        let (ss, mut config) = state_space(1, 0, 0, &[0.5], &[]);
        config.enforce_stationarity = false;
        let init = KalmanInit::from_config(&ss, &config, KalmanInit::default_kappa());
        assert_eq!(init.loglikelihood_burn, 1);
        assert!((init.initial_state_cov[(0, 0)] - 1e6).abs() < 1e-6);
    }

    #[test]
    fn test_default_kappa() {
        assert!((KalmanInit::default_kappa() - 1e6).abs() < 1e-10);
    }
}
