//! Synthetic ARIMA series generation.
//!
//! A realization is produced by filtering scaled Gaussian innovations
//! through the ARMA lag polynomials, dropping a burn-in prefix, adding an
//! optional linear ramp and integrating `d` times.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::polynomial::{lfilter, outside_unit_circle, root_moduli};

/// Parameters of the generating process.
///
/// Coefficients use the textbook sign convention:
/// `y_t = φ1 y_{t-1} + ... + e_t + θ1 e_{t-1} + ...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSpec {
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    /// Number of cumulative sums applied after the ARMA step.
    pub d: usize,
    /// Innovation standard deviation.
    pub sigma: f64,
    /// Leading samples simulated and discarded.
    pub burnin: usize,
    /// Per-step increment of the deterministic ramp.
    pub trend_slope: Option<f64>,
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self {
            ar: Vec::new(),
            ma: Vec::new(),
            d: 0,
            sigma: 1.0,
            burnin: 100,
            trend_slope: None,
        }
    }
}

/// Root diagnostics of the generating polynomials. Reported, never enforced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessProperties {
    pub stationary: bool,
    pub invertible: bool,
    pub ar_root_moduli: Vec<f64>,
    pub ma_root_moduli: Vec<f64>,
}

impl ProcessSpec {
    /// AR lag polynomial `[1, -φ1, ..., -φp]`.
    pub fn ar_poly(&self) -> Vec<f64> {
        std::iter::once(1.0).chain(self.ar.iter().map(|c| -c)).collect()
    }

    /// MA lag polynomial `[1, θ1, ..., θq]`.
    pub fn ma_poly(&self) -> Vec<f64> {
        std::iter::once(1.0).chain(self.ma.iter().copied()).collect()
    }

    /// True when any AR or MA coefficient is non-zero.
    pub fn has_dynamics(&self) -> bool {
        self.ar.iter().chain(self.ma.iter()).any(|&c| c != 0.0)
    }

    pub fn properties(&self) -> ProcessProperties {
        let ar_root_moduli = root_moduli(&self.ar_poly());
        let ma_root_moduli = root_moduli(&self.ma_poly());
        ProcessProperties {
            stationary: outside_unit_circle(&ar_root_moduli),
            invertible: outside_unit_circle(&ma_root_moduli),
            ar_root_moduli,
            ma_root_moduli,
        }
    }
}

/// Simulate `n` stationary ARMA samples after discarding `spec.burnin`.
pub fn simulate_arma<R: Rng>(spec: &ProcessSpec, n: usize, rng: &mut R) -> Vec<f64> {
    let total = n + spec.burnin;
    let eta: Vec<f64> = (0..total)
        .map(|_| spec.sigma * rng.sample::<f64, _>(StandardNormal))
        .collect();
    let mut out = lfilter(&spec.ma_poly(), &spec.ar_poly(), &eta);
    out.drain(..spec.burnin.min(out.len()));
    out
}

/// Draw one realization of length `n`.
///
/// Innovations are consumed identically regardless of `d` and the trend,
/// so a fixed seed gives the same underlying ARMA path for every
/// integration order.
pub fn generate<R: Rng>(spec: &ProcessSpec, n: usize, rng: &mut R) -> Vec<f64> {
    let mut y = simulate_arma(spec, n, rng);
    if let Some(slope) = spec.trend_slope {
        for (i, v) in y.iter_mut().enumerate() {
            *v += slope * i as f64;
        }
    }
    integrate(&y, spec.d)
}

/// Apply `d` successive cumulative sums.
pub fn integrate(series: &[f64], d: usize) -> Vec<f64> {
    let mut out = series.to_vec();
    for _ in 0..d {
        let mut acc = 0.0;
        for v in out.iter_mut() {
            acc += *v;
            *v = acc;
        }
    }
    out
}

/// Apply regular differencing d times. Each pass shortens the series by one.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= 1 {
            return vec![];
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}
