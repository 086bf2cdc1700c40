//! Generate → gate → fit → predict, once per configuration.

use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{ArimaError, Result};
use crate::fit_policy::{self, FitDecision};
use crate::forecast::{self, Prediction};
use crate::optimizer::{self, DEFAULT_MAXITER};
use crate::params::ModelParams;
use crate::process::{generate, ProcessProperties, ProcessSpec};
use crate::timeline::DatedSeries;
use crate::types::{FitResult, ModelConfig, ModelOrder, Trend};

/// Seasonal part of the fitted model, `(P, D, Q, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub s: usize,
}

/// The model fitted to the training prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSpec {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal: Option<SeasonalOrder>,
    /// Deterministic trend in the fitted model, independent of the
    /// generating ramp.
    pub trend: Trend,
    pub enforce_stationarity: bool,
    pub enforce_invertibility: bool,
    /// "lbfgs" or "nelder-mead".
    pub method: String,
    pub maxiter: u64,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            p: 1,
            d: 0,
            q: 0,
            seasonal: None,
            trend: Trend::None,
            enforce_stationarity: false,
            enforce_invertibility: false,
            method: "lbfgs".to_string(),
            maxiter: DEFAULT_MAXITER,
        }
    }
}

impl ModelSpec {
    pub fn order(&self) -> ModelOrder {
        match self.seasonal {
            Some(s) => ModelOrder::new(self.p, self.d, self.q, s.p, s.d, s.q, s.s),
            None => ModelOrder::arima(self.p, self.d, self.q),
        }
    }

    pub fn to_model_config(&self) -> ModelConfig {
        ModelConfig {
            order: self.order(),
            trend: self.trend,
            enforce_stationarity: self.enforce_stationarity,
            enforce_invertibility: self.enforce_invertibility,
            concentrate_scale: true,
        }
    }
}

/// Everything one exploration run depends on. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub process: ProcessSpec,
    pub n_samples: usize,
    pub seed: u64,
    pub model: ModelSpec,
    pub n_train: usize,
    pub horizon: usize,
    /// Interval level is `1 - alpha`.
    pub alpha: f64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            process: ProcessSpec {
                ar: vec![0.5],
                ..Default::default()
            },
            n_samples: 120,
            seed: 42,
            model: ModelSpec::default(),
            n_train: 108,
            horizon: 24,
            alpha: 0.05,
        }
    }
}

impl ExplorerConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reject values that would otherwise panic deeper down. Coefficient
    /// counts are deliberately not checked against the model order.
    pub fn validate(&self) -> Result<()> {
        if !(self.process.sigma.is_finite() && self.process.sigma >= 0.0) {
            return Err(ArimaError::InvalidConfig(format!(
                "sigma must be finite and non-negative, got {}",
                self.process.sigma
            )));
        }
        if self
            .process
            .ar
            .iter()
            .chain(&self.process.ma)
            .chain(self.process.trend_slope.iter())
            .any(|c| !c.is_finite())
        {
            return Err(ArimaError::InvalidConfig(
                "process coefficients must be finite".to_string(),
            ));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ArimaError::InvalidConfig(format!(
                "alpha must lie in (0, 1), got {}",
                self.alpha
            )));
        }
        if let Some(s) = self.model.seasonal {
            let has_terms = s.p > 0 || s.d > 0 || s.q > 0;
            if has_terms && s.s < 2 {
                return Err(ArimaError::InvalidConfig(format!(
                    "seasonal period must be at least 2, got {}",
                    s.s
                )));
            }
            if s.d > 1 {
                return Err(ArimaError::InvalidConfig(format!(
                    "seasonal differencing order above 1 is not supported, got {}",
                    s.d
                )));
            }
        }
        Ok(())
    }
}

/// Held-out observations that fell inside the forecast band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HoldoutCoverage {
    pub inside: usize,
    pub total: usize,
}

/// Estimation and prediction results for one fitted run.
#[derive(Debug, Clone, Serialize)]
pub struct FitReport {
    pub order: ModelOrder,
    pub trend: Trend,
    pub param_names: Vec<String>,
    pub result: FitResult,
    pub prediction: Prediction,
    /// `observed - predicted`, starting at `prediction.start`.
    pub residuals: Vec<f64>,
    /// Filter innovations over the training span past the burn-in,
    /// scaled to unit variance.
    pub standardized_residuals: Vec<f64>,
}

impl FitReport {
    /// Estimates in `param_names` order, with the concentrated scale filled in.
    pub fn coefficients(&self) -> Vec<f64> {
        let mut values = self.result.params.clone();
        if values.len() < self.param_names.len() {
            values.push(self.result.scale);
        }
        values
    }

    pub fn sigma2(&self) -> f64 {
        self.result.scale
    }
}

impl fmt::Display for FitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(62);
        let thin = "-".repeat(62);
        let status = if self.result.converged {
            "converged"
        } else {
            "not converged"
        };
        writeln!(f, "{}", rule)?;
        writeln!(
            f,
            " {:<32}{:>29}",
            format!("Model: {}", self.order),
            format!("No. Observations: {}", self.result.n_obs)
        )?;
        writeln!(
            f,
            " {:<32}{:>29}",
            format!("Method: {}", self.result.method),
            format!("Log Likelihood: {:.3}", self.result.loglike)
        )?;
        writeln!(
            f,
            " {:<32}{:>29}",
            format!("Iterations: {} ({})", self.result.n_iter, status),
            format!("AIC: {:.3}", self.result.aic)
        )?;
        writeln!(
            f,
            " {:<32}{:>29}",
            format!("Trend: {:?}", self.trend),
            format!("BIC: {:.3}", self.result.bic)
        )?;
        writeln!(f, "{}", thin)?;
        writeln!(f, " {:<20}{:>14}", "param", "coef")?;
        for (name, value) in self.param_names.iter().zip(self.coefficients()) {
            writeln!(f, " {:<20}{:>14.4}", name, value)?;
        }
        write!(f, "{}", rule)
    }
}

/// Result of one exploration run.
#[derive(Debug, Clone, Serialize)]
pub struct ExplorerOutcome {
    pub config: ExplorerConfig,
    pub series: DatedSeries,
    pub n_train: usize,
    pub properties: ProcessProperties,
    pub decision: FitDecision,
    pub fit: Option<FitReport>,
}

impl ExplorerOutcome {
    pub fn train(&self) -> &[f64] {
        self.series.split(self.n_train).0
    }

    pub fn test(&self) -> &[f64] {
        self.series.split(self.n_train).1
    }

    /// Count of held-out points inside the band, over the span where both
    /// exist. `None` without a fit or without any such point.
    pub fn holdout_coverage(&self) -> Option<HoldoutCoverage> {
        let pred = &self.fit.as_ref()?.prediction;
        let lo = self.n_train.max(pred.start);
        let hi = pred.end().min(self.series.len());
        if lo >= hi {
            return None;
        }
        let inside = (lo..hi)
            .filter(|&t| {
                let i = t - pred.start;
                let y = self.series.values[t];
                y >= pred.ci_lower[i] && y <= pred.ci_upper[i]
            })
            .count();
        Some(HoldoutCoverage {
            inside,
            total: hi - lo,
        })
    }
}

/// Run one exploration: generate, gate, and fit and predict when allowed.
pub fn run(config: &ExplorerConfig) -> Result<ExplorerOutcome> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let series = DatedSeries::new(generate(&config.process, config.n_samples, &mut rng));
    let n_train = config.n_train.min(series.len());

    let properties = config.process.properties();
    if !properties.stationary || !properties.invertible {
        tracing::info!(
            stationary = properties.stationary,
            invertible = properties.invertible,
            "generating process has roots on or inside the unit circle"
        );
    }

    let model_config = config.model.to_model_config();
    let decision = fit_policy::decide(&config.process, &model_config.order);
    tracing::info!(
        seed = config.seed,
        n = series.len(),
        n_train,
        order = %model_config.order,
        %decision,
        "exploration run"
    );

    let fit = if decision.should_fit() {
        Some(fit_and_predict(&series, n_train, &model_config, config)?)
    } else {
        None
    };

    Ok(ExplorerOutcome {
        config: config.clone(),
        series,
        n_train,
        properties,
        decision,
        fit,
    })
}

fn fit_and_predict(
    series: &DatedSeries,
    n_train: usize,
    model_config: &ModelConfig,
    config: &ExplorerConfig,
) -> Result<FitReport> {
    let (train, _) = series.split(n_train);
    let result = optimizer::fit(
        train,
        model_config,
        None,
        Some(&config.model.method),
        Some(config.model.maxiter),
    )?;
    let params = ModelParams::from_flat(&result.params, model_config)?;

    let (prediction, filter_resid) =
        forecast::predict_pipeline(train, model_config, &params, config.horizon, config.alpha)?;
    let residuals = forecast::prediction_residuals(&series.values, &prediction);
    tracing::info!(
        loglike = result.loglike,
        converged = result.converged,
        final_band_width = ?prediction.widths().last(),
        "model fitted"
    );
    let burn = prediction.start.min(filter_resid.standardized_residuals.len());
    let standardized_residuals = filter_resid.standardized_residuals[burn..].to_vec();

    Ok(FitReport {
        order: model_config.order.clone(),
        trend: model_config.trend,
        param_names: ModelParams::names(model_config),
        result,
        prediction,
        residuals,
        standardized_residuals,
    })
}
