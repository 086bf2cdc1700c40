use serde::{Deserialize, Serialize};

/// SARIMA model order specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelOrder {
    pub p: usize,   // AR order
    pub d: usize,   // differencing order
    pub q: usize,   // MA order
    pub pp: usize,  // seasonal AR order (P)
    pub dd: usize,  // seasonal differencing order (D)
    pub qq: usize,  // seasonal MA order (Q)
    pub s: usize,   // seasonal period
}

impl ModelOrder {
    pub fn new(p: usize, d: usize, q: usize, pp: usize, dd: usize, qq: usize, s: usize) -> Self {
        Self { p, d, q, pp, dd, qq, s }
    }

    /// Non-seasonal ARIMA(p, d, q).
    pub fn arima(p: usize, d: usize, q: usize) -> Self {
        Self::new(p, d, q, 0, 0, 0, 0)
    }

    /// Extended AR order: p + s*P
    pub fn k_ar(&self) -> usize {
        self.p + self.s * self.pp
    }

    /// Extended MA order: q + s*Q
    pub fn k_ma(&self) -> usize {
        self.q + self.s * self.qq
    }

    /// State space ARMA dimension: max(k_ar, k_ma + 1)
    pub fn k_order(&self) -> usize {
        std::cmp::max(self.k_ar(), self.k_ma() + 1)
    }

    /// Differencing state dimension: d + s*D
    pub fn k_states_diff(&self) -> usize {
        self.d + self.s * self.dd
    }

    /// Total state dimension
    pub fn k_states(&self) -> usize {
        self.k_order() + self.k_states_diff()
    }

    pub fn is_seasonal(&self) -> bool {
        self.pp > 0 || self.dd > 0 || self.qq > 0
    }
}

impl std::fmt::Display for ModelOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ARIMA({}, {}, {})", self.p, self.d, self.q)?;
        if self.is_seasonal() {
            write!(f, "x({}, {}, {}, {})", self.pp, self.dd, self.qq, self.s)?;
        }
        Ok(())
    }
}

/// Trend specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    #[default]
    None,     // 'n': k_trend = 0
    Constant, // 'c': k_trend = 1
    Linear,   // 't': k_trend = 1
    Both,     // 'ct': k_trend = 2
}

impl Trend {
    pub fn k_trend(&self) -> usize {
        match self {
            Trend::None => 0,
            Trend::Constant | Trend::Linear => 1,
            Trend::Both => 2,
        }
    }

    /// Parse the short statsmodels-style code ("n", "c", "t", "ct").
    pub fn from_code(s: &str) -> Self {
        match s {
            "c" => Trend::Constant,
            "t" => Trend::Linear,
            "ct" | "tc" => Trend::Both,
            _ => Trend::None,
        }
    }

    /// Deterministic trend value at time index `t` for the given coefficients.
    pub fn value_at(&self, coeffs: &[f64], t: usize) -> f64 {
        let tf = t as f64;
        match (self, coeffs) {
            (Trend::Constant, [c, ..]) => *c,
            (Trend::Linear, [b, ..]) => b * tf,
            (Trend::Both, [c, b, ..]) => c + b * tf,
            _ => 0.0,
        }
    }
}

/// Model configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub order: ModelOrder,
    pub trend: Trend,
    pub enforce_stationarity: bool,
    pub enforce_invertibility: bool,
    pub concentrate_scale: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            order: ModelOrder::arima(1, 0, 0),
            trend: Trend::None,
            enforce_stationarity: false,
            enforce_invertibility: false,
            concentrate_scale: true,
        }
    }
}

impl ModelConfig {
    /// Length of the flat parameter vector for this configuration.
    pub fn param_len(&self) -> usize {
        self.trend.k_trend()
            + self.order.p
            + self.order.q
            + self.order.pp
            + self.order.qq
            + if self.concentrate_scale { 0 } else { 1 }
    }
}

/// Fit result returned by the optimizer.
#[derive(Debug, Clone, Serialize)]
pub struct FitResult {
    pub params: Vec<f64>,
    pub loglike: f64,
    pub scale: f64,
    pub n_obs: usize,
    pub n_params: usize,
    pub n_iter: u64,
    pub converged: bool,
    pub method: String,
    pub aic: f64,
    pub bic: f64,
}

impl FitResult {
    /// Fill in AIC and BIC from loglike, n_params and n_obs.
    pub fn with_information_criteria(mut self) -> Self {
        let k = self.n_params as f64;
        self.aic = -2.0 * self.loglike + 2.0 * k;
        self.bic = -2.0 * self.loglike + k * (self.n_obs.max(1) as f64).ln();
        self
    }
}
