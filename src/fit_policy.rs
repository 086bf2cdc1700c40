//! Decides whether a generated series gets a model fitted at all.

use serde::Serialize;

use crate::process::ProcessSpec;
use crate::types::ModelOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitDecision {
    Fit,
    /// Every AR and MA generation coefficient is zero.
    SkipWhiteNoise,
    /// The model has neither AR nor MA terms (p = q = 0).
    SkipNoArmaTerms,
}

impl FitDecision {
    pub fn should_fit(&self) -> bool {
        matches!(self, FitDecision::Fit)
    }
}

impl std::fmt::Display for FitDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FitDecision::Fit => "fit",
            FitDecision::SkipWhiteNoise => "skipped: generating process has no ARMA dynamics",
            FitDecision::SkipNoArmaTerms => "skipped: model order has p = q = 0",
        })
    }
}

/// Fit only when the process has ARMA dynamics and the model has p or q.
pub fn decide(process: &ProcessSpec, order: &ModelOrder) -> FitDecision {
    if !process.has_dynamics() {
        FitDecision::SkipWhiteNoise
    } else if order.p == 0 && order.q == 0 {
        FitDecision::SkipNoArmaTerms
    } else {
        FitDecision::Fit
    }
}
