//! Rayon-based Monte Carlo sweep over seeds.
//!
//! Runs the explorer once per seed in parallel using Rayon's work-stealing
//! thread pool, then aggregates how often the held-out observations fall
//! inside the forecast band.

use rayon::prelude::*;
use serde::Serialize;

use crate::explorer::{self, ExplorerConfig};
use crate::fit_policy::FitDecision;

/// Summary of a single seed's run.
#[derive(Debug, Clone, Serialize)]
pub struct SeedOutcome {
    pub seed: u64,
    pub decision: Option<FitDecision>,
    pub params: Option<Vec<f64>>,
    pub loglike: Option<f64>,
    pub converged: Option<bool>,
    pub inside: usize,
    pub total: usize,
    /// Error message when the run failed.
    pub error: Option<String>,
}

/// Held-out coverage aggregated over every fitted seed.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    /// Interval level the bands were built for, `1 - alpha`.
    pub nominal: f64,
    pub runs: usize,
    pub fitted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub inside: usize,
    pub total: usize,
    /// Mean estimate per parameter across fitted runs.
    pub mean_params: Vec<f64>,
}

impl CoverageReport {
    /// Observed fraction of held-out points inside the band.
    pub fn empirical(&self) -> Option<f64> {
        (self.total > 0).then(|| self.inside as f64 / self.total as f64)
    }
}

impl std::fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "runs: {} (fitted {}, skipped {}, failed {})",
            self.runs, self.fitted, self.skipped, self.failed
        )?;
        match self.empirical() {
            Some(c) => write!(
                f,
                "; coverage {:.1}% of {} held-out points (nominal {:.1}%)",
                c * 100.0,
                self.total,
                self.nominal * 100.0
            ),
            None => write!(f, "; no held-out points to score"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub runs: Vec<SeedOutcome>,
    pub coverage: CoverageReport,
}

/// `count` consecutive seeds starting at `first`.
pub fn seed_range(first: u64, count: usize) -> Vec<u64> {
    (0..count as u64).map(|i| first.wrapping_add(i)).collect()
}

/// Run `base` once per seed in parallel. Failed runs are counted, not
/// propagated.
pub fn sweep(base: &ExplorerConfig, seeds: &[u64]) -> SweepReport {
    let runs: Vec<SeedOutcome> = seeds
        .par_iter()
        .map(|&seed| {
            let config = ExplorerConfig {
                seed,
                ..base.clone()
            };
            run_one(&config)
        })
        .collect();

    let coverage = aggregate(&runs, 1.0 - base.alpha);
    tracing::info!(
        runs = coverage.runs,
        fitted = coverage.fitted,
        failed = coverage.failed,
        coverage = ?coverage.empirical(),
        "sweep finished"
    );
    SweepReport { runs, coverage }
}

fn run_one(config: &ExplorerConfig) -> SeedOutcome {
    let mut out = SeedOutcome {
        seed: config.seed,
        decision: None,
        params: None,
        loglike: None,
        converged: None,
        inside: 0,
        total: 0,
        error: None,
    };
    match explorer::run(config) {
        Ok(outcome) => {
            out.decision = Some(outcome.decision);
            if let Some(cov) = outcome.holdout_coverage() {
                out.inside = cov.inside;
                out.total = cov.total;
            }
            if let Some(report) = &outcome.fit {
                out.params = Some(report.result.params.clone());
                out.loglike = Some(report.result.loglike);
                out.converged = Some(report.result.converged);
            }
        }
        Err(e) => {
            tracing::warn!(seed = config.seed, error = %e, "sweep run failed");
            out.error = Some(e.to_string());
        }
    }
    out
}

fn aggregate(runs: &[SeedOutcome], nominal: f64) -> CoverageReport {
    let fitted: Vec<&SeedOutcome> = runs.iter().filter(|r| r.params.is_some()).collect();
    let failed = runs.iter().filter(|r| r.error.is_some()).count();

    let k = fitted
        .iter()
        .filter_map(|r| r.params.as_ref().map(Vec::len))
        .max()
        .unwrap_or(0);
    let mut mean_params = vec![0.0; k];
    for params in fitted.iter().filter_map(|r| r.params.as_ref()) {
        for (m, v) in mean_params.iter_mut().zip(params) {
            *m += v;
        }
    }
    if !fitted.is_empty() {
        for m in mean_params.iter_mut() {
            *m /= fitted.len() as f64;
        }
    }

    CoverageReport {
        nominal,
        runs: runs.len(),
        fitted: fitted.len(),
        skipped: runs.len() - fitted.len() - failed,
        failed,
        inside: fitted.iter().map(|r| r.inside).sum(),
        total: fitted.iter().map(|r| r.total).sum(),
        mean_params,
    }
}
