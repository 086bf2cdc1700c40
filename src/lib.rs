//! Synthetic ARIMA series with SARIMA fitting, forecasting and plotting.
//!
//! ```no_run
//! use arima_explorer::{explorer, render, ExplorerConfig};
//!
//! let outcome = explorer::run(&ExplorerConfig::default())?;
//! if let Some(report) = &outcome.fit {
//!     println!("{}", report);
//! }
//! render::write_svg(&outcome, "arima.svg")?;
//! # Ok::<(), arima_explorer::ArimaError>(())
//! ```

pub mod error;
pub mod types;
pub mod params;
pub mod polynomial;
pub mod state_space;
pub mod initialization;
pub mod kalman;
pub mod start_params;
pub mod optimizer;
pub mod forecast;
pub mod process;
pub mod timeline;
pub mod fit_policy;
pub mod explorer;
pub mod render;
pub mod batch;

pub use error::{ArimaError, Result};
pub use explorer::{ExplorerConfig, ExplorerOutcome, FitReport, ModelSpec, SeasonalOrder};
pub use fit_policy::FitDecision;
pub use forecast::Prediction;
pub use process::{ProcessProperties, ProcessSpec};
pub use types::{FitResult, ModelConfig, ModelOrder, Trend};

/// Crate version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
