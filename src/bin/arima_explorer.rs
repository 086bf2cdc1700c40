//! # arima-explorer
//!
//! Command-line front end: generate a synthetic ARIMA series, fit and
//! forecast, and write the figure as SVG.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arima_explorer::{batch, explorer, render, ExplorerConfig, SeasonalOrder, Trend};

#[derive(Parser)]
#[command(name = "arima-explorer", version)]
#[command(about = "Generate, fit and forecast synthetic ARIMA series", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    config: ConfigArgs,

    /// Write the outcome (or sweep report) as JSON; "-" for stdout
    #[arg(long, global = true)]
    json: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run once and render the figure (default)
    Run {
        /// SVG output path
        #[arg(short, long, default_value = "arima.svg")]
        output: PathBuf,

        /// Print the fit summary table
        #[arg(long)]
        summary: bool,
    },

    /// Repeat the run over many seeds and report forecast band coverage
    Sweep {
        /// Number of seeds
        #[arg(long, default_value_t = 200)]
        seeds: usize,

        /// First seed; the rest follow consecutively
        #[arg(long, default_value_t = 0)]
        first_seed: u64,
    },
}

/// Overrides applied on top of the defaults or the `--config` file.
#[derive(Args)]
struct ConfigArgs {
    /// Base configuration as JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// AR coefficients, comma separated
    #[arg(long, global = true, value_delimiter = ',', allow_hyphen_values = true)]
    ar: Option<Vec<f64>>,

    /// MA coefficients, comma separated
    #[arg(long, global = true, value_delimiter = ',', allow_hyphen_values = true)]
    ma: Option<Vec<f64>>,

    /// Integration order of the generated series
    #[arg(long, global = true)]
    integrate: Option<usize>,

    /// Innovation standard deviation
    #[arg(long, global = true)]
    sigma: Option<f64>,

    /// Discarded leading samples
    #[arg(long, global = true)]
    burnin: Option<usize>,

    /// Per-step linear trend added before integration
    #[arg(long, global = true, allow_hyphen_values = true)]
    trend_slope: Option<f64>,

    /// Series length
    #[arg(short = 'n', long, global = true)]
    n_samples: Option<usize>,

    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Model AR order
    #[arg(short, long, global = true)]
    p: Option<usize>,

    /// Model differencing order
    #[arg(short, long, global = true)]
    d: Option<usize>,

    /// Model MA order
    #[arg(short, long, global = true)]
    q: Option<usize>,

    /// Seasonal order as P,D,Q,s
    #[arg(long, global = true, value_delimiter = ',')]
    seasonal: Option<Vec<usize>>,

    /// Model trend: n, c, t or ct
    #[arg(long, global = true)]
    model_trend: Option<String>,

    #[arg(long, global = true)]
    enforce_stationarity: bool,

    #[arg(long, global = true)]
    enforce_invertibility: bool,

    /// Optimizer: lbfgs or nelder-mead
    #[arg(long, global = true)]
    method: Option<String>,

    #[arg(long, global = true)]
    maxiter: Option<u64>,

    /// Training prefix length
    #[arg(long, global = true)]
    n_train: Option<usize>,

    /// Forecast horizon past the training prefix
    #[arg(long, global = true)]
    horizon: Option<usize>,

    /// Interval level is 1 - alpha
    #[arg(long, global = true)]
    alpha: Option<f64>,
}

impl ConfigArgs {
    fn resolve(&self) -> anyhow::Result<ExplorerConfig> {
        let mut cfg = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                ExplorerConfig::from_json(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => ExplorerConfig::default(),
        };

        if let Some(ar) = &self.ar {
            cfg.process.ar = ar.clone();
        }
        if let Some(ma) = &self.ma {
            cfg.process.ma = ma.clone();
        }
        if let Some(d) = self.integrate {
            cfg.process.d = d;
        }
        if let Some(sigma) = self.sigma {
            cfg.process.sigma = sigma;
        }
        if let Some(burnin) = self.burnin {
            cfg.process.burnin = burnin;
        }
        if self.trend_slope.is_some() {
            cfg.process.trend_slope = self.trend_slope;
        }
        if let Some(n) = self.n_samples {
            cfg.n_samples = n;
        }
        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
        if let Some(p) = self.p {
            cfg.model.p = p;
        }
        if let Some(d) = self.d {
            cfg.model.d = d;
        }
        if let Some(q) = self.q {
            cfg.model.q = q;
        }
        if let Some(seasonal) = &self.seasonal {
            let [p, d, q, s] = seasonal.as_slice() else {
                bail!("--seasonal expects four values P,D,Q,s, got {}", seasonal.len());
            };
            cfg.model.seasonal = Some(SeasonalOrder {
                p: *p,
                d: *d,
                q: *q,
                s: *s,
            });
        }
        if let Some(code) = &self.model_trend {
            cfg.model.trend = match code.as_str() {
                "n" | "c" | "t" | "ct" | "tc" => Trend::from_code(code),
                other => bail!("unknown model trend '{}', expected n, c, t or ct", other),
            };
        }
        cfg.model.enforce_stationarity |= self.enforce_stationarity;
        cfg.model.enforce_invertibility |= self.enforce_invertibility;
        if let Some(method) = &self.method {
            cfg.model.method = method.clone();
        }
        if let Some(maxiter) = self.maxiter {
            cfg.model.maxiter = maxiter;
        }
        if let Some(n_train) = self.n_train {
            cfg.n_train = n_train;
        }
        if let Some(horizon) = self.horizon {
            cfg.horizon = horizon;
        }
        if let Some(alpha) = self.alpha {
            cfg.alpha = alpha;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn write_json<T: serde::Serialize>(value: &T, target: &Path) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    if target == Path::new("-") {
        println!("{}", text);
    } else {
        std::fs::write(target, text).with_context(|| format!("writing {}", target.display()))?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arima_explorer=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config.resolve()?;
    tracing::debug!(version = arima_explorer::version(), "configuration resolved");

    match cli.command.unwrap_or(Commands::Run {
        output: PathBuf::from("arima.svg"),
        summary: false,
    }) {
        Commands::Run { output, summary } => {
            let outcome = explorer::run(&config).context("exploration run failed")?;
            match &outcome.fit {
                Some(report) if summary => println!("{}", report),
                Some(_) => {}
                None => println!("No model fitted: {}", outcome.decision),
            }
            render::write_svg(&outcome, &output)
                .with_context(|| format!("rendering {}", output.display()))?;
            tracing::info!(path = %output.display(), "figure written");
            if let Some(target) = &cli.json {
                write_json(&outcome, target)?;
            }
        }
        Commands::Sweep { seeds, first_seed } => {
            let report = batch::sweep(&config, &batch::seed_range(first_seed, seeds));
            println!("{}", report.coverage);
            if let Some(target) = &cli.json {
                write_json(&report, target)?;
            }
        }
    }

    Ok(())
}
