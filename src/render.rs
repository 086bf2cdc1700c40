//! SVG rendering of an exploration run.
//!
//! With a fit the figure has two stacked panels: data, predictions and the
//! confidence band on top, residuals underneath. Without a fit only the
//! raw series is drawn.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::{ArimaError, Result};
use crate::explorer::{ExplorerOutcome, FitReport};
use crate::timeline::MonthlyIndex;

const WIDTH: u32 = 1100;
const HEIGHT: u32 = 760;
const UPPER_HEIGHT: u32 = 470;

const TRAIN_COLOR: RGBColor = RGBColor(31, 119, 180);
const TEST_COLOR: RGBColor = RGBColor(40, 40, 40);
const PRED_COLOR: RGBColor = RGBColor(214, 39, 40);
const BAND_COLOR: RGBColor = RGBColor(255, 127, 14);
const TRAIN_SHADE: RGBColor = RGBColor(230, 238, 247);
const FORECAST_SHADE: RGBColor = RGBColor(252, 236, 220);

fn render_err<E: std::fmt::Display>(e: E) -> ArimaError {
    ArimaError::Render(e.to_string())
}

/// Render the outcome as an SVG document.
pub fn render_svg(outcome: &ExplorerOutcome) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;
        match &outcome.fit {
            Some(report) => {
                let (upper, lower) = root.split_vertically(UPPER_HEIGHT);
                draw_fit_panel(&upper, outcome, report)?;
                draw_residual_panel(&lower, outcome, report)?;
            }
            None => draw_series_panel(&root, outcome)?,
        }
        root.present().map_err(render_err)?;
    }
    Ok(svg)
}

/// Render and write to `path`.
pub fn write_svg<P: AsRef<Path>>(outcome: &ExplorerOutcome, path: P) -> Result<()> {
    let svg = render_svg(outcome)?;
    std::fs::write(path, svg)?;
    Ok(())
}

/// Finite bounds of `values` padded by 5%, or `[-1, 1]` when there are none.
fn padded_range<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
    (lo - pad, hi + pad)
}

fn month_label(index: &MonthlyIndex, x: f64) -> String {
    index
        .date(x.max(0.0).round() as usize)
        .map(|d| d.format("%Y-%m").to_string())
        .unwrap_or_default()
}

fn draw_series_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    outcome: &ExplorerOutcome,
) -> Result<()> {
    let values = &outcome.series.values;
    let index = outcome.series.index;
    let x_max = values.len().max(1) as f64;
    let (y_lo, y_hi) = padded_range(values);

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("Generated series, seed {} ({})", outcome.config.seed, outcome.decision),
            ("sans-serif", 20),
        )
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..x_max, y_lo..y_hi)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_labels(10)
        .x_label_formatter(&|x: &f64| month_label(&index, *x))
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(LineSeries::new(
            values.iter().enumerate().map(|(t, &y)| (t as f64, y)),
            TRAIN_COLOR.stroke_width(2),
        ))
        .map_err(render_err)?;

    Ok(())
}

fn draw_fit_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    outcome: &ExplorerOutcome,
    report: &FitReport,
) -> Result<()> {
    let values = &outcome.series.values;
    let pred = &report.prediction;
    let index = outcome.series.index;
    let n_train = outcome.n_train;
    let x_max = values.len().max(pred.end()).max(1) as f64;
    let (y_lo, y_hi) = padded_range(
        values
            .iter()
            .chain(&pred.mean)
            .chain(&pred.ci_lower)
            .chain(&pred.ci_upper),
    );
    let level = ((1.0 - pred.alpha) * 100.0).round();

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("{} fit, seed {}", report.order, outcome.config.seed),
            ("sans-serif", 20),
        )
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..x_max, y_lo..y_hi)
        .map_err(render_err)?;

    // Region shading first so everything else sits on top
    chart
        .draw_series([
            Rectangle::new([(0.0, y_lo), (n_train as f64, y_hi)], TRAIN_SHADE.filled()),
            Rectangle::new([(n_train as f64, y_lo), (x_max, y_hi)], FORECAST_SHADE.filled()),
        ])
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_labels(10)
        .x_label_formatter(&|x: &f64| month_label(&index, *x))
        .draw()
        .map_err(render_err)?;

    let xs = (pred.start..pred.end()).map(|t| t as f64);
    let band: Vec<(f64, f64)> = xs
        .clone()
        .zip(pred.ci_upper.iter().copied())
        .chain(xs.zip(pred.ci_lower.iter().copied()).rev())
        .filter(|(_, y)| y.is_finite())
        .collect();
    chart
        .draw_series(std::iter::once(Polygon::new(band, BAND_COLOR.mix(0.25).filled())))
        .map_err(render_err)?
        .label(format!("{}% interval", level))
        .legend(|(x, y)| Rectangle::new([(x, y - 4), (x + 20, y + 4)], BAND_COLOR.mix(0.25).filled()));

    chart
        .draw_series(LineSeries::new(
            outcome.train().iter().enumerate().map(|(t, &y)| (t as f64, y)),
            TRAIN_COLOR.stroke_width(2),
        ))
        .map_err(render_err)?
        .label("training")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], TRAIN_COLOR));

    let held_out = outcome.test();
    if !held_out.is_empty() {
        // Start from the last training point so the two lines join
        let joint = outcome
            .train()
            .last()
            .map(|&y| ((n_train - 1) as f64, y));
        chart
            .draw_series(LineSeries::new(
                joint.into_iter().chain(
                    held_out
                        .iter()
                        .enumerate()
                        .map(|(i, &y)| ((n_train + i) as f64, y)),
                ),
                TEST_COLOR.stroke_width(2),
            ))
            .map_err(render_err)?
            .label("held out")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], TEST_COLOR));
    }

    chart
        .draw_series(LineSeries::new(
            pred.mean
                .iter()
                .enumerate()
                .map(|(i, &y)| ((pred.start + i) as f64, y)),
            PRED_COLOR.stroke_width(1),
        ))
        .map_err(render_err)?
        .label("predicted")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], PRED_COLOR));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(render_err)?;

    Ok(())
}

fn draw_residual_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    outcome: &ExplorerOutcome,
    report: &FitReport,
) -> Result<()> {
    let start = report.prediction.start;
    let index = outcome.series.index;
    let x_max = outcome.series.len().max(report.prediction.end()).max(1) as f64;
    let (y_lo, y_hi) = padded_range(report.residuals.iter().chain(std::iter::once(&0.0)));

    let mut chart = ChartBuilder::on(area)
        .caption("Residuals (observed - predicted)", ("sans-serif", 16))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..x_max, y_lo..y_hi)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_labels(10)
        .x_label_formatter(&|x: &f64| month_label(&index, *x))
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(LineSeries::new(
            [(0.0, 0.0), (x_max, 0.0)],
            BLACK.stroke_width(1),
        ))
        .map_err(render_err)?;

    chart
        .draw_series(LineSeries::new(
            report
                .residuals
                .iter()
                .enumerate()
                .map(|(i, &r)| ((start + i) as f64, r)),
            PRED_COLOR.stroke_width(1),
        ))
        .map_err(render_err)?;

    Ok(())
}
