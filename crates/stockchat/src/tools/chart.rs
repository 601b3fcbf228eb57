//! Price chart rendering

use chrono::{Duration, NaiveDate};
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::api::PriceSeries;
use crate::error::{Result, StockError};

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 500;

/// Renders a close-price line chart to a fixed PNG path
///
/// Each render overwrites the previous image.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    path: PathBuf,
}

impl ChartRenderer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Draw `series` and return the image path
    pub fn render(&self, series: &PriceSeries) -> Result<PathBuf> {
        let points = series.points();
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Err(StockError::unavailable(series.symbol(), "nothing to plot"));
        };

        let start = first.date;
        let end = if last.date > start {
            last.date
        } else {
            start + Duration::days(1)
        };

        let (low, high) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.close), hi.max(p.close))
            });
        let pad = if high > low { (high - low) * 0.05 } else { 1.0 };

        let root = BitMapBackend::new(&self.path, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!("{} Stock Price Over Last Year", series.symbol()),
                ("sans-serif", 24),
            )
            .margin(16)
            .x_label_area_size(40)
            .y_label_area_size(64)
            .build_cartesian_2d(start..end, (low - pad)..(high + pad))
            .map_err(chart_error)?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc("Stock Price ($)")
            .x_labels(8)
            .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m-%d").to_string())
            .y_label_formatter(&|v: &f64| format!("{v:.2}"))
            .draw()
            .map_err(chart_error)?;

        chart
            .draw_series(LineSeries::new(
                points.iter().map(|p| (p.date, p.close)),
                &BLUE,
            ))
            .map_err(chart_error)?;

        root.present().map_err(chart_error)?;

        info!(symbol = series.symbol(), path = %self.path.display(), "Chart rendered");
        Ok(self.path.clone())
    }
}

fn chart_error(e: impl std::fmt::Display) -> StockError {
    StockError::ChartError(e.to_string())
}
