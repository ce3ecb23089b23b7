use crate::chart::{ChartRenderer, RenderError};
use crate::domain::series::PriceSeries;
use plotters::prelude::*;
use std::path::Path;

const DEFAULT_WIDTH: u32 = 1000;
const DEFAULT_HEIGHT: u32 = 600;

const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);
const GRID_LIGHT: RGBColor = RGBColor(232, 232, 232);
const GRID_BOLD: RGBColor = RGBColor(208, 208, 208);

/// PNG line chart of daily closes. Rendering is text-free (grid and series
/// line only), which keeps the backend free of any system font dependency.
#[derive(Debug, Clone)]
pub struct PlottersLineChart {
    width: u32,
    height: u32,
}

impl Default for PlottersLineChart {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl PlottersLineChart {
    pub fn from_env() -> Self {
        let dim = |key: &str, fallback: u32| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(fallback)
        };

        Self {
            width: dim("CHART_WIDTH", DEFAULT_WIDTH),
            height: dim("CHART_HEIGHT", DEFAULT_HEIGHT),
        }
    }

    fn draw(&self, series: &PriceSeries, out_path: &Path) -> Result<(), RenderError> {
        let fail = |detail: String| RenderError {
            symbol: series.symbol.clone(),
            detail,
        };

        if series.len() < 2 {
            return Err(fail(format!(
                "need at least 2 sessions to chart, got {}",
                series.len()
            )));
        }

        let first_date = series.points[0].date;
        let last_date = series.points[series.len() - 1].date;
        let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in &series.points {
            min = min.min(p.close);
            max = max.max(p.close);
        }
        // Flat series still needs a visible band.
        let pad = ((max - min) * 0.05).max(0.5);

        let root = BitMapBackend::new(out_path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| fail(e.to_string()))?;

        let mut chart = ChartBuilder::on(&root)
            .margin(16)
            .build_cartesian_2d(first_date..last_date, (min - pad)..(max + pad))
            .map_err(|e| fail(e.to_string()))?;

        chart
            .configure_mesh()
            .light_line_style(&GRID_LIGHT)
            .bold_line_style(&GRID_BOLD)
            .draw()
            .map_err(|e| fail(e.to_string()))?;

        chart
            .draw_series(LineSeries::new(
                series.points.iter().map(|p| (p.date, p.close)),
                LINE_COLOR.stroke_width(2),
            ))
            .map_err(|e| fail(e.to_string()))?;

        root.present().map_err(|e| fail(e.to_string()))?;
        Ok(())
    }
}

impl ChartRenderer for PlottersLineChart {
    fn render(&self, series: &PriceSeries, out_path: &Path) -> anyhow::Result<()> {
        self.draw(series, out_path)?;
        tracing::debug!(
            symbol = %series.symbol,
            sessions = series.len(),
            path = %out_path.display(),
            "rendered price chart"
        );
        Ok(())
    }
}
