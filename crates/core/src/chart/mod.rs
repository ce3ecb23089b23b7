use crate::domain::series::PriceSeries;
use std::fmt;
use std::path::Path;

pub mod line;

pub use line::PlottersLineChart;

/// Chart generation failed before or during rasterization.
#[derive(Debug, Clone)]
pub struct RenderError {
    pub symbol: String,
    pub detail: String,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chart render failed for {}: {}", self.symbol, self.detail)
    }
}

impl std::error::Error for RenderError {}

/// Rasterizes a close series into an image file at `out_path`.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, series: &PriceSeries, out_path: &Path) -> anyhow::Result<()>;
}
