use crate::domain::series::{FxRate, PriceSeries};
use anyhow::Result;

/// Trailing window of daily closes to request from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    Days5,
    Month1,
    Month3,
}

impl Lookback {
    pub fn as_range(self) -> &'static str {
        match self {
            Lookback::Days5 => "5d",
            Lookback::Month1 => "1mo",
            Lookback::Month3 => "3mo",
        }
    }
}

#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_series(&self, symbol: &str, lookback: Lookback) -> Result<PriceSeries>;

    /// Latest close of an FX pair (e.g. "JPY=X" for USD/JPY).
    async fn fetch_fx_rate(&self, pair: &str) -> Result<FxRate>;
}
