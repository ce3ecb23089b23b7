use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily close observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Chronological daily closes for one symbol. The source may be missing
/// sessions (holidays), so consumers work with "most recent available"
/// rather than fixed calendar offsets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Self {
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// USD/JPY rate observed at report time. No change computation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FxRate {
    pub rate: f64,
}

/// Immutable view of the three closes the change computation needs.
/// `previous` and `week_ago` are `None` when the series has no usable
/// observation at that offset.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub symbol: String,
    pub current: f64,
    pub previous: Option<f64>,
    pub week_ago: Option<f64>,
}
