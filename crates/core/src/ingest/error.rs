use std::fmt;

/// The price source returned nothing usable for a symbol. The worker treats
/// this as a per-symbol degradation, not a run failure, so it must stay
/// downcastable from `anyhow::Error`.
#[derive(Debug, Clone)]
pub struct DataUnavailable {
    pub symbol: String,
    pub detail: String,
}

impl fmt::Display for DataUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no price data for {}: {}", self.symbol, self.detail)
    }
}

impl std::error::Error for DataUnavailable {}
