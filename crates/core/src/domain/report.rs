use crate::domain::series::{FxRate, PriceSeries, PriceSnapshot};
use chrono::NaiveDate;
use std::fmt;

/// Sessions between "current" and the week-over-week reference close.
const WEEK_SESSIONS: usize = 5;

/// Default section order of the notification. Results are rendered in this
/// order no matter how they are supplied.
pub const DEFAULT_PRIORITY: [&str; 3] = ["VT", "VOO", "QQQ"];

/// Malformed input to the change computation. Carries the symbol so the
/// caller can decide whether to drop the section or abort the run.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub symbol: String,
    pub detail: &'static str,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid price series for {}: {}", self.symbol, self.detail)
    }
}

impl std::error::Error for ValidationError {}

/// Percentage changes for one symbol. `None` means the reference close was
/// missing or zero, so the figure is reported as unavailable instead of
/// propagating NaN or infinity into the notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeResult {
    pub symbol: String,
    pub current_price: f64,
    pub daily_change: Option<f64>,
    pub weekly_change: Option<f64>,
}

/// Day-over-day and week-over-week percentage changes, one decimal place.
///
/// The week-over-week reference is the close 5 sessions before the current
/// one when the series is long enough, otherwise the earliest available
/// session. A series with a single point has no reference at all, so both
/// figures come back unavailable.
pub fn compute_change(series: &PriceSeries) -> Result<ChangeResult, ValidationError> {
    let snapshot = snapshot(series)?;

    let daily_change = snapshot.previous.and_then(|prev| percent_change(snapshot.current, prev));
    let weekly_change = snapshot
        .week_ago
        .and_then(|base| percent_change(snapshot.current, base));

    Ok(ChangeResult {
        symbol: snapshot.symbol,
        current_price: snapshot.current,
        daily_change,
        weekly_change,
    })
}

fn snapshot(series: &PriceSeries) -> Result<PriceSnapshot, ValidationError> {
    let n = series.len();
    let current = series.latest().ok_or_else(|| ValidationError {
        symbol: series.symbol.clone(),
        detail: "series is empty",
    })?;

    let previous = n.checked_sub(2).map(|i| series.points[i].close);

    // n-1-WEEK_SESSIONS when available, else the earliest session. The
    // earliest session must not be the current one.
    let week_ago = match n.checked_sub(WEEK_SESSIONS + 1) {
        Some(i) => Some(series.points[i].close),
        None if n >= 2 => Some(series.points[0].close),
        None => None,
    };

    Ok(PriceSnapshot {
        symbol: series.symbol.clone(),
        current: current.close,
        previous,
        week_ago,
    })
}

fn percent_change(current: f64, base: f64) -> Option<f64> {
    if base == 0.0 || !base.is_finite() {
        return None;
    }
    Some(round_one_decimal((current - base) / base * 100.0))
}

fn round_one_decimal(v: f64) -> f64 {
    // The `+ 0.0` keeps -0.05..0.0 from rendering as "-0.0".
    (v * 10.0).round() / 10.0 + 0.0
}

/// Renders the notification text. Layout is fixed: date header, one section
/// per priority symbol (unavailable symbols still get a section), any extra
/// results in supplied order, then the FX section. Byte-deterministic for
/// identical inputs.
pub fn format_report(
    priority: &[String],
    results: &[ChangeResult],
    fx: Option<FxRate>,
    date: NaiveDate,
) -> String {
    let mut out = format!("📈ETF Price Tracker {date}\n\n");

    for symbol in priority {
        match results.iter().find(|r| &r.symbol == symbol) {
            Some(result) => push_symbol_section(&mut out, result),
            None => {
                out.push_str(&format!("【{symbol}】\nデータ取得不可\n\n"));
            }
        }
    }

    for result in results {
        if !priority.contains(&result.symbol) {
            push_symbol_section(&mut out, result);
        }
    }

    out.push_str("【為替】\n");
    match fx {
        Some(fx) => out.push_str(&format!("USD/JPY: {:.2}\n", fx.rate)),
        None => out.push_str("USD/JPY: n/a\n"),
    }

    out.trim_end().to_string()
}

fn push_symbol_section(out: &mut String, result: &ChangeResult) {
    out.push_str(&format!("【{}】\n", result.symbol));
    out.push_str(&format!("現在値: ${:.2}\n", result.current_price));
    out.push_str(&format!("前日比: {}\n", format_change(result.daily_change)));
    out.push_str(&format!("前週比: {}\n\n", format_change(result.weekly_change)));
}

fn format_change(change: Option<f64>) -> String {
    match change {
        Some(v) => format!("{v:+.1}%"),
        None => "n/a".to_string(),
    }
}

/// Optional notify gate recovered from the pilot deployment: when no
/// threshold is configured the digest always goes out.
#[derive(Debug, Clone, Default)]
pub struct AlertThresholds {
    pub daily: Option<f64>,
    pub weekly: Option<f64>,
}

impl AlertThresholds {
    pub fn from_env() -> Self {
        let parse = |key: &str| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
        };

        Self {
            daily: parse("ALERT_DAILY_THRESHOLD"),
            weekly: parse("ALERT_WEEKLY_THRESHOLD"),
        }
    }

    /// True when any symbol moved at or below a configured threshold, or
    /// when no threshold is configured at all.
    pub fn should_notify(&self, results: &[ChangeResult]) -> bool {
        if self.daily.is_none() && self.weekly.is_none() {
            return true;
        }

        results.iter().any(|r| {
            let daily_hit = match (self.daily, r.daily_change) {
                (Some(limit), Some(change)) => change <= limit,
                _ => false,
            };
            let weekly_hit = match (self.weekly, r.weekly_change) {
                (Some(limit), Some(change)) => change <= limit,
                _ => false,
            };
            daily_hit || weekly_hit
        })
    }
}
