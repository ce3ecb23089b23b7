use crate::config::Settings;
use crate::domain::series::{FxRate, PricePoint, PriceSeries};
use crate::ingest::error::DataUnavailable;
use crate::ingest::provider::{Lookback, PriceSource};
use crate::ingest::types::ChartResponse;
use anyhow::{Context, Result};
use chrono::DateTime;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const INTERVAL: &str = "1d";

/// End-of-day price source backed by the public v8 chart endpoint.
#[derive(Debug, Clone)]
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: String,
}

impl YahooChartClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .market_data_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("etfwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self { http, base_url })
    }

    fn url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{symbol}",
            self.base_url.trim_end_matches('/')
        )
    }

    async fn fetch_chart(&self, symbol: &str, lookback: Lookback) -> Result<ChartResponse> {
        let res = self
            .http
            .get(self.url(symbol))
            .query(&[("interval", INTERVAL), ("range", lookback.as_range())])
            .send()
            .await
            .with_context(|| format!("chart request for {symbol} failed"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read chart response for {symbol}"))?;

        if !status.is_success() {
            anyhow::bail!("chart endpoint HTTP {status} for {symbol}: {text}");
        }

        serde_json::from_str::<ChartResponse>(&text)
            .with_context(|| format!("chart response for {symbol} is not valid JSON: {text}"))
    }
}

#[async_trait::async_trait]
impl PriceSource for YahooChartClient {
    fn source_name(&self) -> &'static str {
        "yahoo_chart_v8"
    }

    async fn fetch_series(&self, symbol: &str, lookback: Lookback) -> Result<PriceSeries> {
        let resp = self.fetch_chart(symbol, lookback).await?;
        let series = series_from_response(symbol, resp)?;
        tracing::debug!(
            symbol,
            range = lookback.as_range(),
            sessions = series.len(),
            "fetched price series"
        );
        Ok(series)
    }

    async fn fetch_fx_rate(&self, pair: &str) -> Result<FxRate> {
        let series = self.fetch_series(pair, Lookback::Days5).await?;
        let latest = series.latest().ok_or_else(|| DataUnavailable {
            symbol: pair.to_string(),
            detail: "fx series is empty".to_string(),
        })?;
        Ok(FxRate { rate: latest.close })
    }
}

/// Flattens the chart envelope into a chronological close series. Adjusted
/// closes are preferred when the venue provides them; sessions with a null
/// close are skipped rather than zero-filled.
pub fn series_from_response(symbol: &str, resp: ChartResponse) -> Result<PriceSeries> {
    if let Some(err) = resp.chart.error {
        return Err(DataUnavailable {
            symbol: symbol.to_string(),
            detail: format!("{}: {}", err.code, err.description),
        }
        .into());
    }

    let result = resp
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .ok_or_else(|| DataUnavailable {
            symbol: symbol.to_string(),
            detail: "empty chart result".to_string(),
        })?;

    let closes = result
        .indicators
        .adjclose
        .as_ref()
        .and_then(|blocks| blocks.first())
        .map(|b| b.adjclose.clone())
        .or_else(|| {
            result
                .indicators
                .quote
                .first()
                .map(|q| q.close.clone())
        })
        .unwrap_or_default();

    let mut points = Vec::with_capacity(result.timestamp.len());
    for (ts, close) in result.timestamp.iter().zip(closes) {
        let Some(close) = close else { continue };
        let date = DateTime::from_timestamp(*ts, 0)
            .with_context(|| format!("invalid session timestamp {ts} for {symbol}"))?
            .date_naive();
        points.push(PricePoint { date, close });
    }

    if points.is_empty() {
        return Err(DataUnavailable {
            symbol: symbol.to_string(),
            detail: "no usable closes in chart result".to_string(),
        }
        .into());
    }

    Ok(PriceSeries::new(result.meta.symbol, points))
}
