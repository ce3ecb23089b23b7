use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use etfwatch_core::chart::ChartRenderer;
use etfwatch_core::config::Settings;
use etfwatch_core::domain::report::{self, AlertThresholds};
use etfwatch_core::ingest::error::DataUnavailable;
use etfwatch_core::ingest::provider::{Lookback, PriceSource};
use etfwatch_core::notify::Notifier;
use etfwatch_core::storage::{self, ChartStore};
use std::time::Duration;

const DEFAULT_FX_PAIR: &str = "JPY=X";

#[derive(Debug, Clone)]
pub struct DigestOptions {
    /// Watched symbols; the order doubles as the report section order.
    pub symbols: Vec<String>,

    /// Symbol whose 3-month chart accompanies the text digest.
    pub chart_symbol: String,

    /// FX pair appended after the symbol sections.
    pub fx_pair: String,

    pub thresholds: AlertThresholds,

    /// Fetch, compute and render, but skip upload and both pushes.
    pub dry_run: bool,

    /// Send even when the newest session is stale (market-closed gate).
    pub force: bool,
}

impl Default for DigestOptions {
    fn default() -> Self {
        let symbols: Vec<String> = report::DEFAULT_PRIORITY
            .iter()
            .map(|s| s.to_string())
            .collect();
        let chart_symbol = symbols[0].clone();
        Self {
            symbols,
            chart_symbol,
            fx_pair: DEFAULT_FX_PAIR.to_string(),
            thresholds: AlertThresholds::default(),
            dry_run: false,
            force: false,
        }
    }
}

impl DigestOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("WATCH_SYMBOLS") {
            let symbols: Vec<String> = s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !symbols.is_empty() {
                out.chart_symbol = symbols[0].clone();
                out.symbols = symbols;
            }
        }

        if let Ok(s) = std::env::var("CHART_SYMBOL") {
            if !s.trim().is_empty() {
                out.chart_symbol = s.trim().to_string();
            }
        }

        if let Ok(s) = std::env::var("FX_PAIR") {
            if !s.trim().is_empty() {
                out.fx_pair = s.trim().to_string();
            }
        }

        out.thresholds = AlertThresholds::from_env();
        out
    }
}

/// What the invocation accomplished; mirrored into the final log line for
/// the scheduler/operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub notification_sent: bool,
    pub ticker_count: usize,
    pub message: &'static str,
}

/// One scheduled digest: fetch, compute, format, push text, then chart,
/// upload, presign, push image. Sequential and single-shot; the only
/// recovered failure is per-symbol missing data.
pub async fn run(
    settings: &Settings,
    opts: &DigestOptions,
    source: &dyn PriceSource,
    renderer: &dyn ChartRenderer,
    store: &dyn ChartStore,
    notifier: &dyn Notifier,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<RunSummary> {
    tracing::debug!(
        source = source.source_name(),
        notifier = notifier.provider_name(),
        symbols = ?opts.symbols,
        "starting digest run"
    );

    let mut results = Vec::with_capacity(opts.symbols.len());
    let mut newest_session: Option<NaiveDate> = None;

    for symbol in &opts.symbols {
        match source.fetch_series(symbol, Lookback::Month1).await {
            Ok(series) => {
                if let Some(p) = series.latest() {
                    newest_session = Some(newest_session.map_or(p.date, |d| d.max(p.date)));
                }
                match report::compute_change(&series) {
                    Ok(result) => results.push(result),
                    Err(err) => {
                        tracing::warn!(%symbol, error = %err, "series failed validation; section will be unavailable");
                    }
                }
            }
            Err(err) if err.downcast_ref::<DataUnavailable>().is_some() => {
                tracing::warn!(%symbol, error = %err, "price data unavailable; section will be unavailable");
            }
            Err(err) => return Err(err),
        }
    }

    anyhow::ensure!(
        !results.is_empty(),
        "no price data available for any watched symbol"
    );
    let report_date = newest_session.context("fetched series carried no session dates")?;

    if !opts.force && !etfwatch_core::time::us_market::is_fresh(report_date, now_utc) {
        tracing::info!(%report_date, "newest session is stale; market was closed");
        return Ok(RunSummary {
            notification_sent: false,
            ticker_count: 0,
            message: "Market is closed today",
        });
    }

    if !opts.thresholds.should_notify(&results) {
        tracing::info!(ticker_count = results.len(), "no threshold breached; skipping notification");
        return Ok(RunSummary {
            notification_sent: false,
            ticker_count: results.len(),
            message: "No threshold breached",
        });
    }

    let fx = match source.fetch_fx_rate(&opts.fx_pair).await {
        Ok(fx) => Some(fx),
        Err(err) if err.downcast_ref::<DataUnavailable>().is_some() => {
            tracing::warn!(pair = %opts.fx_pair, error = %err, "fx rate unavailable");
            None
        }
        Err(err) => return Err(err),
    };

    let text = report::format_report(&opts.symbols, &results, fx, report_date);

    if opts.dry_run {
        tracing::info!(report = %text, "dry-run: notification suppressed");
    } else {
        notifier.push_text(&text).await?;
    }

    push_chart(settings, opts, source, renderer, store, notifier, report_date).await?;

    Ok(RunSummary {
        notification_sent: !opts.dry_run,
        ticker_count: results.len(),
        message: if opts.dry_run {
            "Dry run completed"
        } else {
            "Stock monitoring completed successfully"
        },
    })
}

/// Chart leg. The rendered file lives in a scoped temp location that is
/// removed on drop, whether or not upload and delivery succeed.
async fn push_chart(
    settings: &Settings,
    opts: &DigestOptions,
    source: &dyn PriceSource,
    renderer: &dyn ChartRenderer,
    store: &dyn ChartStore,
    notifier: &dyn Notifier,
    report_date: NaiveDate,
) -> anyhow::Result<()> {
    let series = source
        .fetch_series(&opts.chart_symbol, Lookback::Month3)
        .await?;

    let temp = tempfile::Builder::new()
        .prefix("etfwatch_chart")
        .suffix(".png")
        .tempfile()
        .context("failed to create chart temp file")?;

    renderer.render(&series, temp.path())?;

    if opts.dry_run {
        return Ok(());
    }

    let filename = format!("{}_chart.png", opts.chart_symbol.to_lowercase());
    let key = storage::build_chart_key(&filename, report_date);
    store.upload(temp.path(), &key).await?;

    let url = store
        .presign_get(&key, Duration::from_secs(settings.presign_ttl_secs))
        .await?;
    notifier.push_image(&url).await?;
    Ok(())
}

/// Stand-ins for the dry-run wiring; `run` never touches the store or the
/// notifier when `dry_run` is set.
pub struct NullChartStore;

#[async_trait::async_trait]
impl ChartStore for NullChartStore {
    async fn upload(&self, _local_path: &std::path::Path, _key: &str) -> anyhow::Result<()> {
        anyhow::bail!("chart store is disabled in dry-run")
    }

    async fn presign_get(&self, _key: &str, _ttl: Duration) -> anyhow::Result<String> {
        anyhow::bail!("chart store is disabled in dry-run")
    }
}

pub struct NullNotifier;

#[async_trait::async_trait]
impl Notifier for NullNotifier {
    fn provider_name(&self) -> &'static str {
        "null"
    }

    async fn push_text(&self, _text: &str) -> anyhow::Result<()> {
        anyhow::bail!("notifier is disabled in dry-run")
    }

    async fn push_image(&self, _image_url: &str) -> anyhow::Result<()> {
        anyhow::bail!("notifier is disabled in dry-run")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use etfwatch_core::chart::RenderError;
    use etfwatch_core::domain::series::{FxRate, PricePoint, PriceSeries};
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    fn settings() -> Settings {
        Settings {
            line_channel_access_token: Some("token".to_string()),
            line_user_id: Some("U1234".to_string()),
            s3_bucket: Some("charts-bucket".to_string()),
            presign_ttl_secs: 3600,
            market_data_base_url: None,
            sentry_dsn: None,
        }
    }

    struct FakeSource {
        closes: HashMap<String, Vec<f64>>,
        latest_session: NaiveDate,
        fx: Option<f64>,
    }

    impl FakeSource {
        fn new(latest_session: NaiveDate) -> Self {
            let mut closes = HashMap::new();
            closes.insert(
                "VT".to_string(),
                vec![110.35, 109.10, 108.40, 107.20, 104.18, 100.20],
            );
            closes.insert(
                "VOO".to_string(),
                vec![505.0, 507.0, 509.0, 511.0, 510.0, 512.10],
            );
            closes.insert(
                "QQQ".to_string(),
                vec![568.0, 570.0, 571.0, 574.0, 573.0, 575.31],
            );
            Self {
                closes,
                latest_session,
                fx: Some(147.52),
            }
        }

        fn series(&self, symbol: &str) -> Option<PriceSeries> {
            let closes = self.closes.get(symbol)?;
            let n = closes.len() as i64;
            let points = closes
                .iter()
                .enumerate()
                .map(|(i, &close)| PricePoint {
                    date: self.latest_session - ChronoDuration::days(n - 1 - i as i64),
                    close,
                })
                .collect();
            Some(PriceSeries::new(symbol, points))
        }
    }

    #[async_trait::async_trait]
    impl PriceSource for FakeSource {
        fn source_name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_series(&self, symbol: &str, _lookback: Lookback) -> anyhow::Result<PriceSeries> {
            self.series(symbol).ok_or_else(|| {
                DataUnavailable {
                    symbol: symbol.to_string(),
                    detail: "not in fixture".to_string(),
                }
                .into()
            })
        }

        async fn fetch_fx_rate(&self, pair: &str) -> anyhow::Result<FxRate> {
            match self.fx {
                Some(rate) => Ok(FxRate { rate }),
                None => Err(DataUnavailable {
                    symbol: pair.to_string(),
                    detail: "fx not in fixture".to_string(),
                }
                .into()),
            }
        }
    }

    struct FakeRenderer;

    impl ChartRenderer for FakeRenderer {
        fn render(&self, series: &PriceSeries, out_path: &Path) -> anyhow::Result<()> {
            if series.len() < 2 {
                return Err(RenderError {
                    symbol: series.symbol.clone(),
                    detail: "too short".to_string(),
                }
                .into());
            }
            std::fs::write(out_path, b"png")?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeStore {
        uploads: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ChartStore for FakeStore {
        async fn upload(&self, local_path: &Path, key: &str) -> anyhow::Result<()> {
            anyhow::ensure!(local_path.exists(), "upload before render");
            self.uploads.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn presign_get(&self, key: &str, ttl: Duration) -> anyhow::Result<String> {
            Ok(format!(
                "https://charts-bucket.example.com/{key}?expires={}",
                ttl.as_secs()
            ))
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        texts: Mutex<Vec<String>>,
        images: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Notifier for FakeNotifier {
        fn provider_name(&self) -> &'static str {
            "fake"
        }

        async fn push_text(&self, text: &str) -> anyhow::Result<()> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn push_image(&self, image_url: &str) -> anyhow::Result<()> {
            anyhow::ensure!(image_url.starts_with("https://"), "image URL must be HTTPS");
            self.images.lock().unwrap().push(image_url.to_string());
            Ok(())
        }
    }

    fn fixture_dates() -> (NaiveDate, DateTime<Utc>) {
        let latest = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 1, 7, 0).unwrap();
        (latest, now)
    }

    #[tokio::test]
    async fn full_run_pushes_text_then_chart_image() {
        let (latest, now) = fixture_dates();
        let source = FakeSource::new(latest);
        let store = FakeStore::default();
        let notifier = FakeNotifier::default();

        let summary = run(
            &settings(),
            &DigestOptions::default(),
            &source,
            &FakeRenderer,
            &store,
            &notifier,
            now,
        )
        .await
        .unwrap();

        assert!(summary.notification_sent);
        assert_eq!(summary.ticker_count, 3);
        assert_eq!(summary.message, "Stock monitoring completed successfully");

        let texts = notifier.texts.lock().unwrap();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("📈ETF Price Tracker 2026-08-06"));
        assert!(texts[0].contains("前日比: -3.8%"));
        assert!(texts[0].contains("USD/JPY: 147.52"));

        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0], "charts/2026/08/06/vt_chart.png");

        let images = notifier.images.lock().unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0].contains("charts/2026/08/06/vt_chart.png"));
        assert!(images[0].contains("expires=3600"));
    }

    #[tokio::test]
    async fn missing_symbol_degrades_to_unavailable_section() {
        let (latest, now) = fixture_dates();
        let mut source = FakeSource::new(latest);
        source.closes.remove("VOO");
        let notifier = FakeNotifier::default();

        let summary = run(
            &settings(),
            &DigestOptions::default(),
            &source,
            &FakeRenderer,
            &FakeStore::default(),
            &notifier,
            now,
        )
        .await
        .unwrap();

        assert!(summary.notification_sent);
        assert_eq!(summary.ticker_count, 2);

        let texts = notifier.texts.lock().unwrap();
        assert!(texts[0].contains("【VOO】\nデータ取得不可"));
    }

    #[tokio::test]
    async fn stale_session_skips_without_notifying() {
        let (latest, _) = fixture_dates();
        let source = FakeSource::new(latest);
        let notifier = FakeNotifier::default();

        // Monday morning after a Friday close.
        let now = Utc.with_ymd_and_hms(2026, 8, 10, 1, 7, 0).unwrap();
        let summary = run(
            &settings(),
            &DigestOptions::default(),
            &source,
            &FakeRenderer,
            &FakeStore::default(),
            &notifier,
            now,
        )
        .await
        .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                notification_sent: false,
                ticker_count: 0,
                message: "Market is closed today",
            }
        );
        assert!(notifier.texts.lock().unwrap().is_empty());
        assert!(notifier.images.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn force_bypasses_the_freshness_gate() {
        let (latest, _) = fixture_dates();
        let source = FakeSource::new(latest);
        let notifier = FakeNotifier::default();
        let opts = DigestOptions {
            force: true,
            ..DigestOptions::default()
        };

        let now = Utc.with_ymd_and_hms(2026, 8, 10, 1, 7, 0).unwrap();
        let summary = run(
            &settings(),
            &opts,
            &source,
            &FakeRenderer,
            &FakeStore::default(),
            &notifier,
            now,
        )
        .await
        .unwrap();

        assert!(summary.notification_sent);
        assert_eq!(notifier.texts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dry_run_touches_neither_store_nor_notifier() {
        let (latest, now) = fixture_dates();
        let source = FakeSource::new(latest);
        let opts = DigestOptions {
            dry_run: true,
            ..DigestOptions::default()
        };

        let summary = run(
            &settings(),
            &opts,
            &source,
            &FakeRenderer,
            &NullChartStore,
            &NullNotifier,
            now,
        )
        .await
        .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                notification_sent: false,
                ticker_count: 3,
                message: "Dry run completed",
            }
        );
    }

    #[tokio::test]
    async fn unbreached_thresholds_suppress_the_push() {
        let (latest, now) = fixture_dates();
        let source = FakeSource::new(latest);
        let notifier = FakeNotifier::default();
        let opts = DigestOptions {
            thresholds: AlertThresholds {
                daily: Some(-20.0),
                weekly: Some(-20.0),
            },
            ..DigestOptions::default()
        };

        let summary = run(
            &settings(),
            &opts,
            &source,
            &FakeRenderer,
            &FakeStore::default(),
            &notifier,
            now,
        )
        .await
        .unwrap();

        assert_eq!(summary.message, "No threshold breached");
        assert!(!summary.notification_sent);
        assert!(notifier.texts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fx_outage_degrades_to_unavailable_fx_section() {
        let (latest, now) = fixture_dates();
        let mut source = FakeSource::new(latest);
        source.fx = None;
        let notifier = FakeNotifier::default();

        run(
            &settings(),
            &DigestOptions::default(),
            &source,
            &FakeRenderer,
            &FakeStore::default(),
            &notifier,
            now,
        )
        .await
        .unwrap();

        let texts = notifier.texts.lock().unwrap();
        assert!(texts[0].contains("USD/JPY: n/a"));
    }

    #[tokio::test]
    async fn no_data_for_any_symbol_aborts_the_run() {
        let (latest, now) = fixture_dates();
        let mut source = FakeSource::new(latest);
        source.closes.clear();

        let err = run(
            &settings(),
            &DigestOptions::default(),
            &source,
            &FakeRenderer,
            &FakeStore::default(),
            &FakeNotifier::default(),
            now,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("no price data"));
    }
}
