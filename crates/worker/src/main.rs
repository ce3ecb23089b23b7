use anyhow::Context;
use clap::Parser;
use etfwatch_core::chart::PlottersLineChart;
use etfwatch_core::ingest::yahoo::YahooChartClient;
use etfwatch_core::notify::LineClient;
use etfwatch_core::storage::S3ChartStore;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod digest;

#[derive(Debug, Parser)]
#[command(name = "etfwatch_worker")]
struct Args {
    /// Fetch, compute and render, but do not upload or push anything.
    #[arg(long)]
    dry_run: bool,

    /// Send even when the newest session is stale (market-closed gate).
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = etfwatch_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let mut opts = digest::DigestOptions::from_env();
    opts.dry_run = args.dry_run;
    opts.force = args.force;

    let source = YahooChartClient::from_settings(&settings)?;
    let renderer = PlottersLineChart::from_env();
    let now_utc = chrono::Utc::now();

    let result = if opts.dry_run {
        digest::run(
            &settings,
            &opts,
            &source,
            &renderer,
            &digest::NullChartStore,
            &digest::NullNotifier,
            now_utc,
        )
        .await
    } else {
        let store = S3ChartStore::from_settings(&settings)
            .await
            .context("failed to build chart store")?;
        let notifier = LineClient::from_settings(&settings)?;
        digest::run(&settings, &opts, &source, &renderer, &store, &notifier, now_utc).await
    };

    match result {
        Ok(summary) => {
            tracing::info!(
                notification_sent = summary.notification_sent,
                ticker_count = summary.ticker_count,
                message = summary.message,
                "digest run finished"
            );
            Ok(())
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "digest run failed");
            Err(err)
        }
    }
}

fn init_sentry(settings: &etfwatch_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
