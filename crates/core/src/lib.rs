pub mod chart;
pub mod domain;
pub mod ingest;
pub mod notify;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;

    const DEFAULT_PRESIGN_TTL_SECS: u64 = 3600;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub line_channel_access_token: Option<String>,
        pub line_user_id: Option<String>,
        pub s3_bucket: Option<String>,
        pub presign_ttl_secs: u64,
        pub market_data_base_url: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let presign_ttl_secs = std::env::var("PRESIGN_URL_TTL_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_PRESIGN_TTL_SECS);

            Ok(Self {
                line_channel_access_token: std::env::var("LINE_CHANNEL_ACCESS_TOKEN").ok(),
                line_user_id: std::env::var("LINE_USER_ID").ok(),
                s3_bucket: std::env::var("S3_BUCKET").ok(),
                presign_ttl_secs,
                market_data_base_url: std::env::var("MARKET_DATA_BASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_line_channel_access_token(&self) -> anyhow::Result<&str> {
            self.line_channel_access_token
                .as_deref()
                .context("LINE_CHANNEL_ACCESS_TOKEN is required")
        }

        pub fn require_line_user_id(&self) -> anyhow::Result<&str> {
            self.line_user_id
                .as_deref()
                .context("LINE_USER_ID is required")
        }

        pub fn require_s3_bucket(&self) -> anyhow::Result<&str> {
            self.s3_bucket.as_deref().context("S3_BUCKET is required")
        }
    }
}
