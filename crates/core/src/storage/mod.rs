use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub mod s3;

pub use s3::S3ChartStore;

/// Upload or presign failed.
#[derive(Debug, Clone)]
pub struct StorageError {
    pub stage: &'static str,
    pub detail: String,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chart storage error (stage={}): {}", self.stage, self.detail)
    }
}

impl std::error::Error for StorageError {}

/// Transient home for the rendered chart: the object exists only so a
/// time-limited HTTPS URL can be handed to the notifier.
#[async_trait::async_trait]
pub trait ChartStore: Send + Sync {
    async fn upload(&self, local_path: &Path, key: &str) -> anyhow::Result<()>;

    /// Time-limited, credential-free HTTPS URL for a previously uploaded key.
    async fn presign_get(&self, key: &str, ttl: Duration) -> anyhow::Result<String>;
}

/// Object key layout: `charts/YYYY/MM/DD/<filename>`, zero-padded.
pub fn build_chart_key(filename: &str, date: NaiveDate) -> String {
    format!(
        "charts/{:04}/{:02}/{:02}/{filename}",
        date.year(),
        date.month(),
        date.day()
    )
}
