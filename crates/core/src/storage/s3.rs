use crate::config::Settings;
use crate::storage::{ChartStore, StorageError};
use anyhow::Result;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use std::time::Duration;

const CHART_CONTENT_TYPE: &str = "image/png";

/// S3-backed chart store. Credentials and region come from the ambient AWS
/// environment (the execution role on the scheduler platform, the usual
/// variables or profile locally).
#[derive(Debug, Clone)]
pub struct S3ChartStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ChartStore {
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let bucket = settings.require_s3_bucket()?.to_string();
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;

        Ok(Self {
            client: aws_sdk_s3::Client::new(&aws_config),
            bucket,
        })
    }
}

#[async_trait::async_trait]
impl ChartStore for S3ChartStore {
    async fn upload(&self, local_path: &Path, key: &str) -> Result<()> {
        let body = ByteStream::from_path(local_path).await.map_err(|e| StorageError {
            stage: "read_local",
            detail: format!("{}: {e}", local_path.display()),
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(CHART_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError {
                stage: "put_object",
                detail: e.to_string(),
            })?;

        tracing::info!(bucket = %self.bucket, key, "uploaded chart");
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(|e| StorageError {
            stage: "presign_config",
            detail: e.to_string(),
        })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError {
                stage: "presign_get",
                detail: e.to_string(),
            })?;

        Ok(request.uri().to_string())
    }
}
