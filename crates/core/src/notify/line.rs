use crate::config::Settings;
use crate::notify::error::DeliveryError;
use crate::notify::Notifier;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.line.me";
const PUSH_PATH: &str = "/v2/bot/message/push";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Push client for the LINE Messaging API.
///
/// Every push carries an `X-Line-Retry-Key` derived from the payload, so a
/// platform-level invocation retry that replays the same digest cannot
/// double-deliver it.
#[derive(Debug, Clone)]
pub struct LineClient {
    http: reqwest::Client,
    base_url: String,
    channel_access_token: String,
    user_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "originalContentUrl")]
        original_content_url: String,
        #[serde(rename = "previewImageUrl")]
        preview_image_url: String,
    },
}

#[derive(Debug, Clone, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: &'a [Message],
}

impl LineClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let channel_access_token = settings.require_line_channel_access_token()?.to_string();
        let user_id = settings.require_line_user_id()?.to_string();

        let base_url =
            std::env::var("LINE_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("LINE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("etfwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build LINE http client")?;

        Ok(Self {
            http,
            base_url,
            channel_access_token,
            user_id,
        })
    }

    /// SHA-256 hex over the serialized payload. Stable across invocation
    /// retries because the payload is deterministic for a given report.
    pub fn build_retry_key(seed: &str) -> String {
        let digest = Sha256::digest(seed.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    async fn push_messages(&self, messages: &[Message]) -> Result<()> {
        let payload = PushRequest {
            to: &self.user_id,
            messages,
        };
        let payload_json =
            serde_json::to_string(&payload).context("failed to serialize push payload")?;
        let retry_key = Self::build_retry_key(&payload_json);

        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", self.channel_access_token))?,
        );
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("X-Line-Retry-Key", HeaderValue::from_str(&retry_key)?);

        let url = format!("{}{PUSH_PATH}", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .body(payload_json)
            .send()
            .await
            .map_err(|e| DeliveryError {
                stage: "http",
                status: None,
                retryable: true,
                detail: e.to_string(),
            })?;

        let status = res.status();
        if status.is_success() {
            return Ok(());
        }

        let body = res.text().await.unwrap_or_default();
        Err(DeliveryError {
            stage: "push",
            status: Some(status.as_u16()),
            retryable: status.is_server_error() || status.as_u16() == 429,
            detail: body,
        }
        .into())
    }
}

#[async_trait::async_trait]
impl Notifier for LineClient {
    fn provider_name(&self) -> &'static str {
        "line_messaging"
    }

    async fn push_text(&self, text: &str) -> Result<()> {
        self.push_messages(&[Message::Text {
            text: text.to_string(),
        }])
        .await?;
        tracing::info!(chars = text.chars().count(), "pushed text notification");
        Ok(())
    }

    async fn push_image(&self, image_url: &str) -> Result<()> {
        if !image_url.starts_with("https://") {
            return Err(DeliveryError {
                stage: "validate_image_url",
                status: None,
                retryable: false,
                detail: format!("image URL must be HTTPS: {image_url}"),
            }
            .into());
        }

        self.push_messages(&[Message::Image {
            original_content_url: image_url.to_string(),
            preview_image_url: image_url.to_string(),
        }])
        .await?;
        tracing::info!("pushed image notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_message_serializes_to_provider_shape() {
        let msg = Message::Text {
            text: "hello".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "text", "text": "hello"})
        );
    }

    #[test]
    fn image_message_serializes_both_urls() {
        let msg = Message::Image {
            original_content_url: "https://example.com/c.png".to_string(),
            preview_image_url: "https://example.com/c.png".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "image",
                "originalContentUrl": "https://example.com/c.png",
                "previewImageUrl": "https://example.com/c.png"
            })
        );
    }

    #[test]
    fn push_payload_targets_the_fixed_recipient() {
        let messages = vec![Message::Text {
            text: "digest".to_string(),
        }];
        let payload = PushRequest {
            to: "U1234",
            messages: &messages,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"to": "U1234", "messages": [{"type": "text", "text": "digest"}]})
        );
    }

    #[tokio::test]
    async fn non_https_image_url_is_rejected_before_any_request() {
        let settings = crate::config::Settings {
            line_channel_access_token: Some("token".to_string()),
            line_user_id: Some("U1234".to_string()),
            s3_bucket: None,
            presign_ttl_secs: 3600,
            market_data_base_url: None,
            sentry_dsn: None,
        };
        let client = LineClient::from_settings(&settings).unwrap();

        let err = client
            .push_image("http://example.com/chart.png")
            .await
            .unwrap_err();
        let delivery = err.downcast_ref::<DeliveryError>().unwrap();
        assert_eq!(delivery.stage, "validate_image_url");
        assert!(!delivery.retryable);
    }

    #[test]
    fn retry_key_is_deterministic_sha256_hex() {
        let a = LineClient::build_retry_key("same payload");
        let b = LineClient::build_retry_key("same payload");
        let c = LineClient::build_retry_key("other payload");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
