pub mod error;
pub mod line;

pub use line::LineClient;

/// Delivers the digest to the fixed recipient configured at construction.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn push_text(&self, text: &str) -> anyhow::Result<()>;

    /// `image_url` must be HTTPS; anything else is rejected before the
    /// network call.
    async fn push_image(&self, image_url: &str) -> anyhow::Result<()>;
}
