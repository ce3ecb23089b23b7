use std::fmt;

/// The messaging provider rejected a push, or the payload failed local
/// validation. `retryable` records the provider's transient/permanent
/// classification (5xx and 429 are transient) for the operator; the run
/// itself never retries, that is the scheduler platform's job.
#[derive(Debug, Clone)]
pub struct DeliveryError {
    pub stage: &'static str,
    pub status: Option<u16>,
    pub retryable: bool,
    pub detail: String,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "notification delivery failed (stage={}, http={status}, retryable={}): {}",
                self.stage, self.retryable, self.detail
            ),
            None => write!(
                f,
                "notification delivery failed (stage={}): {}",
                self.stage, self.detail
            ),
        }
    }
}

impl std::error::Error for DeliveryError {}
