//! Error types for the Saavn API client.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SaavnApiError {
    /// The breaker is cooling down after a 429; no request was sent.
    #[error("Saavn calls are blocked for another {}s", .retry_after.as_secs())]
    CircuitOpen { retry_after: Duration },
    /// This call observed the 429 that tripped the breaker.
    #[error("Saavn rate limited (429), blocking all calls for {}s", .cooldown.as_secs())]
    RateLimited { cooldown: Duration },
    #[error("Saavn request failed: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },
    #[error("Saavn request timed out")]
    Timeout,
    #[error("Failed to parse response from {path}")]
    ParseFailed {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Saavn request worker has shut down")]
    WorkerGone,
}

impl SaavnApiError {
    /// True when the upstream is temporarily refusing us, as opposed to failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::RateLimited { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Upstream {
                status: Some(404),
                ..
            }
        )
    }

    /// How long callers should wait before trying again, when known.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after } => Some(*retry_after),
            Self::RateLimited { cooldown } => Some(*cooldown),
            _ => None,
        }
    }
}
