//! JSON error responses for the HTTP API.

use crate::cache::FetchError;
use crate::saavn::SaavnApiError;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    MissingQuery,
    BadRequest,
    NotFound,
    UpstreamUnavailable,
    UpstreamTimeout,
    UpstreamError,
    InternalError,
}

impl ApiErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            Self::MissingQuery | Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamError => StatusCode::BAD_GATEWAY,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    /// Sent as `Retry-After` when set.
    pub retry_after: Option<Duration>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: ApiErrorCode,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn missing_query() -> Self {
        Self::new(ApiErrorCode::MissingQuery, "Query is required")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::BadRequest, message)
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        Self::new(ApiErrorCode::NotFound, format!("{what} not found: {id}"))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InternalError, message)
    }

    pub fn unavailable(retry_after: Duration) -> Self {
        Self {
            code: ApiErrorCode::UpstreamUnavailable,
            message: "Music service is temporarily unavailable".to_owned(),
            retry_after: Some(retry_after),
        }
    }
}

/// Whole seconds for `Retry-After`, rounded up and never zero.
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            code: self.code,
        };
        let mut response = (self.code.status(), Json(body)).into_response();
        if let Some(wait) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(wait)));
        }
        response
    }
}

impl From<&SaavnApiError> for ApiError {
    fn from(err: &SaavnApiError) -> Self {
        match err {
            SaavnApiError::CircuitOpen { .. } | SaavnApiError::RateLimited { .. } => {
                let wait = err.retry_after().unwrap_or(Duration::from_secs(1));
                Self::unavailable(wait)
            }
            SaavnApiError::Timeout => {
                Self::new(ApiErrorCode::UpstreamTimeout, "Music service timed out")
            }
            SaavnApiError::Upstream {
                status: Some(404), ..
            } => Self::new(ApiErrorCode::NotFound, "Not found"),
            SaavnApiError::Upstream { status, message } => {
                warn!(status = ?status, message = %message, "Upstream request failed");
                Self::new(ApiErrorCode::UpstreamError, "Music service request failed")
            }
            SaavnApiError::ParseFailed { path, source } => {
                warn!(path = %path, error = ?source, "Unparseable upstream response");
                Self::new(ApiErrorCode::UpstreamError, "Music service returned an unexpected response")
            }
            SaavnApiError::WorkerGone => {
                error!("Saavn request worker is gone");
                Self::internal_error("Service is shutting down")
            }
        }
    }
}

impl From<SaavnApiError> for ApiError {
    fn from(err: SaavnApiError) -> Self {
        Self::from(&err)
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match &err {
            FetchError::Upstream(upstream) => Self::from(upstream.as_ref()),
            FetchError::Aborted { key } => {
                error!(key = %key, "Fetch aborted without a result");
                Self::internal_error("Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(59_001)), 60);
        assert_eq!(retry_after_secs(Duration::from_secs(60)), 60);
    }

    #[test]
    fn upstream_errors_map_to_statuses() {
        let cases = [
            (
                SaavnApiError::CircuitOpen {
                    retry_after: Duration::from_secs(5),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                SaavnApiError::RateLimited {
                    cooldown: Duration::from_secs(60),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (SaavnApiError::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (
                SaavnApiError::Upstream {
                    status: Some(500),
                    message: "boom".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                SaavnApiError::Upstream {
                    status: Some(404),
                    message: "gone".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                SaavnApiError::ParseFailed {
                    path: "/api/songs".into(),
                    source: anyhow::anyhow!("expected value"),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(&err).code.status(), status, "{err}");
        }
    }

    #[test]
    fn unavailable_sets_retry_after_header() {
        let err = ApiError::from(SaavnApiError::CircuitOpen {
            retry_after: Duration::from_millis(12_300),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "13");
    }
}
