//! Structured problem documents.
//!
//! Every read-path failure is translated at the handler boundary into a
//! problem document with a distinct HTTP status: 400 for malformed input,
//! 404 for not-found, 429 for throttled requests, 5xx for store failures.
//! Raw internal error messages never reach clients.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use digest_store::StoreError;
use serde::{Deserialize, Serialize};

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// RFC 7807-style problem body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub title: String,
    pub detail: String,
    pub status: u16,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: detail.into(),
            status: status.as_u16(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad request", detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not found", detail)
    }

    pub fn rate_limited(retry_after_ms: u64) -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate limit exceeded",
            format!("retry after {retry_after_ms}ms"),
        )
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error", detail)
    }

    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "store unavailable", detail)
    }

    /// Store failures map to 5xx; the concrete error stays in the logs.
    pub fn from_store(err: StoreError) -> Self {
        tracing::warn!(error = %err, "store query failed");
        match err {
            StoreError::Connectivity(_) | StoreError::DeadlineExceeded => {
                Self::service_unavailable("document store unavailable")
            }
            _ => Self::internal("document store query failed"),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.title, self.detail)
    }
}

impl std::error::Error for Problem {}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::to_vec(&self).unwrap_or_default();
        (
            status,
            [(header::CONTENT_TYPE, PROBLEM_CONTENT_TYPE)],
            body,
        )
            .into_response()
    }
}

/// Result alias for handler fetch paths.
pub type ApiResult<T> = Result<T, Problem>;
