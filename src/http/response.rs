//! API error taxonomy and response mapping.
//!
//! Validation and auth errors are rejected at the boundary; storage
//! failures are logged with context and translated to a generic server
//! error. Raw error objects never reach the client.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the API boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed required input.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credential.
    #[error("{0}")]
    Auth(String),

    /// Authenticated but not permitted (e.g., CSRF validation failed).
    #[error("{0}")]
    Forbidden(String),

    /// Client exceeded a rate policy.
    #[error("rate limit exceeded")]
    RateLimited {
        retry_after_secs: u64,
        reset_at_ms: u64,
    },

    /// Requested entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Persistence or other internal failure. The detail is logged, not
    /// returned.
    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION",
            ApiError::Auth(_) => "AUTH_REQUIRED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(detail = %detail, "Internal error");
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
            "error_code": self.error_code(),
        }));
        let mut response = (self.status(), body).into_response();

        if let ApiError::RateLimited {
            retry_after_secs,
            reset_at_ms,
        } = self
        {
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                headers.insert("retry-after", value);
            }
            if let Ok(value) = HeaderValue::from_str(&reset_at_ms.to_string()) {
                headers.insert("x-ratelimit-reset", value);
            }
        }

        response
    }
}
