//! API error types
//!
//! Every failure leaves the server as `{"error": "<message>"}`. Store
//! failures are logged with their cause and answered with a generic message.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Message returned for every store or task failure
pub const INTERNAL_MESSAGE: &str = "internal server error";

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request parameters
    #[error("{0}")]
    BadRequest(String),

    /// Failure on the server side; the string is sent to the client as is
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_client_error() {
            tracing::warn!(status = %status, error = %self, "Rejected request");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<watchlog_core::Error> for ApiError {
    fn from(err: watchlog_core::Error) -> Self {
        if err.is_client_error() {
            Self::BadRequest(err.to_string())
        } else {
            tracing::error!(error = %err, "Request failed");
            Self::Internal(INTERNAL_MESSAGE.to_string())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type for handlers
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let bad = ApiError::from(watchlog_core::Error::InvalidQuery("unknown sort field".into()));
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(bad.to_string(), "invalid query: unknown sort field");

        let failure = task_failure();
        let internal = ApiError::from(failure);
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.to_string(), INTERNAL_MESSAGE);
    }

    fn task_failure() -> watchlog_core::Error {
        watchlog_core::Error::Task("aggregation panicked: no such table: videos".into())
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let err = ApiError::from(task_failure());
        assert!(!err.to_string().contains("videos"));
    }
}
