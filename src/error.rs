use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::cache::StoreError;

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Configuration Errors
///
/// Everything detected while building the middleware configuration is
/// fatal at startup. These variants never reach a client in practice, but
/// they still map to a 500 if a handler ever returns one:
///
/// - `ConfigError` - Malformed value, unknown key, empty list after merge
/// - `InvalidPattern` - A path rule that does not compile as a regex
/// - `InvalidCidr` - A blacklist/whitelist entry that is not IPv4 CIDR
///
/// # Request-Time Errors
///
/// - `NotFound` - Unknown resource requested from a handler (404)
/// - `Store` - Cache store read/write failure (propagated, never a silent miss)
/// - `Internal` - Anything else raised by a middleware at request time
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid pattern in `{key}`: {pattern}: {source}")]
    InvalidPattern {
        key: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid CIDR range in `{key}`: {value}")]
    InvalidCidr { key: String, value: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cache store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full error details server-side for debugging
        // but only expose sanitized messages to clients
        tracing::error!(error = %self, "Request failed");

        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.as_str()),

            // The cache backend is infrastructure; clients may retry
            AppError::Store(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "cache_unavailable",
                "The response cache is temporarily unavailable. Please try again later.",
            ),

            AppError::ConfigError(_)
            | AppError::InvalidPattern { .. }
            | AppError::InvalidCidr { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                "Service configuration error. Please contact support.",
            ),

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred. Please contact support if the issue persists.",
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_maps_to_503() {
        let err = AppError::from(StoreError::Unavailable("redis down".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AppError::NotFound("Post 'nope' not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_config_error_maps_to_500() {
        let response = AppError::ConfigError("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_pattern_message_names_key() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = AppError::InvalidPattern {
            key: "excluded_path".to_string(),
            pattern: "(".to_string(),
            source,
        };
        assert!(err.to_string().contains("excluded_path"));
    }
}
