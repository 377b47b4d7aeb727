use axum::{
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::IntoResponse,
};
use serde_json::json;
use thiserror::Error;

/// Application error type
///
/// Every variant maps to one HTTP status and one stable error code so that
/// handlers and middleware can return it directly.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded: {message}")]
    TooManyRequests {
        message: String,
        /// Milliseconds until the caller's bucket holds one whole token again
        retry_after_ms: u64,
    },

    // ===== Internal Server Errors =====
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message (without sensitive details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound(msg) => msg.clone(),
            AppError::TooManyRequests { message, .. } => message.clone(),
            AppError::Internal(_) => "Server error.  Please try again later.".to_string(),
        }
    }

    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::TooManyRequests { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = %code,
                status = %status.as_u16(),
                "Server error occurred"
            );
        } else {
            tracing::debug!(
                error = %self,
                error_code = %code,
                "Client error occurred"
            );
        }
    }
}

/// `Retry-After` carries whole seconds; round up so clients never retry early
fn retry_after_secs(retry_after_ms: u64) -> u64 {
    retry_after_ms.div_ceil(1_000).max(1)
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // Log the error with appropriate level
        self.log();

        let status = self.status_code();
        let error_code = self.error_code();
        let user_message = self.user_message();

        let response_body = match &self {
            AppError::TooManyRequests { retry_after_ms, .. } => json!({
                "error": user_message,
                "error_code": error_code,
                "status": status.as_u16(),
                "retry_after_ms": retry_after_ms,
            }),
            _ => json!({
                "error": user_message,
                "error_code": error_code,
                "status": status.as_u16(),
            }),
        };

        let mut response = (status, axum::Json(response_body)).into_response();

        if let AppError::TooManyRequests { retry_after_ms, .. } = &self {
            response.headers_mut().insert(
                RETRY_AFTER,
                HeaderValue::from(retry_after_secs(*retry_after_ms)),
            );
        }

        response
    }
}

// ============================================================================
// Helper functions for creating common errors
// ============================================================================

impl AppError {
    /// Create a not-found error (404)
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    /// Create a rate limit rejection (429)
    pub fn too_many_requests(msg: impl Into<String>, retry_after_ms: u64) -> Self {
        AppError::TooManyRequests {
            message: msg.into(),
            retry_after_ms,
        }
    }

    /// Create an internal server error
    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}
