use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors raised while talking to the hosted auth + data service.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The HTTP request could not be sent or the body could not be read.
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The auth endpoints rejected the credentials or token.
    #[error("{0}")]
    Auth(String),

    /// The service answered with a non-success status.
    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// A response or row could not be (de)serialized.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The request did not finish in time.
    #[error("Backend request timed out")]
    Timeout,
}

impl From<sonic_rs::Error> for BackendError {
    fn from(e: sonic_rs::Error) -> Self {
        BackendError::Decode(e.to_string())
    }
}

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A backend (auth or table) error.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An authorization error.
    #[error("Authorization failed")]
    Unauthorized,

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The role picked on the login form is not the account's role.
    #[error("Selected role does not match your account permissions")]
    RoleMismatch,

    /// A destructive operation was requested without confirmation.
    #[error("Confirmation required")]
    ConfirmationRequired,

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// A rate limit exceeded error.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        AppError::Validation(report.to_string())
    }
}

impl AppError {
    /// The message shown inline on a form or next to a list.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Backend(BackendError::Auth(msg)) => msg.clone(),
            AppError::Backend(BackendError::Api { message, .. }) => message.clone(),
            AppError::Backend(_) | AppError::Redis(_) | AppError::Internal(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            AppError::Authentication(msg)
            | AppError::Validation(msg)
            | AppError::RateLimitExceeded(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// The HTTP status that goes with this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Backend(BackendError::Auth(_)) | AppError::Authentication(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Backend(BackendError::Api { status, .. }) if *status < 500 => {
                StatusCode::BAD_REQUEST
            }
            AppError::Backend(BackendError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            AppError::Redis(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::RoleMismatch => StatusCode::BAD_REQUEST,
            AppError::ConfirmationRequired => StatusCode::PRECONDITION_REQUIRED,
            AppError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            AppError::Backend(BackendError::Auth(msg)) | AppError::Authentication(msg) => {
                tracing::warn!("Authentication failed: {}", msg)
            }
            AppError::Backend(e) => tracing::error!("Backend error: {}", e),
            AppError::Redis(e) => tracing::error!("Redis error: {}", e),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            AppError::Unauthorized => tracing::warn!("Authorization failed"),
            AppError::RateLimitExceeded(msg) => tracing::warn!("Rate limit exceeded: {}", msg),
            AppError::NotFound => tracing::debug!("Resource not found"),
            AppError::Validation(msg) => tracing::debug!("Validation error: {}", msg),
            AppError::RoleMismatch => tracing::debug!("Role mismatch at login"),
            AppError::ConfirmationRequired => tracing::debug!("Delete without confirmation"),
        }

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": self.user_message()
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, [(http::header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_keep_backend_message() {
        let err = AppError::from(BackendError::Auth("Invalid login credentials".into()));
        assert_eq!(err.user_message(), "Invalid login credentials");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn internal_details_are_not_shown() {
        let err = AppError::Internal("pool exhausted".into());
        assert!(!err.user_message().contains("pool"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn confirmation_required_maps_to_428() {
        assert_eq!(
            AppError::ConfirmationRequired.status(),
            StatusCode::PRECONDITION_REQUIRED
        );
    }

    #[test]
    fn role_mismatch_message() {
        assert_eq!(
            AppError::RoleMismatch.user_message(),
            "Selected role does not match your account permissions"
        );
    }
}
