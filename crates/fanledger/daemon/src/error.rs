//! Error types for fanledger-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fanledger_service::LedgerError;
use fanledger_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Ledger refusal or failure
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// HTTP status for a ledger error code.
pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "not_found" => StatusCode::NOT_FOUND,
        "duplicate_action" | "conflict" => StatusCode::CONFLICT,
        "insufficient_balance" | "invalid_amount" | "objective_closed" => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        "invalid_input" => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, details) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            ApiError::Ledger(LedgerError::InsufficientBalance {
                required,
                available,
            }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Some(serde_json::json!({ "required": required, "available": available })),
            ),
            ApiError::Ledger(err) => (status_for_code(err.code()), None),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl ApiError {
    /// Same snake_case codes as [`LedgerError::code`] and `ActionOutcome`.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Ledger(err) => err.code(),
        }
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;
    use fanledger_types::ObjectiveId;

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::BadRequest("test".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );

        assert_eq!(
            ApiError::from(LedgerError::NotFound("account 1".into()))
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );

        assert_eq!(
            ApiError::from(LedgerError::DuplicateAction("vote".into()))
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );

        assert_eq!(
            ApiError::from(LedgerError::ObjectiveClosed(ObjectiveId(1)))
                .into_response()
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        assert_eq!(
            ApiError::from(LedgerError::Storage(StorageError::Backend("down".into())))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_codes_match_outcome_codes() {
        assert_eq!(ApiError::BadRequest("x".into()).code(), "bad_request");

        let err = LedgerError::DuplicateAction("vote".into());
        let outcome = fanledger_service::ActionOutcome::error(&err);
        assert_eq!(ApiError::from(err).code(), outcome.code.as_deref().unwrap());
    }
}
