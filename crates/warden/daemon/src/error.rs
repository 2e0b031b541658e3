//! Error types for warden-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use warden_authority::AuthorityError;
use warden_orchestrator::OrchestratorError;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Secret store error
    #[error("Secret store error: {0}")]
    Secrets(#[from] warden_sandbox::SecretStoreError),

    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] warden_ledger::LedgerError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Credential rejected (revoked, expired, or bad signature)
    #[error("Credential rejected: {0}")]
    CredentialRejected(String),

    /// Scope policy denied the request
    #[error("Policy denied: {0}")]
    PolicyDenied(String),

    /// Conflict with current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthorityError> for ApiError {
    fn from(e: AuthorityError) -> Self {
        match e {
            AuthorityError::Validation(msg) => ApiError::Validation(msg),
            AuthorityError::NotFound(id) => ApiError::NotFound(id.to_string()),
            AuthorityError::Revoked(_) | AuthorityError::Expired(_) => {
                ApiError::CredentialRejected(e.to_string())
            }
            AuthorityError::Signature(msg) => ApiError::CredentialRejected(msg),
            AuthorityError::Ledger(_) | AuthorityError::LockPoisoned => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::NotFound(id) => ApiError::NotFound(id.to_string()),
            OrchestratorError::IllegalTransition { .. } => ApiError::Conflict(e.to_string()),
            OrchestratorError::InsufficientScopes { .. } => ApiError::PolicyDenied(e.to_string()),
            OrchestratorError::Authority(inner) => ApiError::from(inner),
            OrchestratorError::Sandbox(_) | OrchestratorError::Ledger(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::CredentialRejected(_) => (StatusCode::UNAUTHORIZED, "CREDENTIAL_REJECTED"),
            ApiError::PolicyDenied(_) => (StatusCode::FORBIDDEN, "POLICY_DENIED"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
