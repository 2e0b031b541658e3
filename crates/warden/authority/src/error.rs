//! Authority error types

use thiserror::Error;
use warden_types::TokenId;

/// Credential authority errors.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// Bad TTL, empty scope intersection, or an otherwise unmintable request
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Token not found: {0}")]
    NotFound(TokenId),

    #[error("Token revoked: {0}")]
    Revoked(TokenId),

    #[error("Token expired: {0}")]
    Expired(TokenId),

    /// Signature, issuer, or audience verification failure; fatal to the call
    #[error("Invalid credential: {0}")]
    Signature(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] warden_ledger::LedgerError),

    #[error("Authority lock poisoned")]
    LockPoisoned,
}
