//! Ledger error types

use thiserror::Error;

/// Ledger-related errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Ledger lock poisoned")]
    LockPoisoned,
}
