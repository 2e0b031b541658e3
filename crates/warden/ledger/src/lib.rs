//! Warden audit ledger.
//!
//! An append-only, hash-chained event log. Every privileged action taken by
//! the credential authority or the lifecycle orchestrator lands here as one
//! entry; each entry's hash is a keyed MAC over its canonical serialization
//! concatenated with the previous entry's hash, so any retroactive edit is
//! detectable by [`AuditLedger::verify`].
//!
//! Verification is strictly diagnostic: the ledger never attempts chain
//! repair, since a "repaired" chain would defeat the tamper-evidence
//! guarantee.

#![deny(unsafe_code)]

mod chain;
mod entry;
mod error;
mod export;
mod ledger;
mod verify;

pub use chain::GENESIS_HASH;
pub use entry::{AuditEntry, AuditEvent, AuditEventType, AuditResourceType};
pub use error::LedgerError;
pub use export::{AuditPackage, ExportFilter};
pub use ledger::AuditLedger;
pub use verify::{ChainFault, ChainFaultKind, ChainStatus, ChainVerification};
