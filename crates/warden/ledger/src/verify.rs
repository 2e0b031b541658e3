//! Integrity verification for the audit chain

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall verification status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainStatus {
    Ok,
    Mismatch,
}

/// Which of the two per-entry checks failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFaultKind {
    /// Recomputed hash differs from the stored `current_hash`.
    HashMismatch,
    /// Stored `previous_hash` differs from the prior entry's stored hash.
    LinkageMismatch,
}

/// One verification failure, anchored to a specific entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainFault {
    pub entry_id: Uuid,
    pub index: usize,
    pub kind: ChainFaultKind,
    pub expected: String,
    pub actual: String,
}

/// Result of a full-chain verification pass.
///
/// Verification walks every entry and reports each failing check as its own
/// fault; it never short-circuits, so a single pass surfaces all tampering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainVerification {
    pub status: ChainStatus,
    pub total_entries: usize,
    pub errors: Vec<ChainFault>,
}

impl ChainVerification {
    pub fn ok(total_entries: usize) -> Self {
        Self {
            status: ChainStatus::Ok,
            total_entries,
            errors: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ChainStatus::Ok
    }
}
