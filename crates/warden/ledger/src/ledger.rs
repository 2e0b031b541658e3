//! The append-only ledger

use crate::chain::{entry_hash, GENESIS_HASH};
use crate::entry::{AuditEntry, AuditEvent};
use crate::error::LedgerError;
use crate::export::{AuditPackage, ExportFilter};
use crate::verify::{ChainFault, ChainFaultKind, ChainStatus, ChainVerification};
use chrono::Utc;
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;
use warden_types::{RequestId, TenantId};

/// The tamper-evident audit ledger.
///
/// Entries are kept in insertion order and never updated or deleted.
/// `append` holds the write lock across the read-previous-hash + insert
/// sequence, so concurrent writers are linearized and the chain cannot
/// fork.
pub struct AuditLedger {
    key: [u8; 32],
    inner: RwLock<ChainState>,
}

struct ChainState {
    entries: Vec<AuditEntry>,
    head: String,
}

impl AuditLedger {
    /// Create an empty ledger using the given MAC key.
    ///
    /// The key must come from the secret store collaborator; the ledger
    /// never generates or persists key material itself.
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key,
            inner: RwLock::new(ChainState {
                entries: Vec::new(),
                head: GENESIS_HASH.to_string(),
            }),
        }
    }

    /// Append an event, returning the new entry's id.
    pub fn append(&self, event: AuditEvent) -> Result<Uuid, LedgerError> {
        let mut state = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;

        let mut entry = AuditEntry {
            entry_id: Uuid::new_v4(),
            request_id: event.request_id,
            timestamp: Utc::now(),
            event_type: event.event_type,
            resource_type: event.resource_type,
            resource_id: event.resource_id,
            actor: event.actor,
            details: event.details,
            previous_hash: state.head.clone(),
            current_hash: String::new(),
        };
        entry.current_hash = entry_hash(&self.key, &entry, &state.head)?;

        debug!(
            entry_id = %entry.entry_id,
            event_type = %entry.event_type,
            resource_id = %entry.resource_id,
            "Audit entry appended"
        );

        state.head = entry.current_hash.clone();
        let entry_id = entry.entry_id;
        state.entries.push(entry);
        Ok(entry_id)
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.inner
            .read()
            .map(|state| state.entries.clone())
            .unwrap_or_default()
    }

    /// Entries recorded under a specific request.
    pub fn entries_for_request(&self, request_id: &RequestId) -> Vec<AuditEntry> {
        self.inner
            .read()
            .map(|state| {
                state
                    .entries
                    .iter()
                    .filter(|e| e.request_id == *request_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entries whose details carry the given tenant.
    pub fn entries_for_tenant(&self, tenant_id: &TenantId) -> Vec<AuditEntry> {
        let tenant = serde_json::Value::String(tenant_id.as_str().to_string());
        self.inner
            .read()
            .map(|state| {
                state
                    .entries
                    .iter()
                    .filter(|e| e.details.get("tenant_id") == Some(&tenant))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of entries in the chain.
    pub fn len(&self) -> usize {
        self.inner.read().map(|state| state.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hash of the most recently inserted entry (the genesis marker when
    /// the ledger is empty).
    pub fn head_hash(&self) -> String {
        self.inner
            .read()
            .map(|state| state.head.clone())
            .unwrap_or_else(|_| GENESIS_HASH.to_string())
    }

    /// Walk the full chain, recomputing each entry's hash and checking the
    /// previous-hash linkage independently.
    ///
    /// The hash check recomputes each entry's MAC from its stored fields.
    /// The linkage check compares each entry's stored `previous_hash` to
    /// both the stored and the recomputed hash of the entry before it, so
    /// a tampered entry surfaces twice: at itself (hash) and at its
    /// successor (linkage). Both checks are reported separately per entry
    /// and the walk never short-circuits, so one pass surfaces all
    /// tampering. Verification is read-only; the chain is never repaired.
    pub fn verify(&self) -> ChainVerification {
        let entries = self.entries();
        let mut errors = Vec::new();
        let mut prev_stored = GENESIS_HASH.to_string();
        let mut prev_recomputed = GENESIS_HASH.to_string();

        for (index, entry) in entries.iter().enumerate() {
            let recomputed = match entry_hash(&self.key, entry, &entry.previous_hash) {
                Ok(expected) => {
                    if expected != entry.current_hash {
                        errors.push(ChainFault {
                            entry_id: entry.entry_id,
                            index,
                            kind: ChainFaultKind::HashMismatch,
                            expected: expected.clone(),
                            actual: entry.current_hash.clone(),
                        });
                    }
                    expected
                }
                Err(e) => {
                    errors.push(ChainFault {
                        entry_id: entry.entry_id,
                        index,
                        kind: ChainFaultKind::HashMismatch,
                        expected: format!("unserializable entry: {}", e),
                        actual: entry.current_hash.clone(),
                    });
                    entry.current_hash.clone()
                }
            };

            if entry.previous_hash != prev_stored || entry.previous_hash != prev_recomputed {
                let expected = if entry.previous_hash != prev_recomputed {
                    prev_recomputed.clone()
                } else {
                    prev_stored.clone()
                };
                errors.push(ChainFault {
                    entry_id: entry.entry_id,
                    index,
                    kind: ChainFaultKind::LinkageMismatch,
                    expected,
                    actual: entry.previous_hash.clone(),
                });
            }

            prev_stored = entry.current_hash.clone();
            prev_recomputed = recomputed;
        }

        let status = if errors.is_empty() {
            ChainStatus::Ok
        } else {
            ChainStatus::Mismatch
        };

        ChainVerification {
            status,
            total_entries: entries.len(),
            errors,
        }
    }

    /// Export filtered entries together with a fresh full-chain
    /// verification result.
    pub fn export(&self, filter: ExportFilter) -> AuditPackage {
        let entries = match (&filter.request_id, &filter.tenant_id) {
            (Some(request_id), _) => self.entries_for_request(request_id),
            (None, Some(tenant_id)) => self.entries_for_tenant(tenant_id),
            (None, None) => self.entries(),
        };

        AuditPackage {
            package_id: Uuid::new_v4(),
            exported_at: Utc::now(),
            request_id: filter.request_id,
            tenant_id: filter.tenant_id,
            entry_count: entries.len(),
            entries,
            verification: self.verify(),
        }
    }

    /// Tamper with a stored entry. Test-only: exists so integrity tests can
    /// simulate retroactive edits against the in-memory store.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn tamper_with_entry(&self, index: usize, mutate: impl FnOnce(&mut AuditEntry)) {
        if let Ok(mut state) = self.inner.write() {
            if let Some(entry) = state.entries.get_mut(index) {
                mutate(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditEventType, AuditResourceType};
    use proptest::prelude::*;

    fn ledger() -> AuditLedger {
        AuditLedger::new([42u8; 32])
    }

    fn sample_event(request_id: RequestId) -> AuditEvent {
        AuditEvent::new(
            request_id,
            AuditEventType::TokenMinted,
            AuditResourceType::Token,
            "token:abc",
            "credential-authority",
        )
        .detail("tenant_id", "tenant-1")
    }

    #[test]
    fn test_append_links_chain() {
        let ledger = ledger();
        let request_id = RequestId::generate();

        ledger.append(sample_event(request_id)).unwrap();
        ledger.append(sample_event(request_id)).unwrap();
        ledger.append(sample_event(request_id)).unwrap();

        let entries = ledger.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].previous_hash, GENESIS_HASH);
        assert_eq!(entries[1].previous_hash, entries[0].current_hash);
        assert_eq!(entries[2].previous_hash, entries[1].current_hash);
        assert_eq!(ledger.head_hash(), entries[2].current_hash);
    }

    #[test]
    fn test_verify_ok_on_untouched_chain() {
        let ledger = ledger();
        for _ in 0..5 {
            ledger.append(sample_event(RequestId::generate())).unwrap();
        }

        let result = ledger.verify();
        assert!(result.is_ok());
        assert_eq!(result.total_entries, 5);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_verify_empty_chain_is_ok() {
        assert!(ledger().verify().is_ok());
    }

    #[test]
    fn test_tampered_field_breaks_hash_and_next_linkage() {
        let ledger = ledger();
        for _ in 0..4 {
            ledger.append(sample_event(RequestId::generate())).unwrap();
        }

        ledger.tamper_with_entry(1, |entry| {
            entry.resource_id = "token:forged".to_string();
        });

        let result = ledger.verify();
        assert_eq!(result.status, ChainStatus::Mismatch);

        // The tampered entry fails the recomputed-hash check, and its
        // successor's stored previous_hash no longer matches the entry's
        // true (recomputed) hash.
        assert!(result
            .errors
            .iter()
            .any(|f| f.index == 1 && f.kind == ChainFaultKind::HashMismatch));
        assert!(result
            .errors
            .iter()
            .any(|f| f.index == 2 && f.kind == ChainFaultKind::LinkageMismatch));

        // Entries past the tamper's blast radius verify clean.
        assert!(!result.errors.iter().any(|f| f.index == 3));
    }

    #[test]
    fn test_tampered_hash_breaks_entry_and_next_linkage() {
        let ledger = ledger();
        for _ in 0..4 {
            ledger.append(sample_event(RequestId::generate())).unwrap();
        }

        ledger.tamper_with_entry(1, |entry| {
            entry.current_hash = "0000".to_string();
        });

        let result = ledger.verify();
        assert_eq!(result.status, ChainStatus::Mismatch);

        assert!(result
            .errors
            .iter()
            .any(|f| f.index == 1 && f.kind == ChainFaultKind::HashMismatch));
        assert!(result
            .errors
            .iter()
            .any(|f| f.index == 2 && f.kind == ChainFaultKind::LinkageMismatch));
    }

    #[test]
    fn test_export_filters_by_request() {
        let ledger = ledger();
        let wanted = RequestId::generate();
        ledger.append(sample_event(wanted)).unwrap();
        ledger.append(sample_event(RequestId::generate())).unwrap();
        ledger.append(sample_event(wanted)).unwrap();

        let package = ledger.export(ExportFilter::for_request(wanted));
        assert_eq!(package.entry_count, 2);
        assert!(package.entries.iter().all(|e| e.request_id == wanted));
        assert!(package.verification.is_ok());
    }

    #[test]
    fn test_export_filters_by_tenant() {
        let ledger = ledger();
        ledger.append(sample_event(RequestId::generate())).unwrap();
        ledger
            .append(
                AuditEvent::new(
                    RequestId::generate(),
                    AuditEventType::AgentSpawned,
                    AuditResourceType::Agent,
                    "agent:xyz",
                    "orchestrator",
                )
                .detail("tenant_id", "tenant-2"),
            )
            .unwrap();

        let package = ledger.export(ExportFilter::for_tenant(TenantId::new("tenant-2")));
        assert_eq!(package.entry_count, 1);
        assert_eq!(package.entries[0].resource_id, "agent:xyz");
    }

    #[test]
    fn test_concurrent_appends_never_fork() {
        let ledger = std::sync::Arc::new(ledger());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let ledger = ledger.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..25 {
                    ledger.append(sample_event(RequestId::generate())).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.len(), 200);
        assert!(ledger.verify().is_ok());
    }

    proptest! {
        // Mutating any single hashed field of any entry must surface a
        // mismatch at that entry.
        #[test]
        fn property_any_field_mutation_is_detected(
            target in 0usize..6,
            field in 0usize..3,
            payload in "[a-z]{1,12}",
        ) {
            let ledger = ledger();
            for _ in 0..6 {
                ledger.append(sample_event(RequestId::generate())).unwrap();
            }

            ledger.tamper_with_entry(target, |entry| match field {
                0 => entry.resource_id = payload.clone(),
                1 => entry.actor = payload.clone(),
                _ => {
                    entry
                        .details
                        .insert("injected".to_string(), serde_json::json!(payload));
                }
            });

            let result = ledger.verify();
            prop_assert_eq!(result.status, ChainStatus::Mismatch);
            prop_assert!(result
                .errors
                .iter()
                .any(|f| f.index == target && f.kind == ChainFaultKind::HashMismatch));
        }
    }
}
