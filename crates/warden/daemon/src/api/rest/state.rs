//! Shared API state

use std::sync::Arc;
use warden_authority::CredentialAuthority;
use warden_ledger::AuditLedger;
use warden_orchestrator::AgentOrchestrator;

/// State shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub authority: Arc<CredentialAuthority>,
    pub orchestrator: Arc<AgentOrchestrator>,
    pub ledger: Arc<AuditLedger>,
}

impl AppState {
    pub fn new(
        authority: Arc<CredentialAuthority>,
        orchestrator: Arc<AgentOrchestrator>,
        ledger: Arc<AuditLedger>,
    ) -> Self {
        Self {
            authority,
            orchestrator,
            ledger,
        }
    }
}
