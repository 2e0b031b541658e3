//! Orchestrator error types

use std::collections::BTreeSet;
use thiserror::Error;
use warden_authority::AuthorityError;
use warden_sandbox::SandboxError;
use warden_types::{AgentId, AgentRole, AgentStatus};

/// Agent lifecycle errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Agent not found: {0}")]
    NotFound(AgentId),

    #[error("Illegal transition: {from} -> {to}")]
    IllegalTransition { from: AgentStatus, to: AgentStatus },

    /// The granted scope set would not cover the role's minimum operations
    #[error("Insufficient scopes for role {role}: missing {missing:?}")]
    InsufficientScopes {
        role: AgentRole,
        missing: BTreeSet<String>,
    },

    #[error("Sandbox runtime error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("Authority error: {0}")]
    Authority(#[from] AuthorityError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] warden_ledger::LedgerError),
}
