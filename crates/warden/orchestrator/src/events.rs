//! Lifecycle events emitted by the orchestrator

use warden_types::{AgentId, AgentStatus, SandboxId};

/// Events broadcast to [`crate::AgentOrchestrator::subscribe`] listeners.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Agent spawned and entered ACTIVE.
    Spawned(AgentId),

    /// Status transition.
    StatusChanged {
        agent_id: AgentId,
        from: AgentStatus,
        to: AgentStatus,
    },

    /// Sandbox paused by the idle policy or an operator.
    Suspended { agent_id: AgentId, reason: String },

    /// Sandbox unpaused.
    Resumed(AgentId),

    /// Agent terminated and its token revoked.
    Terminated { agent_id: AgentId, reason: String },

    /// Orphaned sandbox removed by the reconciliation sweep.
    OrphanRemoved(SandboxId),
}
