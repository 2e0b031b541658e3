//! Agent instance state tracking
//!
//! The `AgentStatus` state machine:
//!
//! ```text
//! CREATED -> SPAWNING -> ACTIVE <-> {BUSY, IDLE} -> SUSPENDED -> {ACTIVE, TERMINATING}
//!                                       |                              |
//!                                       +---------> TERMINATING -> TERMINATED
//! ```
//!
//! Any non-terminal state may transition to ERROR on unrecoverable fault;
//! ERROR and TERMINATED are terminal. TERMINATING is reachable from any
//! non-terminal state so that cleanup can always run.

use crate::{AgentId, AgentRole, SandboxId, TenantId, TokenId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Agent lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Created,
    Spawning,
    Active,
    Busy,
    Idle,
    Suspended,
    Terminating,
    Terminated,
    Error,
}

impl AgentStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Terminated | AgentStatus::Error)
    }

    /// States in which the monitoring loop polls the agent.
    pub fn is_monitorable(&self) -> bool {
        matches!(
            self,
            AgentStatus::Active | AgentStatus::Busy | AgentStatus::Idle
        )
    }

    /// States in which a sandbox must be allocated to the instance.
    pub fn has_sandbox(&self) -> bool {
        matches!(
            self,
            AgentStatus::Active
                | AgentStatus::Busy
                | AgentStatus::Idle
                | AgentStatus::Suspended
                | AgentStatus::Terminating
        )
    }

    /// Whether the transition `self -> to` is legal.
    pub fn can_transition_to(&self, to: AgentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        // Error absorbs any fault; Terminating is always reachable for cleanup.
        if to == AgentStatus::Error || to == AgentStatus::Terminating {
            return true;
        }
        match (self, to) {
            (AgentStatus::Created, AgentStatus::Spawning) => true,
            (AgentStatus::Spawning, AgentStatus::Active) => true,
            (AgentStatus::Active, AgentStatus::Busy | AgentStatus::Idle) => true,
            (AgentStatus::Busy, AgentStatus::Active | AgentStatus::Idle) => true,
            (AgentStatus::Idle, AgentStatus::Active | AgentStatus::Busy) => true,
            (
                AgentStatus::Active | AgentStatus::Busy | AgentStatus::Idle,
                AgentStatus::Suspended,
            ) => true,
            (AgentStatus::Suspended, AgentStatus::Active) => true,
            (AgentStatus::Terminating, AgentStatus::Terminated) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentStatus::Created => "created",
            AgentStatus::Spawning => "spawning",
            AgentStatus::Active => "active",
            AgentStatus::Busy => "busy",
            AgentStatus::Idle => "idle",
            AgentStatus::Suspended => "suspended",
            AgentStatus::Terminating => "terminating",
            AgentStatus::Terminated => "terminated",
            AgentStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Health check outcome for an agent endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Unhealthy { code: u16 },
    Unreachable,
    Unknown,
}

impl HealthState {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Healthy)
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Unhealthy { code } => write!(f, "unhealthy ({})", code),
            HealthState::Unreachable => write!(f, "unreachable"),
            HealthState::Unknown => write!(f, "unknown"),
        }
    }
}

/// A running (or terminated) agent instance.
///
/// Owned exclusively by the orchestrator. `sandbox_id` is set iff the status
/// is one of the sandbox-holding states; the instance never outlives its
/// bound token's validity window without transitioning to TERMINATED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInstance {
    pub agent_id: AgentId,
    pub tenant_id: TenantId,
    pub role: AgentRole,
    pub status: AgentStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_id: Option<SandboxId>,

    /// Agent-supplied health endpoint, if the sandbox exposes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,

    pub bound_token_id: TokenId,
    pub token_expires_at: DateTime<Utc>,

    pub cpu_usage_pct: f64,
    pub memory_usage_pct: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,

    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminated_at: Option<DateTime<Utc>>,

    pub health: HealthState,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AgentInstance {
    /// The bound token's absolute deadline has passed.
    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.token_expires_at
    }

    /// Total runtime exceeds the configured maximum.
    pub fn exceeded_runtime(&self, now: DateTime<Utc>, max_runtime: std::time::Duration) -> bool {
        let max = Duration::from_std(max_runtime).unwrap_or_else(|_| Duration::MAX);
        now - self.started_at > max
    }

    /// Idle (no recorded activity) longer than the configured maximum.
    pub fn idle_longer_than(&self, now: DateTime<Utc>, max_idle: std::time::Duration) -> bool {
        let max = Duration::from_std(max_idle).unwrap_or_else(|_| Duration::MAX);
        match self.last_activity {
            Some(last) => now - last > max,
            None => false,
        }
    }
}
