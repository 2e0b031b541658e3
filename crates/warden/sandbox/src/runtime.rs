//! Sandbox runtime collaborator interface

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use warden_types::{AgentId, ResourceLimits, SandboxId, TenantId};

/// Label key marking a sandbox as orchestrator-managed.
pub const MANAGED_BY_LABEL: &str = "managed_by";

/// Label value identifying this orchestrator's sandboxes.
pub const MANAGED_BY_VALUE: &str = "warden-orchestrator";

/// Label key carrying the owning agent id.
pub const AGENT_ID_LABEL: &str = "agent_id";

/// Label key carrying the tenant id.
pub const TENANT_ID_LABEL: &str = "tenant_id";

/// Hardening applied to every agent sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityOptions {
    pub read_only_rootfs: bool,
    pub run_as_non_root: bool,
    pub no_new_privileges: bool,
}

impl Default for SecurityOptions {
    fn default() -> Self {
        Self {
            read_only_rootfs: true,
            run_as_non_root: true,
            no_new_privileges: true,
        }
    }
}

/// Request to allocate a new isolated sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSpec {
    /// Image reference to run
    pub image: String,

    /// Environment passed to the workload
    pub env: BTreeMap<String, String>,

    /// CPU/memory ceilings
    pub limits: ResourceLimits,

    /// Per-tenant isolated network to attach to
    pub network: String,

    /// Hardening options
    pub security: SecurityOptions,

    /// Labels used for ownership tracking and orphan discovery
    pub labels: BTreeMap<String, String>,
}

/// Point-in-time resource counters for a sandbox.
///
/// CPU counters are cumulative; callers compute utilization from deltas
/// between two samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxStats {
    pub cpu_cumulative_ns: u64,
    pub system_cpu_ns: u64,
    pub online_cpus: u32,
    pub mem_used_bytes: u64,
    pub mem_limit_bytes: u64,
}

/// A sandbox carrying the orchestrator-managed label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedSandbox {
    pub sandbox_id: SandboxId,
    pub agent_id: Option<AgentId>,
    pub tenant_id: Option<TenantId>,
}

/// Sandbox runtime errors.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Sandbox not found: {0}")]
    NotFound(SandboxId),

    #[error("Sandbox creation failed: {0}")]
    CreateFailed(String),

    #[error("Sandbox operation failed for {sandbox_id}: {reason}")]
    OperationFailed {
        sandbox_id: SandboxId,
        reason: String,
    },

    #[error("Sandbox stats unavailable: {0}")]
    StatsUnavailable(String),
}

/// Container/process isolation API consumed by the orchestrator.
///
/// `stop` and `remove` of a missing sandbox report [`SandboxError::NotFound`]
/// so callers can treat "already gone" as success during cleanup.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Allocate a sandbox. The sandbox is created stopped; `start` launches it.
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxId, SandboxError>;

    async fn start(&self, sandbox_id: &SandboxId) -> Result<(), SandboxError>;

    async fn stop(&self, sandbox_id: &SandboxId) -> Result<(), SandboxError>;

    /// Pause execution without losing state.
    async fn pause(&self, sandbox_id: &SandboxId) -> Result<(), SandboxError>;

    async fn unpause(&self, sandbox_id: &SandboxId) -> Result<(), SandboxError>;

    async fn remove(&self, sandbox_id: &SandboxId) -> Result<(), SandboxError>;

    async fn stats(&self, sandbox_id: &SandboxId) -> Result<SandboxStats, SandboxError>;

    /// Enumerate sandboxes carrying the orchestrator-managed label.
    async fn list_managed(&self) -> Result<Vec<ManagedSandbox>, SandboxError>;
}
