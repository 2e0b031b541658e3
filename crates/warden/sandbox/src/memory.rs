//! In-memory sandbox runtime
//!
//! Used by the development profile and the test suites. Simulates cumulative
//! CPU counters so callers exercising delta-based utilization math see
//! realistic samples.

use crate::runtime::{
    ManagedSandbox, SandboxError, SandboxRuntime, SandboxSpec, SandboxStats, AGENT_ID_LABEL,
    MANAGED_BY_LABEL, MANAGED_BY_VALUE, TENANT_ID_LABEL,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;
use warden_types::{AgentId, SandboxId, TenantId};

const SYSTEM_TICK_NS: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SandboxState {
    Created,
    Running,
    Paused,
    Stopped,
}

struct SandboxRecord {
    spec: SandboxSpec,
    state: SandboxState,
    cpu_cumulative_ns: u64,
    system_cpu_ns: u64,
    /// Fraction of one core consumed per system tick; drives the simulated
    /// cumulative counters.
    busy_fraction: f64,
    mem_used_bytes: u64,
}

/// In-memory [`SandboxRuntime`] implementation.
pub struct InMemorySandboxRuntime {
    sandboxes: DashMap<SandboxId, SandboxRecord>,
    fail_next_create: AtomicBool,
}

impl InMemorySandboxRuntime {
    pub fn new() -> Self {
        Self {
            sandboxes: DashMap::new(),
            fail_next_create: AtomicBool::new(false),
        }
    }

    /// Make the next `create` call fail. Lets tests exercise the
    /// partial-spawn path.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Set the simulated load for a sandbox: the fraction of one core it
    /// burns per stats interval, and its current memory footprint.
    pub fn set_load(&self, sandbox_id: &SandboxId, busy_fraction: f64, mem_used_bytes: u64) {
        if let Some(mut record) = self.sandboxes.get_mut(sandbox_id) {
            record.busy_fraction = busy_fraction.clamp(0.0, 1.0);
            record.mem_used_bytes = mem_used_bytes;
        }
    }

    /// Register a sandbox that no instance owns, as if left behind by a
    /// previous process. Used to exercise orphan cleanup.
    pub fn register_orphan(&self, agent_id: Option<AgentId>, tenant_id: Option<TenantId>) -> SandboxId {
        let sandbox_id = SandboxId::new(format!("sbx-{}", &Uuid::new_v4().simple().to_string()[..12]));
        let mut labels = std::collections::BTreeMap::new();
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
        if let Some(agent_id) = &agent_id {
            labels.insert(AGENT_ID_LABEL.to_string(), agent_id.to_string());
        }
        if let Some(tenant_id) = &tenant_id {
            labels.insert(TENANT_ID_LABEL.to_string(), tenant_id.to_string());
        }

        let spec = SandboxSpec {
            image: "warden/orphan:latest".to_string(),
            env: Default::default(),
            limits: Default::default(),
            network: "orphan-net".to_string(),
            security: Default::default(),
            labels,
        };

        self.sandboxes.insert(
            sandbox_id.clone(),
            SandboxRecord {
                spec,
                state: SandboxState::Running,
                cpu_cumulative_ns: 0,
                system_cpu_ns: 0,
                busy_fraction: 0.0,
                mem_used_bytes: 0,
            },
        );
        sandbox_id
    }

    /// Whether a sandbox still exists in the runtime.
    pub fn contains(&self, sandbox_id: &SandboxId) -> bool {
        self.sandboxes.contains_key(sandbox_id)
    }

    /// Current lifecycle state, for assertions.
    pub fn is_paused(&self, sandbox_id: &SandboxId) -> bool {
        self.sandboxes
            .get(sandbox_id)
            .map(|r| r.state == SandboxState::Paused)
            .unwrap_or(false)
    }
}

impl Default for InMemorySandboxRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxRuntime for InMemorySandboxRuntime {
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxId, SandboxError> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(SandboxError::CreateFailed(
                "injected create failure".to_string(),
            ));
        }

        let sandbox_id =
            SandboxId::new(format!("sbx-{}", &Uuid::new_v4().simple().to_string()[..12]));
        debug!(sandbox_id = %sandbox_id, image = %spec.image, "Created sandbox");

        self.sandboxes.insert(
            sandbox_id.clone(),
            SandboxRecord {
                spec: spec.clone(),
                state: SandboxState::Created,
                cpu_cumulative_ns: 0,
                system_cpu_ns: 0,
                busy_fraction: 0.0,
                mem_used_bytes: 0,
            },
        );
        Ok(sandbox_id)
    }

    async fn start(&self, sandbox_id: &SandboxId) -> Result<(), SandboxError> {
        let mut record = self
            .sandboxes
            .get_mut(sandbox_id)
            .ok_or_else(|| SandboxError::NotFound(sandbox_id.clone()))?;
        record.state = SandboxState::Running;
        Ok(())
    }

    async fn stop(&self, sandbox_id: &SandboxId) -> Result<(), SandboxError> {
        let mut record = self
            .sandboxes
            .get_mut(sandbox_id)
            .ok_or_else(|| SandboxError::NotFound(sandbox_id.clone()))?;
        record.state = SandboxState::Stopped;
        Ok(())
    }

    async fn pause(&self, sandbox_id: &SandboxId) -> Result<(), SandboxError> {
        let mut record = self
            .sandboxes
            .get_mut(sandbox_id)
            .ok_or_else(|| SandboxError::NotFound(sandbox_id.clone()))?;
        if record.state != SandboxState::Running {
            return Err(SandboxError::OperationFailed {
                sandbox_id: sandbox_id.clone(),
                reason: format!("cannot pause from state {:?}", record.state),
            });
        }
        record.state = SandboxState::Paused;
        Ok(())
    }

    async fn unpause(&self, sandbox_id: &SandboxId) -> Result<(), SandboxError> {
        let mut record = self
            .sandboxes
            .get_mut(sandbox_id)
            .ok_or_else(|| SandboxError::NotFound(sandbox_id.clone()))?;
        if record.state != SandboxState::Paused {
            return Err(SandboxError::OperationFailed {
                sandbox_id: sandbox_id.clone(),
                reason: format!("cannot unpause from state {:?}", record.state),
            });
        }
        record.state = SandboxState::Running;
        Ok(())
    }

    async fn remove(&self, sandbox_id: &SandboxId) -> Result<(), SandboxError> {
        self.sandboxes
            .remove(sandbox_id)
            .map(|_| ())
            .ok_or_else(|| SandboxError::NotFound(sandbox_id.clone()))
    }

    async fn stats(&self, sandbox_id: &SandboxId) -> Result<SandboxStats, SandboxError> {
        let mut record = self
            .sandboxes
            .get_mut(sandbox_id)
            .ok_or_else(|| SandboxError::NotFound(sandbox_id.clone()))?;

        // Advance the simulated cumulative counters by one system tick.
        record.system_cpu_ns += SYSTEM_TICK_NS;
        if record.state == SandboxState::Running {
            record.cpu_cumulative_ns += (SYSTEM_TICK_NS as f64 * record.busy_fraction) as u64;
        }

        Ok(SandboxStats {
            cpu_cumulative_ns: record.cpu_cumulative_ns,
            system_cpu_ns: record.system_cpu_ns,
            online_cpus: 1,
            mem_used_bytes: record.mem_used_bytes,
            mem_limit_bytes: record.spec.limits.memory_bytes,
        })
    }

    async fn list_managed(&self) -> Result<Vec<ManagedSandbox>, SandboxError> {
        let managed = self
            .sandboxes
            .iter()
            .filter(|item| {
                item.value().spec.labels.get(MANAGED_BY_LABEL).map(String::as_str)
                    == Some(MANAGED_BY_VALUE)
            })
            .map(|item| ManagedSandbox {
                sandbox_id: item.key().clone(),
                agent_id: item
                    .value()
                    .spec
                    .labels
                    .get(AGENT_ID_LABEL)
                    .and_then(|raw| AgentId::parse(raw).ok()),
                tenant_id: item
                    .value()
                    .spec
                    .labels
                    .get(TENANT_ID_LABEL)
                    .map(TenantId::new),
            })
            .collect();
        Ok(managed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn managed_spec() -> SandboxSpec {
        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
        SandboxSpec {
            image: "warden/test:latest".to_string(),
            env: BTreeMap::new(),
            limits: Default::default(),
            network: "tenant-test-net".to_string(),
            security: Default::default(),
            labels,
        }
    }

    #[tokio::test]
    async fn test_create_start_stop_remove() {
        let runtime = InMemorySandboxRuntime::new();
        let id = runtime.create(&managed_spec()).await.unwrap();

        runtime.start(&id).await.unwrap();
        runtime.stop(&id).await.unwrap();
        runtime.remove(&id).await.unwrap();

        assert!(matches!(
            runtime.stop(&id).await,
            Err(SandboxError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pause_requires_running() {
        let runtime = InMemorySandboxRuntime::new();
        let id = runtime.create(&managed_spec()).await.unwrap();

        assert!(runtime.pause(&id).await.is_err());
        runtime.start(&id).await.unwrap();
        runtime.pause(&id).await.unwrap();
        assert!(runtime.is_paused(&id));
        runtime.unpause(&id).await.unwrap();
        assert!(!runtime.is_paused(&id));
    }

    #[tokio::test]
    async fn test_stats_advance_cumulative_counters() {
        let runtime = InMemorySandboxRuntime::new();
        let id = runtime.create(&managed_spec()).await.unwrap();
        runtime.start(&id).await.unwrap();
        runtime.set_load(&id, 0.5, 1024);

        let first = runtime.stats(&id).await.unwrap();
        let second = runtime.stats(&id).await.unwrap();

        assert!(second.system_cpu_ns > first.system_cpu_ns);
        assert!(second.cpu_cumulative_ns > first.cpu_cumulative_ns);
        assert_eq!(second.mem_used_bytes, 1024);
    }

    #[tokio::test]
    async fn test_injected_create_failure_fires_once() {
        let runtime = InMemorySandboxRuntime::new();
        runtime.fail_next_create();

        assert!(runtime.create(&managed_spec()).await.is_err());
        assert!(runtime.create(&managed_spec()).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_managed_filters_by_label() {
        let runtime = InMemorySandboxRuntime::new();
        runtime.create(&managed_spec()).await.unwrap();

        let mut unmanaged = managed_spec();
        unmanaged.labels.clear();
        runtime.create(&unmanaged).await.unwrap();

        let managed = runtime.list_managed().await.unwrap();
        assert_eq!(managed.len(), 1);
    }
}
