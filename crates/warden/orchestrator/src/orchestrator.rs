//! The agent lifecycle orchestrator

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::events::AgentEvent;
use crate::monitor::MonitorHandle;
use crate::report::{CleanupReport, CleanupStep};
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use warden_authority::{CredentialAuthority, MintRequest};
use warden_ledger::{AuditEvent, AuditEventType, AuditLedger, AuditResourceType};
use warden_sandbox::{
    HealthProbe, SandboxError, SandboxRuntime, SandboxSpec, AGENT_ID_LABEL, MANAGED_BY_LABEL,
    MANAGED_BY_VALUE, TENANT_ID_LABEL,
};
use warden_types::{
    AgentId, AgentInstance, AgentRole, AgentStatus, HealthState, RequestId, ResourceLimits,
    SandboxId, TenantId,
};

const ACTOR: &str = "agent-orchestrator";

/// Request to spawn a new agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub role: AgentRole,
    pub tenant_id: TenantId,
    pub scopes: BTreeSet<String>,

    /// CPU/memory ceilings; role defaults apply when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceLimits>,

    /// Health endpoint exposed by the agent workload, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,

    pub reason: String,
}

/// Fleet-wide counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetMetrics {
    pub total_agents: usize,
    pub agents_by_role: BTreeMap<String, usize>,
    pub agents_by_status: BTreeMap<String, usize>,
    pub total_cpu_pct: f64,
    pub total_memory_pct: f64,
    pub active_monitors: usize,
}

/// Spawns, supervises, and tears down sandboxed agents.
///
/// One monitoring task runs per monitored agent; tasks are cooperatively
/// cancellable and independent, so one agent's fault never stalls another's
/// loop. The orchestrator owns `AgentInstance` state exclusively; token
/// state is only ever touched through the credential authority.
pub struct AgentOrchestrator {
    authority: Arc<CredentialAuthority>,
    ledger: Arc<AuditLedger>,
    runtime: Arc<dyn SandboxRuntime>,
    probe: Arc<dyn HealthProbe>,
    pub(crate) config: OrchestratorConfig,

    pub(crate) agents: DashMap<AgentId, AgentInstance>,
    pub(crate) monitors: DashMap<AgentId, MonitorHandle>,
    /// Signed credentials for health-probe bearer auth, kept off the
    /// instance so API responses never carry them.
    pub(crate) credentials: DashMap<AgentId, String>,

    event_tx: broadcast::Sender<AgentEvent>,
}

impl AgentOrchestrator {
    pub fn new(
        authority: Arc<CredentialAuthority>,
        ledger: Arc<AuditLedger>,
        runtime: Arc<dyn SandboxRuntime>,
        probe: Arc<dyn HealthProbe>,
        config: OrchestratorConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            authority,
            ledger,
            runtime,
            probe,
            config,
            agents: DashMap::new(),
            monitors: DashMap::new(),
            credentials: DashMap::new(),
            event_tx,
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn runtime(&self) -> &Arc<dyn SandboxRuntime> {
        &self.runtime
    }

    pub(crate) fn probe(&self) -> &Arc<dyn HealthProbe> {
        &self.probe
    }

    /// Spawn an agent bound to a freshly minted token.
    ///
    /// On sandbox-start failure the minted token is NOT rolled back: the
    /// instance is discarded and the error surfaced, leaving the token for
    /// explicit revocation or the authority's expiry sweep.
    #[instrument(skip(self, request), fields(role = %request.role, tenant_id = %request.tenant_id))]
    pub async fn spawn(
        self: &Arc<Self>,
        request: SpawnRequest,
    ) -> Result<AgentInstance, OrchestratorError> {
        let request_id = RequestId::generate();

        // Refuse before minting if the grant could not cover the role's
        // minimum operations.
        let allowed = self.authority.scopes_for_role(request.role);
        let preview: BTreeSet<String> = request.scopes.intersection(&allowed).cloned().collect();
        let minimum = self.authority.minimum_scopes(request.role);
        let missing: BTreeSet<String> = minimum.difference(&preview).cloned().collect();
        if !missing.is_empty() {
            return Err(OrchestratorError::InsufficientScopes {
                role: request.role,
                missing,
            });
        }

        let token = self.authority.mint(MintRequest {
            role: request.role,
            tenant_id: request.tenant_id.clone(),
            ttl_minutes: self.config.token_ttl_minutes(),
            scopes: request.scopes.clone(),
            reason: request.reason.clone(),
            parent_token_id: None,
            request_id,
        })?;

        let agent_id = AgentId::generate();
        let limits = request
            .limits
            .unwrap_or_else(|| ResourceLimits::for_role(request.role));
        let spec = self.sandbox_spec(agent_id, &request, &token.signed_value, limits);

        let now = Utc::now();
        let mut instance = AgentInstance {
            agent_id,
            tenant_id: request.tenant_id.clone(),
            role: request.role,
            status: AgentStatus::Spawning,
            sandbox_id: None,
            endpoint_url: request.endpoint_url.clone(),
            bound_token_id: token.token_id,
            token_expires_at: token.expires_at,
            cpu_usage_pct: 0.0,
            memory_usage_pct: 0.0,
            last_activity: Some(now),
            started_at: now,
            terminated_at: None,
            health: HealthState::Unknown,
            error_message: None,
        };

        let sandbox_id = match self.runtime.create(&spec).await {
            Ok(sandbox_id) => sandbox_id,
            Err(e) => {
                self.audit_spawn_failure(request_id, agent_id, &request, &token.token_id, &e);
                return Err(e.into());
            }
        };

        if let Err(e) = self.runtime.start(&sandbox_id).await {
            // Best-effort: don't leave the dead sandbox behind.
            if let Err(remove_err) = self.runtime.remove(&sandbox_id).await {
                warn!(sandbox_id = %sandbox_id, error = %remove_err, "Failed to remove dead sandbox");
            }
            self.audit_spawn_failure(request_id, agent_id, &request, &token.token_id, &e);
            return Err(e.into());
        }

        instance.sandbox_id = Some(sandbox_id.clone());
        instance.status = AgentStatus::Active;
        instance.started_at = Utc::now();

        self.credentials.insert(agent_id, token.signed_value.clone());
        self.agents.insert(agent_id, instance.clone());
        self.start_monitor(agent_id);

        self.ledger.append(
            AuditEvent::new(
                request_id,
                AuditEventType::AgentSpawned,
                AuditResourceType::Agent,
                agent_id.to_string(),
                ACTOR,
            )
            .detail("role", request.role)
            .detail("tenant_id", request.tenant_id.as_str())
            .detail("sandbox_id", sandbox_id.as_str())
            .detail("token_id", token.token_id.to_string()),
        )?;

        let _ = self.event_tx.send(AgentEvent::Spawned(agent_id));
        info!(agent_id = %agent_id, sandbox_id = %sandbox_id, "Agent spawned");

        Ok(instance)
    }

    /// Terminate an agent, best-effort.
    ///
    /// All four sub-steps (cancel monitor, revoke token, stop sandbox,
    /// remove sandbox) are attempted even if earlier ones fail; outcomes
    /// are aggregated in the returned report. Safe to call concurrently
    /// with an in-flight monitoring iteration: every sub-step tolerates
    /// already-done state.
    #[instrument(skip(self))]
    pub async fn terminate(
        &self,
        agent_id: AgentId,
        reason: &str,
    ) -> Result<CleanupReport, OrchestratorError> {
        let request_id = RequestId::generate();
        let mut report = CleanupReport::new(agent_id);

        let (token_id, sandbox_id, tenant_id) = {
            let mut entry = self
                .agents
                .get_mut(&agent_id)
                .ok_or(OrchestratorError::NotFound(agent_id))?;

            if entry.status.is_terminal() {
                report.push(CleanupStep::skipped("terminate", "already terminal"));
                return Ok(report);
            }

            self.set_status(&mut entry, AgentStatus::Terminating)?;
            (
                entry.bound_token_id,
                entry.sandbox_id.clone(),
                entry.tenant_id.clone(),
            )
        };

        // 1. Cancel the monitoring task.
        match self.monitors.remove(&agent_id) {
            Some((_, handle)) => {
                handle.cancel();
                report.push(CleanupStep::ok("cancel_monitor"));
            }
            None => report.push(CleanupStep::skipped("cancel_monitor", "no monitor running")),
        }

        // 2. Revoke the bound token (already-revoked is an empty-delta success).
        match self
            .authority
            .revoke(token_id, &format!("agent_termination: {reason}"), request_id)
        {
            Ok(_) => report.push(CleanupStep::ok("revoke_token")),
            Err(e) => report.push(CleanupStep::failed("revoke_token", e.to_string())),
        }

        // 3. Stop the sandbox, tolerating "already gone".
        match &sandbox_id {
            Some(sandbox_id) => match self.runtime.stop(sandbox_id).await {
                Ok(()) => report.push(CleanupStep::ok("stop_sandbox")),
                Err(SandboxError::NotFound(_)) => {
                    report.push(CleanupStep::skipped("stop_sandbox", "already gone"))
                }
                Err(e) => report.push(CleanupStep::failed("stop_sandbox", e.to_string())),
            },
            None => report.push(CleanupStep::skipped("stop_sandbox", "no sandbox")),
        }

        // 4. Remove the sandbox, tolerating "already gone".
        match &sandbox_id {
            Some(sandbox_id) => match self.runtime.remove(sandbox_id).await {
                Ok(()) => report.push(CleanupStep::ok("remove_sandbox")),
                Err(SandboxError::NotFound(_)) => {
                    report.push(CleanupStep::skipped("remove_sandbox", "already gone"))
                }
                Err(e) => report.push(CleanupStep::failed("remove_sandbox", e.to_string())),
            },
            None => report.push(CleanupStep::skipped("remove_sandbox", "no sandbox")),
        }

        self.credentials.remove(&agent_id);

        if let Some(mut entry) = self.agents.get_mut(&agent_id) {
            if !entry.status.is_terminal() {
                self.set_status(&mut entry, AgentStatus::Terminated)?;
            }
            entry.terminated_at = Some(Utc::now());
            entry.sandbox_id = None;
            if let Some(summary) = report.failure_summary() {
                entry.error_message = Some(summary);
            }
        }

        self.ledger.append(
            AuditEvent::new(
                request_id,
                AuditEventType::AgentTerminated,
                AuditResourceType::Agent,
                agent_id.to_string(),
                ACTOR,
            )
            .detail("reason", reason)
            .detail("tenant_id", tenant_id.as_str())
            .detail("clean", report.is_clean())
            .detail("failures", report.failure_summary()),
        )?;

        let _ = self.event_tx.send(AgentEvent::Terminated {
            agent_id,
            reason: reason.to_string(),
        });
        info!(agent_id = %agent_id, reason = %reason, clean = report.is_clean(), "Agent terminated");

        Ok(report)
    }

    /// Pause an agent's sandbox without revoking its token.
    ///
    /// Legal only from ACTIVE, BUSY, or IDLE.
    #[instrument(skip(self))]
    pub async fn suspend(&self, agent_id: AgentId, reason: &str) -> Result<(), OrchestratorError> {
        let (sandbox_id, tenant_id) = {
            let entry = self
                .agents
                .get(&agent_id)
                .ok_or(OrchestratorError::NotFound(agent_id))?;

            if !entry.status.can_transition_to(AgentStatus::Suspended) {
                return Err(OrchestratorError::IllegalTransition {
                    from: entry.status,
                    to: AgentStatus::Suspended,
                });
            }
            let sandbox_id =
                entry
                    .sandbox_id
                    .clone()
                    .ok_or(OrchestratorError::IllegalTransition {
                        from: entry.status,
                        to: AgentStatus::Suspended,
                    })?;
            (sandbox_id, entry.tenant_id.clone())
        };

        self.runtime.pause(&sandbox_id).await?;

        // The monitoring loop exits once the agent leaves the monitored
        // set; drop its handle so resume can start a fresh one.
        if let Some((_, handle)) = self.monitors.remove(&agent_id) {
            handle.cancel();
        }

        if let Some(mut entry) = self.agents.get_mut(&agent_id) {
            self.set_status(&mut entry, AgentStatus::Suspended)?;
        }

        self.ledger.append(
            AuditEvent::new(
                RequestId::generate(),
                AuditEventType::AgentSuspended,
                AuditResourceType::Agent,
                agent_id.to_string(),
                ACTOR,
            )
            .detail("reason", reason)
            .detail("tenant_id", tenant_id.as_str()),
        )?;

        let _ = self.event_tx.send(AgentEvent::Suspended {
            agent_id,
            reason: reason.to_string(),
        });
        info!(agent_id = %agent_id, reason = %reason, "Agent suspended");

        Ok(())
    }

    /// Unpause a suspended agent and restart its monitoring task.
    #[instrument(skip(self))]
    pub async fn resume(self: &Arc<Self>, agent_id: AgentId) -> Result<(), OrchestratorError> {
        let (sandbox_id, tenant_id) = {
            let entry = self
                .agents
                .get(&agent_id)
                .ok_or(OrchestratorError::NotFound(agent_id))?;

            if entry.status != AgentStatus::Suspended {
                return Err(OrchestratorError::IllegalTransition {
                    from: entry.status,
                    to: AgentStatus::Active,
                });
            }
            let sandbox_id =
                entry
                    .sandbox_id
                    .clone()
                    .ok_or(OrchestratorError::IllegalTransition {
                        from: entry.status,
                        to: AgentStatus::Active,
                    })?;
            (sandbox_id, entry.tenant_id.clone())
        };

        self.runtime.unpause(&sandbox_id).await?;

        if let Some(mut entry) = self.agents.get_mut(&agent_id) {
            self.set_status(&mut entry, AgentStatus::Active)?;
            // A fresh activity mark, so the idle policy doesn't instantly
            // re-suspend the agent it just woke.
            entry.last_activity = Some(Utc::now());
        }
        self.start_monitor(agent_id);

        self.ledger.append(
            AuditEvent::new(
                RequestId::generate(),
                AuditEventType::AgentResumed,
                AuditResourceType::Agent,
                agent_id.to_string(),
                ACTOR,
            )
            .detail("tenant_id", tenant_id.as_str()),
        )?;

        let _ = self.event_tx.send(AgentEvent::Resumed(agent_id));
        info!(agent_id = %agent_id, "Agent resumed");

        Ok(())
    }

    /// All agents, optionally filtered by tenant.
    pub fn list(&self, tenant_id: Option<&TenantId>) -> Vec<AgentInstance> {
        self.agents
            .iter()
            .filter(|entry| match tenant_id {
                Some(tenant) => entry.tenant_id == *tenant,
                None => true,
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Current state of one agent.
    pub fn status(&self, agent_id: AgentId) -> Result<AgentInstance, OrchestratorError> {
        self.agents
            .get(&agent_id)
            .map(|entry| entry.value().clone())
            .ok_or(OrchestratorError::NotFound(agent_id))
    }

    /// Remove managed sandboxes that no registered instance owns.
    ///
    /// Covers sandboxes left behind by a crash or restart. Each orphan is
    /// removed exactly once; a second consecutive call is a no-op.
    #[instrument(skip(self))]
    pub async fn cleanup_orphans(&self) -> Result<Vec<SandboxId>, OrchestratorError> {
        let managed = self.runtime.list_managed().await?;

        let owned: HashSet<SandboxId> = self
            .agents
            .iter()
            .filter_map(|entry| entry.sandbox_id.clone())
            .collect();

        let mut removed = Vec::new();
        for sandbox in managed {
            if owned.contains(&sandbox.sandbox_id) {
                continue;
            }

            if let Err(e) = self.runtime.stop(&sandbox.sandbox_id).await {
                if !matches!(e, SandboxError::NotFound(_)) {
                    warn!(sandbox_id = %sandbox.sandbox_id, error = %e, "Failed to stop orphan");
                }
            }
            match self.runtime.remove(&sandbox.sandbox_id).await {
                Ok(()) => {}
                Err(SandboxError::NotFound(_)) => continue,
                Err(e) => {
                    warn!(sandbox_id = %sandbox.sandbox_id, error = %e, "Failed to remove orphan");
                    continue;
                }
            }

            self.ledger.append(
                AuditEvent::new(
                    RequestId::generate(),
                    AuditEventType::OrphanRemoved,
                    AuditResourceType::Sandbox,
                    sandbox.sandbox_id.as_str(),
                    ACTOR,
                )
                .detail("agent_id", sandbox.agent_id.map(|id| id.to_string()))
                .detail("tenant_id", sandbox.tenant_id.as_ref().map(|t| t.as_str())),
            )?;

            let _ = self
                .event_tx
                .send(AgentEvent::OrphanRemoved(sandbox.sandbox_id.clone()));
            info!(sandbox_id = %sandbox.sandbox_id, "Removed orphaned sandbox");
            removed.push(sandbox.sandbox_id);
        }

        Ok(removed)
    }

    /// Fleet-wide counters.
    pub fn metrics(&self) -> FleetMetrics {
        let mut by_role: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_cpu = 0.0;
        let mut total_memory = 0.0;
        let mut total = 0usize;

        for entry in self.agents.iter() {
            total += 1;
            *by_role.entry(entry.role.to_string()).or_insert(0) += 1;
            *by_status.entry(entry.status.to_string()).or_insert(0) += 1;
            total_cpu += entry.cpu_usage_pct;
            total_memory += entry.memory_usage_pct;
        }

        FleetMetrics {
            total_agents: total,
            agents_by_role: by_role,
            agents_by_status: by_status,
            total_cpu_pct: total_cpu,
            total_memory_pct: total_memory,
            active_monitors: self.monitors.len(),
        }
    }

    /// Cancel all monitors and terminate every live agent, best-effort.
    pub async fn shutdown(&self) {
        info!("Shutting down orchestrator");

        for item in self.monitors.iter() {
            item.value().cancel();
        }
        self.monitors.clear();

        let live: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|entry| !entry.status.is_terminal())
            .map(|entry| entry.agent_id)
            .collect();

        for agent_id in live {
            if let Err(e) = self.terminate(agent_id, "shutdown").await {
                warn!(agent_id = %agent_id, error = %e, "Shutdown termination failed");
            }
        }
    }

    /// Apply a status transition, emitting a StatusChanged event.
    pub(crate) fn set_status(
        &self,
        instance: &mut AgentInstance,
        to: AgentStatus,
    ) -> Result<(), OrchestratorError> {
        if instance.status == to {
            return Ok(());
        }
        if !instance.status.can_transition_to(to) {
            return Err(OrchestratorError::IllegalTransition {
                from: instance.status,
                to,
            });
        }

        let from = instance.status;
        instance.status = to;
        debug!(agent_id = %instance.agent_id, from = %from, to = %to, "Agent status changed");
        let _ = self.event_tx.send(AgentEvent::StatusChanged {
            agent_id: instance.agent_id,
            from,
            to,
        });
        Ok(())
    }

    /// Mark an agent faulted without tearing it down.
    pub(crate) fn record_fault(&self, agent_id: AgentId, message: String, fatal: bool) {
        if let Some(mut entry) = self.agents.get_mut(&agent_id) {
            entry.error_message = Some(message);
            if fatal && !entry.status.is_terminal() {
                let _ = self.set_status(&mut entry, AgentStatus::Error);
            }
        }
    }

    fn sandbox_spec(
        &self,
        agent_id: AgentId,
        request: &SpawnRequest,
        signed_value: &str,
        limits: ResourceLimits,
    ) -> SandboxSpec {
        let mut env = BTreeMap::new();
        env.insert("AGENT_ID".to_string(), agent_id.to_string());
        env.insert("TENANT_ID".to_string(), request.tenant_id.to_string());
        env.insert("AGENT_ROLE".to_string(), request.role.to_string());
        env.insert("ACCESS_TOKEN".to_string(), signed_value.to_string());

        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
        labels.insert(AGENT_ID_LABEL.to_string(), agent_id.to_string());
        labels.insert(
            TENANT_ID_LABEL.to_string(),
            request.tenant_id.to_string(),
        );

        SandboxSpec {
            image: self.config.image_for_role(request.role),
            env,
            limits,
            network: format!("tenant-{}-net", request.tenant_id),
            security: Default::default(),
            labels,
        }
    }

    fn audit_spawn_failure(
        &self,
        request_id: RequestId,
        agent_id: AgentId,
        request: &SpawnRequest,
        token_id: &warden_types::TokenId,
        error: &SandboxError,
    ) {
        warn!(agent_id = %agent_id, error = %error, "Agent spawn failed");
        let result = self.ledger.append(
            AuditEvent::new(
                request_id,
                AuditEventType::AgentSpawnFailed,
                AuditResourceType::Agent,
                agent_id.to_string(),
                ACTOR,
            )
            .detail("role", request.role)
            .detail("tenant_id", request.tenant_id.as_str())
            .detail("error", error.to_string())
            // The mint is not rolled back; the expiry sweep or an operator
            // revocation reclaims it.
            .detail("orphaned_token_id", token_id.to_string()),
        );
        if let Err(e) = result {
            warn!(error = %e, "Failed to audit spawn failure");
        }
    }
}

impl Drop for AgentOrchestrator {
    fn drop(&mut self) {
        for item in self.monitors.iter() {
            item.value().cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use warden_authority::{AuthorityError, TokenSigner, TokenState};
    use warden_sandbox::{InMemorySandboxRuntime, StaticHealthProbe};

    struct Harness {
        orchestrator: Arc<AgentOrchestrator>,
        authority: Arc<CredentialAuthority>,
        ledger: Arc<AuditLedger>,
        runtime: Arc<InMemorySandboxRuntime>,
    }

    fn harness(config: OrchestratorConfig) -> Harness {
        let ledger = Arc::new(AuditLedger::new([3u8; 32]));
        let authority = Arc::new(CredentialAuthority::new(
            TokenSigner::new("key-test", [2u8; 32]),
            ledger.clone(),
        ));
        let runtime = Arc::new(InMemorySandboxRuntime::new());
        let probe = Arc::new(StaticHealthProbe::healthy());

        let orchestrator = Arc::new(AgentOrchestrator::new(
            authority.clone(),
            ledger.clone(),
            runtime.clone(),
            probe,
            config,
        ));

        Harness {
            orchestrator,
            authority,
            ledger,
            runtime,
        }
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            monitor_interval: Duration::from_millis(20),
            probe_timeout: Duration::from_millis(200),
            max_idle: Duration::from_secs(3600),
            max_runtime: Duration::from_secs(3600),
            ..OrchestratorConfig::default()
        }
    }

    fn founder_request() -> SpawnRequest {
        SpawnRequest {
            role: AgentRole::Founder,
            tenant_id: TenantId::new("tenant-1"),
            scopes: BTreeSet::from(["ai:reasoning".to_string(), "ai:analysis".to_string()]),
            limits: None,
            endpoint_url: None,
            reason: "test spawn".to_string(),
        }
    }

    /// Poll until the condition holds or the deadline passes.
    async fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    #[tokio::test]
    async fn test_spawn_activates_and_monitors() {
        let h = harness(fast_config());

        let instance = h.orchestrator.spawn(founder_request()).await.unwrap();
        assert_eq!(instance.status, AgentStatus::Active);

        let sandbox_id = instance.sandbox_id.clone().unwrap();
        assert!(h.runtime.contains(&sandbox_id));
        assert!(h.orchestrator.monitors.contains_key(&instance.agent_id));

        let entries = h.ledger.entries();
        assert!(entries
            .iter()
            .any(|e| e.event_type == AuditEventType::TokenMinted));
        assert!(entries
            .iter()
            .any(|e| e.event_type == AuditEventType::AgentSpawned));
    }

    #[tokio::test]
    async fn test_spawn_refuses_insufficient_scopes() {
        let h = harness(fast_config());

        let mut request = founder_request();
        // Allowed for the role, but misses the role's minimum (ai:reasoning).
        request.scopes = BTreeSet::from(["ai:writing".to_string()]);

        let result = h.orchestrator.spawn(request).await;
        assert!(matches!(
            result,
            Err(OrchestratorError::InsufficientScopes { .. })
        ));
        assert!(h.orchestrator.list(None).is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_discards_instance_but_keeps_token() {
        let h = harness(fast_config());
        h.runtime.fail_next_create();

        let result = h.orchestrator.spawn(founder_request()).await;
        assert!(matches!(result, Err(OrchestratorError::Sandbox(_))));
        assert!(h.orchestrator.list(None).is_empty());

        // The minted token is deliberately not rolled back.
        assert_eq!(h.authority.metrics().active_tokens, 1);
        assert!(h
            .ledger
            .entries()
            .iter()
            .any(|e| e.event_type == AuditEventType::AgentSpawnFailed));
    }

    #[tokio::test]
    async fn test_terminate_cleans_up_everything() {
        let h = harness(fast_config());
        let instance = h.orchestrator.spawn(founder_request()).await.unwrap();
        let sandbox_id = instance.sandbox_id.clone().unwrap();

        let report = h
            .orchestrator
            .terminate(instance.agent_id, "operator")
            .await
            .unwrap();
        assert!(report.is_clean());

        let after = h.orchestrator.status(instance.agent_id).unwrap();
        assert_eq!(after.status, AgentStatus::Terminated);
        assert!(after.terminated_at.is_some());
        assert!(after.sandbox_id.is_none());

        assert!(!h.runtime.contains(&sandbox_id));
        let token = h.authority.token_status(instance.bound_token_id).unwrap();
        assert_eq!(token.state, TokenState::Revoked);
        assert!(h
            .ledger
            .entries()
            .iter()
            .any(|e| e.event_type == AuditEventType::AgentTerminated));
    }

    #[tokio::test]
    async fn test_terminate_twice_is_benign() {
        let h = harness(fast_config());
        let instance = h.orchestrator.spawn(founder_request()).await.unwrap();

        h.orchestrator
            .terminate(instance.agent_id, "first")
            .await
            .unwrap();
        let second = h
            .orchestrator
            .terminate(instance.agent_id, "second")
            .await
            .unwrap();

        assert!(second.is_clean());
        assert!(second
            .steps
            .iter()
            .any(|s| matches!(s.outcome, crate::report::StepOutcome::Skipped { .. })));
    }

    #[tokio::test]
    async fn test_terminate_unknown_agent() {
        let h = harness(fast_config());
        assert!(matches!(
            h.orchestrator.terminate(AgentId::generate(), "x").await,
            Err(OrchestratorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_runtime_limit_terminates_and_revokes() {
        let config = OrchestratorConfig {
            monitor_interval: Duration::from_millis(20),
            max_runtime: Duration::from_millis(50),
            ..fast_config()
        };
        let h = harness(config);

        let instance = h.orchestrator.spawn(founder_request()).await.unwrap();

        let terminated = wait_for(
            || {
                h.orchestrator
                    .status(instance.agent_id)
                    .map(|i| i.status == AgentStatus::Terminated)
                    .unwrap_or(false)
            },
            Duration::from_secs(5),
        )
        .await;
        assert!(terminated, "agent should hit the runtime limit");

        let token = h.authority.token_status(instance.bound_token_id).unwrap();
        assert_eq!(token.state, TokenState::Revoked);
    }

    #[tokio::test]
    async fn test_expired_token_terminates_agent() {
        let h = harness(fast_config());
        let instance = h.orchestrator.spawn(founder_request()).await.unwrap();

        // Pull the deadline into the past; the next tick must terminate.
        if let Some(mut entry) = h.orchestrator.agents.get_mut(&instance.agent_id) {
            entry.token_expires_at = Utc::now() - chrono::Duration::minutes(1);
        }

        let terminated = wait_for(
            || {
                h.orchestrator
                    .status(instance.agent_id)
                    .map(|i| i.status == AgentStatus::Terminated)
                    .unwrap_or(false)
            },
            Duration::from_secs(5),
        )
        .await;
        assert!(terminated, "agent should terminate on token expiry");
    }

    #[tokio::test]
    async fn test_idle_timeout_suspends_never_terminates() {
        let config = OrchestratorConfig {
            monitor_interval: Duration::from_millis(20),
            max_idle: Duration::from_millis(60),
            ..fast_config()
        };
        let h = harness(config);

        let instance = h.orchestrator.spawn(founder_request()).await.unwrap();
        let sandbox_id = instance.sandbox_id.clone().unwrap();

        let suspended = wait_for(
            || {
                h.orchestrator
                    .status(instance.agent_id)
                    .map(|i| i.status == AgentStatus::Suspended)
                    .unwrap_or(false)
            },
            Duration::from_secs(5),
        )
        .await;
        assert!(suspended, "idle agent should be suspended");
        assert!(h.runtime.is_paused(&sandbox_id));

        // Suspension, not termination: token still valid, sandbox kept.
        let token = h.authority.token_status(instance.bound_token_id).unwrap();
        assert_eq!(token.state, TokenState::Active);

        h.orchestrator.resume(instance.agent_id).await.unwrap();
        let after = h.orchestrator.status(instance.agent_id).unwrap();
        assert_eq!(after.status, AgentStatus::Active);
        assert!(!h.runtime.is_paused(&sandbox_id));
    }

    #[tokio::test]
    async fn test_busy_then_idle_transitions() {
        let h = harness(fast_config());
        let instance = h.orchestrator.spawn(founder_request()).await.unwrap();
        let sandbox_id = instance.sandbox_id.clone().unwrap();

        h.runtime.set_load(&sandbox_id, 0.8, 0);
        let became_busy = wait_for(
            || {
                h.orchestrator
                    .status(instance.agent_id)
                    .map(|i| i.status == AgentStatus::Busy)
                    .unwrap_or(false)
            },
            Duration::from_secs(5),
        )
        .await;
        assert!(became_busy, "loaded agent should be marked busy");

        h.runtime.set_load(&sandbox_id, 0.0, 0);
        let became_idle = wait_for(
            || {
                h.orchestrator
                    .status(instance.agent_id)
                    .map(|i| i.status == AgentStatus::Idle)
                    .unwrap_or(false)
            },
            Duration::from_secs(5),
        )
        .await;
        assert!(became_idle, "unloaded agent should demote to idle");
    }

    #[tokio::test]
    async fn test_suspend_rejected_from_illegal_state() {
        let h = harness(fast_config());
        let instance = h.orchestrator.spawn(founder_request()).await.unwrap();
        h.orchestrator
            .terminate(instance.agent_id, "done")
            .await
            .unwrap();

        assert!(matches!(
            h.orchestrator.suspend(instance.agent_id, "x").await,
            Err(OrchestratorError::IllegalTransition { .. })
        ));
        assert!(matches!(
            h.orchestrator.resume(instance.agent_id).await,
            Err(OrchestratorError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_cleanup_orphans_removes_exactly_unowned() {
        let h = harness(fast_config());
        let instance = h.orchestrator.spawn(founder_request()).await.unwrap();
        let owned = instance.sandbox_id.clone().unwrap();

        let orphan_a = h.runtime.register_orphan(Some(AgentId::generate()), None);
        let orphan_b = h.runtime.register_orphan(None, Some(TenantId::new("t2")));

        let removed = h.orchestrator.cleanup_orphans().await.unwrap();
        assert_eq!(removed.len(), 2);
        assert!(removed.contains(&orphan_a));
        assert!(removed.contains(&orphan_b));
        assert!(h.runtime.contains(&owned));

        // Exactly once: the second sweep finds nothing.
        let second = h.orchestrator.cleanup_orphans().await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_by_tenant() {
        let h = harness(fast_config());
        h.orchestrator.spawn(founder_request()).await.unwrap();

        let mut other = founder_request();
        other.tenant_id = TenantId::new("tenant-2");
        h.orchestrator.spawn(other).await.unwrap();

        assert_eq!(h.orchestrator.list(None).len(), 2);
        assert_eq!(
            h.orchestrator
                .list(Some(&TenantId::new("tenant-2")))
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_shutdown_terminates_fleet() {
        let h = harness(fast_config());
        let a = h.orchestrator.spawn(founder_request()).await.unwrap();
        let b = h.orchestrator.spawn(founder_request()).await.unwrap();

        h.orchestrator.shutdown().await;

        for agent_id in [a.agent_id, b.agent_id] {
            let status = h.orchestrator.status(agent_id).unwrap().status;
            assert_eq!(status, AgentStatus::Terminated);
        }
        assert!(h.orchestrator.monitors.is_empty());
    }

    #[tokio::test]
    async fn test_export_round_trip_after_lifecycle() {
        let h = harness(fast_config());
        let instance = h.orchestrator.spawn(founder_request()).await.unwrap();
        h.orchestrator
            .suspend(instance.agent_id, "operator")
            .await
            .unwrap();
        h.orchestrator.resume(instance.agent_id).await.unwrap();
        h.orchestrator
            .terminate(instance.agent_id, "done")
            .await
            .unwrap();

        // mint, spawn, suspend, resume, revoke (cascade of one), terminate
        let package = h.ledger.export(Default::default());
        assert_eq!(package.entry_count, 6);
        assert!(package.verification.is_ok());
    }

    #[tokio::test]
    async fn test_validate_after_termination_reports_revoked() {
        let h = harness(fast_config());
        let instance = h.orchestrator.spawn(founder_request()).await.unwrap();

        let bearer = h
            .orchestrator
            .credentials
            .get(&instance.agent_id)
            .map(|c| c.value().clone())
            .unwrap();
        assert!(h.authority.validate(&bearer).is_ok());

        h.orchestrator
            .terminate(instance.agent_id, "done")
            .await
            .unwrap();
        assert!(matches!(
            h.authority.validate(&bearer),
            Err(AuthorityError::Revoked(_))
        ));
    }
}
