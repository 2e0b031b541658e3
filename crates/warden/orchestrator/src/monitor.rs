//! Per-agent monitoring loop
//!
//! One task per monitored agent, cancellable without touching other
//! agents' loops. Cancellation is cooperative: the flag is checked at the
//! top of each iteration and raced against every blocking sub-call, so a
//! terminate request is observed promptly even mid-iteration.

use crate::orchestrator::AgentOrchestrator;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use warden_sandbox::{SandboxError, SandboxStats};
use warden_types::{AgentId, AgentStatus, HealthState};

/// Handle to a running monitor task.
pub(crate) struct MonitorHandle {
    cancel_tx: watch::Sender<bool>,
    _task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Request cooperative cancellation.
    pub(crate) fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }
}

/// Previous cumulative CPU counters, for delta-based utilization.
#[derive(Debug, Clone, Copy, Default)]
struct CpuSample {
    cpu_ns: u64,
    system_ns: u64,
}

/// Whether the loop keeps running after an iteration.
enum TickOutcome {
    Continue,
    Stop,
}

impl AgentOrchestrator {
    /// Start the monitoring task for an agent.
    pub(crate) fn start_monitor(self: &Arc<Self>, agent_id: AgentId) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let orchestrator = Arc::clone(self);

        let task = tokio::spawn(async move {
            orchestrator.monitor_loop(agent_id, cancel_rx).await;
        });

        self.monitors.insert(
            agent_id,
            MonitorHandle {
                cancel_tx,
                _task: task,
            },
        );
    }

    async fn monitor_loop(self: Arc<Self>, agent_id: AgentId, mut cancel: watch::Receiver<bool>) {
        debug!(agent_id = %agent_id, "Monitor loop started");

        let mut ticker = tokio::time::interval(self.config.monitor_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so the loop
        // waits a full interval before its first check.
        ticker.tick().await;

        let mut prev = CpuSample::default();

        loop {
            tokio::select! {
                _ = cancel.changed() => break,
                _ = ticker.tick() => {}
            }
            if *cancel.borrow() {
                break;
            }

            match self.monitor_tick(agent_id, &mut prev, &mut cancel).await {
                TickOutcome::Continue => {}
                TickOutcome::Stop => break,
            }
        }

        debug!(agent_id = %agent_id, "Monitor loop exited");
    }

    async fn monitor_tick(
        self: &Arc<Self>,
        agent_id: AgentId,
        prev: &mut CpuSample,
        cancel: &mut watch::Receiver<bool>,
    ) -> TickOutcome {
        let Some(instance) = self.agents.get(&agent_id).map(|e| e.value().clone()) else {
            return TickOutcome::Stop;
        };
        if !instance.status.is_monitorable() {
            return TickOutcome::Stop;
        }

        let now = Utc::now();

        // Runtime limit: termination, not suspension.
        if instance.exceeded_runtime(now, self.config.max_runtime) {
            warn!(agent_id = %agent_id, "Maximum runtime exceeded; terminating");
            if let Err(e) = self.terminate(agent_id, "runtime_limit_exceeded").await {
                warn!(agent_id = %agent_id, error = %e, "Runtime-limit termination failed");
            }
            return TickOutcome::Stop;
        }

        // Token expiry: the deadline is absolute, no heartbeat extends it.
        if instance.is_token_expired(now) {
            warn!(agent_id = %agent_id, "Bound token expired; terminating");
            if let Err(e) = self.terminate(agent_id, "token_expired").await {
                warn!(agent_id = %agent_id, error = %e, "Token-expiry termination failed");
            }
            return TickOutcome::Stop;
        }

        let Some(sandbox_id) = instance.sandbox_id.clone() else {
            self.record_fault(agent_id, "sandbox missing for monitored agent".to_string(), true);
            return TickOutcome::Stop;
        };

        // Resource stats, raced against cancellation and bounded by the
        // per-call timeout.
        let stats = tokio::select! {
            _ = cancel.changed() => return TickOutcome::Stop,
            result = tokio::time::timeout(
                self.config.probe_timeout,
                self.runtime().stats(&sandbox_id),
            ) => result,
        };

        let stats = match stats {
            Err(_) => {
                // A timed-out poll is a transient health-check failure,
                // never a termination trigger by itself.
                if let Some(mut entry) = self.agents.get_mut(&agent_id) {
                    entry.health = HealthState::Unreachable;
                    entry.error_message = Some("stats poll timed out".to_string());
                }
                return TickOutcome::Continue;
            }
            Ok(Err(SandboxError::NotFound(_))) => {
                // Fatal only if nothing else is tearing the agent down; a
                // concurrent terminate legitimately removes the sandbox
                // mid-iteration.
                let still_monitored = self
                    .agents
                    .get(&agent_id)
                    .map(|e| e.status.is_monitorable())
                    .unwrap_or(false);
                if still_monitored {
                    warn!(agent_id = %agent_id, sandbox_id = %sandbox_id, "Sandbox vanished");
                    self.record_fault(agent_id, "sandbox not found".to_string(), true);
                }
                return TickOutcome::Stop;
            }
            Ok(Err(e)) => {
                self.record_fault(agent_id, e.to_string(), false);
                return TickOutcome::Continue;
            }
            Ok(Ok(stats)) => stats,
        };

        let cpu_pct = cpu_percent(*prev, &stats);
        let mem_pct = memory_percent(&stats);
        *prev = CpuSample {
            cpu_ns: stats.cpu_cumulative_ns,
            system_ns: stats.system_cpu_ns,
        };

        // Health probe against the agent's own endpoint, if it has one.
        let health = match &instance.endpoint_url {
            Some(endpoint) => {
                let bearer = self
                    .credentials
                    .get(&agent_id)
                    .map(|c| c.value().clone())
                    .unwrap_or_default();
                tokio::select! {
                    _ = cancel.changed() => return TickOutcome::Stop,
                    state = self.probe().check(endpoint, &bearer) => state,
                }
            }
            None => instance.health,
        };

        let mut idle_timeout = false;
        if let Some(mut entry) = self.agents.get_mut(&agent_id) {
            if !entry.status.is_monitorable() {
                return TickOutcome::Stop;
            }

            entry.cpu_usage_pct = cpu_pct;
            entry.memory_usage_pct = mem_pct;
            entry.health = health;

            let busy = cpu_pct > self.config.busy_cpu_pct || mem_pct > self.config.busy_memory_pct;
            if busy {
                if entry.status != AgentStatus::Busy {
                    if let Err(e) = self.set_status(&mut entry, AgentStatus::Busy) {
                        warn!(agent_id = %agent_id, error = %e, "Busy transition rejected");
                    }
                }
                entry.last_activity = Some(now);
            } else if entry.status == AgentStatus::Busy {
                if let Err(e) = self.set_status(&mut entry, AgentStatus::Idle) {
                    warn!(agent_id = %agent_id, error = %e, "Idle transition rejected");
                }
            }

            idle_timeout = entry.idle_longer_than(now, self.config.max_idle);
        }

        if idle_timeout {
            // The idle policy's consequence is suspension, never
            // termination; the token stays valid and state is preserved.
            debug!(agent_id = %agent_id, "Idle timeout; suspending");
            if let Err(e) = self.suspend(agent_id, "idle_timeout").await {
                warn!(agent_id = %agent_id, error = %e, "Idle suspension failed");
                self.record_fault(agent_id, e.to_string(), false);
                return TickOutcome::Continue;
            }
            return TickOutcome::Stop;
        }

        TickOutcome::Continue
    }
}

/// CPU utilization from a delta of cumulative usage over a delta of system
/// time, normalized by core count.
fn cpu_percent(prev: CpuSample, stats: &SandboxStats) -> f64 {
    let cpu_delta = stats.cpu_cumulative_ns.saturating_sub(prev.cpu_ns) as f64;
    let system_delta = stats.system_cpu_ns.saturating_sub(prev.system_ns) as f64;
    if system_delta <= 0.0 {
        return 0.0;
    }
    (cpu_delta / system_delta) * stats.online_cpus as f64 * 100.0
}

/// Memory utilization as used over limit.
fn memory_percent(stats: &SandboxStats) -> f64 {
    if stats.mem_limit_bytes == 0 {
        return 0.0;
    }
    (stats.mem_used_bytes as f64 / stats.mem_limit_bytes as f64) * 100.0
}
