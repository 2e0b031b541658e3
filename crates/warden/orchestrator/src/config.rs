//! Orchestrator configuration

use std::time::Duration;
use warden_types::{AgentRole, MAX_TTL_MINUTES, MIN_TTL_MINUTES};

/// Monitoring and policy knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Interval between monitoring iterations.
    pub monitor_interval: Duration,

    /// Per-call timeout for sandbox stats polls and health probes.
    /// Independent of the monitoring interval.
    pub probe_timeout: Duration,

    /// CPU utilization (percent) above which an agent counts as busy.
    pub busy_cpu_pct: f64,

    /// Memory utilization (percent) above which an agent counts as busy.
    pub busy_memory_pct: f64,

    /// Idle time after which an agent is suspended (never terminated).
    pub max_idle: Duration,

    /// Total runtime after which an agent is terminated.
    pub max_runtime: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            busy_cpu_pct: 10.0,
            busy_memory_pct: 50.0,
            max_idle: Duration::from_secs(3600),
            max_runtime: Duration::from_secs(8 * 3600),
        }
    }
}

impl OrchestratorConfig {
    /// TTL requested for an agent's bound token.
    ///
    /// The maximum-runtime policy would prefer a runtime-length token, but
    /// the authority's ceiling governs; runtime enforcement is the monitor's
    /// job, not the token's.
    pub fn token_ttl_minutes(&self) -> i64 {
        let minutes = (self.max_runtime.as_secs() / 60) as i64;
        minutes.clamp(MIN_TTL_MINUTES, MAX_TTL_MINUTES)
    }

    /// Image reference for a role's agent workload.
    pub fn image_for_role(&self, role: AgentRole) -> String {
        format!("warden/{}-agent:latest", role)
    }
}
