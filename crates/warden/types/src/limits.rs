//! Sandbox resource limits

use crate::AgentRole;
use serde::{Deserialize, Serialize};

/// CPU and memory ceilings applied to an agent sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU cores allocated
    pub cpu_cores: f64,

    /// Memory ceiling in bytes
    pub memory_bytes: u64,
}

const GIB: u64 = 1024 * 1024 * 1024;

impl ResourceLimits {
    pub fn new(cpu_cores: f64, memory_bytes: u64) -> Self {
        Self {
            cpu_cores,
            memory_bytes,
        }
    }

    /// Default limits for a role.
    pub fn for_role(role: AgentRole) -> Self {
        match role {
            AgentRole::Bootstrap => Self::new(1.0, GIB),
            AgentRole::Founder => Self::new(2.0, 2 * GIB),
            AgentRole::Developer => Self::new(4.0, 4 * GIB),
            AgentRole::Ops => Self::new(2.0, 2 * GIB),
            AgentRole::Security => Self::new(2.0, 2 * GIB),
            AgentRole::Finance => Self::new(1.0, GIB),
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::new(2.0, 2 * GIB)
    }
}
