//! Agent roles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standardized agent roles.
///
/// The role determines the allowed-scope set at the credential authority and
/// the default image and resource limits at the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// One-shot environment bootstrap agent
    Bootstrap,
    /// Business strategy and analysis agent
    Founder,
    /// Code and pipeline work agent
    Developer,
    /// Infrastructure and deployment agent
    Ops,
    /// Scanning and compliance agent
    Security,
    /// Cost tracking and budgeting agent
    Finance,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Bootstrap => "bootstrap",
            AgentRole::Founder => "founder",
            AgentRole::Developer => "developer",
            AgentRole::Ops => "ops",
            AgentRole::Security => "security",
            AgentRole::Finance => "finance",
        }
    }

    pub fn all() -> [AgentRole; 6] {
        [
            AgentRole::Bootstrap,
            AgentRole::Founder,
            AgentRole::Developer,
            AgentRole::Ops,
            AgentRole::Security,
            AgentRole::Finance,
        ]
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bootstrap" => Ok(AgentRole::Bootstrap),
            "founder" => Ok(AgentRole::Founder),
            "developer" => Ok(AgentRole::Developer),
            "ops" => Ok(AgentRole::Ops),
            "security" => Ok(AgentRole::Security),
            "finance" => Ok(AgentRole::Finance),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Error for unrecognized role names
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown agent role: {0}")]
pub struct UnknownRole(pub String);
