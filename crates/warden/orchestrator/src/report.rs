//! Best-effort cleanup reporting
//!
//! `terminate` always attempts all of its sub-steps; failures are collected
//! here rather than aborting cleanup early, because resource leakage is
//! worse than a partially-reported error.

use serde::{Deserialize, Serialize};
use warden_types::AgentId;

/// Outcome of one cleanup sub-step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Ok,
    /// Nothing to do (e.g. sandbox already gone)
    Skipped { reason: String },
    Failed { reason: String },
}

/// One attempted cleanup sub-step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupStep {
    pub name: String,
    pub outcome: StepOutcome,
}

impl CleanupStep {
    pub fn ok(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: StepOutcome::Ok,
        }
    }

    pub fn skipped(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            outcome: StepOutcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn failed(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            outcome: StepOutcome::Failed {
                reason: reason.into(),
            },
        }
    }
}

/// Aggregated outcomes of a termination's cleanup sub-steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupReport {
    pub agent_id: AgentId,
    pub steps: Vec<CleanupStep>,
}

impl CleanupReport {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, step: CleanupStep) {
        self.steps.push(step);
    }

    /// No sub-step failed.
    pub fn is_clean(&self) -> bool {
        self.steps
            .iter()
            .all(|s| !matches!(s.outcome, StepOutcome::Failed { .. }))
    }

    /// Human-readable summary of the failed sub-steps, if any.
    pub fn failure_summary(&self) -> Option<String> {
        let failures: Vec<String> = self
            .steps
            .iter()
            .filter_map(|s| match &s.outcome {
                StepOutcome::Failed { reason } => Some(format!("{}: {}", s.name, reason)),
                _ => None,
            })
            .collect();

        if failures.is_empty() {
            None
        } else {
            Some(failures.join("; "))
        }
    }
}
