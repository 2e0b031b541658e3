//! Warden agent lifecycle orchestrator.
//!
//! Spawns one isolated sandbox per agent, binds it to an ephemeral token
//! from the credential authority, and runs an independently cancellable
//! monitoring task per agent that enforces the runtime, expiry, and idle
//! policies. Every lifecycle transition is recorded in the audit ledger.

#![deny(unsafe_code)]

mod config;
mod error;
mod events;
mod monitor;
mod orchestrator;
mod report;

pub use config::OrchestratorConfig;
pub use error::OrchestratorError;
pub use events::AgentEvent;
pub use orchestrator::{AgentOrchestrator, FleetMetrics, SpawnRequest};
pub use report::{CleanupReport, CleanupStep, StepOutcome};
