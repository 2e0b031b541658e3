//! REST handlers

mod agents;
mod audit;
mod system;
mod tokens;

pub use agents::{
    cleanup_orphans, get_agent, list_agents, resume_agent, spawn_agent, suspend_agent,
    terminate_agent,
};
pub use audit::{export_audit, verify_audit};
pub use system::{health_check, metrics};
pub use tokens::{get_token, mint_token, revoke_token};
