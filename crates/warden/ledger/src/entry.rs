//! Audit entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use warden_types::RequestId;

/// Types of auditable events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Credential authority
    TokenMinted,
    TokenRevoked,
    TokenExpired,

    // Agent lifecycle
    AgentSpawned,
    AgentSpawnFailed,
    AgentSuspended,
    AgentResumed,
    AgentTerminated,
    OrphanRemoved,

    // Service lifecycle
    SystemStarted,
    SystemStopped,

    Custom(String),
}

impl AuditEventType {
    pub fn as_str(&self) -> &str {
        match self {
            AuditEventType::TokenMinted => "token_minted",
            AuditEventType::TokenRevoked => "token_revoked",
            AuditEventType::TokenExpired => "token_expired",
            AuditEventType::AgentSpawned => "agent_spawned",
            AuditEventType::AgentSpawnFailed => "agent_spawn_failed",
            AuditEventType::AgentSuspended => "agent_suspended",
            AuditEventType::AgentResumed => "agent_resumed",
            AuditEventType::AgentTerminated => "agent_terminated",
            AuditEventType::OrphanRemoved => "orphan_removed",
            AuditEventType::SystemStarted => "system_started",
            AuditEventType::SystemStopped => "system_stopped",
            AuditEventType::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of resource an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResourceType {
    Token,
    Agent,
    Sandbox,
    System,
}

impl AuditResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditResourceType::Token => "token",
            AuditResourceType::Agent => "agent",
            AuditResourceType::Sandbox => "sandbox",
            AuditResourceType::System => "system",
        }
    }
}

impl std::fmt::Display for AuditResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A committed ledger entry.
///
/// `current_hash` is a keyed MAC over the canonical serialization of all
/// fields except the two hash fields, concatenated with `previous_hash`.
/// The first entry's `previous_hash` is the literal genesis marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: Uuid,
    pub request_id: RequestId,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub resource_type: AuditResourceType,
    pub resource_id: String,
    pub actor: String,

    /// Structured event details; a BTreeMap so the canonical serialization
    /// used for hashing is deterministic.
    pub details: BTreeMap<String, serde_json::Value>,

    pub previous_hash: String,
    pub current_hash: String,
}

/// An event about to be appended; carries the pre-hash fields.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub request_id: RequestId,
    pub event_type: AuditEventType,
    pub resource_type: AuditResourceType,
    pub resource_id: String,
    pub actor: String,
    pub details: BTreeMap<String, serde_json::Value>,
}

impl AuditEvent {
    pub fn new(
        request_id: RequestId,
        event_type: AuditEventType,
        resource_type: AuditResourceType,
        resource_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            event_type,
            resource_type,
            resource_id: resource_id.into(),
            actor: actor.into(),
            details: BTreeMap::new(),
        }
    }

    /// Attach a detail value. Unserializable values are dropped.
    pub fn detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.insert(key.into(), v);
        }
        self
    }
}
