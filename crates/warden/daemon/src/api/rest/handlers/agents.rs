//! Agent lifecycle handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use warden_orchestrator::{CleanupReport, SpawnRequest};
use warden_types::{AgentId, AgentInstance, AgentRole, ResourceLimits, TenantId};

/// Spawn agent request body
#[derive(Debug, Deserialize)]
pub struct SpawnAgentRequest {
    pub role: AgentRole,
    pub tenant_id: String,
    pub scopes: BTreeSet<String>,
    pub resource_limits: Option<ResourceLimits>,
    pub endpoint_url: Option<String>,
    pub reason: Option<String>,
}

/// Spawn a new sandboxed agent
pub async fn spawn_agent(
    State(state): State<AppState>,
    Json(request): Json<SpawnAgentRequest>,
) -> ApiResult<Json<AgentInstance>> {
    let instance = state
        .orchestrator
        .spawn(SpawnRequest {
            role: request.role,
            tenant_id: TenantId::new(request.tenant_id),
            scopes: request.scopes,
            limits: request.resource_limits,
            endpoint_url: request.endpoint_url,
            reason: request.reason.unwrap_or_else(|| "agent_spawn".to_string()),
        })
        .await?;

    Ok(Json(instance))
}

/// List agents query params
#[derive(Debug, Deserialize)]
pub struct ListAgentsQuery {
    pub tenant_id: Option<String>,
}

/// List agents, optionally filtered by tenant
pub async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<ListAgentsQuery>,
) -> ApiResult<Json<Vec<AgentInstance>>> {
    let tenant = query.tenant_id.map(TenantId::new);
    Ok(Json(state.orchestrator.list(tenant.as_ref())))
}

/// Get a specific agent
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AgentInstance>> {
    let agent_id = parse_agent_id(&id)?;
    let instance = state.orchestrator.status(agent_id)?;
    Ok(Json(instance))
}

/// Terminate request body
#[derive(Debug, Deserialize)]
pub struct TerminateAgentRequest {
    pub reason: Option<String>,
}

/// Terminate response
#[derive(Debug, Serialize)]
pub struct TerminateAgentResponse {
    pub terminated: bool,
    pub report: CleanupReport,
}

/// Terminate an agent (best-effort cleanup)
pub async fn terminate_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TerminateAgentRequest>,
) -> ApiResult<Json<TerminateAgentResponse>> {
    let agent_id = parse_agent_id(&id)?;
    let reason = request.reason.unwrap_or_else(|| "manual".to_string());

    let report = state.orchestrator.terminate(agent_id, &reason).await?;

    Ok(Json(TerminateAgentResponse {
        terminated: report.is_clean(),
        report,
    }))
}

/// Suspend request body
#[derive(Debug, Deserialize)]
pub struct SuspendAgentRequest {
    pub reason: Option<String>,
}

/// Operation acknowledgement
#[derive(Debug, Serialize)]
pub struct AgentOpResponse {
    pub agent_id: String,
    pub status: String,
}

/// Suspend an agent (pause its sandbox)
pub async fn suspend_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SuspendAgentRequest>,
) -> ApiResult<Json<AgentOpResponse>> {
    let agent_id = parse_agent_id(&id)?;
    let reason = request.reason.unwrap_or_else(|| "manual".to_string());

    state.orchestrator.suspend(agent_id, &reason).await?;

    Ok(Json(AgentOpResponse {
        agent_id: id,
        status: "suspended".to_string(),
    }))
}

/// Resume a suspended agent
pub async fn resume_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AgentOpResponse>> {
    let agent_id = parse_agent_id(&id)?;
    state.orchestrator.resume(agent_id).await?;

    Ok(Json(AgentOpResponse {
        agent_id: id,
        status: "active".to_string(),
    }))
}

/// Orphan cleanup response
#[derive(Debug, Serialize)]
pub struct CleanupOrphansResponse {
    pub removed_sandbox_ids: Vec<String>,
}

/// Remove managed sandboxes with no registered instance
pub async fn cleanup_orphans(
    State(state): State<AppState>,
) -> ApiResult<Json<CleanupOrphansResponse>> {
    let removed = state.orchestrator.cleanup_orphans().await?;

    Ok(Json(CleanupOrphansResponse {
        removed_sandbox_ids: removed.iter().map(|id| id.to_string()).collect(),
    }))
}

/// Helper to parse an agent ID from a path segment
fn parse_agent_id(id: &str) -> ApiResult<AgentId> {
    AgentId::parse(id).map_err(|_| ApiError::BadRequest(format!("Invalid agent ID: {}", id)))
}
