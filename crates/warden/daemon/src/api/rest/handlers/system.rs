//! Health and metrics handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::State, Json};
use serde::Serialize;
use warden_authority::AuthorityMetrics;
use warden_orchestrator::FleetMetrics;

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Liveness check
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Combined service metrics
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub tokens: AuthorityMetrics,
    pub fleet: FleetMetrics,
    pub audit_entries: usize,
}

/// Snapshot of authority and fleet counters
pub async fn metrics(State(state): State<AppState>) -> ApiResult<Json<MetricsResponse>> {
    Ok(Json(MetricsResponse {
        tokens: state.authority.metrics(),
        fleet: state.orchestrator.metrics(),
        audit_entries: state.ledger.len(),
    }))
}
