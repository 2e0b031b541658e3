//! Audit ledger handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use warden_ledger::{AuditPackage, ChainVerification, ExportFilter};
use warden_types::{RequestId, TenantId};

/// Verify the full hash chain
pub async fn verify_audit(State(state): State<AppState>) -> ApiResult<Json<ChainVerification>> {
    let result = state.ledger.verify();
    if !result.is_ok() {
        tracing::error!(
            error_count = result.errors.len(),
            "Audit chain verification found mismatches"
        );
    }
    Ok(Json(result))
}

/// Export query params
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub request_id: Option<String>,
    pub tenant_id: Option<String>,
}

/// Export a filtered audit package with a fresh verification result
pub async fn export_audit(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Json<AuditPackage>> {
    let request_id = query
        .request_id
        .as_deref()
        .map(|raw| {
            RequestId::parse(raw)
                .map_err(|_| ApiError::BadRequest(format!("Invalid request ID: {}", raw)))
        })
        .transpose()?;

    let filter = ExportFilter {
        request_id,
        tenant_id: query.tenant_id.map(TenantId::new),
    };

    Ok(Json(state.ledger.export(filter)))
}
