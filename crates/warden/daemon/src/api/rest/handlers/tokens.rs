//! Token management handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use warden_authority::{MintRequest, TokenStatusReport};
use warden_types::{AgentRole, RequestId, TenantId, TokenId};

/// Mint token request body
#[derive(Debug, Deserialize)]
pub struct MintTokenRequest {
    pub role: AgentRole,
    pub tenant_id: String,
    pub ttl_minutes: i64,
    pub scopes: BTreeSet<String>,
    pub reason: String,
    pub parent_token_id: Option<String>,
}

/// Mint token response
#[derive(Debug, Serialize)]
pub struct MintTokenResponse {
    pub token_id: String,
    pub signed_value: String,
    pub expires_at: DateTime<Utc>,
}

/// Mint a new ephemeral token
pub async fn mint_token(
    State(state): State<AppState>,
    Json(request): Json<MintTokenRequest>,
) -> ApiResult<Json<MintTokenResponse>> {
    let parent_token_id = request
        .parent_token_id
        .as_deref()
        .map(parse_token_id)
        .transpose()?;

    let token = state.authority.mint(MintRequest {
        role: request.role,
        tenant_id: TenantId::new(request.tenant_id),
        ttl_minutes: request.ttl_minutes,
        scopes: request.scopes,
        reason: request.reason,
        parent_token_id,
        request_id: RequestId::generate(),
    })?;

    Ok(Json(MintTokenResponse {
        token_id: token.token_id.to_string(),
        signed_value: token.signed_value,
        expires_at: token.expires_at,
    }))
}

/// Revoke token request body
#[derive(Debug, Deserialize)]
pub struct RevokeTokenRequest {
    pub reason: String,
}

/// Revoke token response
#[derive(Debug, Serialize)]
pub struct RevokeTokenResponse {
    pub revoked_token_ids: Vec<String>,
    pub revoked_at: DateTime<Utc>,
}

/// Revoke a token and its descendant lineage
pub async fn revoke_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RevokeTokenRequest>,
) -> ApiResult<Json<RevokeTokenResponse>> {
    let token_id = parse_token_id(&id)?;

    let outcome = state
        .authority
        .revoke(token_id, &request.reason, RequestId::generate())?;

    tracing::info!(
        token_id = %id,
        revoked_count = outcome.revoked_token_ids.len(),
        "Revoked token lineage"
    );

    Ok(Json(RevokeTokenResponse {
        revoked_token_ids: outcome
            .revoked_token_ids
            .iter()
            .map(|id| id.to_string())
            .collect(),
        revoked_at: outcome.revoked_at,
    }))
}

/// Token status response. The signed credential itself is never echoed
/// back by status queries.
#[derive(Debug, Serialize)]
pub struct TokenStatusResponse {
    pub token_id: String,
    pub state: warden_authority::TokenState,
    pub role: AgentRole,
    pub tenant_id: String,
    pub scopes: BTreeSet<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_token_id: Option<String>,
    pub child_tokens: Vec<String>,
    pub reason: String,
}

impl From<TokenStatusReport> for TokenStatusResponse {
    fn from(report: TokenStatusReport) -> Self {
        Self {
            token_id: report.token.token_id.to_string(),
            state: report.state,
            role: report.token.role,
            tenant_id: report.token.tenant_id.to_string(),
            scopes: report.token.scopes,
            issued_at: report.token.issued_at,
            expires_at: report.token.expires_at,
            revoked_at: report.token.revoked_at,
            parent_token_id: report.token.parent_token_id.map(|id| id.to_string()),
            child_tokens: report.child_tokens.iter().map(|id| id.to_string()).collect(),
            reason: report.token.reason,
        }
    }
}

/// Get token status
pub async fn get_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TokenStatusResponse>> {
    let token_id = parse_token_id(&id)?;
    let report = state.authority.token_status(token_id)?;
    Ok(Json(report.into()))
}

/// Helper to parse a token ID from a path segment
fn parse_token_id(id: &str) -> ApiResult<TokenId> {
    TokenId::parse(id).map_err(|_| ApiError::BadRequest(format!("Invalid token ID: {}", id)))
}
