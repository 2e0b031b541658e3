//! The credential authority

use crate::error::AuthorityError;
use crate::policy::RolePolicy;
use crate::signer::{TokenClaims, TokenSigner, AUDIENCE, ISSUER};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};
use warden_ledger::{AuditEvent, AuditEventType, AuditLedger, AuditResourceType};
use warden_types::{
    AgentRole, EphemeralToken, RequestId, TenantId, TokenId, MAX_TTL_MINUTES, MIN_TTL_MINUTES,
};

const ACTOR: &str = "credential-authority";

/// Request to mint a new ephemeral token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintRequest {
    pub role: AgentRole,
    pub tenant_id: TenantId,
    pub ttl_minutes: i64,
    pub scopes: BTreeSet<String>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_token_id: Option<TokenId>,
    pub request_id: RequestId,
}

/// Result of a revocation, listing every token the cascade touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationOutcome {
    pub revoked_token_ids: Vec<TokenId>,
    pub revoked_at: DateTime<Utc>,
}

/// Lifecycle state of a token as seen at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Active,
    Expired,
    Revoked,
}

/// Detailed token status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStatusReport {
    pub token: EphemeralToken,
    pub state: TokenState,
    pub child_tokens: Vec<TokenId>,
}

/// Snapshot of the authority's registries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityMetrics {
    pub total_tokens: usize,
    pub active_tokens: usize,
    pub expired_tokens: usize,
    pub revoked_tokens: usize,
    pub lineages: usize,
}

struct AuthorityState {
    tokens: HashMap<TokenId, EphemeralToken>,
    lineage: HashMap<TokenId, Vec<TokenId>>,
}

/// Mints, validates, and recursively revokes ephemeral scoped tokens.
///
/// Both registries (token map and lineage map) live behind one lock so a
/// revocation cascade observes a consistent forest.
pub struct CredentialAuthority {
    signer: TokenSigner,
    policy: RolePolicy,
    ledger: Arc<AuditLedger>,
    inner: RwLock<AuthorityState>,
}

impl CredentialAuthority {
    pub fn new(signer: TokenSigner, ledger: Arc<AuditLedger>) -> Self {
        Self::with_policy(signer, ledger, RolePolicy::default())
    }

    pub fn with_policy(signer: TokenSigner, ledger: Arc<AuditLedger>, policy: RolePolicy) -> Self {
        Self {
            signer,
            policy,
            ledger,
            inner: RwLock::new(AuthorityState {
                tokens: HashMap::new(),
                lineage: HashMap::new(),
            }),
        }
    }

    /// Allowed scopes for a role, for pre-spawn checks.
    pub fn scopes_for_role(&self, role: AgentRole) -> BTreeSet<String> {
        self.policy.scopes_for_role(role)
    }

    /// Minimum scopes an agent of this role needs to operate.
    pub fn minimum_scopes(&self, role: AgentRole) -> BTreeSet<String> {
        self.policy.minimum_scopes(role)
    }

    /// Mint a signed ephemeral token.
    ///
    /// Never partially succeeds: the token is fully recorded in the
    /// registry, the lineage map, and the audit ledger, or not at all.
    pub fn mint(&self, request: MintRequest) -> Result<EphemeralToken, AuthorityError> {
        if request.ttl_minutes < MIN_TTL_MINUTES {
            return Err(AuthorityError::Validation(format!(
                "minimum TTL is {MIN_TTL_MINUTES} minutes"
            )));
        }
        if request.ttl_minutes > MAX_TTL_MINUTES {
            return Err(AuthorityError::Validation(format!(
                "maximum TTL is {MAX_TTL_MINUTES} minutes"
            )));
        }

        let granted = self.policy.validate_scopes(request.role, &request.scopes)?;

        let token_id = TokenId::generate();
        let issued_at = Utc::now();
        let expires_at = issued_at + Duration::minutes(request.ttl_minutes);

        let claims = TokenClaims {
            jti: token_id,
            iss: ISSUER.to_string(),
            sub: format!("agent:{}", request.role),
            aud: AUDIENCE.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            tenant_id: request.tenant_id.clone(),
            role: request.role,
            scopes: granted.clone(),
            reason: request.reason.clone(),
            parent_token_id: request.parent_token_id,
        };
        let signed_value = self.signer.sign(&claims)?;

        let token = EphemeralToken {
            token_id,
            signed_value,
            role: request.role,
            tenant_id: request.tenant_id.clone(),
            scopes: granted.clone(),
            issued_at,
            expires_at,
            parent_token_id: request.parent_token_id,
            revoked: false,
            revoked_at: None,
            reason: request.reason.clone(),
        };

        let mut state = self.inner.write().map_err(|_| AuthorityError::LockPoisoned)?;

        if let Some(parent_id) = request.parent_token_id {
            let parent = state
                .tokens
                .get(&parent_id)
                .ok_or(AuthorityError::NotFound(parent_id))?;
            if parent.revoked {
                // A child minted under a revoked parent would escape the
                // parent's (already finished) cascade and break the
                // lineage-closure invariant.
                return Err(AuthorityError::Validation(format!(
                    "parent token {parent_id} is revoked"
                )));
            }
        }

        state.tokens.insert(token_id, token.clone());
        if let Some(parent_id) = request.parent_token_id {
            state.lineage.entry(parent_id).or_default().push(token_id);
        }

        let audit = AuditEvent::new(
            request.request_id,
            AuditEventType::TokenMinted,
            AuditResourceType::Token,
            token_id.to_string(),
            ACTOR,
        )
        .detail("role", request.role)
        .detail("tenant_id", request.tenant_id.as_str())
        .detail("scopes", &granted)
        .detail("ttl_minutes", request.ttl_minutes)
        .detail("reason", &request.reason)
        .detail(
            "parent_token_id",
            request.parent_token_id.map(|id| id.to_string()),
        );

        if let Err(e) = self.ledger.append(audit) {
            // Unwind the registry writes so the mint leaves no trace.
            state.tokens.remove(&token_id);
            if let Some(parent_id) = request.parent_token_id {
                if let Some(children) = state.lineage.get_mut(&parent_id) {
                    children.retain(|id| *id != token_id);
                }
            }
            return Err(e.into());
        }

        info!(
            token_id = %token_id,
            role = %request.role,
            tenant_id = %request.tenant_id,
            ttl_minutes = request.ttl_minutes,
            "Ephemeral token minted"
        );

        Ok(token)
    }

    /// Verify a signed credential and look up its live state.
    ///
    /// Validating an already-expired-but-not-yet-revoked token auto-revokes
    /// it (reason "expired") as a side effect and reports `Expired`; the
    /// next validation of the same token reports `Revoked`.
    pub fn validate(&self, signed_value: &str) -> Result<EphemeralToken, AuthorityError> {
        let claims = self.signer.verify(signed_value)?;
        let token_id = claims.jti;

        let mut state = self.inner.write().map_err(|_| AuthorityError::LockPoisoned)?;
        let now = Utc::now();

        let (revoked, expired) = {
            let token = state
                .tokens
                .get(&token_id)
                .ok_or(AuthorityError::NotFound(token_id))?;
            (token.revoked, token.is_expired(now))
        };

        if revoked {
            warn!(token_id = %token_id, "Validation of revoked token");
            return Err(AuthorityError::Revoked(token_id));
        }

        if expired {
            warn!(token_id = %token_id, "Validation of expired token; auto-revoking");
            self.revoke_locked(
                &mut state,
                token_id,
                "expired",
                AuditEventType::TokenExpired,
                RequestId::generate(),
                now,
            )?;
            return Err(AuthorityError::Expired(token_id));
        }

        state
            .tokens
            .get(&token_id)
            .cloned()
            .ok_or(AuthorityError::NotFound(token_id))
    }

    /// Revoke a token and its entire descendant closure.
    ///
    /// Idempotent: revoking an already-revoked token is a no-op returning
    /// an empty delta.
    pub fn revoke(
        &self,
        token_id: TokenId,
        reason: &str,
        request_id: RequestId,
    ) -> Result<RevocationOutcome, AuthorityError> {
        let mut state = self.inner.write().map_err(|_| AuthorityError::LockPoisoned)?;
        let now = Utc::now();

        let already_revoked_at = {
            let token = state
                .tokens
                .get(&token_id)
                .ok_or(AuthorityError::NotFound(token_id))?;
            token.revoked.then(|| token.revoked_at.unwrap_or(now))
        };
        if let Some(revoked_at) = already_revoked_at {
            return Ok(RevocationOutcome {
                revoked_token_ids: Vec::new(),
                revoked_at,
            });
        }

        let revoked =
            self.revoke_locked(&mut state, token_id, reason, AuditEventType::TokenRevoked, request_id, now)?;

        info!(
            token_id = %token_id,
            revoked_count = revoked.len(),
            reason = %reason,
            "Tokens revoked"
        );

        Ok(RevocationOutcome {
            revoked_token_ids: revoked,
            revoked_at: now,
        })
    }

    /// Mark `root` and every unrevoked descendant revoked, writing one
    /// audit entry per token.
    ///
    /// Iterative breadth-first walk over the lineage adjacency map; deep
    /// lineages must not grow the call stack.
    fn revoke_locked(
        &self,
        state: &mut AuthorityState,
        root: TokenId,
        reason: &str,
        event_type: AuditEventType,
        request_id: RequestId,
        revoked_at: DateTime<Utc>,
    ) -> Result<Vec<TokenId>, AuthorityError> {
        let mut closure = Vec::new();
        let mut queue = VecDeque::from([root]);
        let mut seen = HashSet::new();

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            closure.push(current);
            if let Some(children) = state.lineage.get(&current) {
                queue.extend(children.iter().copied());
            }
        }

        let mut revoked = Vec::new();
        for id in closure {
            let Some(token) = state.tokens.get_mut(&id) else {
                continue;
            };
            if token.revoked {
                continue;
            }
            token.revoked = true;
            token.revoked_at = Some(revoked_at);
            let tenant = token.tenant_id.clone();
            revoked.push(id);

            let mut audit = AuditEvent::new(
                request_id,
                event_type.clone(),
                AuditResourceType::Token,
                id.to_string(),
                ACTOR,
            )
            .detail("reason", reason)
            .detail("tenant_id", tenant.as_str());
            if id != root {
                audit = audit.detail("cascaded_from", root.to_string());
            }
            self.ledger.append(audit)?;
        }

        Ok(revoked)
    }

    /// Detailed status for a token.
    pub fn token_status(&self, token_id: TokenId) -> Result<TokenStatusReport, AuthorityError> {
        let state = self.inner.read().map_err(|_| AuthorityError::LockPoisoned)?;

        let token = state
            .tokens
            .get(&token_id)
            .ok_or(AuthorityError::NotFound(token_id))?;

        let token_state = if token.revoked {
            TokenState::Revoked
        } else if token.is_expired(Utc::now()) {
            TokenState::Expired
        } else {
            TokenState::Active
        };

        Ok(TokenStatusReport {
            token: token.clone(),
            state: token_state,
            child_tokens: state.lineage.get(&token_id).cloned().unwrap_or_default(),
        })
    }

    /// Auto-revoke every expired, unrevoked token.
    ///
    /// Bounds the lifetime of tokens orphaned by failed spawns or crashed
    /// callers; returns everything the sweep revoked (including cascades).
    pub fn sweep_expired(&self, request_id: RequestId) -> Result<Vec<TokenId>, AuthorityError> {
        let mut state = self.inner.write().map_err(|_| AuthorityError::LockPoisoned)?;
        let now = Utc::now();

        let expired: Vec<TokenId> = state
            .tokens
            .values()
            .filter(|t| !t.revoked && t.is_expired(now))
            .map(|t| t.token_id)
            .collect();

        let mut swept = Vec::new();
        for token_id in expired {
            // An earlier cascade in this sweep may have covered it already.
            let still_live = state
                .tokens
                .get(&token_id)
                .map(|t| !t.revoked)
                .unwrap_or(false);
            if !still_live {
                continue;
            }
            swept.extend(self.revoke_locked(
                &mut state,
                token_id,
                "expired",
                AuditEventType::TokenExpired,
                request_id,
                now,
            )?);
        }

        if !swept.is_empty() {
            info!(count = swept.len(), "Swept expired tokens");
        }

        Ok(swept)
    }

    /// Revoke every active token. Shutdown path.
    pub fn revoke_all(
        &self,
        reason: &str,
        request_id: RequestId,
    ) -> Result<Vec<TokenId>, AuthorityError> {
        let mut state = self.inner.write().map_err(|_| AuthorityError::LockPoisoned)?;
        let now = Utc::now();

        let active: Vec<TokenId> = state
            .tokens
            .values()
            .filter(|t| t.is_active(now))
            .map(|t| t.token_id)
            .collect();

        let mut revoked = Vec::new();
        for token_id in active {
            let still_live = state
                .tokens
                .get(&token_id)
                .map(|t| !t.revoked)
                .unwrap_or(false);
            if !still_live {
                continue;
            }
            revoked.extend(self.revoke_locked(
                &mut state,
                token_id,
                reason,
                AuditEventType::TokenRevoked,
                request_id,
                now,
            )?);
        }

        info!(count = revoked.len(), reason = %reason, "Revoked all active tokens");
        Ok(revoked)
    }

    /// Registry counters.
    pub fn metrics(&self) -> AuthorityMetrics {
        let now = Utc::now();
        match self.inner.read() {
            Ok(state) => AuthorityMetrics {
                total_tokens: state.tokens.len(),
                active_tokens: state.tokens.values().filter(|t| t.is_active(now)).count(),
                expired_tokens: state
                    .tokens
                    .values()
                    .filter(|t| t.is_expired(now))
                    .count(),
                revoked_tokens: state.tokens.values().filter(|t| t.revoked).count(),
                lineages: state.lineage.len(),
            },
            Err(_) => AuthorityMetrics {
                total_tokens: 0,
                active_tokens: 0,
                expired_tokens: 0,
                revoked_tokens: 0,
                lineages: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn setup() -> (Arc<AuditLedger>, CredentialAuthority) {
        let ledger = Arc::new(AuditLedger::new([5u8; 32]));
        let authority = CredentialAuthority::new(TokenSigner::new("key-test", [1u8; 32]), ledger.clone());
        (ledger, authority)
    }

    fn founder_request(ttl_minutes: i64, parent: Option<TokenId>) -> MintRequest {
        MintRequest {
            role: AgentRole::Founder,
            tenant_id: TenantId::new("tenant-1"),
            ttl_minutes,
            scopes: BTreeSet::from(["ai:reasoning".to_string(), "ai:analysis".to_string()]),
            reason: "test mint".to_string(),
            parent_token_id: parent,
            request_id: RequestId::generate(),
        }
    }

    #[test]
    fn test_ttl_bounds() {
        let (_, authority) = setup();

        assert!(authority.mint(founder_request(5, None)).is_ok());
        assert!(authority.mint(founder_request(60, None)).is_ok());
        assert!(matches!(
            authority.mint(founder_request(4, None)),
            Err(AuthorityError::Validation(_))
        ));
        assert!(matches!(
            authority.mint(founder_request(61, None)),
            Err(AuthorityError::Validation(_))
        ));
    }

    #[test]
    fn test_mint_writes_audit_entry() {
        let (ledger, authority) = setup();
        let token = authority.mint(founder_request(30, None)).unwrap();

        let entries = ledger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, AuditEventType::TokenMinted);
        assert_eq!(entries[0].resource_id, token.token_id.to_string());
    }

    #[test]
    fn test_mint_drops_disallowed_scopes() {
        let (_, authority) = setup();
        let mut request = founder_request(30, None);
        request.scopes.insert("scm:org:create".to_string());

        let token = authority.mint(request).unwrap();
        assert!(!token.scopes.contains("scm:org:create"));
        assert!(token.scopes.contains("ai:reasoning"));
    }

    #[test]
    fn test_validate_round_trip() {
        let (_, authority) = setup();
        let token = authority.mint(founder_request(30, None)).unwrap();

        let validated = authority.validate(&token.signed_value).unwrap();
        assert_eq!(validated.token_id, token.token_id);
    }

    #[test]
    fn test_validate_unknown_token() {
        let (ledger, _) = setup();
        let other = CredentialAuthority::new(TokenSigner::new("key-test", [1u8; 32]), ledger);
        let (_, authority) = setup();

        // Signed by the same key but absent from this authority's registry.
        let token = other.mint(founder_request(30, None)).unwrap();
        assert!(matches!(
            authority.validate(&token.signed_value),
            Err(AuthorityError::NotFound(_))
        ));
    }

    #[test]
    fn test_revocation_cascades_to_descendants() {
        let (_, authority) = setup();
        let t1 = authority.mint(founder_request(30, None)).unwrap();
        let t2 = authority
            .mint(founder_request(30, Some(t1.token_id)))
            .unwrap();
        let t3 = authority
            .mint(founder_request(30, Some(t2.token_id)))
            .unwrap();

        let outcome = authority
            .revoke(t1.token_id, "operator action", RequestId::generate())
            .unwrap();

        assert_eq!(outcome.revoked_token_ids.len(), 3);
        for id in [t1.token_id, t2.token_id, t3.token_id] {
            assert!(outcome.revoked_token_ids.contains(&id));
        }

        assert!(matches!(
            authority.validate(&t2.signed_value),
            Err(AuthorityError::Revoked(_))
        ));
    }

    #[test]
    fn test_revocation_shares_one_timestamp_and_audits_each_token() {
        let (ledger, authority) = setup();
        let t1 = authority.mint(founder_request(30, None)).unwrap();
        let _t2 = authority
            .mint(founder_request(30, Some(t1.token_id)))
            .unwrap();

        let outcome = authority
            .revoke(t1.token_id, "operator action", RequestId::generate())
            .unwrap();

        let statuses: Vec<_> = outcome
            .revoked_token_ids
            .iter()
            .map(|id| authority.token_status(*id).unwrap())
            .collect();
        for status in &statuses {
            assert_eq!(status.token.revoked_at, Some(outcome.revoked_at));
        }

        let revoke_entries: Vec<_> = ledger
            .entries()
            .into_iter()
            .filter(|e| e.event_type == AuditEventType::TokenRevoked)
            .collect();
        assert_eq!(revoke_entries.len(), 2);
    }

    #[test]
    fn test_revoke_is_idempotent_with_empty_delta() {
        let (_, authority) = setup();
        let token = authority.mint(founder_request(30, None)).unwrap();

        let first = authority
            .revoke(token.token_id, "first", RequestId::generate())
            .unwrap();
        assert_eq!(first.revoked_token_ids.len(), 1);

        let second = authority
            .revoke(token.token_id, "second", RequestId::generate())
            .unwrap();
        assert!(second.revoked_token_ids.is_empty());
        assert_eq!(second.revoked_at, first.revoked_at);
    }

    #[test]
    fn test_revoke_unknown_token() {
        let (_, authority) = setup();
        assert!(matches!(
            authority.revoke(TokenId::generate(), "x", RequestId::generate()),
            Err(AuthorityError::NotFound(_))
        ));
    }

    #[test]
    fn test_mint_under_unknown_parent_fails() {
        let (_, authority) = setup();
        let result = authority.mint(founder_request(30, Some(TokenId::generate())));
        assert!(matches!(result, Err(AuthorityError::NotFound(_))));
    }

    #[test]
    fn test_mint_under_revoked_parent_fails() {
        let (_, authority) = setup();
        let parent = authority.mint(founder_request(30, None)).unwrap();
        authority
            .revoke(parent.token_id, "done", RequestId::generate())
            .unwrap();

        let result = authority.mint(founder_request(30, Some(parent.token_id)));
        assert!(matches!(result, Err(AuthorityError::Validation(_))));
    }

    #[test]
    fn test_expired_validate_auto_revokes_then_reports_revoked() {
        let (ledger, authority) = setup();
        let token = authority.mint(founder_request(30, None)).unwrap();

        // Force the deadline into the past directly in the registry.
        {
            let mut state = authority.inner.write().unwrap();
            let stored = state.tokens.get_mut(&token.token_id).unwrap();
            stored.expires_at = Utc::now() - Duration::minutes(1);
        }

        assert!(matches!(
            authority.validate(&token.signed_value),
            Err(AuthorityError::Expired(_))
        ));
        assert!(matches!(
            authority.validate(&token.signed_value),
            Err(AuthorityError::Revoked(_))
        ));

        let expired_entries: Vec<_> = ledger
            .entries()
            .into_iter()
            .filter(|e| e.event_type == AuditEventType::TokenExpired)
            .collect();
        assert_eq!(expired_entries.len(), 1);
    }

    #[test]
    fn test_sweep_expired_revokes_only_expired() {
        let (_, authority) = setup();
        let live = authority.mint(founder_request(30, None)).unwrap();
        let dead = authority.mint(founder_request(30, None)).unwrap();

        {
            let mut state = authority.inner.write().unwrap();
            let stored = state.tokens.get_mut(&dead.token_id).unwrap();
            stored.expires_at = Utc::now() - Duration::minutes(1);
        }

        let swept = authority.sweep_expired(RequestId::generate()).unwrap();
        assert_eq!(swept, vec![dead.token_id]);
        assert!(authority.validate(&live.signed_value).is_ok());
    }

    #[test]
    fn test_revoke_all_covers_active_tokens() {
        let (_, authority) = setup();
        let t1 = authority.mint(founder_request(30, None)).unwrap();
        let t2 = authority.mint(founder_request(30, None)).unwrap();

        let revoked = authority
            .revoke_all("shutdown", RequestId::generate())
            .unwrap();
        assert_eq!(revoked.len(), 2);
        assert!(revoked.contains(&t1.token_id));
        assert!(revoked.contains(&t2.token_id));
    }

    #[test]
    fn test_metrics_reflect_registry() {
        let (_, authority) = setup();
        let t1 = authority.mint(founder_request(30, None)).unwrap();
        let _t2 = authority
            .mint(founder_request(30, Some(t1.token_id)))
            .unwrap();
        authority
            .revoke(t1.token_id, "x", RequestId::generate())
            .unwrap();

        let metrics = authority.metrics();
        assert_eq!(metrics.total_tokens, 2);
        assert_eq!(metrics.active_tokens, 0);
        assert_eq!(metrics.revoked_tokens, 2);
        assert_eq!(metrics.lineages, 1);
    }

    proptest! {
        // Revoking any node of a randomly-shaped lineage forest revokes
        // exactly that node's subtree.
        #[test]
        fn property_revocation_closure_is_exact(
            parents in proptest::collection::vec(proptest::option::of(0usize..8), 1..9),
            target in 0usize..9,
        ) {
            let (_, authority) = setup();

            // Token 0 is the root; token i+1 optionally attaches to an
            // earlier token, which yields an arbitrary forest.
            let mut ids = vec![authority.mint(founder_request(30, None)).unwrap().token_id];
            for parent in &parents {
                let parent_id = parent.and_then(|p| ids.get(p).copied());
                let token = authority.mint(founder_request(30, parent_id)).unwrap();
                ids.push(token.token_id);
            }

            let target_id = ids[target % ids.len()];
            let outcome = authority
                .revoke(target_id, "prop", RequestId::generate())
                .unwrap();

            // Expected subtree, computed independently of the authority.
            let mut expected = vec![target_id];
            let mut grew = true;
            while grew {
                grew = false;
                for (child_index, parent) in parents.iter().enumerate() {
                    let child = ids[child_index + 1];
                    let parent_id = parent.and_then(|p| ids.get(p).copied());
                    if let Some(parent_id) = parent_id {
                        if expected.contains(&parent_id) && !expected.contains(&child) {
                            expected.push(child);
                            grew = true;
                        }
                    }
                }
            }

            let mut got = outcome.revoked_token_ids.clone();
            got.sort_by_key(|id| id.to_string());
            expected.sort_by_key(|id| id.to_string());
            prop_assert_eq!(got, expected);

            // Everything outside the subtree is still active.
            for id in &ids {
                let revoked = authority.token_status(*id).unwrap().token.revoked;
                prop_assert_eq!(revoked, outcome.revoked_token_ids.contains(id));
            }
        }
    }
}
