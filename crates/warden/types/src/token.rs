//! Ephemeral token data model

use crate::{AgentRole, TenantId, TokenId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Minimum token time-to-live in minutes.
pub const MIN_TTL_MINUTES: i64 = 5;

/// Maximum token time-to-live in minutes.
pub const MAX_TTL_MINUTES: i64 = 60;

/// A short-lived, scoped, signed credential.
///
/// Tokens form a forest keyed by `parent_token_id`; revoking a token revokes
/// its entire subtree. Revocation is monotonic: once `revoked` is set it is
/// never cleared, and the record itself is retained for audit traceability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EphemeralToken {
    /// Opaque unique identifier
    pub token_id: TokenId,

    /// Signed credential blob handed to the agent
    pub signed_value: String,

    /// Role the token was minted for
    pub role: AgentRole,

    /// Tenant isolation boundary
    pub tenant_id: TenantId,

    /// Granted scopes (the intersection of the request with the role policy)
    pub scopes: BTreeSet<String>,

    /// Issuance timestamp
    pub issued_at: DateTime<Utc>,

    /// Absolute expiry deadline; never extended
    pub expires_at: DateTime<Utc>,

    /// Parent token in the issuance lineage, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_token_id: Option<TokenId>,

    /// Whether the token has been revoked
    pub revoked: bool,

    /// Revocation timestamp, if revoked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,

    /// Business justification recorded at mint time
    pub reason: String,
}

impl EphemeralToken {
    /// The expiry deadline has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Neither revoked nor expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_token(expires_in_minutes: i64) -> EphemeralToken {
        let issued_at = Utc::now();
        EphemeralToken {
            token_id: TokenId::generate(),
            signed_value: "sig".to_string(),
            role: AgentRole::Founder,
            tenant_id: TenantId::new("tenant-1"),
            scopes: BTreeSet::from(["ai:reasoning".to_string()]),
            issued_at,
            expires_at: issued_at + Duration::minutes(expires_in_minutes),
            parent_token_id: None,
            revoked: false,
            revoked_at: None,
            reason: "test".to_string(),
        }
    }

    #[test]
    fn test_active_within_window() {
        let token = sample_token(30);
        assert!(token.is_active(Utc::now()));
        assert!(!token.is_expired(Utc::now()));
    }

    #[test]
    fn test_expired_after_deadline() {
        let token = sample_token(30);
        let later = Utc::now() + Duration::minutes(31);
        assert!(token.is_expired(later));
        assert!(!token.is_active(later));
    }

    #[test]
    fn test_revoked_is_never_active() {
        let mut token = sample_token(30);
        token.revoked = true;
        token.revoked_at = Some(Utc::now());
        assert!(!token.is_active(Utc::now()));
    }
}
