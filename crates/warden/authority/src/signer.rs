//! Credential signing and verification
//!
//! Credentials are compact two-part blobs: base64url(claims JSON) "." then
//! base64url(Ed25519 signature over the claims bytes). The signing key is
//! supplied by the secret store collaborator; the signer never writes key
//! material anywhere.

use crate::error::AuthorityError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use warden_types::{AgentRole, TenantId, TokenId};

/// Issuer embedded in every credential.
pub const ISSUER: &str = "warden-authority";

/// Audience embedded in every credential.
pub const AUDIENCE: &str = "warden-collaborators";

/// Claims embedded in a signed credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Token id
    pub jti: TokenId,
    /// Issuer
    pub iss: String,
    /// Subject, `agent:<role>`
    pub sub: String,
    /// Audience
    pub aud: String,
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
    pub tenant_id: TenantId,
    pub role: AgentRole,
    pub scopes: BTreeSet<String>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_token_id: Option<TokenId>,
}

/// Signs and verifies credentials with an Ed25519 keypair.
pub struct TokenSigner {
    key_id: String,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl TokenSigner {
    /// Build a signer from secret-store key material.
    pub fn new(key_id: impl Into<String>, seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            key_id: key_id.into(),
            signing_key,
            verifying_key,
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign claims into a credential blob.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, AuthorityError> {
        let payload = serde_json::to_vec(claims)
            .map_err(|e| AuthorityError::Signature(format!("claims serialization: {e}")))?;
        let signature = self.signing_key.sign(&payload);

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature.to_bytes()),
        ))
    }

    /// Verify a credential blob and return its claims.
    ///
    /// Checks the signature, issuer, and audience. Any failure is fatal to
    /// the call; there is no retry path.
    pub fn verify(&self, signed_value: &str) -> Result<TokenClaims, AuthorityError> {
        let (payload_b64, signature_b64) = signed_value
            .split_once('.')
            .ok_or_else(|| AuthorityError::Signature("malformed credential".to_string()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|e| AuthorityError::Signature(format!("payload encoding: {e}")))?;
        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| AuthorityError::Signature(format!("signature encoding: {e}")))?;

        let signature = Signature::from_slice(&signature_bytes)
            .map_err(|e| AuthorityError::Signature(format!("signature length: {e}")))?;
        self.verifying_key
            .verify(&payload, &signature)
            .map_err(|_| AuthorityError::Signature("signature verification failed".to_string()))?;

        let claims: TokenClaims = serde_json::from_slice(&payload)
            .map_err(|e| AuthorityError::Signature(format!("claims decoding: {e}")))?;

        if claims.iss != ISSUER {
            return Err(AuthorityError::Signature(format!(
                "unexpected issuer: {}",
                claims.iss
            )));
        }
        if claims.aud != AUDIENCE {
            return Err(AuthorityError::Signature(format!(
                "unexpected audience: {}",
                claims.aud
            )));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn signer() -> TokenSigner {
        TokenSigner::new("key-test", [9u8; 32])
    }

    fn claims() -> TokenClaims {
        let now = Utc::now().timestamp();
        TokenClaims {
            jti: TokenId::generate(),
            iss: ISSUER.to_string(),
            sub: "agent:founder".to_string(),
            aud: AUDIENCE.to_string(),
            iat: now,
            exp: now + 1800,
            tenant_id: TenantId::new("tenant-1"),
            role: AgentRole::Founder,
            scopes: BTreeSet::from(["ai:reasoning".to_string()]),
            reason: "test".to_string(),
            parent_token_id: None,
        }
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let signer = signer();
        let claims = claims();

        let signed = signer.sign(&claims).unwrap();
        let verified = signer.verify(&signed).unwrap();

        assert_eq!(verified.jti, claims.jti);
        assert_eq!(verified.role, claims.role);
        assert_eq!(verified.scopes, claims.scopes);
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let signer = signer();
        let signed = signer.sign(&claims()).unwrap();

        // Re-encode a modified payload while keeping the original signature.
        let (payload_b64, signature_b64) = signed.split_once('.').unwrap();
        let mut payload = URL_SAFE_NO_PAD.decode(payload_b64).unwrap();
        let position = payload
            .windows(7)
            .position(|w| w == b"founder")
            .expect("payload mentions role");
        payload[position..position + 7].copy_from_slice(b"fownder");
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(&payload), signature_b64);

        assert!(matches!(
            signer.verify(&forged),
            Err(AuthorityError::Signature(_))
        ));
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let signed = signer().sign(&claims()).unwrap();
        let other = TokenSigner::new("key-other", [13u8; 32]);

        assert!(matches!(
            other.verify(&signed),
            Err(AuthorityError::Signature(_))
        ));
    }

    #[test]
    fn test_malformed_blob_is_rejected() {
        assert!(matches!(
            signer().verify("definitely-not-a-credential"),
            Err(AuthorityError::Signature(_))
        ));
    }

    #[test]
    fn test_wrong_issuer_is_rejected() {
        let signer = signer();
        let mut claims = claims();
        claims.iss = "someone-else".to_string();
        let signed = signer.sign(&claims).unwrap();

        assert!(matches!(
            signer.verify(&signed),
            Err(AuthorityError::Signature(_))
        ));
    }
}
