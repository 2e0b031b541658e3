//! Secret store collaborator interface
//!
//! The credential authority never generates or persists signing material
//! outside this collaborator in a production deployment. The in-memory
//! implementation generates keys lazily for development and tests.

use async_trait::async_trait;
use rand::RngCore;
use std::sync::RwLock;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Ed25519 seed plus a key identifier for rotation tracking.
#[derive(Debug, Clone)]
pub struct SigningKeyMaterial {
    pub key_id: String,
    pub seed: [u8; 32],
}

/// Secret store errors.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("Secret unavailable: {0}")]
    Unavailable(String),

    #[error("Secret store lock poisoned")]
    LockPoisoned,
}

/// Signing-key custody collaborator.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch (or provision) the current credential signing key.
    async fn signing_key(&self) -> Result<SigningKeyMaterial, SecretStoreError>;

    /// Replace the signing key with fresh material.
    async fn rotate_signing_key(&self) -> Result<SigningKeyMaterial, SecretStoreError>;

    /// Fetch (or provision) the ledger MAC key.
    async fn ledger_key(&self) -> Result<[u8; 32], SecretStoreError>;
}

/// Ephemeral in-memory secret store for development and tests.
pub struct InMemorySecretStore {
    signing: RwLock<Option<SigningKeyMaterial>>,
    ledger: RwLock<Option<[u8; 32]>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self {
            signing: RwLock::new(None),
            ledger: RwLock::new(None),
        }
    }

    fn fresh_material() -> SigningKeyMaterial {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        SigningKeyMaterial {
            key_id: format!("key-{}", &Uuid::new_v4().simple().to_string()[..12]),
            seed,
        }
    }
}

impl Default for InMemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn signing_key(&self) -> Result<SigningKeyMaterial, SecretStoreError> {
        let mut guard = self
            .signing
            .write()
            .map_err(|_| SecretStoreError::LockPoisoned)?;
        if let Some(material) = guard.as_ref() {
            return Ok(material.clone());
        }

        let material = Self::fresh_material();
        info!(key_id = %material.key_id, "Provisioned signing key");
        *guard = Some(material.clone());
        Ok(material)
    }

    async fn rotate_signing_key(&self) -> Result<SigningKeyMaterial, SecretStoreError> {
        let mut guard = self
            .signing
            .write()
            .map_err(|_| SecretStoreError::LockPoisoned)?;
        let material = Self::fresh_material();
        info!(key_id = %material.key_id, "Rotated signing key");
        *guard = Some(material.clone());
        Ok(material)
    }

    async fn ledger_key(&self) -> Result<[u8; 32], SecretStoreError> {
        let mut guard = self
            .ledger
            .write()
            .map_err(|_| SecretStoreError::LockPoisoned)?;
        if let Some(key) = guard.as_ref() {
            return Ok(*key);
        }

        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        *guard = Some(key);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signing_key_is_stable_until_rotation() {
        let store = InMemorySecretStore::new();

        let first = store.signing_key().await.unwrap();
        let second = store.signing_key().await.unwrap();
        assert_eq!(first.key_id, second.key_id);
        assert_eq!(first.seed, second.seed);

        let rotated = store.rotate_signing_key().await.unwrap();
        assert_ne!(first.key_id, rotated.key_id);
        assert_ne!(first.seed, rotated.seed);

        let after = store.signing_key().await.unwrap();
        assert_eq!(rotated.key_id, after.key_id);
    }

    #[tokio::test]
    async fn test_ledger_key_is_stable() {
        let store = InMemorySecretStore::new();
        assert_eq!(
            store.ledger_key().await.unwrap(),
            store.ledger_key().await.unwrap()
        );
    }
}
