//! Warden external collaborator interfaces.
//!
//! The sandbox runtime (container/process isolation), the secret store
//! (signing-key custody), and the health probe are external collaborators:
//! Warden consumes their interfaces and never reimplements them. This crate
//! defines those interfaces plus in-memory implementations used by the
//! development profile and the test suites.

#![deny(unsafe_code)]

mod memory;
mod probe;
mod runtime;
mod secrets;

pub use memory::InMemorySandboxRuntime;
pub use probe::{HealthProbe, HttpHealthProbe, StaticHealthProbe};
pub use runtime::{
    ManagedSandbox, SandboxError, SandboxRuntime, SandboxSpec, SandboxStats, SecurityOptions,
    AGENT_ID_LABEL, MANAGED_BY_LABEL, MANAGED_BY_VALUE, TENANT_ID_LABEL,
};
pub use secrets::{InMemorySecretStore, SecretStore, SecretStoreError, SigningKeyMaterial};
