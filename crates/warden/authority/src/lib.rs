//! Warden credential authority.
//!
//! Mints, validates, and recursively revokes ephemeral scoped tokens. Every
//! mint and revocation is recorded in the audit ledger; token lineage forms
//! a forest over which revocation cascades to the full descendant closure.
//!
//! The authority is the only component that mutates token state. The
//! orchestrator and HTTP surface call its operations; they never touch
//! `EphemeralToken` fields directly.

#![deny(unsafe_code)]

mod authority;
mod error;
mod policy;
mod signer;

pub use authority::{
    AuthorityMetrics, CredentialAuthority, MintRequest, RevocationOutcome, TokenState,
    TokenStatusReport,
};
pub use error::AuthorityError;
pub use policy::RolePolicy;
pub use signer::{TokenClaims, TokenSigner, AUDIENCE, ISSUER};
