//! Role scope policy
//!
//! Maps each agent role to its allowed-scope set. Mint requests are
//! intersected with the allow-list: disallowed scopes are silently dropped
//! (least privilege without hard failure on over-asking), and only an empty
//! intersection rejects the request.

use crate::error::AuthorityError;
use std::collections::{BTreeSet, HashMap};
use warden_types::AgentRole;

/// Static role -> allowed-scope table.
pub struct RolePolicy {
    allowed: HashMap<AgentRole, BTreeSet<String>>,
    minimum: HashMap<AgentRole, BTreeSet<String>>,
}

fn scope_set(scopes: &[&str]) -> BTreeSet<String> {
    scopes.iter().map(|s| s.to_string()).collect()
}

impl RolePolicy {
    /// Allowed scopes for a role.
    pub fn scopes_for_role(&self, role: AgentRole) -> BTreeSet<String> {
        self.allowed.get(&role).cloned().unwrap_or_default()
    }

    /// Minimum scopes an agent of this role needs to operate at all. Used
    /// by the orchestrator to refuse spawning an underpowered agent.
    pub fn minimum_scopes(&self, role: AgentRole) -> BTreeSet<String> {
        self.minimum.get(&role).cloned().unwrap_or_default()
    }

    /// Intersect requested scopes with the role's allow-list.
    ///
    /// Disallowed scopes are dropped rather than rejected; only an empty
    /// result fails.
    pub fn validate_scopes(
        &self,
        role: AgentRole,
        requested: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, AuthorityError> {
        let allowed = self.scopes_for_role(role);
        let granted: BTreeSet<String> = requested.intersection(&allowed).cloned().collect();

        if granted.is_empty() {
            return Err(AuthorityError::Validation(format!(
                "no valid scopes for role {role}"
            )));
        }

        Ok(granted)
    }
}

impl Default for RolePolicy {
    fn default() -> Self {
        let mut allowed = HashMap::new();
        allowed.insert(
            AgentRole::Bootstrap,
            scope_set(&[
                "scm:org:create",
                "scm:repo:create",
                "scm:team:create",
                "scm:automation:write",
                "scm:secrets:write",
            ]),
        );
        allowed.insert(
            AgentRole::Founder,
            scope_set(&[
                "ai:reasoning",
                "ai:analysis",
                "ai:writing",
                "db:tenant:config:write",
                "db:business:metrics:read",
            ]),
        );
        allowed.insert(
            AgentRole::Developer,
            scope_set(&[
                "ci:project:create",
                "ci:repo:write",
                "ci:pipeline:write",
                "ci:workitem:write",
                "scm:repo:write",
            ]),
        );
        allowed.insert(
            AgentRole::Ops,
            scope_set(&[
                "ci:pipeline:manage",
                "ci:connection:create",
                "ci:pool:manage",
                "ci:monitoring:write",
            ]),
        );
        allowed.insert(
            AgentRole::Security,
            scope_set(&[
                "sec:scan",
                "sec:compliance:validate",
                "sec:policy:enforce",
                "scm:security:read",
            ]),
        );
        allowed.insert(
            AgentRole::Finance,
            scope_set(&[
                "db:cost:tracking:write",
                "db:budget:read",
                "ci:usage:read",
                "ai:cost:optimization",
            ]),
        );

        let mut minimum = HashMap::new();
        minimum.insert(AgentRole::Bootstrap, scope_set(&["scm:repo:create"]));
        minimum.insert(AgentRole::Founder, scope_set(&["ai:reasoning"]));
        minimum.insert(AgentRole::Developer, scope_set(&["scm:repo:write"]));
        minimum.insert(AgentRole::Ops, scope_set(&["ci:pipeline:manage"]));
        minimum.insert(AgentRole::Security, scope_set(&["sec:scan"]));
        minimum.insert(AgentRole::Finance, scope_set(&["db:budget:read"]));

        Self { allowed, minimum }
    }
}
