//! Authentication context propagation for Atmos
//!
//! An [`AuthContext`] is the set of identities a resolver invocation runs
//! under, plus the chain of components that shaped it. The root context is
//! built from global `auth:` configuration at command entry; a component
//! whose materialized config declares its own `auth:` section derives a new
//! context for its subtree. Nested YAML-function evaluations always receive
//! the nearest ancestor's context - no evaluation path falls back to
//! ambient cloud credentials when a context exists upstream.
//!
//! Contexts carry a stable fingerprint so caches keyed on
//! `(tag, args, auth)` never serve a result computed under different
//! credentials.

use atmos_config::{AuthSettings, IdentityConfig};
use atmos_fs::Fingerprint;
use indexmap::IndexMap;
use serde::Serialize;

/// Credentials and identity chain attached to a resolver invocation.
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    identities: IndexMap<String, IdentityConfig>,
    /// Components whose `auth:` sections shaped this context, outermost
    /// first. The root context has an empty chain.
    chain: Vec<String>,
    fingerprint: String,
}

impl AuthContext {
    /// The root context, from global configuration only.
    pub fn root(global: &AuthSettings) -> Self {
        Self::build(global.identities.clone(), Vec::new())
    }

    /// Derive the context for a component's subtree.
    ///
    /// The component's identities merge key-wise over the parent's; the
    /// chain records the component. Callers only invoke this when the
    /// component actually declares `auth:` - a component without one
    /// reuses the parent context verbatim.
    pub fn derive(&self, component: &str, overrides: &AuthSettings) -> Self {
        let mut identities = self.identities.clone();
        for (name, identity) in &overrides.identities {
            identities.insert(name.clone(), merge_identity(identities.get(name), identity));
        }
        let mut chain = self.chain.clone();
        chain.push(component.to_string());
        tracing::debug!(component, chain = ?chain, "derived auth context");
        Self::build(identities, chain)
    }

    fn build(identities: IndexMap<String, IdentityConfig>, chain: Vec<String>) -> Self {
        let fingerprint = fingerprint_of(&identities, &chain);
        Self {
            identities,
            chain,
            fingerprint,
        }
    }

    /// Stable digest for cache keys.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Components that shaped this context, outermost first.
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn identities(&self) -> &IndexMap<String, IdentityConfig> {
        &self.identities
    }

    /// Environment variables to export to subprocesses under this context.
    ///
    /// Identity `env` maps are flattened in declaration order; later
    /// identities win on key conflicts. Cloud-specific credential
    /// synthesis beyond these maps is the auth collaborator's concern.
    pub fn env_exports(&self) -> IndexMap<String, String> {
        let mut exports = IndexMap::new();
        for identity in self.identities.values() {
            for (key, value) in &identity.env {
                exports.insert(key.clone(), value.clone());
            }
        }
        exports
    }
}

fn merge_identity(base: Option<&IdentityConfig>, overrides: &IdentityConfig) -> IdentityConfig {
    let Some(base) = base else {
        return overrides.clone();
    };
    let mut env = base.env.clone();
    for (k, v) in &overrides.env {
        env.insert(k.clone(), v.clone());
    }
    IdentityConfig {
        kind: overrides.kind.clone().or_else(|| base.kind.clone()),
        account: overrides.account.clone().or_else(|| base.account.clone()),
        role: overrides.role.clone().or_else(|| base.role.clone()),
        region: overrides.region.clone().or_else(|| base.region.clone()),
        env,
    }
}

fn fingerprint_of(identities: &IndexMap<String, IdentityConfig>, chain: &[String]) -> String {
    let mut fp = Fingerprint::new();
    for (name, identity) in identities {
        fp.add(name);
        fp.add(serde_json::to_string(identity).unwrap_or_default());
    }
    for link in chain {
        fp.add(link);
    }
    fp.finish()
}
