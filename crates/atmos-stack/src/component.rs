//! Materialized component configuration

use crate::merge::SourcesTrail;
use crate::node::Node;
use atmos_config::AuthSettings;
use indexmap::IndexMap;
use serde::Serialize;

/// Whether a component is provisionable or an inheritance base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    #[default]
    Real,
    Abstract,
}

/// The `metadata` section of a component. Not inherited: a component's
/// metadata comes from its own section only, so an abstract base never
/// makes its children abstract.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Metadata {
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub inherits: Vec<String>,
    /// Overrides which directory under `components/<kind>/` to execute.
    pub component: Option<String>,
    pub terraform_workspace: Option<String>,
}

impl Metadata {
    pub fn from_node(node: Option<&Node>) -> Self {
        let Some(map) = node.and_then(Node::as_map) else {
            return Self::default();
        };
        let component_type = match map.get("type").and_then(Node::as_str) {
            Some("abstract") => ComponentType::Abstract,
            _ => ComponentType::Real,
        };
        let inherits = map
            .get("inherits")
            .map(|n| match n {
                Node::Seq(items) => items
                    .iter()
                    .filter_map(Node::as_str)
                    .map(str::to_string)
                    .collect(),
                Node::String(s) => vec![s.clone()],
                _ => Vec::new(),
            })
            .unwrap_or_default();
        Self {
            component_type,
            inherits,
            component: map.get("component").and_then(Node::as_str).map(str::to_string),
            terraform_workspace: map
                .get("terraform_workspace")
                .and_then(Node::as_str)
                .map(str::to_string),
        }
    }
}

/// The fully materialized configuration for a `(kind, component, stack)`.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentConfig {
    pub kind: String,
    pub name: String,
    pub stack: String,
    /// Directory under `components/<kind>/` the dispatcher executes.
    pub component: String,
    /// External binary overriding `components.<kind>.command`.
    pub command: Option<String>,
    pub vars: Node,
    pub settings: Node,
    /// Subprocess environment deltas. `None` removes an inherited
    /// variable; values are exported verbatim.
    pub env: IndexMap<String, Option<String>>,
    pub backend_type: Option<String>,
    pub backend: Node,
    pub remote_state_backend_type: Option<String>,
    pub remote_state_backend: Node,
    pub metadata: Metadata,
    /// Component-level identity overrides, if declared.
    pub auth: Option<AuthSettings>,
    /// Manifest paths (relative to `stacks.base_path`) this configuration
    /// transitively depends on, sorted.
    pub deps: Vec<String>,
    /// Per-variable audit trail.
    pub sources: SourcesTrail,
}

impl ComponentConfig {
    pub fn is_abstract(&self) -> bool {
        self.metadata.component_type == ComponentType::Abstract
    }

    /// The workspace the dispatcher selects: the metadata override when
    /// present, the stack identity otherwise.
    pub fn workspace(&self) -> &str {
        self.metadata
            .terraform_workspace
            .as_deref()
            .unwrap_or(&self.stack)
    }

    /// Whether any section still carries deferred YAML functions.
    pub fn has_pending_functions(&self) -> bool {
        self.vars.has_tagged()
            || self.settings.has_tagged()
            || self.backend.has_tagged()
            || self.remote_state_backend.has_tagged()
    }
}

/// Convert a merged `env` node into the typed subprocess delta map.
///
/// An `Unset` tombstone (from an explicit `null`) maps to `None`; scalars
/// stringify; anything else is skipped with a warning.
pub fn env_map_from_node(node: &Node) -> IndexMap<String, Option<String>> {
    let mut out = IndexMap::new();
    let Some(map) = node.as_map() else {
        return out;
    };
    for (key, value) in map {
        match value {
            Node::Unset | Node::Null => {
                out.insert(key.clone(), None);
            }
            Node::String(s) => {
                out.insert(key.clone(), Some(s.clone()));
            }
            Node::Bool(b) => {
                out.insert(key.clone(), Some(b.to_string()));
            }
            Node::Int(i) => {
                out.insert(key.clone(), Some(i.to_string()));
            }
            Node::Float(f) => {
                out.insert(key.clone(), Some(f.to_string()));
            }
            other => {
                tracing::warn!(key, "ignoring non-scalar env value: {other:?}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(yaml: &str) -> Node {
        Node::from(serde_yaml::from_str::<serde_yaml::Value>(yaml).unwrap())
    }

    #[test]
    fn metadata_parses_abstract_type() {
        let metadata = Metadata::from_node(Some(&node("type: abstract\ninherits: [base]")));
        assert_eq!(metadata.component_type, ComponentType::Abstract);
        assert_eq!(metadata.inherits, vec!["base"]);
    }

    #[test]
    fn metadata_defaults_to_real() {
        let metadata = Metadata::from_node(None);
        assert_eq!(metadata.component_type, ComponentType::Real);
        assert!(metadata.inherits.is_empty());
    }

    #[test]
    fn env_map_translates_tombstones_to_removals() {
        let mut merged = node("KEEP: value\nCOUNT: 3");
        crate::merge::deep_merge(
            &mut merged,
            &node("DROP: null"),
            atmos_config::ListMergeStrategy::Replace,
        );
        let env = env_map_from_node(&merged);
        assert_eq!(env["KEEP"], Some("value".to_string()));
        assert_eq!(env["COUNT"], Some("3".to_string()));
        assert_eq!(env["DROP"], None);
    }

    #[test]
    fn workspace_prefers_metadata_override() {
        let mut config = ComponentConfig {
            kind: "terraform".into(),
            name: "vpc".into(),
            stack: "plat-ue2-dev".into(),
            component: "vpc".into(),
            command: None,
            vars: Node::map(),
            settings: Node::map(),
            env: IndexMap::new(),
            backend_type: None,
            backend: Node::map(),
            remote_state_backend_type: None,
            remote_state_backend: Node::map(),
            metadata: Metadata::default(),
            auth: None,
            deps: Vec::new(),
            sources: SourcesTrail::new(),
        };
        assert_eq!(config.workspace(), "plat-ue2-dev");

        config.metadata.terraform_workspace = Some("custom-ws".into());
        assert_eq!(config.workspace(), "custom-ws");
    }
}
