//! Typed configuration sections of `atmos.yaml`
//!
//! Every field can be overridden by an `ATMOS_*` environment variable and
//! by command-line flags; see [`crate::loader`] for precedence. Unknown
//! keys are preserved for `describe config` via the free-form sections.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The merged, immutable process configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmosConfig {
    /// Root every relative path below resolves against.
    pub base_path: String,

    pub components: ComponentsConfig,
    pub stacks: StacksConfig,
    pub logs: LogsConfig,
    pub schemas: SchemasConfig,
    pub templates: TemplatesConfig,
    pub settings: SettingsConfig,
    pub stores: IndexMap<String, StoreConfig>,
    pub toolchain: ToolchainConfig,
    pub auth: AuthSettings,
    pub workflows: WorkflowsConfig,
    pub commands: Vec<CustomCommand>,

    /// Vendor manifest location; fetching is an external collaborator.
    pub vendor: serde_yaml::Value,

    /// Free-form integration settings, passed through to describe output.
    pub integrations: serde_yaml::Value,
}

/// Per-kind component execution settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentsConfig {
    pub terraform: ComponentTypeConfig,
    pub helmfile: ComponentTypeConfig,
    pub packer: ComponentTypeConfig,
}

impl ComponentsConfig {
    /// Settings for a component kind by name.
    pub fn for_kind(&self, kind: &str) -> Option<&ComponentTypeConfig> {
        match kind {
            "terraform" => Some(&self.terraform),
            "helmfile" => Some(&self.helmfile),
            "packer" => Some(&self.packer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentTypeConfig {
    /// Directory holding this kind's component folders.
    pub base_path: String,
    /// Default binary; a component's `command` or `metadata.component`
    /// level setting wins over this.
    pub command: String,
    pub auto_generate_backend_file: bool,
    pub init_run_reconfigure: bool,
    pub append_user_agent: Option<String>,
}

impl Default for ComponentTypeConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            command: String::new(),
            auto_generate_backend_file: false,
            init_run_reconfigure: false,
            append_user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StacksConfig {
    pub base_path: String,
    pub included_paths: Vec<String>,
    pub excluded_paths: Vec<String>,
    /// Template rendered against a manifest's vars to produce the stack
    /// identity. Preferred over `name_pattern` when both are set.
    pub name_template: Option<String>,
    /// Token-substitution fallback, e.g. `{tenant}-{environment}-{stage}`.
    pub name_pattern: Option<String>,
}

impl Default for StacksConfig {
    fn default() -> Self {
        Self {
            base_path: "stacks".to_string(),
            included_paths: vec!["**/*.yaml".to_string(), "**/*.yml".to_string()],
            excluded_paths: Vec::new(),
            name_template: None,
            name_pattern: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemasConfig {
    pub jsonschema: SchemaPathConfig,
    pub opa: SchemaPathConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaPathConfig {
    pub base_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub settings: TemplateSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    pub enabled: bool,
    /// Full-manifest render passes; >1 lets templates construct templates.
    pub evaluations: u32,
    /// Optional custom `[open, close]` delimiters.
    pub delimiters: Option<[String; 2]>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            evaluations: 1,
            delimiters: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub list_merge_strategy: ListMergeStrategy,
    pub validation: ValidationDefaults,
}

/// How sequences combine during deep merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListMergeStrategy {
    /// Right replaces left.
    #[default]
    Replace,
    /// Left ++ right, preserving order.
    Append,
    /// Index-wise deep merge up to the right list's length.
    Merge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationDefaults {
    /// Per-policy timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for ValidationDefaults {
    fn default() -> Self {
        Self { timeout_seconds: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(rename = "type")]
    pub kind: StoreKind,
    #[serde(default)]
    pub options: IndexMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKind {
    Memory,
    YamlFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub registries: Vec<RegistryConfig>,
    /// Root of the installed-tool layout, `.tools` by default.
    pub tools_dir: String,
    pub tool_versions_file: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            registries: Vec::new(),
            tools_dir: ".tools".to_string(),
            tool_versions_file: ".tool-versions".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RegistryKind,
    /// Index URI / path for aqua registries; inline package map otherwise.
    #[serde(default)]
    pub source: serde_yaml::Value,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    Aqua,
    Inline,
}

/// Per-source override of the download retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval_ms: 500,
        }
    }
}

/// Global auth configuration; components may override per identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub identities: IndexMap<String, IdentityConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub kind: Option<String>,
    pub account: Option<String>,
    pub role: Option<String>,
    pub region: Option<String>,
    /// Extra variables exported to subprocesses under this identity.
    pub env: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowsConfig {
    pub base_path: String,
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            base_path: "workflows".to_string(),
        }
    }
}

/// A user-defined subcommand surfaced by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomCommand {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Alias kept for the CLI's `commands` listing.
pub type CommandsConfig = Vec<CustomCommand>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_usable_without_a_config_file() {
        let config = AtmosConfig::default();
        assert_eq!(config.stacks.base_path, "stacks");
        assert_eq!(config.settings.list_merge_strategy, ListMergeStrategy::Replace);
        assert_eq!(config.templates.settings.evaluations, 1);
        assert_eq!(config.toolchain.tools_dir, ".tools");
        assert_eq!(config.settings.validation.timeout_seconds, 30);
    }

    #[test]
    fn list_merge_strategy_parses_lowercase() {
        let s: ListMergeStrategy = serde_yaml::from_str("append").unwrap();
        assert_eq!(s, ListMergeStrategy::Append);
    }

    #[test]
    fn minimal_config_deserializes() {
        let yaml = r#"
base_path: .
components:
  terraform:
    base_path: components/terraform
    command: terraform
    auto_generate_backend_file: true
stacks:
  base_path: stacks
  included_paths:
    - "orgs/**/*.yaml"
  name_pattern: "{tenant}-{environment}-{stage}"
"#;
        let config: AtmosConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.components.terraform.command, "terraform");
        assert!(config.components.terraform.auto_generate_backend_file);
        assert_eq!(
            config.stacks.name_pattern.as_deref(),
            Some("{tenant}-{environment}-{stage}")
        );
    }

    #[test]
    fn registry_config_defaults_priority_to_zero() {
        let yaml = r#"
name: default
type: aqua
source: https://example.com/registry.yaml
"#;
        let registry: RegistryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(registry.priority, 0);
        assert_eq!(registry.kind, RegistryKind::Aqua);
    }
}
