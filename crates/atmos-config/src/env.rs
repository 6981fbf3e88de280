//! `ATMOS_*` environment overrides
//!
//! Every recognized config field has an uppercase dot-to-underscore
//! environment key. Field names themselves contain underscores, so the
//! mapping is table-driven rather than split-on-underscore.

use serde_yaml::{Mapping, Value};

/// Recognized `(env suffix, dotted config path)` pairs.
///
/// `ATMOS_` + suffix overrides the field at the dotted path. Values parse
/// as YAML scalars so booleans and numbers keep their types.
const ENV_KEYS: &[(&str, &str)] = &[
    ("BASE_PATH", "base_path"),
    ("COMPONENTS_TERRAFORM_BASE_PATH", "components.terraform.base_path"),
    ("COMPONENTS_TERRAFORM_COMMAND", "components.terraform.command"),
    (
        "COMPONENTS_TERRAFORM_AUTO_GENERATE_BACKEND_FILE",
        "components.terraform.auto_generate_backend_file",
    ),
    (
        "COMPONENTS_TERRAFORM_INIT_RUN_RECONFIGURE",
        "components.terraform.init_run_reconfigure",
    ),
    (
        "COMPONENTS_TERRAFORM_APPEND_USER_AGENT",
        "components.terraform.append_user_agent",
    ),
    ("COMPONENTS_HELMFILE_BASE_PATH", "components.helmfile.base_path"),
    ("COMPONENTS_HELMFILE_COMMAND", "components.helmfile.command"),
    ("COMPONENTS_PACKER_BASE_PATH", "components.packer.base_path"),
    ("COMPONENTS_PACKER_COMMAND", "components.packer.command"),
    ("STACKS_BASE_PATH", "stacks.base_path"),
    ("STACKS_NAME_TEMPLATE", "stacks.name_template"),
    ("STACKS_NAME_PATTERN", "stacks.name_pattern"),
    ("LOGS_LEVEL", "logs.level"),
    ("LOGS_FILE", "logs.file"),
    ("SCHEMAS_JSONSCHEMA_BASE_PATH", "schemas.jsonschema.base_path"),
    ("SCHEMAS_OPA_BASE_PATH", "schemas.opa.base_path"),
    ("TEMPLATES_SETTINGS_ENABLED", "templates.settings.enabled"),
    ("TEMPLATES_SETTINGS_EVALUATIONS", "templates.settings.evaluations"),
    ("SETTINGS_LIST_MERGE_STRATEGY", "settings.list_merge_strategy"),
    (
        "SETTINGS_VALIDATION_TIMEOUT_SECONDS",
        "settings.validation.timeout_seconds",
    ),
    ("TOOLCHAIN_TOOLS_DIR", "toolchain.tools_dir"),
    ("TOOLCHAIN_TOOL_VERSIONS_FILE", "toolchain.tool_versions_file"),
    ("WORKFLOWS_BASE_PATH", "workflows.base_path"),
];

/// Environment variable prefix.
pub const PREFIX: &str = "ATMOS_";

/// Apply all `ATMOS_*` overrides present in the environment onto the
/// configuration value tree.
pub fn apply_env_overrides(config: &mut Value) {
    for (suffix, path) in ENV_KEYS {
        let var = format!("{PREFIX}{suffix}");
        if let Ok(raw) = std::env::var(&var) {
            tracing::debug!(var, path, "environment override");
            set_dotted(config, path, parse_scalar(&raw));
        }
    }
}

/// Parse a raw env value as a YAML scalar, falling back to a string.
fn parse_scalar(raw: &str) -> Value {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(v @ (Value::Bool(_) | Value::Number(_))) => v,
        _ => Value::String(raw.to_string()),
    }
}

/// Set a value at a dotted path, creating intermediate mappings.
fn set_dotted(root: &mut Value, dotted: &str, value: Value) {
    let mut parts: Vec<&str> = dotted.split('.').collect();
    let Some(last) = parts.pop() else { return };

    if !root.is_mapping() {
        *root = Value::Mapping(Mapping::new());
    }
    let mut current = root;
    for part in parts {
        let map = match current {
            Value::Mapping(map) => map,
            _ => return,
        };
        let entry = map
            .entry(Value::String(part.to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if !entry.is_mapping() {
            *entry = Value::Mapping(Mapping::new());
        }
        current = entry;
    }
    if let Value::Mapping(map) = current {
        map.insert(Value::String(last.to_string()), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_dotted_creates_intermediate_maps() {
        let mut root = Value::Mapping(Mapping::new());
        set_dotted(&mut root, "stacks.base_path", Value::String("s".into()));
        let expected: Value = serde_yaml::from_str("stacks:\n  base_path: s").unwrap();
        assert_eq!(root, expected);
    }

    #[test]
    fn scalars_keep_their_types() {
        assert_eq!(parse_scalar("true"), Value::Bool(true));
        assert_eq!(parse_scalar("3"), serde_yaml::from_str::<Value>("3").unwrap());
        assert_eq!(parse_scalar("debug"), Value::String("debug".into()));
    }

    #[test]
    fn overrides_land_on_the_documented_paths() {
        // ATMOS_STACKS_BASE_PATH maps to stacks.base_path per the table
        let entry = ENV_KEYS
            .iter()
            .find(|(suffix, _)| *suffix == "STACKS_BASE_PATH")
            .unwrap();
        assert_eq!(entry.1, "stacks.base_path");
    }
}
