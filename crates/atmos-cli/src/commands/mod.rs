//! Command implementations

pub mod component_ops;
pub mod describe;
pub mod list;
pub mod selector;
pub mod toolchain;
pub mod validate;
pub mod workflow;

use crate::error::{CliError, Result};

/// Serialize a value as `yaml` or `json` for stdout.
pub fn format_output<T: serde::Serialize>(value: &T, format: &str) -> Result<String> {
    match format {
        "yaml" => serde_yaml::to_string(value)
            .map_err(|e| CliError::user(format!("cannot render yaml: {e}"))),
        "json" => serde_json::to_string_pretty(value)
            .map_err(|e| CliError::user(format!("cannot render json: {e}"))),
        other => Err(CliError::user(format!(
            "unknown format `{other}` (expected yaml or json)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_and_json_render() {
        let value = serde_json::json!({"a": 1});
        assert_eq!(format_output(&value, "yaml").unwrap(), "a: 1\n");
        assert!(format_output(&value, "json").unwrap().contains("\"a\": 1"));
        assert!(format_output(&value, "toml").is_err());
    }
}
