//! String and collection filters

use std::collections::HashMap;
use tera::{Result, Value};

/// `{{ value | to_yaml }}` - serialize any value as a YAML document
/// without the trailing newline.
pub fn to_yaml(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    let yaml = serde_yaml::to_string(value)
        .map_err(|e| tera::Error::msg(format!("to_yaml: {e}")))?;
    Ok(Value::String(yaml.trim_end().to_string()))
}

/// `{{ value | to_json }}` - compact JSON.
pub fn to_json(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    let json =
        serde_json::to_string(value).map_err(|e| tera::Error::msg(format!("to_json: {e}")))?;
    Ok(Value::String(json))
}

/// `{{ value | to_json_pretty }}` - indented JSON.
pub fn to_json_pretty(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| tera::Error::msg(format!("to_json_pretty: {e}")))?;
    Ok(Value::String(json))
}

/// `{{ name | basename }}` - final path segment.
pub fn basename(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("basename: expected a string"))?;
    let base = s.trim_end_matches('/').rsplit('/').next().unwrap_or(s);
    Ok(Value::String(base.to_string()))
}
