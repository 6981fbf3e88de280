//! Environment and datasource functions

use std::collections::HashMap;
use tera::{Result, Value};

fn string_arg(args: &HashMap<String, Value>, name: &str, func: &str) -> Result<String> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| tera::Error::msg(format!("{func}: missing string argument `{name}`")))
}

/// `{{ env(name="HOME") }}` - environment variable at render time, with an
/// optional `default`.
pub fn env_fn(args: &HashMap<String, Value>) -> Result<Value> {
    let name = string_arg(args, "name", "env")?;
    match std::env::var(&name) {
        Ok(value) => Ok(Value::String(value)),
        Err(_) => match args.get("default") {
            Some(default) => Ok(default.clone()),
            None => Err(tera::Error::msg(format!(
                "env: variable `{name}` is not set and no default was given"
            ))),
        },
    }
}

/// `{{ file(path="...") }}` - file contents as a string.
pub fn file_fn(args: &HashMap<String, Value>) -> Result<Value> {
    let path = string_arg(args, "path", "file")?;
    std::fs::read_to_string(&path)
        .map(Value::String)
        .map_err(|e| tera::Error::msg(format!("file: cannot read `{path}`: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn env_returns_default_when_unset() {
        let mut args = HashMap::new();
        args.insert("name".to_string(), json!("ATMOS_TEST_SURELY_UNSET"));
        args.insert("default".to_string(), json!("fallback"));
        assert_eq!(env_fn(&args).unwrap(), json!("fallback"));
    }

    #[test]
    fn env_without_default_errors_when_unset() {
        let mut args = HashMap::new();
        args.insert("name".to_string(), json!("ATMOS_TEST_SURELY_UNSET"));
        assert!(env_fn(&args).is_err());
    }

    #[test]
    fn file_reads_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "hello").unwrap();

        let mut args = HashMap::new();
        args.insert("path".to_string(), json!(path.to_string_lossy()));
        assert_eq!(file_fn(&args).unwrap(), json!("hello"));
    }
}
