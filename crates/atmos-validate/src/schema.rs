//! JSON-schema policy evaluation

use crate::{Error, Result};

/// Validate an input document, returning one message per violation.
pub fn validate(
    name: &str,
    schema: &serde_json::Value,
    input: &serde_json::Value,
) -> Result<Vec<String>> {
    let validator = jsonschema::validator_for(schema).map_err(|e| Error::SchemaCompile {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    Ok(validator
        .iter_errors(input)
        .map(|e| {
            if e.instance_path.to_string().is_empty() {
                e.to_string()
            } else {
                format!("{}: {e}", e.instance_path)
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn violations_name_the_offending_path() {
        let schema = json!({
            "type": "object",
            "properties": {
                "vars": {
                    "type": "object",
                    "properties": {"cidr": {"type": "string"}}
                }
            }
        });
        let errors = validate("p", &schema, &json!({"vars": {"cidr": 42}})).unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("cidr"), "{}", errors[0]);
    }

    #[test]
    fn valid_input_has_no_errors() {
        let schema = json!({"type": "object"});
        assert!(validate("p", &schema, &json!({})).unwrap().is_empty());
    }

    #[test]
    fn bad_schema_is_a_compile_error() {
        let schema = json!({"type": "not-a-type"});
        assert!(matches!(
            validate("p", &schema, &json!({})),
            Err(Error::SchemaCompile { .. })
        ));
    }
}
