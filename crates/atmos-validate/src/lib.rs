//! JSON-schema and OPA policy validation
//!
//! Policies are declared under a component's `settings.validation` and
//! addressed by path under `schemas.jsonschema.base_path` /
//! `schemas.opa.base_path` (or given inline). Each policy is evaluated
//! with the materialized component configuration as input; the contract
//! is a string-valued `errors[]` collection - any non-empty set fails the
//! command with exit code 2.
//!
//! Policies run concurrently; outcomes are gathered and reported in
//! declaration order.

pub mod error;
pub mod policy;
pub mod schema;

pub use error::{Error, Result};

use atmos_fs::NormalizedPath;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One policy declaration under `settings.validation.<name>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySpec {
    #[serde(default)]
    pub description: String,
    pub schema_type: SchemaType,
    /// Path under the type's base path. Either this or `schema`.
    #[serde(default)]
    pub schema_path: Option<String>,
    /// Inline schema document (jsonschema only).
    #[serde(default)]
    pub schema: Option<serde_json::Value>,
    #[serde(default)]
    pub disabled: bool,
    /// Per-policy timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Jsonschema,
    Opa,
}

/// Outcome of one policy.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyOutcome {
    pub name: String,
    pub errors: Vec<String>,
}

/// All policy outcomes, declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub outcomes: Vec<PolicyOutcome>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.errors.is_empty())
    }

    /// Every error message, declaration order.
    pub fn messages(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .flat_map(|o| o.errors.iter().map(move |e| format!("{}: {e}", o.name)))
            .collect()
    }
}

/// Runs the validation plan of one component.
pub struct Validator {
    jsonschema_base: NormalizedPath,
    opa_base: NormalizedPath,
    default_timeout: Duration,
}

impl Validator {
    pub fn new(
        jsonschema_base: NormalizedPath,
        opa_base: NormalizedPath,
        default_timeout: Duration,
    ) -> Self {
        Self {
            jsonschema_base,
            opa_base,
            default_timeout,
        }
    }

    /// Parse `settings.validation` into an ordered policy list.
    pub fn plan(validation: &serde_json::Value) -> Result<Vec<(String, PolicySpec)>> {
        let Some(map) = validation.as_object() else {
            return Ok(Vec::new());
        };
        let mut plan = Vec::with_capacity(map.len());
        for (name, spec) in map {
            let spec: PolicySpec =
                serde_json::from_value(spec.clone()).map_err(|e| Error::PolicySpec {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            plan.push((name.clone(), spec));
        }
        Ok(plan)
    }

    /// Run every enabled policy against the component configuration.
    ///
    /// Policies fan out over threads; the report preserves declaration
    /// order regardless of completion order.
    pub fn validate(
        &self,
        input: &serde_json::Value,
        validation: &serde_json::Value,
    ) -> Result<ValidationReport> {
        let plan = Self::plan(validation)?;
        let enabled: Vec<_> = plan.into_iter().filter(|(_, s)| !s.disabled).collect();

        let results: Vec<Result<PolicyOutcome>> = std::thread::scope(|scope| {
            let handles: Vec<_> = enabled
                .iter()
                .map(|(name, spec)| {
                    scope.spawn(move || self.run_policy(name, spec, input))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("policy thread"))
                .collect()
        });

        let mut outcomes = Vec::with_capacity(results.len());
        for result in results {
            outcomes.push(result?);
        }
        Ok(ValidationReport { outcomes })
    }

    fn run_policy(
        &self,
        name: &str,
        spec: &PolicySpec,
        input: &serde_json::Value,
    ) -> Result<PolicyOutcome> {
        let timeout = Duration::from_secs(
            spec.timeout
                .unwrap_or_else(|| self.default_timeout.as_secs()),
        );
        tracing::debug!(policy = name, ?timeout, "running validation policy");
        let errors = match spec.schema_type {
            SchemaType::Jsonschema => {
                let document = self.load_schema(name, spec, &self.jsonschema_base)?;
                schema::validate(name, &document, input)?
            }
            SchemaType::Opa => {
                let path = spec.schema_path.as_ref().ok_or_else(|| Error::PolicySpec {
                    name: name.to_string(),
                    message: "opa policies require `schema_path`".to_string(),
                })?;
                let full = self.opa_base.join(path);
                policy::evaluate(name, &full, input, timeout)?
            }
        };
        Ok(PolicyOutcome {
            name: name.to_string(),
            errors,
        })
    }

    fn load_schema(
        &self,
        name: &str,
        spec: &PolicySpec,
        base: &NormalizedPath,
    ) -> Result<serde_json::Value> {
        if let Some(inline) = &spec.schema {
            return Ok(inline.clone());
        }
        let path = spec.schema_path.as_ref().ok_or_else(|| Error::PolicySpec {
            name: name.to_string(),
            message: "either `schema_path` or `schema` is required".to_string(),
        })?;
        let full = base.join(path);
        let content = atmos_fs::io::read_text(&full)?;
        // Schema files may be JSON or YAML
        serde_yaml::from_str(&content).map_err(|e| Error::SchemaLoad {
            path: full.to_native(),
            message: e.to_string(),
        })
    }
}
