//! Label-selector filtering for `list components`
//!
//! A deliberately small subset: comma-separated `key=value` and
//! `key!=value` conjunctions matched against a component's `vars` and
//! `settings` (dotted keys walk nested maps). The full selector grammar
//! lives in an external collaborator.

use crate::error::{CliError, Result};
use atmos_stack::Node;

#[derive(Debug, PartialEq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
}

/// A parsed selector expression.
#[derive(Debug, PartialEq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    pub fn parse(expression: &str) -> Result<Self> {
        let mut requirements = Vec::new();
        for clause in expression.split(',') {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            if let Some((key, value)) = clause.split_once("!=") {
                requirements.push(Requirement::NotEquals(
                    key.trim().to_string(),
                    value.trim().to_string(),
                ));
            } else if let Some((key, value)) = clause.split_once('=') {
                requirements.push(Requirement::Equals(
                    key.trim().to_string(),
                    value.trim().to_string(),
                ));
            } else {
                return Err(CliError::user(format!(
                    "invalid selector clause `{clause}` (expected key=value or key!=value)"
                )));
            }
        }
        Ok(Self { requirements })
    }

    /// Whether a component's vars+settings satisfy every requirement.
    pub fn matches(&self, vars: &Node, settings: &Node) -> bool {
        self.requirements.iter().all(|req| match req {
            Requirement::Equals(key, value) => {
                lookup(vars, settings, key).is_some_and(|v| v == *value)
            }
            Requirement::NotEquals(key, value) => {
                lookup(vars, settings, key) != Some(value.clone())
            }
        })
    }
}

fn lookup(vars: &Node, settings: &Node, dotted: &str) -> Option<String> {
    let path: Vec<&str> = dotted.split('.').collect();
    let node = vars
        .get_path(&path)
        .or_else(|| settings.get_path(&path))?;
    match node {
        Node::String(s) => Some(s.clone()),
        Node::Bool(b) => Some(b.to_string()),
        Node::Int(i) => Some(i.to_string()),
        Node::Float(f) => Some(f.to_string()),
        _ => None,
    }
}
