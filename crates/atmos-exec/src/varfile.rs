//! Varfile synthesis
//!
//! Terraform and OpenTofu consume HCL varfiles; helmfile consumes YAML.
//! Typing rules: booleans, numbers and `null` render as-is, every other
//! scalar is a quoted string, and maps/lists keep their structure.
//!
//! The HCL renderer emits `key = value` pairs with two-space indentation.
//! Nothing is sorted; manifest order is the author's order.

use crate::{Error, Result};
use atmos_fs::NormalizedPath;
use atmos_stack::{ComponentConfig, Node};

/// The varfile name for a component in a stack:
/// `<stack>-<component>.terraform.tfvars` (`.vars.yaml` for helmfile).
pub fn varfile_name(config: &ComponentConfig) -> String {
    match config.kind.as_str() {
        "helmfile" => format!("{}-{}.vars.yaml", config.stack, config.name),
        _ => format!("{}-{}.terraform.tfvars", config.stack, config.name),
    }
}

/// Write the component's vars in the tool's expected format. Returns the
/// written path.
pub fn write_varfile(
    component_dir: &NormalizedPath,
    config: &ComponentConfig,
) -> Result<NormalizedPath> {
    let path = component_dir.join(&varfile_name(config));
    let rendered = match config.kind.as_str() {
        "helmfile" => serde_yaml::to_string(&config.vars).map_err(|e| Error::VarfileWrite {
            path: path.to_native(),
            message: e.to_string(),
        })?,
        _ => render_hcl_document(&config.vars),
    };
    atmos_fs::write_atomic(&path, rendered.as_bytes()).map_err(|e| Error::VarfileWrite {
        path: path.to_native(),
        message: e.to_string(),
    })?;
    tracing::debug!(path = %path, "varfile written");
    Ok(path)
}

/// Render a vars map as a tfvars document.
pub fn render_hcl_document(vars: &Node) -> String {
    let mut out = String::new();
    if let Some(map) = vars.as_map() {
        for (key, value) in map {
            out.push_str(&format!(
                "{} = {}\n",
                hcl_key(key),
                render_hcl_value(value, 0)
            ));
        }
    }
    out
}

fn render_hcl_value(node: &Node, depth: usize) -> String {
    let pad = "  ".repeat(depth + 1);
    let close_pad = "  ".repeat(depth);
    match node {
        Node::Null | Node::Unset => "null".to_string(),
        Node::Bool(b) => b.to_string(),
        Node::Int(i) => i.to_string(),
        Node::Float(f) => f.to_string(),
        Node::String(s) => quote_hcl(s),
        // A leftover function tag renders as its source spelling
        Node::Tagged { .. } => quote_hcl(&node.source_form()),
        Node::Seq(items) => {
            if items.is_empty() {
                return "[]".to_string();
            }
            let body: Vec<String> = items
                .iter()
                .map(|item| format!("{pad}{}", render_hcl_value(item, depth + 1)))
                .collect();
            format!("[\n{}\n{close_pad}]", body.join(",\n"))
        }
        Node::Map(map) => {
            if map.is_empty() {
                return "{}".to_string();
            }
            let body: Vec<String> = map
                .iter()
                .map(|(key, value)| {
                    format!(
                        "{pad}{} = {}",
                        hcl_key(key),
                        render_hcl_value(value, depth + 1)
                    )
                })
                .collect();
            format!("{{\n{}\n{close_pad}}}", body.join("\n"))
        }
    }
}

/// Bare identifiers stay bare; anything else is quoted.
fn hcl_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !key.chars().next().is_some_and(|c| c.is_ascii_digit());
    if bare {
        key.to_string()
    } else {
        quote_hcl(key)
    }
}

fn quote_hcl(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // Escape template interpolation so terraform takes it literally
            '$' if chars.peek() == Some(&'{') => out.push_str("$$"),
            '%' if chars.peek() == Some(&'{') => out.push_str("%%"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
