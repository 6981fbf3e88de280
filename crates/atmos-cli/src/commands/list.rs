//! `atmos list components|stacks|vars|values|settings|metadata`

use super::selector::Selector;
use crate::context::CommandContext;
use crate::error::{CliError, Result};
use atmos_stack::MaterializeOptions;

/// Component names, across all stacks or one, optionally filtered.
pub fn components(
    ctx: &CommandContext,
    stack: Option<&str>,
    selector: Option<&str>,
) -> Result<Vec<String>> {
    let stacks: Vec<String> = match stack {
        Some(stack) => vec![stack.to_string()],
        None => ctx.materializer.describe_stacks()?.keys().cloned().collect(),
    };
    let selector = selector.map(Selector::parse).transpose()?;

    let mut names = Vec::new();
    for stack in &stacks {
        for kind in ["terraform", "helmfile", "packer"] {
            for name in ctx.materializer.list_components(kind, stack)? {
                if let Some(selector) = &selector {
                    let config = ctx.materializer.materialize(
                        kind,
                        &name,
                        stack,
                        // Selection never triggers infrastructure reads
                        MaterializeOptions {
                            process_templates: true,
                            process_yaml_functions: false,
                        },
                        None,
                    )?;
                    if !selector.matches(&config.vars, &config.settings) {
                        continue;
                    }
                }
                names.push(name);
            }
        }
    }
    names.sort();
    names.dedup();
    Ok(names)
}

/// Stack identities.
pub fn stacks(ctx: &CommandContext) -> Result<Vec<String>> {
    Ok(ctx.materializer.describe_stacks()?.keys().cloned().collect())
}

/// Which section of a component to print.
pub enum Section {
    Vars,
    Settings,
    Metadata,
}

pub fn section(
    ctx: &CommandContext,
    component: &str,
    stack: &str,
    section: Section,
) -> Result<String> {
    let config = ctx.materializer.materialize(
        "terraform",
        component,
        stack,
        MaterializeOptions::default(),
        None,
    )?;
    let rendered = match section {
        Section::Vars => serde_yaml::to_string(&config.vars),
        Section::Settings => serde_yaml::to_string(&config.settings),
        Section::Metadata => serde_yaml::to_string(&config.metadata),
    };
    rendered.map_err(|e| CliError::user(format!("cannot render yaml: {e}")))
}

/// Vars narrowed by an optional dotted query.
pub fn values(
    ctx: &CommandContext,
    component: &str,
    stack: &str,
    query: Option<&str>,
) -> Result<String> {
    let config = ctx.materializer.materialize(
        "terraform",
        component,
        stack,
        MaterializeOptions::default(),
        None,
    )?;
    let node = match query {
        Some(query) => {
            let path: Vec<&str> = query.split('.').collect();
            config
                .vars
                .get_path(&path)
                .cloned()
                .ok_or_else(|| CliError::user(format!("no value at `{query}`")))?
        }
        None => config.vars.clone(),
    };
    serde_yaml::to_string(&node).map_err(|e| CliError::user(format!("cannot render yaml: {e}")))
}
