//! `atmos describe component|stacks|config`

use super::format_output;
use crate::context::CommandContext;
use crate::error::Result;
use atmos_stack::MaterializeOptions;
use std::collections::BTreeMap;

/// Emit one component's materialized configuration.
pub fn component(
    ctx: &CommandContext,
    name: &str,
    stack: &str,
    format: &str,
    process_templates: bool,
    process_yaml_functions: bool,
) -> Result<String> {
    let opts = MaterializeOptions {
        process_templates,
        process_yaml_functions,
    };
    let config = ctx
        .materializer
        .materialize("terraform", name, stack, opts, None)?;
    format_output(config.as_ref(), format)
}

/// Emit stack identity -> components (or just identities).
pub fn stacks(
    ctx: &CommandContext,
    only: Option<&str>,
    with_components: bool,
    format: &str,
) -> Result<String> {
    let all = ctx.materializer.describe_stacks()?;
    let filtered: BTreeMap<String, Vec<String>> = all
        .into_iter()
        .filter(|(stack, _)| only.is_none_or(|s| s == stack.as_str()))
        .collect();

    if with_components {
        format_output(&filtered, format)
    } else {
        let names: Vec<&String> = filtered.keys().collect();
        format_output(&names, format)
    }
}

/// Emit the merged process configuration.
pub fn config(ctx: &CommandContext, format: &str) -> Result<String> {
    format_output(ctx.config.as_ref(), format)
}
