//! `atmos validate stacks|component`

use crate::context::CommandContext;
use crate::error::{CliError, Result};
use atmos_fs::NormalizedPath;
use atmos_stack::MaterializeOptions;
use atmos_validate::Validator;
use std::time::Duration;

fn validator_for(ctx: &CommandContext) -> Validator {
    let base = |path: &str| {
        let p = NormalizedPath::new(path);
        if path.is_empty() {
            ctx.project_root.clone()
        } else if p.is_absolute() {
            p
        } else {
            ctx.project_root.join(path)
        }
    };
    Validator::new(
        base(&ctx.config.schemas.jsonschema.base_path),
        base(&ctx.config.schemas.opa.base_path),
        Duration::from_secs(ctx.config.settings.validation.timeout_seconds),
    )
}

/// Run one component's `settings.validation` policies. Exit 2 on failure.
pub fn component(ctx: &CommandContext, name: &str, stack: &str) -> Result<String> {
    let config = ctx.materializer.materialize(
        "terraform",
        name,
        stack,
        MaterializeOptions::default(),
        None,
    )?;

    let validation = config
        .settings
        .get_path(&["validation"])
        .map(|n| n.to_json())
        .unwrap_or(serde_json::Value::Null);
    if validation.is_null() {
        return Ok(format!("component `{name}` declares no validation"));
    }

    let input = serde_json::to_value(config.as_ref())
        .map_err(|e| CliError::user(format!("cannot serialize component: {e}")))?;
    let report = validator_for(ctx).validate(&input, &validation)?;
    if report.passed() {
        Ok(format!(
            "component `{name}` passed {} polic{}",
            report.outcomes.len(),
            if report.outcomes.len() == 1 { "y" } else { "ies" }
        ))
    } else {
        Err(CliError::ValidationFailed {
            messages: report.messages(),
        })
    }
}

/// Materialize every component of every stack; collect failures.
pub fn stacks(ctx: &CommandContext) -> Result<String> {
    let stacks = ctx.materializer.describe_stacks()?;
    let mut failures = Vec::new();
    let mut checked = 0usize;

    for (stack, components) in &stacks {
        for component in components {
            checked += 1;
            let result = ctx.materializer.materialize(
                "terraform",
                component,
                stack,
                // Functions stay unevaluated: validation must not reach
                // into live infrastructure
                MaterializeOptions {
                    process_templates: true,
                    process_yaml_functions: false,
                },
                None,
            );
            if let Err(e) = result {
                failures.push(format!("{stack}/{component}: {e}"));
            }
        }
    }

    if failures.is_empty() {
        Ok(format!(
            "all stacks valid ({} stacks, {checked} components)",
            stacks.len()
        ))
    } else {
        Err(CliError::ValidationFailed { messages: failures })
    }
}
