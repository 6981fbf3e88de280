//! `atmos workflow <name> -f <file>`
//!
//! Workflow manifests live under `workflows.base_path`:
//!
//! ```yaml
//! workflows:
//!   deploy-networking:
//!     description: Plan and apply the network layer
//!     steps:
//!       - command: terraform plan vpc
//!         stack: plat-ue2-dev
//!       - command: echo done
//!         type: shell
//! ```
//!
//! Steps run sequentially; `atmos` steps go through the dispatcher, shell
//! steps through the host shell. The first failing step stops the run.

use super::component_ops;
use crate::context::CommandContext;
use crate::error::{CliError, Result};
use atmos_fs::NormalizedPath;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct WorkflowManifest {
    workflows: BTreeMap<String, Workflow>,
}

#[derive(Debug, Deserialize)]
struct Workflow {
    #[serde(default)]
    description: String,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    command: String,
    #[serde(default)]
    stack: Option<String>,
    #[serde(rename = "type", default)]
    step_type: StepType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StepType {
    #[default]
    Atmos,
    Shell,
}

pub fn run(ctx: &CommandContext, name: &str, file: &str, _args: &[String]) -> Result<i32> {
    let path = workflow_path(ctx, file);
    let content = atmos_fs::io::read_text(&path).map_err(atmos_stack::Error::from)?;
    let manifest: WorkflowManifest = serde_yaml::from_str(&content)
        .map_err(|e| CliError::user(format!("cannot parse workflow file {path}: {e}")))?;

    let workflow = manifest
        .workflows
        .get(name)
        .ok_or_else(|| CliError::user(format!("workflow `{name}` not found in {path}")))?;
    tracing::info!(workflow = name, description = %workflow.description, "running workflow");

    for (index, step) in workflow.steps.iter().enumerate() {
        tracing::info!(step = index + 1, command = %step.command, "workflow step");
        let code = match step.step_type {
            StepType::Atmos => run_atmos_step(ctx, step)?,
            StepType::Shell => run_shell_step(ctx, step)?,
        };
        if code != 0 {
            return Ok(code);
        }
    }
    Ok(0)
}

/// `terraform <op> <component>` / `helmfile <op> <component>` spellings.
fn run_atmos_step(ctx: &CommandContext, step: &Step) -> Result<i32> {
    let parts: Vec<&str> = step.command.split_whitespace().collect();
    let [kind, operation, component] = parts.as_slice() else {
        return Err(CliError::user(format!(
            "workflow step `{}` must be `<kind> <operation> <component>`",
            step.command
        )));
    };
    let stack = step.stack.as_deref().ok_or_else(|| {
        CliError::user(format!("workflow step `{}` is missing `stack`", step.command))
    })?;
    component_ops::run(ctx, kind, operation, component, stack, &[])
}

fn run_shell_step(ctx: &CommandContext, step: &Step) -> Result<i32> {
    let (shell, flag) = if cfg!(windows) {
        ("cmd".to_string(), "/C")
    } else {
        (std::env::var("SHELL").unwrap_or_else(|_| "sh".to_string()), "-c")
    };
    let code = atmos_exec::runner::run(
        &atmos_exec::runner::Invocation {
            program: shell,
            args: vec![flag.to_string(), step.command.clone()],
            working_dir: ctx.project_root.clone(),
            env: Default::default(),
        },
        &ctx.cancel,
    )?;
    Ok(code)
}

fn workflow_path(ctx: &CommandContext, file: &str) -> NormalizedPath {
    let path = NormalizedPath::new(file);
    if path.is_absolute() {
        return path;
    }
    let base = NormalizedPath::new(&ctx.config.workflows.base_path);
    if base.is_absolute() {
        base.join(file)
    } else {
        ctx.project_root
            .join(&ctx.config.workflows.base_path)
            .join(file)
    }
}
