//! `atmos toolchain install|list|which|set|uninstall`

use crate::context::CommandContext;
use crate::error::{CliError, Result};
use atmos_toolchain::{ToolSpec, VersionConstraint};

/// Install the given specs, or everything pinned in `.tool-versions`.
pub fn install(ctx: &CommandContext, tools: &[String]) -> Result<String> {
    let specs: Vec<ToolSpec> = if tools.is_empty() {
        let from_file = ctx.toolchain.file_specs(&std::env::current_dir()?)?;
        if from_file.is_empty() {
            return Err(CliError::user(
                "nothing to install: no tools given and no .tool-versions found",
            ));
        }
        from_file
    } else {
        tools
            .iter()
            .map(|t| ToolSpec::parse(t).map_err(CliError::from))
            .collect::<Result<_>>()?
    };

    let installed = ctx.toolchain.install(&specs)?;
    let mut lines = Vec::with_capacity(installed.len());
    for tool in installed {
        lines.push(format!(
            "installed {}/{} {} ({})",
            tool.owner, tool.repo, tool.version, tool.platform
        ));
    }
    Ok(lines.join("\n"))
}

pub fn list(ctx: &CommandContext) -> Result<String> {
    let tools = ctx.toolchain.list()?;
    if tools.is_empty() {
        return Ok("no tools installed".to_string());
    }
    let lines: Vec<String> = tools
        .iter()
        .map(|t| format!("{}/{} {} ({})", t.owner, t.repo, t.version, t.platform))
        .collect();
    Ok(lines.join("\n"))
}

pub fn which(ctx: &CommandContext, name: &str) -> Result<String> {
    Ok(ctx.toolchain.which(name)?.as_str().to_string())
}

/// `set owner/repo@version`: the constraint must be an exact version.
pub fn set(ctx: &CommandContext, tool: &str) -> Result<String> {
    let spec = ToolSpec::parse(tool)?;
    let VersionConstraint::Exact(version) = spec.constraint.clone() else {
        return Err(CliError::user(format!(
            "`toolchain set` needs an exact version, got `{}`",
            spec.constraint
        )));
    };
    let installed = ctx
        .toolchain
        .set_active(&std::env::current_dir()?, &spec, &version)?;
    Ok(format!(
        "{} now active at {}",
        spec.slug(),
        installed.version
    ))
}

pub fn uninstall(ctx: &CommandContext, tool: &str) -> Result<String> {
    let spec = ToolSpec::parse(tool)?;
    ctx.toolchain.uninstall(&spec.owner, &spec.repo)?;
    Ok(format!("uninstalled {}", spec.slug()))
}
