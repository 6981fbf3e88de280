//! terraform / helmfile / packer component operations

use crate::context::CommandContext;
use crate::error::Result;
use atmos_auth::AuthContext;
use atmos_exec::DispatchRequest;
use atmos_stack::MaterializeOptions;

/// Materialize the component and hand it to the dispatcher. Returns the
/// tool's exit code.
pub fn run(
    ctx: &CommandContext,
    kind: &str,
    operation: &str,
    component: &str,
    stack: &str,
    passthrough: &[String],
) -> Result<i32> {
    let config = ctx.materializer.materialize(
        kind,
        component,
        stack,
        MaterializeOptions::default(),
        None,
    )?;

    // Abstract components fail in the dispatcher before any tool work
    if !config.is_abstract() {
        ensure_tool_dependencies(ctx, &config)?;
    }

    // Auth gating: a component-level auth section narrows the root
    // context before the tool runs
    let root = AuthContext::root(&ctx.config.auth);
    let auth = match &config.auth {
        Some(settings) => root.derive(component, settings),
        None => root,
    };

    let code = ctx.dispatcher.dispatch(&DispatchRequest {
        component: &config,
        operation,
        passthrough,
        auth: &auth,
    })?;
    Ok(code)
}

/// Install tools the component declares under
/// `settings.dependencies.tools`, with constraints overriding any
/// file-level `.tool-versions` entries for the same tool. An install
/// failure is a warning - the binary may already be on the host PATH.
fn ensure_tool_dependencies(
    ctx: &CommandContext,
    config: &atmos_stack::ComponentConfig,
) -> Result<()> {
    let Some(declared) = config
        .settings
        .get_path(&["dependencies", "tools"])
        .and_then(atmos_stack::Node::as_map)
    else {
        return Ok(());
    };

    let mut overrides = Vec::with_capacity(declared.len());
    for (slug, constraint) in declared {
        let constraint = constraint.as_str().unwrap_or("latest");
        match atmos_toolchain::ToolSpec::parse(&format!("{slug}@{constraint}")) {
            Ok(spec) => overrides.push(spec),
            Err(e) => tracing::warn!("ignoring invalid tool dependency `{slug}`: {e}"),
        }
    }

    let file_specs = ctx.toolchain.file_specs(&std::env::current_dir()?)?;
    let wanted = atmos_toolchain::merge_specs(file_specs, overrides);
    for spec in &wanted {
        // Only the component's own declarations trigger installs here;
        // file-level pins install via `atmos toolchain install`
        if !declared.contains_key(&spec.slug()) {
            continue;
        }
        if let Err(e) = ctx.toolchain.install(std::slice::from_ref(spec)) {
            tracing::warn!("could not install {spec}: {e}");
        }
    }
    Ok(())
}

/// Translate the `terraform generate varfile|backend <component>` spelling
/// into dispatcher operations.
pub fn resolve_terraform_operation<'a>(
    operation: &'a str,
    target: &'a str,
    component: Option<&'a str>,
) -> Result<(String, &'a str)> {
    if operation == "generate" {
        let component = component.ok_or_else(|| {
            crate::error::CliError::user("`atmos terraform generate <varfile|backend> <component>`")
        })?;
        let op = match target {
            "varfile" => "generate-varfile",
            "backend" => "generate-backend",
            other => {
                return Err(crate::error::CliError::user(format!(
                    "unknown generate target `{other}` (expected varfile or backend)"
                )));
            }
        };
        return Ok((op.to_string(), component));
    }
    Ok((operation.to_string(), target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_operations_pass_through() {
        let (op, component) = resolve_terraform_operation("plan", "vpc", None).unwrap();
        assert_eq!(op, "plan");
        assert_eq!(component, "vpc");
    }

    #[test]
    fn generate_spellings_translate() {
        let (op, component) =
            resolve_terraform_operation("generate", "varfile", Some("vpc")).unwrap();
        assert_eq!(op, "generate-varfile");
        assert_eq!(component, "vpc");

        let (op, _) = resolve_terraform_operation("generate", "backend", Some("vpc")).unwrap();
        assert_eq!(op, "generate-backend");
    }

    #[test]
    fn generate_requires_a_component() {
        assert!(resolve_terraform_operation("generate", "varfile", None).is_err());
        assert!(resolve_terraform_operation("generate", "nonsense", Some("vpc")).is_err());
    }
}
