//! The component execution dispatcher
//!
//! Converts a materialized [`ComponentConfig`] into an external-tool
//! invocation: backend file, varfile, workspace selection, environment and
//! auth exports, and finally the subprocess itself. The tool's exit code
//! is the CLI's exit code.

use crate::backend::write_backend_file;
use crate::cancel::CancelToken;
use crate::runner::{run, run_captured, Invocation};
use crate::varfile::write_varfile;
use crate::{inspect, tofu, Error, Result};
use atmos_auth::AuthContext;
use atmos_config::AtmosConfig;
use atmos_fs::NormalizedPath;
use atmos_stack::ComponentConfig;
use indexmap::IndexMap;
use std::sync::Arc;

/// One requested operation against a component.
#[derive(Debug)]
pub struct DispatchRequest<'a> {
    pub component: &'a ComponentConfig,
    /// plan | apply | destroy | init | output | validate | workspace |
    /// generate-varfile | generate-backend | anything the tool accepts
    pub operation: &'a str,
    /// Arguments after `--`, appended verbatim.
    pub passthrough: &'a [String],
    pub auth: &'a AuthContext,
}

/// Dispatches component operations to external provisioning tools.
pub struct Dispatcher {
    config: Arc<AtmosConfig>,
    project_root: NormalizedPath,
    /// `.tools/bin` fragment prepended to the child's PATH.
    path_prepend: Option<String>,
    cancel: CancelToken,
}

impl Dispatcher {
    pub fn new(config: Arc<AtmosConfig>, project_root: NormalizedPath, cancel: CancelToken) -> Self {
        Self {
            config,
            project_root,
            path_prepend: None,
            cancel,
        }
    }

    /// Prepend the toolchain's bin directory to every child's PATH.
    pub fn with_path_prepend(mut self, fragment: Option<String>) -> Self {
        self.path_prepend = fragment;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Execute the requested operation. Returns the tool's exit code.
    pub fn dispatch(&self, request: &DispatchRequest) -> Result<i32> {
        let component = request.component;
        if component.is_abstract() {
            return Err(Error::AbstractComponent {
                component: component.name.clone(),
            });
        }

        let dir = self.component_dir(component)?;

        // File synthesis needs no external binary
        match request.operation {
            "generate-backend" => {
                write_backend_file(&dir, component)?;
                return Ok(0);
            }
            "generate-varfile" => {
                write_varfile(&dir, component)?;
                return Ok(0);
            }
            _ => {}
        }

        let command = self.resolve_command(component)?;

        let provisioning = matches!(request.operation, "plan" | "apply" | "destroy");
        let is_terraform_kind = component.kind == "terraform";

        if is_terraform_kind && provisioning {
            self.preflight(&command, &dir);
            let kind_config = self.config.components.for_kind(&component.kind);
            if kind_config.is_some_and(|k| k.auto_generate_backend_file) {
                write_backend_file(&dir, component)?;
            }
        }

        let env = self.build_env(component, request.auth);

        if is_terraform_kind && (provisioning || request.operation == "output") {
            self.select_workspace(&command, &dir, component, &env)?;
        }

        let mut args: Vec<String> = vec![request.operation.to_string()];
        if request.operation == "init" {
            let kind_config = self.config.components.for_kind(&component.kind);
            if kind_config.is_some_and(|k| k.init_run_reconfigure) {
                args.push("-reconfigure".to_string());
            }
        }
        if is_terraform_kind && provisioning {
            let varfile = write_varfile(&dir, component)?;
            args.push("-var-file".to_string());
            args.push(
                varfile
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| varfile.as_str().to_string()),
            );
        }
        args.extend(request.passthrough.iter().cloned());

        let code = run(
            &Invocation {
                program: command.clone(),
                args,
                working_dir: dir,
                env,
            },
            &self.cancel,
        )?;
        if code != 0 {
            return Err(Error::Subprocess { command, code });
        }
        Ok(0)
    }

    /// Absolute directory of the component under `components.<kind>`.
    pub fn component_dir(&self, component: &ComponentConfig) -> Result<NormalizedPath> {
        let base = self
            .config
            .components
            .for_kind(&component.kind)
            .map(|k| k.base_path.clone())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| format!("components/{}", component.kind));
        let base_path = NormalizedPath::new(&base);
        let dir = if base_path.is_absolute() {
            base_path.join(&component.component)
        } else {
            self.project_root.join(&base).join(&component.component)
        };
        if !dir.is_dir() {
            return Err(Error::ComponentDirMissing {
                path: dir.to_native(),
            });
        }
        Ok(dir)
    }

    /// The binary to run: component override, then the kind's configured
    /// command, then the kind name itself.
    pub fn resolve_command(&self, component: &ComponentConfig) -> Result<String> {
        let command = component
            .command
            .clone()
            .or_else(|| {
                self.config
                    .components
                    .for_kind(&component.kind)
                    .map(|k| k.command.clone())
                    .filter(|c| !c.is_empty())
            })
            .unwrap_or_else(|| default_command(&component.kind).to_string());

        // Toolchain-managed bins first, then the host PATH
        if let Some(prepend) = &self.path_prepend {
            let candidate = NormalizedPath::new(prepend).join(&command);
            if candidate.is_file() {
                return Ok(candidate.as_str().to_string());
            }
            #[cfg(windows)]
            {
                let exe = NormalizedPath::new(prepend).join(&format!("{command}.exe"));
                if exe.is_file() {
                    return Ok(exe.as_str().to_string());
                }
            }
        }
        if command.contains('/') || command.contains('\\') {
            return Ok(command);
        }
        which::which(&command)
            .map(|p| NormalizedPath::new(p).as_str().to_string())
            .map_err(|_| Error::CommandNotFound { command })
    }

    /// Environment for the child: inherited, then component deltas, then
    /// auth exports, then PATH and user-agent adjustments.
    fn build_env(
        &self,
        component: &ComponentConfig,
        auth: &AuthContext,
    ) -> IndexMap<String, Option<String>> {
        let mut env: IndexMap<String, Option<String>> = component.env.clone();
        for (key, value) in auth.env_exports() {
            env.insert(key, Some(value));
        }
        if let Some(prepend) = &self.path_prepend {
            let current = std::env::var("PATH").unwrap_or_default();
            let separator = if cfg!(windows) { ";" } else { ":" };
            env.insert(
                "PATH".to_string(),
                Some(format!("{prepend}{separator}{current}")),
            );
        }
        if let Some(agent) = self
            .config
            .components
            .for_kind(&component.kind)
            .and_then(|k| k.append_user_agent.clone())
        {
            env.insert("TF_APPEND_USER_AGENT".to_string(), Some(agent));
        }
        env
    }

    /// `workspace select`, falling back to `workspace new`.
    fn select_workspace(
        &self,
        command: &str,
        dir: &NormalizedPath,
        component: &ComponentConfig,
        env: &IndexMap<String, Option<String>>,
    ) -> Result<()> {
        let workspace = component.workspace().to_string();
        let select = Invocation {
            program: command.to_string(),
            args: vec![
                "workspace".to_string(),
                "select".to_string(),
                workspace.clone(),
            ],
            working_dir: dir.clone(),
            env: env.clone(),
        };
        if matches!(run_captured(&select, &self.cancel), Ok((0, _))) {
            return Ok(());
        }
        let new = Invocation {
            program: command.to_string(),
            args: vec![
                "workspace".to_string(),
                "new".to_string(),
                workspace.clone(),
            ],
            working_dir: dir.clone(),
            env: env.clone(),
        };
        match run_captured(&new, &self.cancel) {
            Ok((0, _)) => Ok(()),
            Ok((code, _)) => Err(Error::WorkspaceSelect {
                workspace,
                message: format!("workspace new exited with {code}"),
            }),
            Err(e) => Err(Error::WorkspaceSelect {
                workspace,
                message: e.to_string(),
            }),
        }
    }

    /// Inspect component HCL, suppressing diagnostics OpenTofu tolerates.
    /// Remaining findings are warnings; the provisioner stays the
    /// authority on whether they are fatal.
    fn preflight(&self, command: &str, dir: &NormalizedPath) {
        let diagnostics = inspect::inspect_component_dir(dir);
        for diagnostic in tofu::filter_diagnostics(command, diagnostics) {
            tracing::warn!("{diagnostic}");
        }
    }
}

fn default_command(kind: &str) -> &str {
    match kind {
        "helmfile" => "helmfile",
        "packer" => "packer",
        _ => "terraform",
    }
}
