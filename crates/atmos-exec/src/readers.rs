//! Terraform output and remote state readers
//!
//! These implement the stack resolver's seams for `!terraform.output` and
//! `!terraform.state`. The output reader shells out to the component's
//! configured binary (`output -json`); the state reader serves components
//! whose `remote_state_backend_type` is `static`, where outputs live
//! directly in the merged backend map.

use crate::dispatch::Dispatcher;
use crate::runner::{run_captured, Invocation};
use atmos_auth::AuthContext;
use atmos_stack::{ComponentConfig, Node};
use indexmap::IndexMap;
use std::sync::Arc;

/// Reads outputs by running `<command> output -json` in the component
/// directory under the caller's auth context.
pub struct TerraformOutputReader {
    dispatcher: Arc<Dispatcher>,
}

impl TerraformOutputReader {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl atmos_stack::OutputReader for TerraformOutputReader {
    fn read_output(
        &self,
        config: &ComponentConfig,
        output: &str,
        auth: &AuthContext,
    ) -> Result<serde_json::Value, String> {
        let dir = self
            .dispatcher
            .component_dir(config)
            .map_err(|e| e.to_string())?;
        let command = self
            .dispatcher
            .resolve_command(config)
            .map_err(|e| e.to_string())?;

        let mut env: IndexMap<String, Option<String>> = config.env.clone();
        for (key, value) in auth.env_exports() {
            env.insert(key, Some(value));
        }

        let invocation = Invocation {
            program: command.clone(),
            args: vec!["output".to_string(), "-json".to_string()],
            working_dir: dir,
            env,
        };
        let (code, stdout) = run_captured(&invocation, &self.dispatcher.cancel_token())
            .map_err(|e| e.to_string())?;
        if code != 0 {
            return Err(format!("`{command} output -json` exited with {code}"));
        }

        let outputs: serde_json::Value =
            serde_json::from_str(&stdout).map_err(|e| format!("unparseable outputs: {e}"))?;
        outputs
            .get(output)
            .and_then(|entry| entry.get("value"))
            .cloned()
            .ok_or_else(|| format!("output `{output}` not present"))
    }
}

/// Serves `!terraform.state` for static remote state backends.
pub struct StaticRemoteStateReader;

impl atmos_stack::RemoteStateReader for StaticRemoteStateReader {
    fn read_state(
        &self,
        config: &ComponentConfig,
        output: &str,
        _auth: &AuthContext,
    ) -> Result<serde_json::Value, String> {
        if config.remote_state_backend_type.as_deref() != Some("static") {
            return Err(format!(
                "component `{}` has remote_state_backend_type `{}`, only `static` is readable without provisioning",
                config.name,
                config.remote_state_backend_type.as_deref().unwrap_or("none"),
            ));
        }
        lookup(&config.remote_state_backend, output)
            .ok_or_else(|| format!("output `{output}` not present in static remote state"))
    }
}

fn lookup(node: &Node, key: &str) -> Option<serde_json::Value> {
    let mut current = node;
    for segment in key.split('.') {
        current = current.as_map()?.get(segment)?;
    }
    Some(current.to_json())
}
