//! `!exec <shell command>`
//!
//! Runs the command under the host's shell and evaluates to its trimmed
//! stdout, parsed as YAML when possible. The child sees the process
//! environment with the component's `env` deltas applied on top - the
//! same contract the dispatcher gives provisioning tools.

use super::{parse_scalar, Evaluator};
use crate::node::Node;
use crate::{Error, Result};
use std::process::Command;

pub(super) fn eval(evaluator: &Evaluator, args: &Node) -> Result<Node> {
    let command_line = args.as_str().ok_or_else(|| Error::YamlFuncArg {
        tag: "exec".to_string(),
        message: "expected a shell command string".to_string(),
    })?;

    let (shell, flag) = host_shell();
    let mut command = Command::new(&shell);
    command.arg(flag).arg(command_line);
    for (key, value) in evaluator.env_overlay() {
        match value {
            Some(value) => {
                command.env(key, value);
            }
            None => {
                command.env_remove(key);
            }
        }
    }

    let output = command.output().map_err(|e| Error::YamlFuncExec {
        command: command_line.to_string(),
        code: -1,
        stderr: e.to_string(),
    })?;

    if !output.status.success() {
        return Err(Error::YamlFuncExec {
            command: command_line.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_scalar(stdout.trim()))
}

/// The login shell of the host OS: `$SHELL` (fallback `sh`) with `-c` on
/// unix, `cmd /C` on windows.
fn host_shell() -> (String, &'static str) {
    if cfg!(windows) {
        ("cmd".to_string(), "/C")
    } else {
        (
            std::env::var("SHELL").unwrap_or_else(|_| "sh".to_string()),
            "-c",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn shell_defaults_to_sh_with_dash_c() {
        let (_, flag) = host_shell();
        assert_eq!(flag, "-c");
    }
}
