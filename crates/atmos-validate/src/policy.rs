//! OPA policy evaluation
//!
//! Policies are `.rego` files evaluated with the `opa` binary (itself
//! installable through the toolchain). The component configuration is
//! written to a temp file and passed as input; the policy exposes its
//! verdict as `data.atmos.errors`, a list of strings.

use crate::{Error, Result};
use atmos_fs::NormalizedPath;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// The rego document queried for violations.
const ERRORS_QUERY: &str = "data.atmos.errors";

/// Grace between poll iterations while waiting on the child.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Evaluate one policy file, returning its `errors[]` strings.
pub fn evaluate(
    name: &str,
    policy_path: &NormalizedPath,
    input: &serde_json::Value,
    timeout: Duration,
) -> Result<Vec<String>> {
    let mut input_file = tempfile::NamedTempFile::new().map_err(|e| Error::OpaRun {
        name: name.to_string(),
        message: format!("cannot stage input: {e}"),
    })?;
    serde_json::to_writer(&mut input_file, input).map_err(|e| Error::OpaRun {
        name: name.to_string(),
        message: format!("cannot serialize input: {e}"),
    })?;
    input_file.flush().map_err(|e| Error::OpaRun {
        name: name.to_string(),
        message: e.to_string(),
    })?;

    let mut child = Command::new("opa")
        .arg("eval")
        .arg("--format")
        .arg("json")
        .arg("--data")
        .arg(policy_path.to_native())
        .arg("--input")
        .arg(input_file.path())
        .arg(ERRORS_QUERY)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::OpaRun {
            name: name.to_string(),
            message: format!("cannot spawn opa: {e}"),
        })?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_status)) => break,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::PolicyTimeout {
                        name: name.to_string(),
                        seconds: timeout.as_secs(),
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(Error::OpaRun {
                    name: name.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    let output = child.wait_with_output().map_err(|e| Error::OpaRun {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(Error::OpaRun {
            name: name.to_string(),
            message: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    parse_errors(name, &output.stdout)
}

/// Pull the string list out of `opa eval --format json` output.
fn parse_errors(name: &str, stdout: &[u8]) -> Result<Vec<String>> {
    let parsed: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|e| Error::OpaRun {
            name: name.to_string(),
            message: format!("unparseable opa output: {e}"),
        })?;
    let value = parsed
        .pointer("/result/0/expressions/0/value")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()),
        other => Err(Error::OpaRun {
            name: name.to_string(),
            message: format!("policy must produce a string list, got: {other}"),
        }),
    }
}
