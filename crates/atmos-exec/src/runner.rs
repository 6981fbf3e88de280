//! Subprocess execution
//!
//! Runs external provisioning tools with an explicit working directory
//! (never `chdir`), the component's environment deltas, and the
//! invocation's auth exports. Stdio streams to the user's terminal
//! unmodified; the child's exit code is the caller's exit code.
//!
//! Cancellation: when the token trips, the child receives SIGTERM, then
//! SIGKILL after a grace period.

use crate::cancel::CancelToken;
use crate::{Error, Result};
use atmos_fs::NormalizedPath;
use indexmap::IndexMap;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Wait-poll interval.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Grace between SIGTERM and SIGKILL.
const TERM_GRACE: Duration = Duration::from_secs(5);

/// A fully specified subprocess invocation.
#[derive(Debug)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: NormalizedPath,
    /// Applied over the inherited environment; `None` removes.
    pub env: IndexMap<String, Option<String>>,
}

/// Run to completion, streaming stdio. Returns the exit code.
pub fn run(invocation: &Invocation, cancel: &CancelToken) -> Result<i32> {
    tracing::debug!(
        program = %invocation.program,
        args = ?invocation.args,
        dir = %invocation.working_dir,
        "spawning"
    );
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .current_dir(invocation.working_dir.to_native())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    apply_env(&mut command, &invocation.env);

    let mut child = command.spawn().map_err(|_| Error::CommandNotFound {
        command: invocation.program.clone(),
    })?;
    wait(&mut child, cancel).map(|code| {
        tracing::debug!(program = %invocation.program, code, "subprocess finished");
        code
    })
}

/// Run capturing stdout (for `terraform output -json` style reads).
pub fn run_captured(invocation: &Invocation, cancel: &CancelToken) -> Result<(i32, String)> {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .current_dir(invocation.working_dir.to_native())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());
    apply_env(&mut command, &invocation.env);

    let mut child = command.spawn().map_err(|_| Error::CommandNotFound {
        command: invocation.program.clone(),
    })?;
    let stdout = child.stdout.take().expect("stdout piped");
    let reader = std::thread::spawn(move || {
        use std::io::Read;
        let mut buf = String::new();
        let mut stdout = stdout;
        let _ = stdout.read_to_string(&mut buf);
        buf
    });
    let code = wait(&mut child, cancel)?;
    let output = reader.join().unwrap_or_default();
    Ok((code, output))
}

fn apply_env(command: &mut Command, env: &IndexMap<String, Option<String>>) {
    for (key, value) in env {
        match value {
            Some(value) => {
                command.env(key, value);
            }
            None => {
                command.env_remove(key);
            }
        }
    }
}

fn wait(child: &mut Child, cancel: &CancelToken) -> Result<i32> {
    loop {
        if cancel.is_cancelled() {
            terminate(child);
            return Err(Error::Cancelled);
        }
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status.code().unwrap_or(-1)),
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                tracing::warn!("waiting on subprocess failed: {e}");
                return Ok(-1);
            }
        }
    }
}

/// SIGTERM, wait out the grace period, then SIGKILL.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        let pid = child.id().to_string();
        let _ = Command::new("kill").args(["-TERM", &pid]).status();
        let deadline = Instant::now() + TERM_GRACE;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = child.try_wait() {
                return;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn invocation(program: &str, args: &[&str], dir: &TempDir) -> Invocation {
        Invocation {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            working_dir: NormalizedPath::new(dir.path()),
            env: IndexMap::new(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn exit_code_propagates() {
        let dir = TempDir::new().unwrap();
        let inv = invocation("sh", &["-c", "exit 3"], &dir);
        assert_eq!(run(&inv, &CancelToken::new()).unwrap(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn captured_run_returns_stdout() {
        let dir = TempDir::new().unwrap();
        let inv = invocation("sh", &["-c", "echo hello"], &dir);
        let (code, out) = run_captured(&inv, &CancelToken::new()).unwrap();
        assert_eq!(code, 0);
        assert_eq!(out.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn env_deltas_apply_and_remove() {
        let dir = TempDir::new().unwrap();
        // SAFETY: test-local variable, no concurrent env readers here
        unsafe { std::env::set_var("ATMOS_RUNNER_DROP", "present") };
        let mut inv = invocation("sh", &["-c", "echo ${ATMOS_RUNNER_DROP:-gone}-${ADDED:-none}"], &dir);
        inv.env.insert("ATMOS_RUNNER_DROP".into(), None);
        inv.env.insert("ADDED".into(), Some("yes".into()));

        let (_, out) = run_captured(&inv, &CancelToken::new()).unwrap();
        assert_eq!(out.trim(), "gone-yes");
    }

    #[test]
    fn missing_binary_is_command_not_found() {
        let dir = TempDir::new().unwrap();
        let inv = invocation("definitely-not-a-real-binary-name", &[], &dir);
        assert!(matches!(
            run(&inv, &CancelToken::new()),
            Err(Error::CommandNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn cancelled_token_aborts_the_child() {
        let dir = TempDir::new().unwrap();
        let inv = invocation("sh", &["-c", "sleep 30"], &dir);
        let cancel = CancelToken::new();
        cancel.cancel();
        let started = std::time::Instant::now();
        let result = run(&inv, &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(20));
    }
}
