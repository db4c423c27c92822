// src/exec.rs

//! Bounded subprocess execution
//!
//! Every external tool invocation in systune funnels through this module:
//! stdin is nulled to prevent hangs, stdout/stderr are captured, and the
//! child is killed once the timeout elapses. A timeout is a definite
//! failure of that step, never "assume success and continue".

use crate::error::{Error, Result};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Outcome of one bounded subprocess invocation.
#[derive(Debug)]
pub struct ExecResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Run a prepared command with a timeout, capturing output.
///
/// Spawn failures (missing binary, permission denied) surface as
/// `Error::CommandFailed`; a nonzero exit or a timeout is reported in the
/// returned `ExecResult`, not as an error.
pub fn run_command(mut cmd: Command, timeout: Duration) -> Result<ExecResult> {
    let rendered = render(&cmd);
    debug!("Running: {} (timeout {}s)", rendered, timeout.as_secs());

    let mut child = cmd
        .stdin(Stdio::null()) // CRITICAL: prevent stdin hangs
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::CommandFailed(format!("failed to spawn {}: {}", rendered, e)))?;

    match child.wait_timeout(timeout)? {
        Some(_) => {
            let output = child.wait_with_output()?;
            let result = ExecResult {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                timed_out: false,
            };
            if !result.success() {
                for line in result.stderr.lines() {
                    warn!("[{}] {}", program_name(&cmd), line);
                }
            }
            Ok(result)
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            warn!(
                "{} timed out after {}s and was killed",
                rendered,
                timeout.as_secs()
            );
            Ok(ExecResult {
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
            })
        }
    }
}

/// Convenience wrapper for the common program-plus-args shape.
pub fn run_tool<S: AsRef<str>>(program: &str, args: &[S], timeout: Duration) -> Result<ExecResult> {
    let mut cmd = Command::new(program);
    for arg in args {
        cmd.arg(arg.as_ref());
    }
    run_command(cmd, timeout)
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

fn render(cmd: &Command) -> String {
    let mut out = program_name(cmd);
    for arg in cmd.get_args() {
        out.push(' ');
        out.push_str(&arg.to_string_lossy());
    }
    out
}
