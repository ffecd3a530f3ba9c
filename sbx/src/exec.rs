//! Checked execution of external tools (the `e2b` CLI and build scripts).
//!
//! Commands inherit the operator's terminal; a non-zero exit aborts the
//! current workflow with an error carrying the rendered command line.
//! Credentials reach subprocesses through an explicit environment map,
//! never through mutation of this process's environment.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to launch '{command}': {source}")]
    Launch {
        command: String,
        source: std::io::Error,
    },

    #[error("Command '{command}' failed with {status}")]
    CommandFailed { command: String, status: String },
}

pub type ExecResult<T> = Result<T, ExecError>;

/// Runs a command to completion, optionally in a working directory,
/// propagating a non-zero exit as an error.
pub fn run(program: &str, args: &[&str], cwd: Option<&Path>) -> ExecResult<()> {
    run_command(program, args, cwd, None)
}

/// Like [`run`], but with extra environment variables for the subprocess
/// on top of the inherited environment.
pub fn run_with_env(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    envs: &BTreeMap<String, String>,
) -> ExecResult<()> {
    run_command(program, args, cwd, Some(envs))
}

fn run_command(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    envs: Option<&BTreeMap<String, String>>,
) -> ExecResult<()> {
    let rendered = render(program, args);
    info!(command = %rendered, "running external command");

    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    if let Some(envs) = envs {
        command.envs(envs);
    }

    let status = command.status().map_err(|source| ExecError::Launch {
        command: rendered.clone(),
        source,
    })?;

    if !status.success() {
        return Err(ExecError::CommandFailed {
            command: rendered,
            status: status.to_string(),
        });
    }
    Ok(())
}

/// Runs a command and captures its stdout for post-processing. Stderr is
/// passed through to the operator.
pub fn run_captured(program: &str, args: &[&str]) -> ExecResult<String> {
    let rendered = render(program, args);
    info!(command = %rendered, "running external command");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ExecError::Launch {
            command: rendered.clone(),
            source,
        })?;

    let _ = std::io::stderr().write_all(&output.stderr);

    if !output.status.success() {
        return Err(ExecError::CommandFailed {
            command: rendered,
            status: output.status.to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn render(program: &str, args: &[&str]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

pub fn e2b_logout() -> ExecResult<()> {
    run("e2b", &["auth", "logout"], None)
}

pub fn e2b_connect(sandbox_id: &str) -> ExecResult<()> {
    run("e2b", &["sbx", "connect", sandbox_id], None)
}

/// Raw log output for a sandbox; callers post-process it.
pub fn e2b_logs(sandbox_id: &str) -> ExecResult<String> {
    run_captured("e2b", &["sbx", "logs", sandbox_id])
}
