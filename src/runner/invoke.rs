//! Toolchain subprocess invocation.
//!
//! Builds the argument list for one run and spawns the toolchain with null
//! stdin, piped output streams, and a minimal whitelisted environment so
//! coloring behavior stays deterministic regardless of the caller's shell.

use crate::runner::command::ToolchainCommand;
use std::io;
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};

/// Environment variables passed through to the toolchain. Everything else is
/// dropped; `NO_COLOR` is forced on top.
const ENV_WHITELIST: &[&str] = &["PATH", "HOME", "TMPDIR", "DENO_DIR", "SYSTEMROOT"];

/// A spawned toolchain process with its output streams taken.
pub struct ToolchainProcess {
    pub child: Child,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Build the full argument list for one invocation.
///
/// Conditional args are added only when at least one direct input is a
/// script file rather than a document, so flags like coverage collection
/// apply only when real script execution occurs. The sample directory is
/// appended as an extra input when any sample was materialized, and trailing
/// script arguments go after the command's separator.
pub fn build_args(
    command: &ToolchainCommand,
    direct_files: &[String],
    sample_dir: Option<&Path>,
    script_args: &[String],
) -> Vec<String> {
    let mut args: Vec<String> = command.common_args.iter().map(|a| a.to_string()).collect();

    let has_script_input = direct_files.iter().any(|f| command.is_script_file(f));
    if has_script_input {
        args.extend(command.conditional_args.iter().map(|a| a.to_string()));
    }

    args.extend(direct_files.iter().cloned());

    if let Some(dir) = sample_dir {
        args.push(dir.to_string_lossy().into_owned());
    }

    if !script_args.is_empty() {
        if let Some(separator) = command.arg_separator {
            args.push(separator.to_string());
        }
        args.extend(script_args.iter().cloned());
    }

    args
}

/// Spawn the toolchain binary with the prepared arguments.
pub fn spawn(binary: &str, args: &[String], cwd: Option<&Path>) -> io::Result<ToolchainProcess> {
    let mut cmd = Command::new(binary);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    cmd.env_clear();
    for key in ENV_WHITELIST {
        if let Ok(value) = std::env::var(key) {
            cmd.env(key, value);
        }
    }
    cmd.env("NO_COLOR", "1");

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("toolchain stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("toolchain stderr was not piped"))?;

    Ok(ToolchainProcess { child, stdout, stderr })
}
