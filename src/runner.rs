//! Thin wrappers around `std::process::Command`
//!
//! Failures carry the command line and its stderr so they read well in a
//! step's detail.

use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Command, Output, Stdio};

/// Run a command to completion, failing on a non-zero exit
pub fn run_checked(cmd: &str, args: &[&str]) -> Result<()> {
    run_with_env(cmd, args, &[])
}

/// Run a command with extra environment variables, failing on a non-zero exit
pub fn run_with_env(cmd: &str, args: &[&str], env: &[(&str, &str)]) -> Result<()> {
    log::debug!("Running: {} {}", cmd, args.join(" "));
    let output = Command::new(cmd)
        .args(args)
        .envs(env.iter().copied())
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;
    check(cmd, &output)
}

/// Run a command and capture trimmed stdout
pub fn run_capture(cmd: &str, args: &[&str]) -> Result<String> {
    let output = run_output(cmd, args)?;
    check(cmd, &output)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a command and return its raw output whatever the exit status
pub fn run_output(cmd: &str, args: &[&str]) -> Result<Output> {
    log::debug!("Running: {} {}", cmd, args.join(" "));
    Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))
}

/// Run a command silently, returning success/failure
pub fn run_quiet(cmd: &str, args: &[&str]) -> bool {
    Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Run a command feeding `input` on stdin.
///
/// The input is never logged; it usually carries a password.
pub fn run_with_input(cmd: &str, args: &[&str], input: &str) -> Result<()> {
    log::debug!("Running: {} {} (with stdin)", cmd, args.join(" "));
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .with_context(|| format!("Failed to write to {cmd}"))?;
    }

    let output = child
        .wait_with_output()
        .with_context(|| format!("Failed to wait for {cmd}"))?;
    check(cmd, &output)
}

fn check(cmd: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    match output.status.code() {
        Some(code) if stderr.is_empty() => anyhow::bail!("{cmd} exited with status {code}"),
        Some(code) => anyhow::bail!("{cmd} exited with status {code}: {stderr}"),
        None => anyhow::bail!("{cmd} was terminated by a signal"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_capture_trims() {
        assert_eq!(run_capture("echo", &["  hi  "]).unwrap(), "hi");
    }

    #[test]
    fn test_failure_carries_stderr() {
        let err = run_checked("sh", &["-c", "echo broken >&2; exit 3"]).unwrap_err();
        assert_eq!(err.to_string(), "sh exited with status 3: broken");
    }

    #[test]
    fn test_missing_binary() {
        let err = run_checked("hostprep-definitely-missing", &[]).unwrap_err();
        assert!(err.to_string().starts_with("Failed to execute"));
    }

    #[test]
    fn test_input_reaches_stdin() {
        run_with_input("sh", &["-c", "read line; test \"$line\" = secret"], "secret\n").unwrap();
        assert!(run_with_input("sh", &["-c", "read line; test \"$line\" = other"], "secret\n").is_err());
    }

    #[test]
    fn test_env_is_passed() {
        run_with_env("sh", &["-c", "test \"$HOSTPREP_X\" = 1"], &[("HOSTPREP_X", "1")]).unwrap();
    }

    #[test]
    fn test_run_quiet() {
        assert!(run_quiet("true", &[]));
        assert!(!run_quiet("false", &[]));
    }
}
