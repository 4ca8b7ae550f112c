//! Thin wrapper over `std::process::Command`, grounded in the teacher's
//! host-shell helper: run a command, capture both streams, fail loud with
//! the captured stderr on a non-zero exit.

use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[instrument(skip(args))]
pub fn run(program: &str, args: &[&str]) -> Result<CommandOutput> {
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("spawning {program}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        bail!(
            "{program} exited with {status}: {stderr}",
            status = output.status,
            stderr = stderr.trim()
        );
    }

    Ok(CommandOutput { stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_on_success() {
        let out = run("echo", &["hello"]).unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn fails_loud_with_stderr_on_nonzero_exit() {
        let err = run("false", &[]).unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }
}
