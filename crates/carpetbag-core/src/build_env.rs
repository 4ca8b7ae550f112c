//! Abstraction over the VM/guest-agent operations the builder needs.
//!
//! `carpetbag-builder` depends on `carpetbag-core` only; the concrete
//! implementation wiring a real libvirt connection and guest-agent channel
//! to this trait lives in the root `carpetbag` crate. This mirrors the
//! teacher's split between its build-pipeline crate (depends only on the
//! core crate) and the concrete environment the application layer supplies.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

/// A cloned, short-lived domain plus the overlay disk file backing it.
#[derive(Debug, Clone)]
pub struct DomainClone {
    pub clone_id: String,
    pub overlay_path: PathBuf,
}

/// Result of a completed `guest-exec` + polled `guest-exec-status`.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stdout_truncated: bool,
    pub stderr: Vec<u8>,
    pub stderr_truncated: bool,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub trait BuildEnvironment: Send + Sync {
    /// Thin-clone `golden` into a fresh domain named `clone_id` (L2).
    fn clone_domain(&self, golden: &str, clone_id: &str) -> Result<DomainClone>;

    /// Start the domain, with the autodestroy-on-disconnect flag set unless
    /// `debug` is true (spec.md §4.5 step 2).
    fn start_domain(&self, clone_id: &str, debug: bool) -> Result<()>;

    /// Wait for the guest agent to report readiness, racing a lifecycle
    /// event against `timeout`. Returns `true` if the agent came up before
    /// the timeout, `false` on timeout (the caller proceeds regardless,
    /// per spec.md §4.5 step 2).
    fn wait_for_agent(&self, clone_id: &str, timeout: Duration) -> Result<bool>;

    /// Run a command in the guest and block until it exits.
    fn guest_exec(&self, clone_id: &str, path: &str, args: &[String]) -> Result<ExecResult>;

    fn guest_file_copy_to(&self, clone_id: &str, host: &Path, guest_path: &str) -> Result<()>;
    fn guest_file_copy_from(&self, clone_id: &str, guest_path: &str, host: &Path) -> Result<()>;
    fn guest_file_write(&self, clone_id: &str, guest_path: &str, content: &[u8]) -> Result<()>;
    fn guest_file_read(&self, clone_id: &str, guest_path: &str) -> Result<Vec<u8>>;

    /// Hard power-off (no graceful shutdown — the clone is ephemeral).
    fn destroy_domain(&self, clone_id: &str) -> Result<()>;

    /// Undefine the domain (managed-save, snapshot-metadata, NVRAM flags)
    /// and remove the overlay file.
    fn undefine_domain(&self, clone_id: &str, overlay: &Path) -> Result<()>;

    fn log_info(&self, msg: &str);
    fn log_success(&self, msg: &str);
}
