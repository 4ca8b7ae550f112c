//! The concrete [`BuildEnvironment`] the application wires into the
//! builder: a [`VmCloner`] for lifecycle, a [`VirshChannel`] + guest-agent
//! client for everything inside the clone.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use carpetbag_core::build_env::{BuildEnvironment, DomainClone, ExecResult};
use carpetbag_guest::client::GuestAgentClient;
use tracing::info;

use crate::channel::VirshChannel;
use crate::cloner::VmCloner;

pub struct VmBuildEnvironment {
    cloner: VmCloner,
}

impl VmBuildEnvironment {
    pub fn new(images_dir: impl Into<PathBuf>) -> Self {
        Self {
            cloner: VmCloner::new(images_dir),
        }
    }

    fn client_for<'a>(&self, channel: &'a VirshChannel) -> GuestAgentClient<'a, VirshChannel> {
        GuestAgentClient::new(channel)
    }
}

impl BuildEnvironment for VmBuildEnvironment {
    fn clone_domain(&self, golden: &str, clone_id: &str) -> Result<DomainClone> {
        // clone_id already encodes the job id (carpetbag_core::naming); the
        // cloner derives the same name itself, so this just re-derives the
        // id back out rather than taking two sources of truth.
        let job_id: u64 = clone_id
            .strip_prefix("buildvm_")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("clone id {clone_id} doesn't match buildvm_<id>"))?;
        self.cloner.clone_domain(golden, job_id)
    }

    fn start_domain(&self, clone_id: &str, debug: bool) -> Result<()> {
        self.cloner.start_domain(clone_id, debug)
    }

    fn wait_for_agent(&self, clone_id: &str, timeout: Duration) -> Result<bool> {
        let (tx, rx) = mpsc::channel();

        let poll_tx = tx.clone();
        let poll_domain = clone_id.to_string();
        thread::spawn(move || {
            let channel = VirshChannel::new(poll_domain);
            let client = GuestAgentClient::new(&channel);
            loop {
                if client.ping() {
                    let _ = poll_tx.send(true);
                    return;
                }
                thread::sleep(Duration::from_secs(1));
            }
        });

        thread::spawn(move || {
            thread::sleep(timeout);
            let _ = tx.send(false);
        });

        // first sender wins, whichever it is
        Ok(rx.recv().unwrap_or(false))
    }

    fn guest_exec(&self, clone_id: &str, path: &str, args: &[String]) -> Result<ExecResult> {
        let channel = VirshChannel::new(clone_id.to_string());
        let out = self.client_for(&channel).exec_and_wait(path, args)?;
        Ok(ExecResult {
            exit_code: out.exit_code,
            stdout: out.stdout,
            stdout_truncated: out.stdout_truncated,
            stderr: out.stderr,
            stderr_truncated: out.stderr_truncated,
        })
    }

    fn guest_file_copy_to(&self, clone_id: &str, host: &Path, guest_path: &str) -> Result<()> {
        let channel = VirshChannel::new(clone_id.to_string());
        self.client_for(&channel).copy_to(host, guest_path)
    }

    fn guest_file_copy_from(&self, clone_id: &str, guest_path: &str, host: &Path) -> Result<()> {
        let channel = VirshChannel::new(clone_id.to_string());
        self.client_for(&channel).copy_from(guest_path, host)
    }

    fn guest_file_write(&self, clone_id: &str, guest_path: &str, content: &[u8]) -> Result<()> {
        let channel = VirshChannel::new(clone_id.to_string());
        self.client_for(&channel).write_file(guest_path, content)
    }

    fn guest_file_read(&self, clone_id: &str, guest_path: &str) -> Result<Vec<u8>> {
        let channel = VirshChannel::new(clone_id.to_string());
        self.client_for(&channel).read_file(guest_path)
    }

    fn destroy_domain(&self, clone_id: &str) -> Result<()> {
        self.cloner.destroy_domain(clone_id)
    }

    fn undefine_domain(&self, clone_id: &str, overlay: &Path) -> Result<()> {
        self.cloner.undefine_domain(clone_id, overlay)
    }

    fn log_info(&self, msg: &str) {
        info!("{msg}");
    }

    fn log_success(&self, msg: &str) {
        info!(outcome = "success", "{msg}");
    }
}
