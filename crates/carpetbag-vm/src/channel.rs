//! `GuestChannel` over `virsh qemu-agent-command`, the shell-level
//! equivalent of `libvirt_qemu.qemuAgentCommand` used by
//! `libvirt_qemu_ga_utils.py`.

use anyhow::Result;
use carpetbag_guest::channel::GuestChannel;

use crate::shell;

pub struct VirshChannel {
    pub domain: String,
}

impl VirshChannel {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }
}

impl GuestChannel for VirshChannel {
    fn execute(&self, command_json: &str) -> Result<String> {
        let out = shell::run(
            "virsh",
            &["qemu-agent-command", &self.domain, command_json],
        )?;
        Ok(out.stdout)
    }
}
