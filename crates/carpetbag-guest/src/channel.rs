//! The physical transport a [`crate::client::GuestAgentClient`] rides over.
//!
//! spec.md §4.1: "The physical channel is supplied by the hypervisor; the
//! client does not open it directly." Grounded in
//! `libvirt_qemu_ga_utils.py`'s `execute_ga_command`, which hands a JSON
//! string to `libvirt_qemu.qemuAgentCommand` and parses the JSON string it
//! gets back — the same shape, generalized into a trait so the client can be
//! tested against a fake channel.

use anyhow::Result;

/// Send one guest-agent JSON command, block for the JSON reply.
pub trait GuestChannel {
    fn execute(&self, command_json: &str) -> Result<String>;
}
