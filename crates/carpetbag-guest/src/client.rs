//! Guest-agent JSON RPC client (spec.md §4.1), grounded in
//! `libvirt_qemu_ga_utils.py`.
//!
//! Every request is a single JSON object `{"execute": CMD, "arguments": {...}}`;
//! every successful response carries a `return` field. File transfers proceed
//! in fixed-size chunks, base64-encoded; `guest-exec-status` is polled at
//! 1-second intervals with no upper bound (spec.md §9 — intentionally
//! unbounded, do not invent a timeout here).

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde_json::{Value, json};
use tracing::instrument;

use carpetbag_core::error::GuestTransportError;

use crate::channel::GuestChannel;

/// Pre-base64 payload size per chunk. The channel imposes an unspecified
/// upper bound on frame size; 4 KiB keeps the encoded frame comfortably
/// under any plausible limit (spec.md §4.1).
pub const CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stdout_truncated: bool,
    pub stderr: Vec<u8>,
    pub stderr_truncated: bool,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub struct GuestAgentClient<'a, C: GuestChannel> {
    channel: &'a C,
}

impl<'a, C: GuestChannel> GuestAgentClient<'a, C> {
    pub fn new(channel: &'a C) -> Self {
        Self { channel }
    }

    fn call(&self, execute: &str, arguments: Option<Value>) -> Result<Value> {
        let mut obj = serde_json::Map::new();
        obj.insert("execute".to_string(), Value::String(execute.to_string()));
        if let Some(args) = arguments {
            obj.insert("arguments".to_string(), args);
        }
        let command = Value::Object(obj).to_string();
        let raw = self
            .channel
            .execute(&command)
            .map_err(|e| GuestTransportError::Transport(e.to_string()))?;
        serde_json::from_str(&raw).context("parsing guest-agent response JSON")
    }

    /// Translate any transport failure into a soft `false`; success requires
    /// `return` to be present (spec.md §4.1).
    pub fn ping(&self) -> bool {
        match self.call("guest-ping", None) {
            Ok(v) => v.get("return").is_some(),
            Err(_) => false,
        }
    }

    fn file_open(&self, path: &str, mode: &str) -> Result<i64> {
        let v = self.call("guest-file-open", Some(json!({"path": path, "mode": mode})))?;
        v.get("return")
            .and_then(Value::as_i64)
            .ok_or_else(|| GuestTransportError::MissingReturn.into())
    }

    /// Best-effort close; a failure here must never mask the original error
    /// from the operation that used the handle (spec.md §7).
    fn file_close(&self, handle: i64) {
        let _ = self.call("guest-file-close", Some(json!({"handle": handle})));
    }

    /// Run `f` against a freshly opened handle, always closing it
    /// afterwards — even if `f` failed (spec.md §4.1 handle discipline,
    /// §8 testable property).
    fn with_handle<T>(&self, path: &str, mode: &str, f: impl FnOnce(i64) -> Result<T>) -> Result<T> {
        let handle = self.file_open(path, mode)?;
        let result = f(handle);
        self.file_close(handle);
        result
    }

    /// Read an entire guest file into memory, in fixed-size chunks.
    #[instrument(skip(self))]
    pub fn read_file(&self, guest_path: &str) -> Result<Vec<u8>> {
        self.with_handle(guest_path, "r", |handle| {
            let mut out = Vec::new();
            loop {
                let v = self.call(
                    "guest-file-read",
                    Some(json!({"handle": handle, "count": CHUNK_SIZE})),
                )?;
                let ret = v.get("return").ok_or(GuestTransportError::MissingReturn)?;
                let buf_b64 = ret.get("buf-b64").and_then(Value::as_str).unwrap_or("");
                if !buf_b64.is_empty() {
                    out.extend(B64.decode(buf_b64).context("decoding base64 chunk")?);
                }
                if ret.get("eof").and_then(Value::as_bool).unwrap_or(false) {
                    break;
                }
            }
            Ok(out)
        })
    }

    /// Write `content` to a guest file, in fixed-size chunks. A short write
    /// (`count < len(chunk)`) aborts the upload (spec.md §4.1, §7).
    #[instrument(skip(self, content))]
    pub fn write_file(&self, guest_path: &str, content: &[u8]) -> Result<()> {
        self.with_handle(guest_path, "w+", |handle| {
            for chunk in content.chunks(CHUNK_SIZE) {
                let encoded = B64.encode(chunk);
                let v = self.call(
                    "guest-file-write",
                    Some(json!({"handle": handle, "buf-b64": encoded})),
                )?;
                let count = v
                    .get("return")
                    .and_then(|r| r.get("count"))
                    .and_then(Value::as_u64)
                    .ok_or(GuestTransportError::MissingReturn)? as usize;
                if count != chunk.len() {
                    return Err(GuestTransportError::PartialWrite {
                        wrote: count,
                        expected: chunk.len(),
                    }
                    .into());
                }
            }
            Ok(())
        })
    }

    /// Copy a host file into the guest, chunk by chunk.
    pub fn copy_to(&self, host_path: &Path, guest_path: &str) -> Result<()> {
        let content = fs::read(host_path)
            .with_context(|| format!("reading {}", host_path.display()))?;
        self.write_file(guest_path, &content)
    }

    /// Copy a guest file to the host, chunk by chunk.
    pub fn copy_from(&self, guest_path: &str, host_path: &Path) -> Result<()> {
        let content = self.read_file(guest_path)?;
        if let Some(parent) = host_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(host_path, content).with_context(|| format!("writing {}", host_path.display()))
    }

    /// Run a command in the guest and block until it exits, polling
    /// `guest-exec-status` at 1-second intervals with no upper bound
    /// (spec.md §9 open question: a timeout is desirable but none is
    /// specified — do not invent one).
    #[instrument(skip(self, args))]
    pub fn exec_and_wait(&self, path: &str, args: &[String]) -> Result<ExecOutput> {
        let arg_values: Vec<Value> = args.iter().map(|a| Value::String(a.clone())).collect();
        let v = self.call(
            "guest-exec",
            Some(json!({"path": path, "arg": arg_values, "capture-output": true})),
        )?;
        let pid = v
            .get("return")
            .and_then(|r| r.get("pid"))
            .and_then(Value::as_i64)
            .ok_or(GuestTransportError::MissingReturn)?;

        loop {
            let status = self.call("guest-exec-status", Some(json!({"pid": pid})))?;
            let ret = status
                .get("return")
                .ok_or(GuestTransportError::MissingReturn)?;
            let exited = ret.get("exited").and_then(Value::as_bool).unwrap_or(false);
            if !exited {
                thread::sleep(Duration::from_secs(1));
                continue;
            }

            let exit_code = ret.get("exitcode").and_then(Value::as_i64).unwrap_or(-1) as i32;
            let stdout = ret
                .get("out-data")
                .and_then(Value::as_str)
                .map(|s| B64.decode(s).unwrap_or_default())
                .unwrap_or_default();
            let stderr = ret
                .get("err-data")
                .and_then(Value::as_str)
                .map(|s| B64.decode(s).unwrap_or_default())
                .unwrap_or_default();

            return Ok(ExecOutput {
                exit_code,
                stdout,
                stdout_truncated: ret.get("out-truncated").is_some(),
                stderr,
                stderr_truncated: ret.get("err-truncated").is_some(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// A fake channel that replays a fixed sequence of JSON responses,
    /// recording the commands it was sent — the in-process equivalent of
    /// `libvirt_qemu.qemuAgentCommand` for tests.
    struct FakeChannel {
        responses: RefCell<VecDeque<String>>,
        sent: RefCell<Vec<String>>,
    }

    impl FakeChannel {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: RefCell::new(responses.into_iter().map(String::from).collect()),
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl GuestChannel for FakeChannel {
        fn execute(&self, command_json: &str) -> Result<String> {
            self.sent.borrow_mut().push(command_json.to_string());
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no more fake responses"))
        }
    }

    #[test]
    fn ping_true_when_return_present() {
        let chan = FakeChannel::new(vec![r#"{"return":{}}"#]);
        assert!(GuestAgentClient::new(&chan).ping());
    }

    #[test]
    fn ping_false_on_transport_failure() {
        struct AlwaysFails;
        impl GuestChannel for AlwaysFails {
            fn execute(&self, _: &str) -> Result<String> {
                anyhow::bail!("no route to guest")
            }
        }
        assert!(!GuestAgentClient::new(&AlwaysFails).ping());
    }

    #[test]
    fn read_file_stops_at_eof_and_always_closes() {
        let chan = FakeChannel::new(vec![
            r#"{"return": 7}"#,
            r#"{"return": {"buf-b64": "aGVsbG8=", "eof": false}}"#,
            r#"{"return": {"buf-b64": "", "eof": true}}"#,
            r#"{"return": {}}"#, // file-close
        ]);
        let client = GuestAgentClient::new(&chan);
        let content = client.read_file(r"C:\vm_out\manifest").unwrap();
        assert_eq!(content, b"hello");

        let sent = chan.sent.borrow();
        assert_eq!(sent.len(), 4);
        assert!(sent[0].contains("guest-file-open"));
        assert!(sent.last().unwrap().contains("guest-file-close"));
    }

    #[test]
    fn write_file_closes_handle_even_when_write_fails() {
        let chan = FakeChannel::new(vec![
            r#"{"return": 3}"#,                  // file-open
            r#"{"return": {"count": 2}}"#,        // short write: only 2 of 5 bytes
            r#"{"return": {}}"#,                  // file-close still happens
        ]);
        let client = GuestAgentClient::new(&chan);
        let err = client.write_file("C:\\vm_in\\x", b"hello").unwrap_err();
        assert!(err.to_string().contains("wrote 2"));

        let sent = chan.sent.borrow();
        assert!(sent.last().unwrap().contains("guest-file-close"));
    }

    #[test]
    fn exec_and_wait_polls_until_exited() {
        let chan = FakeChannel::new(vec![
            r#"{"return": {"pid": 1234}}"#,
            r#"{"return": {"exited": false}}"#,
            r#"{"return": {"exited": true, "exitcode": 0, "out-data": "b2s=" }}"#,
        ]);
        let client = GuestAgentClient::new(&chan);
        let result = client.exec_and_wait("bash", &["-c".to_string(), "true".to_string()]).unwrap();
        assert!(result.success());
        assert_eq!(result.stdout, b"ok");
    }

    #[test]
    fn exec_and_wait_reports_nonzero_exit() {
        let chan = FakeChannel::new(vec![
            r#"{"return": {"pid": 1}}"#,
            r#"{"return": {"exited": true, "exitcode": 1}}"#,
        ]);
        let client = GuestAgentClient::new(&chan);
        let result = client.exec_and_wait("bash", &[]).unwrap();
        assert!(!result.success());
    }
}
