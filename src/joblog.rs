//! Per-job log handler (spec.md §4.7: "attach a per-job log handler... run
//! analyze→build→verify... detach the handler"). A plain append-only file
//! plays that role here rather than a dynamic `tracing` layer — the file is
//! opened at job start and closed (via `Drop`) when the job finishes,
//! which is the attach/detach discipline spec.md describes.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use carpetbag_core::time::utc_now;

pub struct JobLog {
    file: fs::File,
}

impl JobLog {
    pub fn attach(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening job log {}", path.display()))?;
        Ok(Self { file })
    }

    pub fn line(&mut self, msg: &str) {
        let _ = writeln!(self.file, "[{}] {msg}", utc_now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_creates_parent_dirs_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("1.log");
        let mut log = JobLog::attach(&path).unwrap();
        log.line("started");
        drop(log);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("started"));
    }
}
