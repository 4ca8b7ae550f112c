//! Filesystem-backed durable queue (L3), grounded in `queue.py` /
//! `main.py`'s use of `dirq.QueueSimple`: each enqueued item is a plain
//! file; a consumer claims one by atomically creating a sibling lock file,
//! and `purge()` clears locks abandoned by a consumer that died mid-job so
//! the item can be retried.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{instrument, warn};
use uuid::Uuid;

const LOCK_SUFFIX: &str = ".lock";

pub struct FsQueue {
    root: PathBuf,
    stale_lock: Duration,
}

/// A claimed queue item: its element filename and raw payload.
pub struct QueueItem {
    pub name: String,
    pub payload: Vec<u8>,
}

impl FsQueue {
    pub fn open(root: impl Into<PathBuf>, stale_lock: Duration) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).with_context(|| format!("creating queue dir {}", root.display()))?;
        Ok(Self { root, stale_lock })
    }

    /// Write `payload` as a new queue element. Elements are named so that
    /// directory order is also arrival order (spec.md §4.3: FIFO-ish,
    /// best-effort — matching `dirq`'s own guarantee).
    #[instrument(skip(self, payload))]
    pub fn enqueue(&self, payload: &[u8]) -> Result<String> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let name = format!("{nanos:020}-{}", Uuid::new_v4());

        let tmp = self.root.join(format!(".tmp-{name}"));
        fs::write(&tmp, payload).with_context(|| format!("writing {}", tmp.display()))?;
        let dest = self.root.join(&name);
        fs::rename(&tmp, &dest).with_context(|| format!("renaming {} into place", dest.display()))?;
        Ok(name)
    }

    /// Names of all elements currently present, in arrival order, whether
    /// claimed or not.
    fn element_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(&self.root)
            .with_context(|| format!("reading queue dir {}", self.root.display()))?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| !n.starts_with('.') && !n.ends_with(LOCK_SUFFIX))
            .collect();
        names.sort();
        Ok(names)
    }

    fn lock_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{LOCK_SUFFIX}"))
    }

    /// Atomically claim an element. Returns `false` if another consumer
    /// already holds the lock.
    fn lock(&self, name: &str) -> Result<bool> {
        match fs::OpenOptions::new().write(true).create_new(true).open(self.lock_path(name)) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e).with_context(|| format!("locking queue element {name}")),
        }
    }

    /// Scan for the next unclaimed element and lock it. Returns `None` if
    /// the queue is empty or everything is currently locked by another
    /// consumer.
    #[instrument(skip(self))]
    pub fn next(&self) -> Result<Option<QueueItem>> {
        for name in self.element_names()? {
            if !self.lock(&name)? {
                continue;
            }
            let path = self.root.join(&name);
            match fs::read(&path) {
                Ok(payload) => return Ok(Some(QueueItem { name, payload })),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    // element vanished between listing and read (another
                    // process already removed it); drop our stale lock and
                    // keep scanning.
                    let _ = fs::remove_file(self.lock_path(&name));
                    continue;
                }
                Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
            }
        }
        Ok(None)
    }

    /// Remove a completed element and its lock.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.root.join(name);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
        }
        let lock = self.lock_path(name);
        if lock.exists() {
            fs::remove_file(&lock).with_context(|| format!("removing {}", lock.display()))?;
        }
        Ok(())
    }

    /// Clear lock files older than the stale-lock threshold, so an element
    /// whose consumer died mid-job becomes claimable again (the equivalent
    /// of `dirq.purge(1, 1)` in `main.py`, generalized to a configurable
    /// threshold rather than hardcoded seconds).
    #[instrument(skip(self))]
    pub fn purge(&self) -> Result<usize> {
        let mut cleared = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(LOCK_SUFFIX) {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|m| m.elapsed().ok())
                .unwrap_or_default();
            if age > self.stale_lock {
                if let Err(e) = fs::remove_file(entry.path()) {
                    warn!(lock = %name, error = %e, "failed to clear stale lock");
                } else {
                    cleared += 1;
                }
            }
        }
        Ok(cleared)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
