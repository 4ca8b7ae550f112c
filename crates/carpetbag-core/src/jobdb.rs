//! Persistent job-id counter and job database (spec.md §4.7, §6, §9).
//!
//! Both are touched only by the main loop (single writer, per spec.md §5's
//! "Shared resources" note) — the counter is never read by the builder,
//! which receives the id as a plain argument.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::job::JobRecord;

/// Single-owner monotonic counter, persisted as an ASCII integer file
/// (spec.md §6: `jobid` — persistent monotonic counter).
pub struct JobIdCounter {
    path: PathBuf,
    current: u64,
}

impl JobIdCounter {
    /// Read the current counter value from disk, defaulting to 0 if the
    /// file doesn't exist yet (first run).
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = match fs::read_to_string(&path) {
            Ok(s) => s.trim().parse().unwrap_or(0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e).context("reading jobid counter"),
        };
        Ok(Self { path, current })
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    /// Atomically increment and persist, returning the new id. This is the
    /// only mutator the main loop ever calls; the builder only ever sees
    /// the resulting id as an argument.
    pub fn allocate_next(&mut self) -> Result<u64> {
        self.current += 1;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, self.current.to_string())
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming {} into place", self.path.display()))?;
        Ok(self.current)
    }
}

/// The job table, schema per spec.md §4.7: one `JobRecord` per line of a
/// JSON-lines file, rewritten atomically on update. This replaces the
/// original's embedded SQL table with a dependency-free equivalent that
/// still gives single-writer durability.
pub struct JobDatabase {
    path: PathBuf,
}

impl JobDatabase {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(&path, "").with_context(|| format!("creating {}", path.display()))?;
        }
        Ok(Self { path })
    }

    pub fn load_all(&self) -> Result<Vec<JobRecord>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).context("parsing job record"))
            .collect()
    }

    pub fn pending(&self) -> Result<Vec<JobRecord>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| r.status == crate::job::JobStatus::Pending)
            .collect())
    }

    pub fn insert(&self, record: &JobRecord) -> Result<()> {
        let mut f = fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        writeln!(f, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }

    /// Replace the row with a matching id; rewrites the whole file via a
    /// temp-file-then-rename to avoid ever leaving a half-written database
    /// on disk.
    pub fn update(&self, record: &JobRecord) -> Result<()> {
        let mut rows = self.load_all()?;
        match rows.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => *slot = record.clone(),
            None => rows.push(record.clone()),
        }
        self.write_all(&rows)
    }

    fn write_all(&self, rows: &[JobRecord]) -> Result<()> {
        let tmp = self.path.with_extension("db.tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            for r in rows {
                writeln!(f, "{}", serde_json::to_string(r)?)?;
            }
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn counter_starts_at_zero_when_absent() {
        let dir = tempdir().unwrap();
        let counter = JobIdCounter::load(dir.path().join("jobid")).unwrap();
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn counter_is_strictly_monotonic_and_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobid");

        let mut counter = JobIdCounter::load(&path).unwrap();
        assert_eq!(counter.allocate_next().unwrap(), 1);
        assert_eq!(counter.allocate_next().unwrap(), 2);

        // simulate a restart
        let mut reloaded = JobIdCounter::load(&path).unwrap();
        assert_eq!(reloaded.current(), 2);
        assert_eq!(reloaded.allocate_next().unwrap(), 3);
    }

    #[test]
    fn jobdb_insert_and_update_roundtrip() {
        let dir = tempdir().unwrap();
        let db = JobDatabase::open(dir.path().join("carpetbag.db")).unwrap();

        let mut job = JobRecord::new(1, "pkg", "/var/log/carpetbag");
        db.insert(&job).unwrap();
        assert_eq!(db.pending().unwrap().len(), 1);

        job.mark_processed(true, Some(true));
        db.update(&job).unwrap();

        let rows = db.load_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].built, Some(true));
        assert_eq!(db.pending().unwrap().len(), 0);
    }
}
