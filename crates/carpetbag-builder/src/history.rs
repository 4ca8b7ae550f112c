//! Per-package build history, grounded in the teacher's `record_build_history`:
//! a capped JSON-lines log kept alongside each package's output, trimmed to
//! its last 50 entries on every write.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_ENTRIES: usize = 50;
const HISTORY_FILE: &str = "history.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub job_id: u64,
    pub timestamp: DateTime<Utc>,
    pub built: bool,
    pub verified: Option<bool>,
    pub elapsed_report: String,
}

/// Appends `entry` to `dir/history.jsonl`, then drops the oldest rows past
/// `MAX_ENTRIES` so the file never grows unbounded.
pub fn record(dir: &Path, entry: &HistoryEntry) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = history_path(dir);

    let mut rows = load(dir)?;
    rows.push(entry.clone());
    if rows.len() > MAX_ENTRIES {
        let drop = rows.len() - MAX_ENTRIES;
        rows.drain(0..drop);
    }

    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut f = fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        for row in &rows {
            writeln!(f, "{}", serde_json::to_string(row)?)?;
        }
    }
    fs::rename(&tmp, &path).with_context(|| format!("renaming {} into place", tmp.display()))?;
    Ok(())
}

pub fn load(dir: &Path) -> Result<Vec<HistoryEntry>> {
    let path = history_path(dir);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).context("parsing history entry"))
        .collect()
}

fn history_path(dir: &Path) -> PathBuf {
    dir.join(HISTORY_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(job_id: u64) -> HistoryEntry {
        HistoryEntry {
            job_id,
            timestamp: Utc::now(),
            built: true,
            verified: Some(true),
            elapsed_report: "total time 0:05:00 ()".to_string(),
        }
    }

    #[test]
    fn record_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        record(dir.path(), &entry(1)).unwrap();
        record(dir.path(), &entry(2)).unwrap();

        let rows = load(dir.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].job_id, 2);
    }

    #[test]
    fn history_is_capped_at_fifty_entries() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..60 {
            record(dir.path(), &entry(i)).unwrap();
        }
        let rows = load(dir.path()).unwrap();
        assert_eq!(rows.len(), 50);
        assert_eq!(rows.first().unwrap().job_id, 10);
        assert_eq!(rows.last().unwrap().job_id, 59);
    }
}
