//! Job data model (spec.md §3).
//!
//! A Job is created when a queue item is admitted, mutated by the dispatcher
//! and builder, and never deleted.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Processed,
    Exception,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Processed => "processed",
            JobStatus::Exception => "exception",
        };
        write!(f, "{s}")
    }
}

/// A single row of the job database, schema per spec.md §4.7:
/// `(id, srcpkg, status, log, buildlog, built, valid, start_timestamp, end_timestamp)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: u64,
    pub srcpkg: String,
    pub status: JobStatus,
    #[serde(rename = "log")]
    pub job_log_path: String,
    #[serde(rename = "buildlog")]
    pub build_log_path: String,
    #[serde(default)]
    pub built: Option<bool>,
    #[serde(default)]
    pub valid: Option<bool>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

impl JobRecord {
    pub fn new(id: u64, srcpkg: impl Into<String>, log_dir: &str) -> Self {
        let srcpkg = srcpkg.into();
        Self {
            id,
            job_log_path: format!("{log_dir}/{id}.log"),
            build_log_path: format!("{log_dir}/build_{id}.log"),
            srcpkg,
            status: JobStatus::Pending,
            built: None,
            valid: None,
            start: None,
            end: None,
        }
    }

    pub fn mark_started(&mut self) {
        self.status = JobStatus::Processing;
        self.start = Some(crate::time::utc_now());
    }

    pub fn mark_processed(&mut self, built: bool, valid: Option<bool>) {
        self.status = JobStatus::Processed;
        self.built = Some(built);
        self.valid = valid;
        self.end = Some(crate::time::utc_now());
    }

    pub fn mark_exception(&mut self) {
        self.status = JobStatus::Exception;
        self.end = Some(crate::time::utc_now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_is_pending_with_no_outcome() {
        let j = JobRecord::new(1, "x86_64/release/foo/foo-1-src.tar.xz", "/var/log/carpetbag");
        assert_eq!(j.status, JobStatus::Pending);
        assert!(j.built.is_none());
        assert!(j.valid.is_none());
        assert_eq!(j.job_log_path, "/var/log/carpetbag/1.log");
        assert_eq!(j.build_log_path, "/var/log/carpetbag/build_1.log");
    }

    #[test]
    fn lifecycle_transitions_set_expected_fields() {
        let mut j = JobRecord::new(2, "pkg", "/var/log/carpetbag");
        j.mark_started();
        assert_eq!(j.status, JobStatus::Processing);
        assert!(j.start.is_some());

        j.mark_processed(true, Some(false));
        assert_eq!(j.status, JobStatus::Processed);
        assert_eq!(j.built, Some(true));
        assert_eq!(j.valid, Some(false));
        assert!(j.end.is_some());
    }

    #[test]
    fn built_and_valid_are_independent() {
        // spec.md §9: verification failure doesn't retract a successful build.
        let mut j = JobRecord::new(3, "pkg", "/var/log/carpetbag");
        j.mark_processed(true, Some(false));
        assert_eq!(j.built, Some(true));
        assert_eq!(j.valid, Some(false));
    }

    #[test]
    fn roundtrips_through_json() {
        let mut j = JobRecord::new(4, "pkg", "/var/log/carpetbag");
        j.mark_started();
        let s = serde_json::to_string(&j).unwrap();
        let back: JobRecord = serde_json::from_str(&s).unwrap();
        assert_eq!(back.id, j.id);
        assert_eq!(back.status, j.status);
    }
}
