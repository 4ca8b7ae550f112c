//! Main-loop iteration (L7), grounded in `main.py`'s per-cycle admit-then-process
//! split (spec.md §4.7): first drain the queue into pending job rows, then run
//! every pending row through analyze → build → verify, updating its row and
//! detaching its log handler regardless of outcome.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use carpetbag_analyzer::{classify, depends, Tables};
use carpetbag_builder::history::{self, HistoryEntry};
use carpetbag_builder::pipeline::{run_job, BuildRequest};
use carpetbag_core::arch;
use carpetbag_core::build_env::BuildEnvironment;
use carpetbag_core::config::CarpetbagConfig;
use carpetbag_core::job::JobRecord;
use carpetbag_core::jobdb::{JobDatabase, JobIdCounter};
use carpetbag_core::time::utc_now;
use carpetbag_queue::FsQueue;

use crate::joblog::JobLog;

/// Admit every currently-queued entry as a new pending job row, per spec.md
/// §4.7: lock, allocate the next id, insert, remove — in that order, so a
/// crash between insert and remove simply re-admits the same entry next run.
#[instrument(skip_all)]
pub fn admit_queue(queue: &FsQueue, counter: &mut JobIdCounter, db: &JobDatabase, cfg: &CarpetbagConfig) -> Result<usize> {
    let mut admitted = 0;
    while let Some(item) = queue.next()? {
        let srcpkg = String::from_utf8(item.payload)
            .with_context(|| format!("queue entry {} is not valid UTF-8", item.name))?;
        let id = counter.allocate_next()?;
        let record = JobRecord::new(id, &srcpkg, &cfg.log_dir.to_string_lossy());
        db.insert(&record)?;
        queue.remove(&item.name)?;
        info!(job_id = id, srcpkg = %srcpkg, "admitted");
        admitted += 1;
    }
    Ok(admitted)
}

/// Run every pending row through the pipeline. Each job's failure is
/// contained — logged, the row marked accordingly — and never aborts the
/// rest of the batch (spec.md §7: "no exception escapes the main loop").
#[instrument(skip_all)]
pub fn process_pending(
    db: &JobDatabase,
    cfg: &CarpetbagConfig,
    tables: &Tables,
    env: &dyn BuildEnvironment,
) -> Result<()> {
    for mut job in db.pending()? {
        job.mark_started();
        db.update(&job)?;

        let mut log = JobLog::attach(&cfg.log_dir.join(format!("{}.log", job.id)))?;
        log.line(&format!("job {} ({}) starting", job.id, job.srcpkg));

        process_job(&mut job, cfg, tables, env, &mut log);

        log.line(&format!(
            "job {} finished: status={} built={:?} valid={:?}",
            job.id, job.status, job.built, job.valid
        ));
        db.update(&job)?;
    }
    Ok(())
}

fn process_job(job: &mut JobRecord, cfg: &CarpetbagConfig, tables: &Tables, env: &dyn BuildEnvironment, log: &mut JobLog) {
    let archive_path = cfg.uploads_dir().join(&job.srcpkg);
    let arch_name = job.srcpkg.split('/').next().unwrap_or("");

    let Some(arch_entry) = arch::arch_info(arch_name) else {
        warn!(job_id = job.id, arch = arch_name, "unsupported architecture");
        log.line(&format!("unsupported architecture: {arch_name}"));
        job.mark_exception();
        return;
    };

    let upload_dir = archive_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.uploads_dir());
    let hints = depends::scan_upload_dir(&upload_dir);

    let package = match classify(&archive_path, &job.srcpkg, &hints, tables) {
        Ok(p) => p,
        Err(e) => {
            log.line(&format!("classification failed: {e}"));
            job.mark_processed(false, None);
            return;
        }
    };
    let kind_label = package.kind.map(|k| k.to_string()).unwrap_or_else(|| "unknown".to_string());
    log.line(&format!("classified as {kind_label} via {}", package.script));

    let outdir = cfg.root.join("outputs").join(job.id.to_string());
    let scripts_dir = cfg.scripts_dir();
    let req = BuildRequest {
        job_id: job.id,
        golden_domain: arch_entry.golden_domain,
        guest_bash_path: arch_entry.guest_bash_path,
        archive_path: &archive_path,
        scripts_dir: &scripts_dir,
        package: &package,
        outdir: &outdir,
        boot_wait: std::time::Duration::from_secs(cfg.boot_wait_secs),
        debug: false,
    };

    let outcome = match run_job(env, &req) {
        Ok(o) => o,
        Err(e) => {
            log.line(&format!("build lifecycle error: {e}"));
            job.mark_exception();
            return;
        }
    };

    let build_log_path = PathBuf::from(&job.build_log_path);
    let mut combined = outcome.stdout.clone();
    combined.extend_from_slice(b"\n--- stderr ---\n");
    combined.extend_from_slice(&outcome.stderr);
    let _ = std::fs::write(&build_log_path, &combined);

    log.line(&format!("build {}: {}", if outcome.built { "succeeded" } else { "failed" }, outcome.elapsed_report));

    let valid = if outcome.built {
        Some(verify_rebuild(&upload_dir, &outdir, log))
    } else {
        None
    };

    let _ = history::record(
        &cfg.root.join("history"),
        &HistoryEntry {
            job_id: job.id,
            timestamp: chrono::Utc::now(),
            built: outcome.built,
            verified: valid,
            elapsed_report: outcome.elapsed_report.clone(),
        },
    );

    job.mark_processed(outcome.built, valid);
}

/// Verify a build's output against the uploaded source tree it was built
/// from (spec.md §4.6): the rebuild must reproduce the same directory
/// shape and, file by file, the same content or archive member list.
/// Purely advisory — the job is still recorded as built either way.
fn verify_rebuild(upload_dir: &std::path::Path, outdir: &std::path::Path, log: &mut JobLog) -> bool {
    match carpetbag_verifier::verify(upload_dir, outdir) {
        Ok(report) => {
            if !report.valid {
                log.line(&format!(
                    "verification failed: {:?}",
                    report.tree_diff.or(Some(report.mismatched_files.join(", ")))
                ));
            }
            report.valid
        }
        Err(e) => {
            log.line(&format!("verification error: {e}"));
            false
        }
    }
}
