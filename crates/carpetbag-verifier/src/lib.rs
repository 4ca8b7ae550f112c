//! Build output verification (L6), grounded in `verify.py`'s `verify()`:
//! compare the tree shape first, then dispatch per file — archives get a
//! member-list comparison, everything else a byte-exact one.

pub mod archive_cmp;
pub mod dirtree;
pub mod file_cmp;

use std::path::Path;

use anyhow::Result;
use tracing::{info, instrument, warn};

pub struct VerifyReport {
    pub valid: bool,
    pub tree_diff: Option<String>,
    pub mismatched_files: Vec<String>,
}

/// Compare `indir` (the uploaded source tree) against `outdir` (the rebuilt
/// tree), per spec.md §4.6. `indir` is normalized first, rewriting trailing
/// `.bz2|.gz|.lzma` extensions to `.xz`. A tree-shape mismatch short-circuits
/// file comparison, same as `verify.py`.
#[instrument(skip_all)]
pub fn verify(indir: &Path, outdir: &Path) -> Result<VerifyReport> {
    let uploaded = dirtree::capture_normalized(indir)?;
    let rebuilt_tree = dirtree::capture(outdir)?;

    if let Some(diff) = dirtree::diff(&uploaded.tree, &rebuilt_tree) {
        warn!(%diff, "rebuilt tree does not match uploaded tree");
        return Ok(VerifyReport {
            valid: false,
            tree_diff: Some(diff),
            mismatched_files: Vec::new(),
        });
    }

    let mut mismatched = Vec::new();
    for (dir, files) in &uploaded.tree {
        for file in files {
            let rel = if dir.is_empty() {
                file.clone()
            } else {
                format!("{dir}/{file}")
            };
            let indir_path = indir.join(uploaded.original_rel(&rel));
            let outdir_path = outdir.join(&rel);

            let equal = if is_archive(file) {
                archive_cmp::archives_equal(&indir_path, &outdir_path)?
            } else {
                file_cmp::files_equal(&indir_path, &outdir_path)?
            };

            if !equal {
                mismatched.push(rel);
            }
        }
    }

    let valid = mismatched.is_empty();
    if valid {
        info!("rebuild matches uploaded tree");
    } else {
        warn!(count = mismatched.len(), "files differ from uploaded tree");
    }

    Ok(VerifyReport {
        valid,
        tree_diff: None,
        mismatched_files: mismatched,
    })
}

fn is_archive(name: &str) -> bool {
    name.ends_with(".tar.xz") || name.ends_with(".tar.bz2") || name.ends_with(".tar.gz")
}
