//! Directory-tree capture, grounded in `verify.py`'s `capture_dirtree`
//! (`os.walk`-based relpath -> sorted filename list).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use carpetbag_analyzer::archive::normalize_compression_suffix;

/// relative directory path (empty string for the root) -> sorted filenames
/// directly inside it.
pub type DirTree = BTreeMap<String, Vec<String>>;

pub fn capture(root: &Path) -> Result<DirTree> {
    let mut tree = DirTree::new();
    walk(root, root, &mut tree)?;
    Ok(tree)
}

/// An uploaded-side tree capture, normalized for comparison (spec.md §4.6:
/// trailing `.bz2|.gz|.lzma` rewritten to `.xz`) but still able to map a
/// normalized relative path back to the file that actually exists on disk.
pub struct NormalizedTree {
    pub tree: DirTree,
    renamed: BTreeMap<String, String>,
}

impl NormalizedTree {
    /// The on-disk relative path backing a normalized `rel` path (same path
    /// if the name wasn't rewritten).
    pub fn original_rel(&self, rel: &str) -> String {
        self.renamed.get(rel).cloned().unwrap_or_else(|| rel.to_string())
    }
}

pub fn capture_normalized(root: &Path) -> Result<NormalizedTree> {
    let raw = capture(root)?;
    let mut tree = DirTree::new();
    let mut renamed = BTreeMap::new();

    for (dir, files) in raw {
        let mut normalized_files = Vec::with_capacity(files.len());
        for file in files {
            let normalized = normalize_compression_suffix(&file);
            if normalized != file {
                let rel = if dir.is_empty() {
                    normalized.clone()
                } else {
                    format!("{dir}/{normalized}")
                };
                renamed.insert(rel, if dir.is_empty() { file.clone() } else { format!("{dir}/{file}") });
            }
            normalized_files.push(normalized);
        }
        normalized_files.sort();
        tree.insert(dir, normalized_files);
    }

    Ok(NormalizedTree { tree, renamed })
}

fn walk(root: &Path, dir: &Path, tree: &mut DirTree) -> Result<()> {
    let rel = dir
        .strip_prefix(root)
        .unwrap_or(dir)
        .to_string_lossy()
        .replace('\\', "/");

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(root, &entry.path(), tree)?;
        } else {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    files.sort();
    tree.insert(rel, files);
    Ok(())
}

/// Produce a human-readable description of how two trees differ, or `None`
/// if they match exactly. Mirrors `verify.py`'s `datadiff` in spirit —
/// readable enough to act on, not a byte-exact diff format.
pub fn diff(expected: &DirTree, actual: &DirTree) -> Option<String> {
    if expected == actual {
        return None;
    }

    let mut lines = Vec::new();
    for (dir, expected_files) in expected {
        match actual.get(dir) {
            None => lines.push(format!("- {dir}/ (missing)")),
            Some(actual_files) if actual_files != expected_files => {
                lines.push(format!(
                    "! {dir}/ expected {expected_files:?}, got {actual_files:?}"
                ));
            }
            _ => {}
        }
    }
    for dir in actual.keys() {
        if !expected.contains_key(dir) {
            lines.push(format!("+ {dir}/ (unexpected)"));
        }
    }
    Some(lines.join("\n"))
}
