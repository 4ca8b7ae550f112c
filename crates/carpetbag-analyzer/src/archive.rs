//! Transparent-compression tar reading, the Rust equivalent of Python's
//! `tarfile.open(mode='r:*')` used throughout `analyze.py`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::Result;
use carpetbag_core::error::ClassificationError;

/// One member's path and raw content, read fully into memory. Source
/// packages are small enough (a handful of patches plus a recipe) that
/// streaming isn't worth the complexity here.
pub struct Member {
    pub path: String,
    pub data: Vec<u8>,
}

pub fn read_members(archive_path: &Path) -> Result<Vec<Member>, ClassificationError> {
    let file = File::open(archive_path)
        .map_err(|e| ClassificationError::UnreadableArchive(e.to_string()))?;
    let reader: Box<dyn Read> = match extension_kind(archive_path) {
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
        Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(file)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new(file)),
        Compression::None => Box::new(file),
    };

    let mut archive = tar::Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|e| ClassificationError::UnreadableArchive(e.to_string()))?;

    let mut members = Vec::new();
    for entry in entries {
        let mut entry = entry.map_err(|e| ClassificationError::UnreadableArchive(e.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|e| ClassificationError::UnreadableArchive(e.to_string()))?
            .to_string_lossy()
            .into_owned();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| ClassificationError::UnreadableArchive(e.to_string()))?;
        members.push(Member { path, data });
    }
    Ok(members)
}

enum Compression {
    Gzip,
    Bzip2,
    Xz,
    None,
}

fn extension_kind(path: &Path) -> Compression {
    let name = path.to_string_lossy();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Compression::Gzip
    } else if name.ends_with(".tar.bz2") {
        Compression::Bzip2
    } else if name.ends_with(".tar.xz") {
        Compression::Xz
    } else {
        Compression::None
    }
}

/// Normalize a release filename's compression suffix the way spec.md §4.6
/// requires when comparing archives across a rebuild: `.bz2`/`.gz`/`.lzma`
/// are all folded to `.xz` before the filename comparison.
pub fn normalize_compression_suffix(name: &str) -> String {
    for suffix in [".tar.bz2", ".tar.gz", ".tar.lzma"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            return format!("{stripped}.tar.xz");
        }
    }
    name.to_string()
}

/// Find the single member ending in `suffix`; ambiguous or absent is an
/// error, matching `analyze.py`'s "exactly one recipe" invariant.
pub fn find_one(members: &[Member], suffix: &str) -> Result<usize, ClassificationError> {
    let matches: Vec<usize> = members
        .iter()
        .enumerate()
        .filter(|(_, m)| m.path.ends_with(suffix))
        .map(|(i, _)| i)
        .collect();
    match matches.len() {
        0 => Err(ClassificationError::NoRecipeFound),
        1 => Ok(matches[0]),
        _ => Err(ClassificationError::AmbiguousCygport),
    }
}
