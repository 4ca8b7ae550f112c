//! Source archive classification (spec.md §4.4), grounded in `analyze.py`'s
//! `analyze()`: look for exactly one `.cygport` recipe, else exactly one
//! `*.sh` script, classified as `cygbuild` if its content matches
//! `^CYGBUILD` or `g-b-s` otherwise; more than one candidate of either kind
//! is a classification failure.

use std::path::Path;

use carpetbag_core::error::ClassificationError;
use carpetbag_core::package::{Kind, PackageKind};
use regex::Regex;

use crate::archive::{self, Member};
use crate::depends::{self, HintScan};
use crate::tables::Tables;

/// `CYGBUILD` at the start of a line, grounded in `analyze.py`'s regex used
/// to tell a build script apart from a `g-b-s` recipe shipped as a plain
/// `.sh` file.
fn cygbuild_marker() -> Regex {
    Regex::new(r"(?m)^CYGBUILD\b").unwrap()
}

/// `DEPEND="..."` as a single line — spec.md §9 decides only this form is
/// recognized; a DEPEND split across continuation lines is not parsed.
fn depend_clause(cygport_text: &str) -> Option<String> {
    let re = Regex::new(r#"(?m)^DEPEND="([^"]*)"$"#).unwrap();
    re.captures(cygport_text).map(|c| c[1].to_string())
}

pub fn classify(
    archive_path: &Path,
    srcpkg: &str,
    hints: &HintScan,
    tables: &Tables,
) -> Result<PackageKind, ClassificationError> {
    let members = archive::read_members(archive_path)?;

    if let Some(kind) = classify_cygport(&members, srcpkg, hints, tables)? {
        return Ok(kind);
    }
    if let Some(kind) = classify_sh_based(&members, srcpkg, hints, tables)? {
        return Ok(kind);
    }
    Err(ClassificationError::NoRecipeFound)
}

fn classify_cygport(
    members: &[Member],
    srcpkg: &str,
    hints: &HintScan,
    tables: &Tables,
) -> Result<Option<PackageKind>, ClassificationError> {
    let idx = match archive::find_one(members, ".cygport") {
        Ok(idx) => idx,
        Err(ClassificationError::NoRecipeFound) => return Ok(None),
        Err(e) => return Err(e),
    };
    let cygport_text = String::from_utf8_lossy(&members[idx].data);
    let overrides = depends::per_package_overrides(srcpkg, tables);

    let (kind, deps) = if hints.found {
        let mut deps = depends::from_hints(hints, tables);
        deps.extend(overrides);
        (Kind::CygportWithDepends, deps)
    } else {
        let mut deps = depends::from_cygport(&cygport_text);
        if let Some(depend_line) = depend_clause(&cygport_text) {
            deps.extend(depends::from_depend(&depend_line, tables));
        }
        deps.extend(overrides);
        (Kind::CygportGuessedDepends, deps)
    };

    Ok(Some(PackageKind::new(kind, members[idx].path.clone(), deps)))
}

/// Exactly one `*.sh` member recognized as a recipe; its content decides
/// `cygbuild` (`CYGBUILD` marker, plus `quilt`) vs `g-b-s` (no marker).
/// Both share the same hints+overrides dependency base (`analyze.py`'s
/// `depends_from_hints` ∪ `depends_from_database`).
fn classify_sh_based(
    members: &[Member],
    srcpkg: &str,
    hints: &HintScan,
    tables: &Tables,
) -> Result<Option<PackageKind>, ClassificationError> {
    let candidates: Vec<&Member> = members.iter().filter(|m| m.path.ends_with(".sh")).collect();

    match candidates.len() {
        0 => Ok(None),
        1 => {
            let script = candidates[0];
            let content = String::from_utf8_lossy(&script.data);
            let is_cygbuild = cygbuild_marker().is_match(&content);

            let mut deps = depends::from_hints(hints, tables);
            deps.extend(depends::per_package_overrides(srcpkg, tables));
            let kind = if is_cygbuild {
                deps.extend(depends::from_cygbuild());
                Kind::Cygbuild
            } else {
                Kind::Gbs
            };

            Ok(Some(PackageKind::new(kind, script.path.clone(), deps)))
        }
        _ => Err(ClassificationError::AmbiguousScript),
    }
}
