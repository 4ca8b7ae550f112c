//! Dependency synthesis cascade, grounded in `analyze.py`'s
//! `depends_from_hints` / `depends_from_cygport` / `depends_from_depend` /
//! `depends_from_cygbuild`.

use std::collections::BTreeSet;
use std::path::Path;

use carpetbag_core::arch::cross_package_prefixes;
use regex::Regex;

use crate::tables::Tables;

/// Result of walking a package's upload directory for `setup.hint` files
/// (spec.md §4.4 step 2), grounded in `analyze.py`'s `depends_from_hints`:
/// every `requires:` atom collected from every hint found anywhere under
/// the upload directory, whether any hint was found at all (this decides
/// the `cygport-with-depends` vs `cygport-guessed-depends` branch), and an
/// exclusion set of sibling package directory names so a multi-package
/// source upload doesn't pick up a build-dependency on a package it itself
/// produces.
pub struct HintScan {
    pub found: bool,
    pub requires: Vec<String>,
    pub exclude: BTreeSet<String>,
}

/// Walk `upload_dir` collecting `requires:` atoms from every `setup.hint`
/// found anywhere in the tree, and every subdirectory name plus the upload
/// directory's own basename as the sibling-package exclusion set.
pub fn scan_upload_dir(upload_dir: &Path) -> HintScan {
    let mut scan = HintScan { found: false, requires: Vec::new(), exclude: BTreeSet::new() };

    if let Some(name) = upload_dir.file_name() {
        scan.exclude.insert(name.to_string_lossy().into_owned());
    }

    walk_for_hints(upload_dir, &mut scan);
    scan
}

fn walk_for_hints(dir: &Path, scan: &mut HintScan) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else { continue };
        let path = entry.path();
        if file_type.is_dir() {
            scan.exclude.insert(entry.file_name().to_string_lossy().into_owned());
            walk_for_hints(&path, scan);
        } else if entry.file_name() == "setup.hint" {
            if let Ok(text) = std::fs::read_to_string(&path) {
                scan.found = true;
                if let Some(line) = text.lines().find_map(|l| l.strip_prefix("requires:")) {
                    scan.requires.extend(line.split_whitespace().map(str::to_string));
                }
            }
        }
    }
}

/// `setup.hint`'s `requires:` atoms, generalized to always add
/// `gettext-devel`, drop anything in the sibling-package exclusion set,
/// and pass through `-devel`, cross-prefixed, and language-runtime atoms
/// untouched (`analyze.py`'s exclusion set).
pub fn from_hints(scan: &HintScan, tables: &Tables) -> Vec<String> {
    let prefixes: Vec<&str> = cross_package_prefixes().into_values().collect();
    let mut out = Vec::new();

    for atom in &scan.requires {
        if scan.exclude.contains(atom.as_str()) {
            continue;
        }
        if atom.ends_with("-devel")
            || prefixes.iter().any(|p| atom.starts_with(p))
            || atom.starts_with("perl")
            || atom.starts_with("python")
            || atom.starts_with("ruby")
        {
            out.push(atom.clone());
            continue;
        }
        if let Some(devel) = tables.devel_package_map.get(atom.as_str()) {
            out.push(devel.clone());
            continue;
        }
        out.push(atom.clone());
    }

    if out.iter().any(|d| d == "libgpgme-devel") {
        out.push("libgpg-error-devel".to_string());
    }
    out.push("gettext-devel".to_string());
    out
}

/// cygport's `inherit` line cascades to extra build-time dependencies
/// (`analyze.py`'s inherit table).
pub fn from_cygport(cygport_text: &str) -> Vec<String> {
    let inherit_line = cygport_text
        .lines()
        .find(|l| l.trim_start().starts_with("inherit "))
        .unwrap_or("");
    let classes: Vec<&str> = inherit_line
        .trim_start()
        .strip_prefix("inherit ")
        .unwrap_or("")
        .split_whitespace()
        .collect();

    let mut out = Vec::new();
    let mut saw_autotools_like = false;

    for class in &classes {
        match *class {
            "gnome2" => out.push("gnome-common".to_string()),
            "kf5" => {
                out.push("cmake".to_string());
                out.push("extra-cmake-modules".to_string());
            }
            "mate" => out.push("mate-common".to_string()),
            "python" | "python-distutils" => out.push("python".to_string()),
            "python3" | "python3-distutils" => out.push("python3".to_string()),
            "texlive" => out.push("texlive-collection-basic".to_string()),
            "xfce4" => out.push("xfce4-dev-tools".to_string()),
            "xorg" => out.push("xorg-util-macros".to_string()),
            "autotools" => saw_autotools_like = true,
            "cross" => {
                if let Some(host) = cygport_text
                    .lines()
                    .find_map(|l| l.trim_start().strip_prefix("CROSS_HOST="))
                {
                    let host = host.trim().trim_matches('"');
                    if let Some(prefix) = cross_package_prefixes().get(host) {
                        out.push(format!("{prefix}binutils"));
                        out.push(format!("{prefix}gcc-core"));
                        out.push(format!("{prefix}gcc-g++"));
                    }
                }
                out.push("pkg-config".to_string());
            }
            _ => {}
        }
    }

    if classes.is_empty() || saw_autotools_like {
        out.push("pkg-config".to_string());
    }
    out
}

/// Parse a cygport's `DEPEND="..."` clause (`analyze.py`'s
/// `depends_from_depend`): `perl(A::B::C)` -> `perl-A-B-C`,
/// `pkgconfig(foo)` -> looked up + always `pkg-config`, bare atoms pass
/// through, unrecognized function-call forms are skipped.
pub fn from_depend(depend_line: &str, tables: &Tables) -> Vec<String> {
    let perl_re = Regex::new(r"^perl\(([\w:]+)\)$").unwrap();
    let pkgconfig_re = Regex::new(r"^pkgconfig\(([^)]+)\)$").unwrap();

    let mut out = Vec::new();
    for atom in depend_line.split_whitespace() {
        if let Some(caps) = perl_re.captures(atom) {
            out.push(format!("perl-{}", caps[1].replace("::", "-")));
        } else if let Some(caps) = pkgconfig_re.captures(atom) {
            if let Some(pkg) = tables.pkgconfig_map.get(&caps[1]) {
                out.push(pkg.clone());
            }
            out.push("pkg-config".to_string());
        } else if atom.contains('(') {
            // unknown function-call form; ignore rather than guess wrong.
            continue;
        } else {
            out.push(atom.to_string());
        }
    }
    out
}

/// `.sh`-based cygbuild recipes always need `quilt` for patch application.
pub fn from_cygbuild() -> Vec<String> {
    vec!["quilt".to_string()]
}

/// Per-package overrides keyed by source package name (`analyze.py`'s
/// hardcoded `per_package_deps` table).
pub fn per_package_overrides(srcpkg: &str, tables: &Tables) -> Vec<String> {
    tables
        .per_package_deps
        .get(srcpkg)
        .cloned()
        .unwrap_or_default()
}

/// Merge and normalize a set of dependency atoms: sorted, deduplicated,
/// empty atoms dropped (spec.md §8).
pub fn merge(sets: impl IntoIterator<Item = Vec<String>>) -> Vec<String> {
    let mut out: Vec<String> = sets
        .into_iter()
        .flatten()
        .filter(|d| !d.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(requires: &str) -> HintScan {
        HintScan {
            found: true,
            requires: requires.split_whitespace().map(str::to_string).collect(),
            exclude: BTreeSet::new(),
        }
    }

    #[test]
    fn hints_adds_gettext_devel_always() {
        let tables = Tables::defaults();
        let deps = from_hints(&scan("make gcc-core"), &tables);
        assert!(deps.contains(&"gettext-devel".to_string()));
    }

    #[test]
    fn libgpgme_devel_pulls_in_gpg_error_devel() {
        let tables = Tables::defaults();
        let deps = from_hints(&scan("libgpgme-devel"), &tables);
        assert!(deps.contains(&"libgpg-error-devel".to_string()));
    }

    #[test]
    fn hints_excludes_sibling_package_names() {
        let tables = Tables::defaults();
        let mut scan = scan("make foo-devel siblingpkg");
        scan.exclude.insert("siblingpkg".to_string());
        let deps = from_hints(&scan, &tables);
        assert!(!deps.contains(&"siblingpkg".to_string()));
        assert!(deps.contains(&"foo-devel".to_string()));
    }

    #[test]
    fn scan_upload_dir_collects_hints_and_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path().join("foo");
        std::fs::create_dir_all(pkg_dir.join("x86_64")).unwrap();
        std::fs::write(pkg_dir.join("setup.hint"), "requires: make gcc-core\n").unwrap();
        std::fs::create_dir_all(pkg_dir.join("foo-devel")).unwrap();
        std::fs::write(pkg_dir.join("foo-devel").join("setup.hint"), "requires: foo\n").unwrap();

        let scan = scan_upload_dir(&pkg_dir);
        assert!(scan.found);
        assert!(scan.requires.contains(&"make".to_string()));
        assert!(scan.exclude.contains("foo"));
        assert!(scan.exclude.contains("foo-devel"));
        assert!(scan.exclude.contains("x86_64"));
    }

    #[test]
    fn scan_upload_dir_without_any_hint_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path().join("foo");
        std::fs::create_dir_all(&pkg_dir).unwrap();
        std::fs::write(pkg_dir.join("foo-1.0-1-src.tar.xz"), b"").unwrap();

        let scan = scan_upload_dir(&pkg_dir);
        assert!(!scan.found);
        assert!(scan.requires.is_empty());
    }

    #[test]
    fn cygport_kf5_inherit_adds_cmake_and_ecm() {
        let deps = from_cygport("inherit kf5\n");
        assert!(deps.contains(&"cmake".to_string()));
        assert!(deps.contains(&"extra-cmake-modules".to_string()));
    }

    #[test]
    fn cygport_cross_inherit_adds_prefixed_toolchain() {
        let cygport = "inherit cross\nCROSS_HOST=\"x86_64-w64-mingw32\"\n";
        let deps = from_cygport(cygport);
        assert!(deps.contains(&"mingw64-x86_64-binutils".to_string()));
        assert!(deps.contains(&"mingw64-x86_64-gcc-core".to_string()));
        assert!(deps.contains(&"pkg-config".to_string()));
    }

    #[test]
    fn depend_clause_translates_perl_and_pkgconfig_atoms() {
        let tables = Tables::defaults();
        let deps = from_depend("perl(Foo::Bar) pkgconfig(gtk+-3.0) make", &tables);
        assert!(deps.contains(&"perl-Foo-Bar".to_string()));
        assert!(deps.contains(&"libgtk3-devel".to_string()));
        assert!(deps.contains(&"pkg-config".to_string()));
        assert!(deps.contains(&"make".to_string()));
    }

    #[test]
    fn merge_sorts_dedups_and_drops_empty() {
        let merged = merge([
            vec!["b".to_string(), "".to_string()],
            vec!["a".to_string(), "b".to_string()],
        ]);
        assert_eq!(merged, vec!["a", "b"]);
    }
}
