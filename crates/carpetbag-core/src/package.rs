//! PackageKind: the result of the analyzer (spec.md §3, §4.4).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Kind {
    CygportWithDepends,
    CygportGuessedDepends,
    Cygbuild,
    #[serde(rename = "g-b-s")]
    Gbs,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Kind::CygportWithDepends => "cygport-with-depends",
            Kind::CygportGuessedDepends => "cygport-guessed-depends",
            Kind::Cygbuild => "cygbuild",
            Kind::Gbs => "g-b-s",
        };
        write!(f, "{s}")
    }
}

/// Result of classifying a source archive. `None` (no `kind`) means analysis
/// failed and the job is skipped — invariant: a `Some` kind always carries a
/// non-empty script name (spec.md §3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageKind {
    pub kind: Option<Kind>,
    pub script: String,
    pub depends: Vec<String>,
}

impl PackageKind {
    pub fn none() -> Self {
        Self::default()
    }

    /// Build a successful classification. Depends are sorted and deduplicated
    /// here so every caller sees the invariant already upheld (spec.md §8:
    /// "depends output is sorted, deduplicated, and comma-separated with no
    /// empty atoms").
    pub fn new(kind: Kind, script: impl Into<String>, depends: impl IntoIterator<Item = String>) -> Self {
        let mut depends: Vec<String> = depends.into_iter().filter(|d| !d.is_empty()).collect();
        depends.sort();
        depends.dedup();
        Self {
            kind: Some(kind),
            script: script.into(),
            depends,
        }
    }

    pub fn is_classified(&self) -> bool {
        self.kind.is_some()
    }

    /// Comma-separated sorted dependency string, as carried in the manifest
    /// field described by spec.md §3.
    pub fn depends_csv(&self) -> String {
        self.depends.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_has_no_kind() {
        let p = PackageKind::none();
        assert!(!p.is_classified());
        assert_eq!(p.script, "");
    }

    #[test]
    fn new_sorts_and_dedups_depends() {
        let p = PackageKind::new(
            Kind::Cygbuild,
            "p.sh",
            ["quilt".to_string(), "gettext-devel".to_string(), "quilt".to_string()],
        );
        assert_eq!(p.depends, vec!["gettext-devel", "quilt"]);
        assert_eq!(p.depends_csv(), "gettext-devel,quilt");
    }

    #[test]
    fn empty_atoms_are_dropped() {
        let p = PackageKind::new(Kind::Gbs, "p.sh", ["".to_string(), "make".to_string()]);
        assert_eq!(p.depends, vec!["make"]);
    }

    #[test]
    fn display_matches_spec_kind_names() {
        assert_eq!(Kind::CygportWithDepends.to_string(), "cygport-with-depends");
        assert_eq!(Kind::Gbs.to_string(), "g-b-s");
    }
}
