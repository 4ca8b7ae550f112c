//! Lookup tables for dependency synthesis, grounded in `depends.py` /
//! `analyze.py`'s hardcoded dicts. Defaults are compiled in; a deployment
//! can override either table from TOML via `CarpetbagConfig::tables`
//! (SPEC_FULL.md §4.4).

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
struct TableFile {
    #[serde(default)]
    pkgconfig_map: HashMap<String, String>,
    #[serde(default)]
    devel_package_map: HashMap<String, String>,
    #[serde(default)]
    per_package_deps: HashMap<String, Vec<String>>,
}

pub struct Tables {
    pub pkgconfig_map: HashMap<String, String>,
    pub devel_package_map: HashMap<String, String>,
    pub per_package_deps: HashMap<String, Vec<String>>,
}

impl Tables {
    pub fn defaults() -> Self {
        Self {
            pkgconfig_map: default_pkgconfig_map(),
            devel_package_map: default_devel_package_map(),
            per_package_deps: default_per_package_deps(),
        }
    }

    /// Load overrides from a TOML file, layered on top of the compiled-in
    /// defaults (an override replaces a key, it never needs to repeat the
    /// whole table).
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading tables file {}", path.display()))?;
        let file: TableFile = toml::from_str(&text).context("parsing tables TOML")?;
        let mut tables = Self::defaults();
        tables.pkgconfig_map.extend(file.pkgconfig_map);
        tables.devel_package_map.extend(file.devel_package_map);
        tables.per_package_deps.extend(file.per_package_deps);
        Ok(tables)
    }
}

fn default_pkgconfig_map() -> HashMap<String, String> {
    HashMap::from(
        [
            ("gtk+-3.0", "libgtk3-devel"),
            ("gtk+-2.0", "libgtk2.0-devel"),
            ("glib-2.0", "libglib2.0-devel"),
            ("cairo", "libcairo-devel"),
            ("pango", "libpango1.0-devel"),
            ("libxml-2.0", "libxml2-devel"),
            ("zlib", "zlib-devel"),
            ("openssl", "libssl-devel"),
            ("sqlite3", "libsqlite3-devel"),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string())),
    )
}

fn default_devel_package_map() -> HashMap<String, String> {
    HashMap::from(
        [
            ("libgpgme", "libgpgme-devel"),
            ("libcurl4", "libcurl-devel"),
            ("libpng16", "libpng-devel"),
            ("libjpeg8", "libjpeg-devel"),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string())),
    )
}

fn default_per_package_deps() -> HashMap<String, Vec<String>> {
    HashMap::from([
        ("gcc".to_string(), vec!["gcc-ada".to_string()]),
        ("git".to_string(), vec!["bash-completion-devel".to_string()]),
        (
            "gobject-introspection".to_string(),
            vec!["flex".to_string()],
        ),
        (
            "maxima".to_string(),
            vec!["recode".to_string(), "clisp".to_string()],
        ),
        (
            "mingw64-i686-fftw3".to_string(),
            vec!["mingw64-i686-gcc-fortran".to_string()],
        ),
        (
            "mingw64-x86_64-fftw3".to_string(),
            vec!["mingw64-x86_64-gcc-fortran".to_string()],
        ),
        (
            "mutt".to_string(),
            vec!["libxslt".to_string(), "docbook-xsl".to_string()],
        ),
        (
            "perl-Unicode-LineBreak".to_string(),
            vec!["libcrypt-devel".to_string()],
        ),
    ])
}
