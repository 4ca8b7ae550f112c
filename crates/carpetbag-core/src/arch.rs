//! Arch-specific golden domain names, in-guest shell paths, and the
//! cross-toolchain package-prefix map.
//!
//! Grounded in `builder.py`'s `BASE_VMID` constant and `main.py`'s
//! `arch != 'x86_64'` dispatch, generalized to the three architectures
//! named in the data model (`x86_64`, `x86`, `noarch`).

use std::collections::HashMap;

/// One entry of the arch table: which golden domain to clone, and which
/// in-guest bash to invoke for the build.
#[derive(Debug, Clone, Copy)]
pub struct ArchInfo {
    pub golden_domain: &'static str,
    pub guest_bash_path: &'static str,
}

/// Look up the golden domain and guest bash path for an architecture.
/// Returns `None` for an arch with no known entry (the main loop logs and
/// skips it, matching `main.py`'s `arch != 'x86_64'` warning path).
pub fn arch_info(arch: &str) -> Option<ArchInfo> {
    match arch {
        "x86_64" => Some(ArchInfo {
            golden_domain: "carpetbag-golden-x86_64",
            guest_bash_path: r"C:\cygwin64\bin\bash.exe",
        }),
        "x86" => Some(ArchInfo {
            golden_domain: "carpetbag-golden-x86",
            guest_bash_path: r"C:\cygwin\bin\bash.exe",
        }),
        "noarch" => Some(ArchInfo {
            golden_domain: "carpetbag-golden-noarch",
            guest_bash_path: r"C:\cygwin64\bin\bash.exe",
        }),
        _ => None,
    }
}

/// Host triple -> cygwin package-name prefix, per spec.md §6.
pub fn cross_package_prefixes() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("i686-w64-mingw32", "mingw64-i686-"),
        ("x86_64-w64-mingw32", "mingw64-x86_64-"),
        ("i686-pc-cygwin", "cygwin32-"),
        ("x86_64-pc-cygwin", "cygwin64-"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_arches_resolve() {
        assert!(arch_info("x86_64").is_some());
        assert!(arch_info("x86").is_some());
        assert!(arch_info("noarch").is_some());
    }

    #[test]
    fn unknown_arch_is_none() {
        assert!(arch_info("armv7").is_none());
    }

    #[test]
    fn cross_prefix_table_has_four_entries() {
        assert_eq!(cross_package_prefixes().len(), 4);
        assert_eq!(
            cross_package_prefixes().get("x86_64-w64-mingw32"),
            Some(&"mingw64-x86_64-")
        );
    }
}
