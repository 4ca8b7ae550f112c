//! Manifest file format (spec.md §6): UTF-8, one relative path per line, LF
//! terminated, forward-slash separators. The builder never copies artifacts
//! not listed here (spec.md §3 invariant).

/// Parse a manifest's bytes into the ordered list of relative paths it lists.
pub fn parse(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect()
}

/// Translate a manifest's forward-slash relative path to the guest's
/// backslash-separated form under a Windows base directory, per spec.md
/// §4.5 step 5.
pub fn to_guest_path(base: &str, rel: &str) -> String {
    let win_rel = rel.replace('/', "\\");
    format!("{}\\{}", base.trim_end_matches('\\'), win_rel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lf_terminated_paths() {
        let bytes = b"release/p/p-1.0-1.tar.xz\nrelease/p/setup.hint\n";
        let paths = parse(bytes);
        assert_eq!(paths, vec!["release/p/p-1.0-1.tar.xz", "release/p/setup.hint"]);
    }

    #[test]
    fn ignores_blank_lines() {
        let bytes = b"a/b.txt\n\n\nc/d.txt\n";
        assert_eq!(parse(bytes), vec!["a/b.txt", "c/d.txt"]);
    }

    #[test]
    fn guest_path_uses_backslashes() {
        assert_eq!(
            to_guest_path(r"C:\vm_out", "release/p/p-1.0-1.tar.xz"),
            r"C:\vm_out\release\p\p-1.0-1.tar.xz"
        );
    }
}
