//! Byte-exact file comparison, grounded in `verify.py`'s
//! `filecmp.cmp(..., shallow=False)`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};

const BUF_SIZE: usize = 64 * 1024;

pub fn files_equal(a: &Path, b: &Path) -> Result<bool> {
    let meta_a = std::fs::metadata(a).with_context(|| format!("stat {}", a.display()))?;
    let meta_b = std::fs::metadata(b).with_context(|| format!("stat {}", b.display()))?;
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut ra = BufReader::new(File::open(a)?);
    let mut rb = BufReader::new(File::open(b)?);
    let mut buf_a = [0u8; BUF_SIZE];
    let mut buf_b = [0u8; BUF_SIZE];

    loop {
        let n_a = ra.read(&mut buf_a)?;
        let n_b = rb.read(&mut buf_b)?;
        if n_a != n_b {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
        if buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn identical_content_compares_equal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"same content").unwrap();
        fs::write(dir.path().join("b"), b"same content").unwrap();
        assert!(files_equal(&dir.path().join("a"), &dir.path().join("b")).unwrap());
    }

    #[test]
    fn differing_content_compares_unequal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"one").unwrap();
        fs::write(dir.path().join("b"), b"two").unwrap();
        assert!(!files_equal(&dir.path().join("a"), &dir.path().join("b")).unwrap());
    }

    #[test]
    fn differing_length_compares_unequal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"short").unwrap();
        fs::write(dir.path().join("b"), b"much longer content").unwrap();
        assert!(!files_equal(&dir.path().join("a"), &dir.path().join("b")).unwrap());
    }
}
