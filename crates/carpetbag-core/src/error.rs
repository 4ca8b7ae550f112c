//! Crate-level error kinds (spec.md §7). Leaf crates return these so callers
//! can match on failure kind; the application layer converts them to
//! `anyhow::Error` via `?`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("source package contains multiple .cygport files")]
    AmbiguousCygport,
    #[error("source package contains multiple build scripts")]
    AmbiguousScript,
    #[error("no build instructions found in source package")]
    NoRecipeFound,
    #[error("could not read source package: {0}")]
    UnreadableArchive(String),
}

#[derive(Debug, Error)]
pub enum VmLifecycleError {
    #[error("golden domain {0} not found")]
    GoldenDomainNotFound(String),
    #[error("golden disk {0} is writable, refusing to clone")]
    GoldenDiskWritable(String),
    #[error("backing disk is not qcow2, don't know what to do")]
    UnsupportedDiskFormat,
    #[error("failed to define cloned domain: {0}")]
    DefineFailed(String),
    #[error("failed to start domain {0}: {1}")]
    StartFailed(String, String),
}

#[derive(Debug, Error)]
pub enum GuestTransportError {
    #[error("guest-agent transport failure: {0}")]
    Transport(String),
    #[error("partial write: wrote {wrote} of {expected} bytes")]
    PartialWrite { wrote: usize, expected: usize },
    #[error("guest command returned no `return` field")]
    MissingReturn,
    #[error("guest command failed: {0}")]
    CommandFailed(String),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("vm lifecycle error: {0}")]
    Lifecycle(#[from] VmLifecycleError),
    #[error("guest transport error: {0}")]
    Transport(#[from] GuestTransportError),
    #[error("build exited with non-zero status")]
    BuildFailed,
    #[error("manifest file missing or unreadable: {0}")]
    ManifestUnreadable(String),
    #[error("build environment error: {0}")]
    Environment(#[from] anyhow::Error),
}
