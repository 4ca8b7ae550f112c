//! # carpetbag — automated source-package build and verification service
//!
//! Facade crate that re-exports the carpetbag workspace crates so the
//! binary (and any embedder) can depend on a single `carpetbag` library.
//!
//! ## Crate breakdown
//!
//! | Module | Crate | Purpose |
//! |--------|-------|---------|
//! | [`core`] | carpetbag-core | Data model, config, naming, step timer, errors |
//! | [`guest`] | carpetbag-guest | Guest-agent JSON RPC client |
//! | [`vm`] | carpetbag-vm | VM clone lifecycle, domain XML editing |
//! | [`queue`] | carpetbag-queue | Filesystem-backed durable queue |
//! | [`analyzer`] | carpetbag-analyzer | Archive classification, dependency synthesis |
//! | [`builder`] | carpetbag-builder | Per-job build pipeline |
//! | [`verifier`] | carpetbag-verifier | Build output verification |

pub use carpetbag_analyzer as analyzer;
pub use carpetbag_builder as builder;
pub use carpetbag_core as core;
pub use carpetbag_guest as guest;
pub use carpetbag_queue as queue;
pub use carpetbag_verifier as verifier;
pub use carpetbag_vm as vm;

pub mod dispatch;
pub mod joblog;
