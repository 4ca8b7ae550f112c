//! Archive classification and dependency synthesis (L4).

pub mod archive;
pub mod classify;
pub mod depends;
pub mod tables;

pub use classify::classify;
pub use tables::Tables;
