//! Domain building blocks shared by the repository, service, and HTTP layers.
//!
//! Nothing in this crate performs I/O: list/show query normalization,
//! pagination arithmetic, and export encoding are all pure so they can be
//! unit-tested without a database.

pub mod error;
pub mod export;
pub mod list_query;
pub mod pagination;
pub mod roles;
pub mod show_query;
pub mod types;
