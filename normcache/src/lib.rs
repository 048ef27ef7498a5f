//! Normalized object cache for graph-shaped query results.
//!
//! A WRITE flattens a nested result tree into a shared store keyed by entity
//! identity; a READ projects a query-shaped view back out of the store. The
//! architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (identity keys, fingerprints,
//!   list reconciliation, the read/write walks). No I/O, no logging.
//! - **[`io`]**: Side-effecting helpers (config, metadata artifacts,
//!   snapshot documents).
//!
//! [`engine`] exposes the `write`/`read` entry points over [`core`],
//! [`shared`] publishes copy-on-write snapshots for concurrent readers, and
//! [`commands`] coordinates engine and I/O for the CLI.

pub mod commands;
pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod meta;
pub mod shared;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::core::error::{CacheError, FieldPath};
pub use crate::core::store::{Bucket, Store};
pub use crate::core::value::{CacheKey, Entry, Value};
pub use crate::engine::{ReadOutcome, WriteOutcome, read, write};
pub use crate::meta::{OperationMeta, Variables};
