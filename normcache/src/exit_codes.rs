//! Stable exit codes for `normcache` CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid metadata, config, input files or other errors.
pub const INVALID: i32 = 1;
/// `normcache read` found a selected field with no cached entry.
pub const MISSING: i32 = 2;
