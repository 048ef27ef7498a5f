//! Deterministic, pure logic of the normalized cache.
//!
//! Core modules are free of I/O and logging. They operate on in-memory
//! metadata, result trees and store snapshots and return deterministic
//! outputs suitable for tests.

pub mod args;
pub mod cache_key;
pub mod canonical;
pub mod diff;
pub mod equality;
pub mod error;
pub mod invariants;
pub mod list;
pub mod read;
pub mod selection;
pub mod store;
pub mod value;
pub mod write;
