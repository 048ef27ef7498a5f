//! Copy-on-write store shared between concurrent readers and writers.
//!
//! Readers load one immutable snapshot and never observe a write in progress.
//! A writer runs the engine against the snapshot it loaded and publishes with
//! compare-and-swap; if another writer got there first, the write is re-run
//! against the newer snapshot.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use crate::core::diff::{StorePatch, diff};
use crate::core::equality::EqualityMode;
use crate::core::error::CacheError;
use crate::core::store::Store;
use crate::core::value::Value;
use crate::engine::{self, ReadOutcome};
use crate::meta::{OperationMeta, Variables};

/// What a successful write published.
#[derive(Debug, Clone)]
pub struct Published {
    /// Snapshot current after the write (unchanged when nothing was written).
    pub snapshot: Arc<Store>,
    pub view: Value,
    pub added: usize,
    pub updated: usize,
    pub patch: StorePatch,
}

pub struct SharedStore {
    current: ArcSwap<Store>,
    equality: EqualityMode,
}

impl SharedStore {
    pub fn new(store: Store) -> Self {
        Self::with_equality(store, EqualityMode::default())
    }

    pub fn with_equality(store: Store, equality: EqualityMode) -> Self {
        Self {
            current: ArcSwap::from_pointee(store),
            equality,
        }
    }

    /// Current immutable snapshot.
    pub fn snapshot(&self) -> Arc<Store> {
        self.current.load_full()
    }

    /// Apply a result and publish the new snapshot.
    ///
    /// Errors leave the published snapshot untouched.
    pub fn write(
        &self,
        meta: &OperationMeta,
        variables: &Variables,
        result: &serde_json::Value,
        prior_view: Option<&Value>,
    ) -> Result<Published, CacheError> {
        loop {
            let base = self.current.load_full();
            let outcome = engine::write(
                meta,
                variables,
                &base,
                result,
                prior_view,
                Some(self.equality.capability()),
            )?;
            let patch = diff(&base, &outcome.store);
            if patch.is_empty() {
                return Ok(Published {
                    snapshot: base,
                    view: outcome.view,
                    added: outcome.added,
                    updated: outcome.updated,
                    patch,
                });
            }

            let next = Arc::new(outcome.store);
            let prev = self.current.compare_and_swap(&base, Arc::clone(&next));
            if Arc::ptr_eq(&prev, &base) {
                debug!(
                    root_changed = patch.root_changed,
                    added = patch.added.len(),
                    changed = patch.changed.len(),
                    "published snapshot"
                );
                return Ok(Published {
                    snapshot: next,
                    view: outcome.view,
                    added: outcome.added,
                    updated: outcome.updated,
                    patch,
                });
            }
            warn!("snapshot moved during write; retrying");
        }
    }

    /// Read against the current snapshot.
    pub fn read(
        &self,
        meta: &OperationMeta,
        variables: &Variables,
        prior_view: Option<&Value>,
    ) -> Result<ReadOutcome, CacheError> {
        let snapshot = self.current.load();
        engine::read_with(
            meta,
            variables,
            &snapshot,
            prior_view,
            self.equality.capability(),
        )
    }
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new(Store::new())
    }
}
