//! Structural patch between two store snapshots.
//!
//! Buckets are compared by handle: a write that leaves a bucket alone keeps
//! its `Arc`, so handle inequality is exactly "this bucket was rewritten".

use std::sync::Arc;

use serde::Serialize;

use super::store::Store;
use super::value::CacheKey;

/// Keys whose buckets differ between two snapshots, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorePatch {
    pub root_changed: bool,
    pub added: Vec<CacheKey>,
    pub changed: Vec<CacheKey>,
}

impl StorePatch {
    pub fn is_empty(&self) -> bool {
        !self.root_changed && self.added.is_empty() && self.changed.is_empty()
    }
}

pub fn diff(old: &Store, new: &Store) -> StorePatch {
    let mut patch = StorePatch {
        root_changed: !Arc::ptr_eq(old.root(), new.root()),
        ..StorePatch::default()
    };
    for (key, bucket) in new.entities() {
        match old.entity(key) {
            None => patch.added.push(key.clone()),
            Some(previous) if !Arc::ptr_eq(previous, bucket) => patch.changed.push(key.clone()),
            Some(_) => {}
        }
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::Bucket;

    /// Only rewritten or new buckets show up, sorted by key.
    #[test]
    fn reports_added_and_changed_by_handle() {
        let mut old = Store::new();
        old.put(CacheKey::from("User:2"), Arc::new(Bucket::new()));
        old.put(CacheKey::from("User:1"), Arc::new(Bucket::new()));

        let mut new = old.clone();
        new.put(CacheKey::from("User:2"), Arc::new(Bucket::new()));
        new.put(CacheKey::from("Post:9"), Arc::new(Bucket::new()));

        let patch = diff(&old, &new);
        assert_eq!(
            patch,
            StorePatch {
                root_changed: false,
                added: vec![CacheKey::from("Post:9")],
                changed: vec![CacheKey::from("User:2")],
            }
        );
        assert!(diff(&new, &new.clone()).is_empty());
    }
}
