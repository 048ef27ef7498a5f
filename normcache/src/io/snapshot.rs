//! Snapshot documents: a store export plus the operations written into it.
//!
//! The document is a tooling export for inspection and hydration, written
//! atomically. It is not a durability mechanism.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::artifact::meta_hash;
use crate::core::store::Store;
use crate::meta::{OperationMeta, Variables};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDoc {
    pub store: Store,
    #[serde(default)]
    pub operations: BTreeMap<String, OperationRecord>,
}

/// Last write of one named operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Hex SHA-256 of the canonical metadata JSON.
    pub hash: String,
    pub variables: Variables,
    pub meta: OperationMeta,
}

impl SnapshotDoc {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            operations: BTreeMap::new(),
        }
    }

    /// Record that `name` was written with `variables`.
    pub fn record(&mut self, name: &str, meta: &OperationMeta, variables: &Variables) -> Result<()> {
        let record = OperationRecord {
            hash: meta_hash(meta)?,
            variables: variables.clone(),
            meta: meta.clone(),
        };
        self.operations.insert(name.to_string(), record);
        Ok(())
    }
}

/// Load a snapshot document; a missing file is an empty store.
pub fn load_snapshot(path: &Path) -> Result<SnapshotDoc> {
    if !path.exists() {
        debug!(path = %path.display(), "no snapshot; starting empty");
        return Ok(SnapshotDoc::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read snapshot {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse snapshot {}", path.display()))
}

pub fn write_snapshot(path: &Path, doc: &SnapshotDoc, pretty: bool) -> Result<()> {
    let mut buf = if pretty {
        serde_json::to_string_pretty(doc)
    } else {
        serde_json::to_string(doc)
    }
    .context("serialize snapshot")?;
    buf.push('\n');
    super::write_atomic(path, &buf)?;
    debug!(
        path = %path.display(),
        entities = doc.store.entity_count(),
        operations = doc.operations.len(),
        "snapshot written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{store_with, vars, viewer_query, viewer_result};
    use serde_json::json;

    /// Missing snapshots load as empty documents.
    #[test]
    fn missing_snapshot_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let doc = load_snapshot(&temp.path().join("none.json")).expect("load");
        assert_eq!(doc, SnapshotDoc::default());
    }

    /// Documents round-trip through disk, nested directories included.
    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".normcache").join("snapshot.json");
        let meta = viewer_query();
        let variables = vars(json!({ "first": 2 }));
        let mut doc = SnapshotDoc::new(store_with(&meta, &variables, &viewer_result("Ada", 2)));
        doc.record("Viewer", &meta, &variables).expect("record");

        write_snapshot(&path, &doc, true).expect("write");
        let loaded = load_snapshot(&path).expect("load");
        assert_eq!(loaded, doc);
        assert_eq!(loaded.operations["Viewer"].hash.len(), 64);
    }
}
