//! Normalized store: one root bucket plus one bucket per entity.
//!
//! Buckets are held behind `Arc`, so cloning a [`Store`] copies handles only
//! and a bucket that a write leaves alone keeps its handle.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::value::{CacheKey, Entry};
use crate::meta::TYPENAME;

/// Reserved cache key addressing the root bucket.
pub const ROOT_KEY: &str = "$root";

/// `field name → argument fingerprint → entry`, plus the recorded `__typename`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bucket {
    typename: Option<String>,
    fields: IndexMap<String, IndexMap<String, Entry>>,
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn typename(&self) -> Option<&str> {
        self.typename.as_deref()
    }

    pub fn set_typename(&mut self, typename: impl Into<String>) {
        self.typename = Some(typename.into());
    }

    pub fn get(&self, field: &str, fingerprint: &str) -> Option<&Entry> {
        self.fields.get(field).and_then(|slots| slots.get(fingerprint))
    }

    /// Store an entry, returning the one it replaced.
    pub fn insert(&mut self, field: &str, fingerprint: &str, entry: Entry) -> Option<Entry> {
        self.fields
            .entry(field.to_string())
            .or_default()
            .insert(fingerprint.to_string(), entry)
    }

    pub fn is_empty(&self) -> bool {
        self.typename.is_none() && self.fields.is_empty()
    }

    /// Parse the JSON rendering produced by `Serialize`.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, String> {
        let object = json
            .as_object()
            .ok_or_else(|| format!("bucket must be an object, got {json}"))?;
        let mut bucket = Self::new();
        for (field, slots) in object {
            if field == TYPENAME {
                let typename = slots
                    .as_str()
                    .ok_or_else(|| format!("{TYPENAME} must be a string, got {slots}"))?;
                bucket.set_typename(typename);
                continue;
            }
            let slots = slots
                .as_object()
                .ok_or_else(|| format!("field `{field}` must map fingerprints to entries"))?;
            for (fingerprint, entry) in slots {
                let entry = Entry::from_json(entry).map_err(|err| format!("{field}: {err}"))?;
                bucket.insert(field, fingerprint, entry);
            }
        }
        Ok(bucket)
    }
}

impl Serialize for Bucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.fields.len() + usize::from(self.typename.is_some());
        let mut out = serializer.serialize_map(Some(len))?;
        if let Some(typename) = &self.typename {
            out.serialize_entry(TYPENAME, typename)?;
        }
        for (field, slots) in &self.fields {
            out.serialize_entry(field, slots)?;
        }
        out.end()
    }
}

impl<'de> Deserialize<'de> for Bucket {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&json).map_err(serde::de::Error::custom)
    }
}

/// The shared cache: root bucket plus entity buckets keyed by [`CacheKey`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    root: Arc<Bucket>,
    entities: BTreeMap<CacheKey, Arc<Bucket>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &Arc<Bucket> {
        &self.root
    }

    /// Bucket for `key`; [`ROOT_KEY`] addresses the root bucket.
    pub fn entity(&self, key: &CacheKey) -> Option<&Arc<Bucket>> {
        if key.as_str() == ROOT_KEY {
            return Some(&self.root);
        }
        self.entities.get(key)
    }

    pub fn entities(&self) -> impl Iterator<Item = (&CacheKey, &Arc<Bucket>)> {
        self.entities.iter()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn set_root(&mut self, bucket: Arc<Bucket>) {
        self.root = bucket;
    }

    /// Replace the bucket for `key`; [`ROOT_KEY`] replaces the root bucket.
    pub fn put(&mut self, key: CacheKey, bucket: Arc<Bucket>) {
        if key.as_str() == ROOT_KEY {
            self.root = bucket;
        } else {
            self.entities.insert(key, bucket);
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Result<Self, String> {
        let object = json
            .as_object()
            .ok_or_else(|| "store must be an object".to_string())?;
        let root = match object.get("root") {
            Some(root) => Bucket::from_json(root).map_err(|err| format!("root: {err}"))?,
            None => Bucket::new(),
        };
        let mut store = Self {
            root: Arc::new(root),
            entities: BTreeMap::new(),
        };
        if let Some(entities) = object.get("entities") {
            let entities = entities
                .as_object()
                .ok_or_else(|| "entities must be an object".to_string())?;
            for (key, bucket) in entities {
                let bucket = Bucket::from_json(bucket).map_err(|err| format!("{key}: {err}"))?;
                store.put(CacheKey::new(key.clone()), Arc::new(bucket));
            }
        }
        Ok(store)
    }
}

impl Serialize for Store {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entities: BTreeMap<&CacheKey, &Bucket> = self
            .entities
            .iter()
            .map(|(key, bucket)| (key, bucket.as_ref()))
            .collect();
        let mut out = serializer.serialize_map(Some(2))?;
        out.serialize_entry("root", self.root.as_ref())?;
        out.serialize_entry("entities", &entities)?;
        out.end()
    }
}

impl<'de> Deserialize<'de> for Store {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&json).map_err(serde::de::Error::custom)
    }
}
