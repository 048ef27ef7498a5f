//! Values held in buckets and handed back in views.
//!
//! Containers sit behind `Arc` so that an unchanged subtree can be handed back
//! as the very same handle. "Nothing changed" is observable as
//! [`Arc::ptr_eq`], never as a side effect.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::store::Bucket;

/// Key marking a reference in the JSON rendering of a bucket.
pub const REF_KEY: &str = "$ref";

/// Key wrapping a JSON-valued scalar (object or list) so it is not read back
/// as an embedded bucket or an entry list.
pub const SCALAR_KEY: &str = "$scalar";

/// Canonical identity of a normalized entity, e.g. `User:42`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Type name prefix of the key (`User` for `User:42`).
    pub fn type_name(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(name, _)| name)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// A view node: JSON-shaped, reference-free.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Arc<Vec<Value>>),
    Object(Arc<IndexMap<String, Value>>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_object(&self) -> Option<&Arc<IndexMap<String, Value>>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Arc<Vec<Value>>> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Field of an object view.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Scalars compare by content, containers by handle.
    pub fn same_handle(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::List(_) | Self::Object(_), _) | (_, Self::List(_) | Self::Object(_)) => false,
            (a, b) => a == b,
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.clone()),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => {
                Self::List(Arc::new(items.iter().map(Self::from_json).collect()))
            }
            serde_json::Value::Object(map) => Self::Object(Arc::new(
                map.iter()
                    .map(|(key, value)| (key.clone(), Self::from_json(value)))
                    .collect(),
            )),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Self::from_json(&json)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.as_slice() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in &**map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

/// A slot in a bucket: `bucket[field][fingerprint]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Null,
    Scalar(Value),
    /// Non-owning pointer to another bucket in the store.
    Ref(CacheKey),
    /// Non-identity object stored in place under its parent's slot.
    Embedded(Arc<Bucket>),
    List(Arc<Vec<Entry>>),
}

impl Entry {
    /// Wrap a scalar, folding JSON null into [`Entry::Null`].
    pub fn scalar(value: Value) -> Self {
        if value.is_null() {
            Self::Null
        } else {
            Self::Scalar(value)
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_list(&self) -> Option<&Arc<Vec<Entry>>> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Plain view value for reference-free entries.
    pub fn to_plain(&self) -> Option<Value> {
        match self {
            Self::Null => Some(Value::Null),
            Self::Scalar(value) => Some(value.clone()),
            Self::List(items) => items
                .iter()
                .map(Self::to_plain)
                .collect::<Option<Vec<_>>>()
                .map(|items| Value::List(Arc::new(items))),
            Self::Ref(_) | Self::Embedded(_) => None,
        }
    }

    /// Scalars and references compare by content, shared containers by handle.
    pub fn same_handle(&self, other: &Entry) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => a == b,
            (Self::Embedded(a), Self::Embedded(b)) => Arc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Result<Self, String> {
        match json {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Array(items) => items
                .iter()
                .map(Self::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(|items| Self::List(Arc::new(items))),
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(serde_json::Value::String(key)) = map.get(REF_KEY) {
                        return Ok(Self::Ref(CacheKey::new(key.clone())));
                    }
                    if let Some(scalar) = map.get(SCALAR_KEY) {
                        return Ok(Self::Scalar(Value::from_json(scalar)));
                    }
                }
                Bucket::from_json(json).map(|bucket| Self::Embedded(Arc::new(bucket)))
            }
            scalar => Ok(Self::Scalar(Value::from_json(scalar))),
        }
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Scalar(value @ (Value::List(_) | Value::Object(_))) => {
                let mut out = serializer.serialize_map(Some(1))?;
                out.serialize_entry(SCALAR_KEY, value)?;
                out.end()
            }
            Self::Scalar(value) => value.serialize(serializer),
            Self::Ref(key) => {
                let mut out = serializer.serialize_map(Some(1))?;
                out.serialize_entry(REF_KEY, key)?;
                out.end()
            }
            Self::Embedded(bucket) => bucket.serialize(serializer),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.as_slice() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Entry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&json).map_err(serde::de::Error::custom)
    }
}
