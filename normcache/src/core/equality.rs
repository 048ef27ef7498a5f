//! Injected equality used to decide whether a write changes anything.

use serde::{Deserialize, Serialize};

use super::value::{Entry, Value};

/// Comparison capability for store entries and view values.
///
/// Returning `true` keeps the existing handle and does not count as a write.
pub trait IsEqual: Send + Sync {
    fn entries(&self, existing: &Entry, next: &Entry) -> bool;
    fn values(&self, existing: &Value, next: &Value) -> bool;
}

/// Identity semantics: scalars by value, shared containers by handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameHandle;

impl IsEqual for SameHandle {
    fn entries(&self, existing: &Entry, next: &Entry) -> bool {
        existing.same_handle(next)
    }

    fn values(&self, existing: &Value, next: &Value) -> bool {
        existing.same_handle(next)
    }
}

/// Structural equality all the way down.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeepEqual;

impl IsEqual for DeepEqual {
    fn entries(&self, existing: &Entry, next: &Entry) -> bool {
        existing == next
    }

    fn values(&self, existing: &Value, next: &Value) -> bool {
        existing == next
    }
}

static SAME_HANDLE: SameHandle = SameHandle;
static DEEP_EQUAL: DeepEqual = DeepEqual;

/// Configurable choice of [`IsEqual`] capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EqualityMode {
    #[default]
    SameHandle,
    Deep,
}

impl EqualityMode {
    pub fn capability(self) -> &'static dyn IsEqual {
        match self {
            Self::SameHandle => &SAME_HANDLE,
            Self::Deep => &DEEP_EQUAL,
        }
    }
}
