//! Depth-aware reconciliation of nested lists.
//!
//! The reconciler walks `depth` array levels of a source list against the
//! existing target list, hands each leaf to the caller, and keeps every
//! target element (and the target list itself) whose replacement compares
//! equal. A list that comes back unmodified is the same `Arc` that went in.

use std::sync::Arc;

use super::error::{CacheError, FieldPath};
use super::value::{Entry, Value};

/// Element of the list being read from.
pub trait ListSource: Sized {
    fn is_null(&self) -> bool;
    fn items(&self) -> Option<&[Self]>;
}

/// Element of the list being reconciled into.
pub trait ListTarget: Clone {
    fn null() -> Self;
    fn nested(&self) -> Option<&Arc<Vec<Self>>>;
    fn from_nested(items: Arc<Vec<Self>>) -> Self;
}

impl ListSource for serde_json::Value {
    fn is_null(&self) -> bool {
        serde_json::Value::is_null(self)
    }

    fn items(&self) -> Option<&[Self]> {
        self.as_array().map(Vec::as_slice)
    }
}

impl ListSource for Entry {
    fn is_null(&self) -> bool {
        Entry::is_null(self)
    }

    fn items(&self) -> Option<&[Self]> {
        self.as_list().map(|items| items.as_slice())
    }
}

impl ListTarget for Entry {
    fn null() -> Self {
        Entry::Null
    }

    fn nested(&self) -> Option<&Arc<Vec<Self>>> {
        self.as_list()
    }

    fn from_nested(items: Arc<Vec<Self>>) -> Self {
        Entry::List(items)
    }
}

impl ListTarget for Value {
    fn null() -> Self {
        Value::Null
    }

    fn nested(&self) -> Option<&Arc<Vec<Self>>> {
        self.as_list()
    }

    fn from_nested(items: Arc<Vec<Self>>) -> Self {
        Value::List(items)
    }
}

/// Result of one reconciliation.
#[derive(Debug, Clone)]
pub struct Reconciled<T> {
    pub list: Arc<Vec<T>>,
    pub modified: bool,
}

/// Reconcile `source` into `target` across `depth` nested levels.
///
/// `on_leaf(existing, leaf, indexes)` produces the new target leaf; `indexes`
/// holds one position per level. Null elements are copied through at every
/// level without reaching `on_leaf`.
pub fn reconcile<S, T, F>(
    source: &[S],
    target: Option<&Arc<Vec<T>>>,
    depth: u32,
    path: &FieldPath,
    is_equal: &dyn Fn(&T, &T) -> bool,
    on_leaf: &mut F,
) -> Result<Reconciled<T>, CacheError>
where
    S: ListSource,
    T: ListTarget,
    F: FnMut(Option<&T>, &S, &[usize]) -> Result<T, CacheError>,
{
    if depth == 0 {
        return Err(CacheError::InvalidListDepth { path: path.clone() });
    }
    let mut indexes = Vec::with_capacity(depth as usize);
    reconcile_level(source, target, depth, path, is_equal, on_leaf, &mut indexes)
}

fn reconcile_level<S, T, F>(
    source: &[S],
    target: Option<&Arc<Vec<T>>>,
    depth: u32,
    path: &FieldPath,
    is_equal: &dyn Fn(&T, &T) -> bool,
    on_leaf: &mut F,
    indexes: &mut Vec<usize>,
) -> Result<Reconciled<T>, CacheError>
where
    S: ListSource,
    T: ListTarget,
    F: FnMut(Option<&T>, &S, &[usize]) -> Result<T, CacheError>,
{
    let existing: &[T] = target.map_or(&[], |items| items.as_slice());
    // Truncation alone is a modification.
    let mut modified = target.is_none() || source.len() < existing.len();
    let mut list = Vec::with_capacity(source.len());

    for (i, item) in source.iter().enumerate() {
        indexes.push(i);
        let prior = existing.get(i);
        let next = if item.is_null() {
            T::null()
        } else if depth > 1 {
            let items = item.items().ok_or_else(|| CacheError::UnexpectedShape {
                path: path.indexed(indexes),
                expected: "a nested list",
            })?;
            let nested = reconcile_level(
                items,
                prior.and_then(T::nested),
                depth - 1,
                path,
                is_equal,
                on_leaf,
                indexes,
            )?;
            T::from_nested(nested.list)
        } else {
            on_leaf(prior, item, indexes)?
        };
        indexes.pop();

        match prior {
            Some(prior) if is_equal(prior, &next) => list.push(prior.clone()),
            _ => {
                modified = true;
                list.push(next);
            }
        }
    }

    match target {
        Some(target) if !modified => Ok(Reconciled {
            list: Arc::clone(target),
            modified: false,
        }),
        _ => Ok(Reconciled {
            list: Arc::new(list),
            modified: true,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::equality::{IsEqual, SameHandle};
    use serde_json::json;

    fn same(a: &Value, b: &Value) -> bool {
        SameHandle.values(a, b)
    }

    fn copy_leaf(
        _existing: Option<&Value>,
        leaf: &serde_json::Value,
        _indexes: &[usize],
    ) -> Result<Value, CacheError> {
        Ok(Value::from_json(leaf))
    }

    fn run(
        source: serde_json::Value,
        target: Option<&Arc<Vec<Value>>>,
        depth: u32,
    ) -> Reconciled<Value> {
        let source = source.as_array().cloned().expect("array");
        reconcile(
            &source,
            target,
            depth,
            &FieldPath::root().child("items"),
            &same,
            &mut copy_leaf,
        )
        .expect("reconcile")
    }

    /// Re-running with unchanged leaves returns the same list handle.
    #[test]
    fn unchanged_list_keeps_handle() {
        let first = run(json!([1, 2, 3]), None, 1);
        assert!(first.modified);
        let second = run(json!([1, 2, 3]), Some(&first.list), 1);
        assert!(!second.modified);
        assert!(Arc::ptr_eq(&first.list, &second.list));
    }

    /// A shorter source truncates the target and flags the level.
    #[test]
    fn shorter_source_truncates() {
        let first = run(json!([1, 2, 3]), None, 1);
        let second = run(json!([1, 2]), Some(&first.list), 1);
        assert!(second.modified);
        assert_eq!(second.list.len(), 2);
    }

    /// Unchanged inner lists keep their handles when a sibling changes.
    #[test]
    fn nested_levels_share_unchanged_sublists() {
        let first = run(json!([[1, 2], [3]]), None, 2);
        let second = run(json!([[1, 2], [4]]), Some(&first.list), 2);
        assert!(second.modified);
        let (Value::List(a), Value::List(b)) = (&first.list[0], &second.list[0]) else {
            panic!("expected nested lists");
        };
        assert!(Arc::ptr_eq(a, b));
        assert_eq!(second.list[1], Value::from(json!([4])));
    }

    /// Null elements pass through without reaching the leaf callback.
    #[test]
    fn null_elements_are_copied() {
        let source = json!([null, [1]]);
        let items = source.as_array().cloned().expect("array");
        let mut calls = Vec::new();
        let out = reconcile(
            &items,
            None,
            2,
            &FieldPath::root(),
            &same,
            &mut |_existing: Option<&Value>, leaf: &serde_json::Value, indexes: &[usize]| {
                calls.push(indexes.to_vec());
                Ok(Value::from_json(leaf))
            },
        )
        .expect("reconcile");
        assert_eq!(out.list[0], Value::Null);
        assert_eq!(calls, vec![vec![1, 0]]);
    }

    /// Depth zero is rejected.
    #[test]
    fn zero_depth_is_invalid() {
        let err = reconcile(
            &[json!(1)],
            None::<&Arc<Vec<Value>>>,
            0,
            &FieldPath::root().child("items"),
            &same,
            &mut copy_leaf,
        )
        .expect_err("invalid");
        assert!(matches!(err, CacheError::InvalidListDepth { .. }));
    }
}
