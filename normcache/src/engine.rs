//! Public entry points: `write` a result into a store, `read` a view back.
//!
//! Both are synchronous pure functions of their inputs. `write` never mutates
//! the store it is given; it returns a new snapshot that shares every bucket
//! it did not touch. On error nothing is returned to publish.

use tracing::{debug, instrument};

use crate::core::cache_key::{RuleError, derive_key};
use crate::core::equality::{IsEqual, SameHandle};
use crate::core::error::CacheError;
use crate::core::invariants::ensure_inlined;
use crate::core::read::project;
use crate::core::store::Store;
use crate::core::value::{CacheKey, Value};
use crate::core::write::normalize;
use crate::meta::{ArgTemplate, OperationMeta, Variables};

/// Result of a WRITE call.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub store: Store,
    pub view: Value,
    pub added: usize,
    pub updated: usize,
}

/// Result of a READ call.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub view: Value,
}

/// Normalize `result` into a copy of `store` and project the operation's view.
///
/// `prior_view` lets unchanged parts of the view keep their handles;
/// `is_equal` defaults to [`SameHandle`].
#[instrument(skip_all, fields(operation = ?meta.operation))]
pub fn write(
    meta: &OperationMeta,
    variables: &Variables,
    store: &Store,
    result: &serde_json::Value,
    prior_view: Option<&Value>,
    is_equal: Option<&dyn IsEqual>,
) -> Result<WriteOutcome, CacheError> {
    let is_equal = is_equal.unwrap_or(&SameHandle);
    ensure_inlined(meta)?;
    let normalized = normalize(meta, variables, store, result, is_equal)?;
    let view = project(
        meta,
        variables,
        &normalized.store,
        &normalized.top,
        prior_view,
        is_equal,
    )?;
    debug!(
        added = normalized.added,
        updated = normalized.updated,
        entities = normalized.store.entity_count(),
        "write applied"
    );
    Ok(WriteOutcome {
        store: normalized.store,
        view,
        added: normalized.added,
        updated: normalized.updated,
    })
}

/// Rebuild the operation's view from `store`.
pub fn read(
    meta: &OperationMeta,
    variables: &Variables,
    store: &Store,
    prior_view: Option<&Value>,
) -> Result<ReadOutcome, CacheError> {
    read_with(meta, variables, store, prior_view, &SameHandle)
}

/// [`read`] with an explicit equality capability.
#[instrument(skip_all, fields(operation = ?meta.operation))]
pub fn read_with(
    meta: &OperationMeta,
    variables: &Variables,
    store: &Store,
    prior_view: Option<&Value>,
    is_equal: &dyn IsEqual,
) -> Result<ReadOutcome, CacheError> {
    ensure_inlined(meta)?;
    let view = project(meta, variables, store, store.root(), prior_view, is_equal)?;
    let reused = prior_view.is_some_and(|prior| prior.same_handle(&view));
    debug!(reused, "read projected");
    Ok(ReadOutcome { view })
}

/// Cache key for `object` under identity rule `rule`.
pub fn cache_key(
    rule: &str,
    object: &serde_json::Map<String, serde_json::Value>,
) -> Result<CacheKey, RuleError> {
    derive_key(rule, object)
}

/// Argument fingerprint of `template` under `variables`.
pub fn fingerprint(
    template: Option<&ArgTemplate>,
    meta: &OperationMeta,
    variables: &Variables,
) -> String {
    crate::core::args::fingerprint(template, meta, variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{entity, selections};
    use serde_json::json;

    /// WRITE and READ views agree.
    #[test]
    fn write_view_matches_read_view() {
        let meta = OperationMeta::query(vec![
            entity("viewer", "User:id", selections(&["id", "name"])).into(),
        ]);
        let result = json!({ "viewer": { "id": 1, "name": "Ada", "extra": true } });
        let written = write(&meta, &Variables::new(), &Store::new(), &result, None, None)
            .expect("write");
        let read_back = read(&meta, &Variables::new(), &written.store, None).expect("read");
        assert_eq!(written.view, read_back.view);
        assert_eq!(
            read_back.view.to_json(),
            json!({ "viewer": { "id": 1, "name": "Ada" } })
        );
    }

    /// Fragment spreads are refused before any walking happens.
    #[test]
    fn spreads_are_rejected() {
        let meta = OperationMeta::query(vec!["...ViewerFields".into()]);
        let err = read(&meta, &Variables::new(), &Store::new(), None).expect_err("spread");
        assert!(matches!(err, CacheError::FragmentsNotInlined { .. }));
    }
}
