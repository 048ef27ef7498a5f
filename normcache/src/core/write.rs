//! WRITE walk: normalize a result tree into a working copy of the store.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde_json::{Map, Value as Json};

use super::args::{ArgContext, NO_ARGS};
use super::cache_key::IdentityRule;
use super::equality::IsEqual;
use super::error::{CacheError, FieldPath};
use super::list::reconcile;
use super::selection::object_shape;
use super::store::{Bucket, ROOT_KEY, Store};
use super::value::{CacheKey, Entry, Value};
use crate::meta::{FieldMeta, FieldSelection, OperationKind, OperationMeta, TYPENAME, Variables};

/// Outcome of a normalization pass.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub store: Store,
    /// Bucket holding the operation's top-level fields. For queries this is
    /// the store's root; for mutations a scratch bucket outside the store.
    pub top: Arc<Bucket>,
    pub added: usize,
    pub updated: usize,
}

/// Whether writes into a bucket count toward the change counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Shared,
    Scratch,
}

/// An entity write reached while the same entity was already being written.
struct Deferred<'m> {
    key: CacheKey,
    typename: Option<String>,
    fields: Vec<&'m FieldSelection>,
    object: Map<String, Json>,
    path: FieldPath,
}

/// Normalize `result` (the operation's data object) into a copy of `store`.
pub fn normalize(
    meta: &OperationMeta,
    variables: &Variables,
    store: &Store,
    result: &Json,
    is_equal: &dyn IsEqual,
) -> Result<Normalized, CacheError> {
    let object = result.as_object().ok_or_else(|| CacheError::UnexpectedShape {
        path: FieldPath::root(),
        expected: "an object result",
    })?;
    let mut normalizer = Normalizer {
        args: ArgContext::new(meta, variables),
        is_equal,
        store: store.clone(),
        added: 0,
        updated: 0,
        in_progress: HashSet::new(),
        deferred: VecDeque::new(),
    };
    let fields: Vec<&FieldSelection> = meta.fields.iter().collect();

    let top = match meta.operation {
        OperationKind::Mutation => {
            let mut scratch = Bucket::new();
            normalizer.write_fields(&mut scratch, Scope::Scratch, &fields, object, &FieldPath::root())?;
            normalizer.flush_deferred()?;
            Arc::new(scratch)
        }
        OperationKind::Query | OperationKind::Subscription => {
            let root_key = CacheKey::new(ROOT_KEY);
            normalizer.write_entity(&root_key, None, &fields, object, &FieldPath::root())?;
            normalizer.flush_deferred()?;
            Arc::clone(normalizer.store.root())
        }
    };

    Ok(Normalized {
        store: normalizer.store,
        top,
        added: normalizer.added,
        updated: normalizer.updated,
    })
}

struct Normalizer<'m> {
    args: ArgContext<'m>,
    is_equal: &'m dyn IsEqual,
    store: Store,
    added: usize,
    updated: usize,
    in_progress: HashSet<CacheKey>,
    deferred: VecDeque<Deferred<'m>>,
}

impl<'m> Normalizer<'m> {
    fn flush_deferred(&mut self) -> Result<(), CacheError> {
        while let Some(job) = self.deferred.pop_front() {
            self.write_entity(&job.key, job.typename.as_deref(), &job.fields, &job.object, &job.path)?;
        }
        Ok(())
    }

    /// Write `fields` of `object` into the entity bucket for `key`.
    ///
    /// The bucket is replaced only when something in it changed.
    fn write_entity(
        &mut self,
        key: &CacheKey,
        typename: Option<&str>,
        fields: &[&'m FieldSelection],
        object: &Map<String, Json>,
        path: &FieldPath,
    ) -> Result<(), CacheError> {
        if self.in_progress.contains(key) {
            self.deferred.push_back(Deferred {
                key: key.clone(),
                typename: typename.map(str::to_string),
                fields: fields.to_vec(),
                object: object.clone(),
                path: path.clone(),
            });
            return Ok(());
        }
        self.in_progress.insert(key.clone());

        let existing = self.store.entity(key).cloned();
        let mut bucket = existing.as_deref().cloned().unwrap_or_default();
        let mut changed = existing.is_none();
        if let Some(typename) = typename {
            changed |= self.record_typename(&mut bucket, typename, Scope::Shared);
        }
        changed |= self.write_fields(&mut bucket, Scope::Shared, fields, object, path)?;

        self.in_progress.remove(key);
        if changed {
            self.store.put(key.clone(), Arc::new(bucket));
        }
        Ok(())
    }

    /// Returns true if the bucket changed.
    fn write_fields(
        &mut self,
        bucket: &mut Bucket,
        scope: Scope,
        fields: &[&'m FieldSelection],
        object: &Map<String, Json>,
        path: &FieldPath,
    ) -> Result<bool, CacheError> {
        let mut changed = false;
        for selection in fields.iter().copied() {
            match selection {
                FieldSelection::Typename => {
                    let typename = match object.get(TYPENAME) {
                        Some(Json::String(typename)) => typename,
                        Some(_) => {
                            return Err(CacheError::UnexpectedShape {
                                path: path.child(TYPENAME),
                                expected: "a string __typename",
                            });
                        }
                        None => {
                            return Err(CacheError::MissingField {
                                path: path.child(TYPENAME),
                            });
                        }
                    };
                    changed |= self.record_typename(bucket, typename, scope);
                }
                FieldSelection::Scalar(name) => {
                    let value = object.get(name.as_str()).ok_or_else(|| CacheError::MissingField {
                        path: path.child(name),
                    })?;
                    let entry = Entry::scalar(Value::from_json(value));
                    changed |= self.set_slot(bucket, scope, name, NO_ARGS, entry);
                }
                FieldSelection::Field(field) => {
                    changed |= self.write_field(bucket, scope, field, object, path)?;
                }
                FieldSelection::FragmentSpread(fragment) => {
                    return Err(CacheError::FragmentsNotInlined {
                        path: path.clone(),
                        fragment: fragment.clone(),
                    });
                }
            }
        }
        Ok(changed)
    }

    fn write_field(
        &mut self,
        bucket: &mut Bucket,
        scope: Scope,
        field: &'m FieldMeta,
        object: &Map<String, Json>,
        parent: &FieldPath,
    ) -> Result<bool, CacheError> {
        let path = parent.child(field.result_name());
        if self.args.is_excluded(field, &path)? {
            return Ok(false);
        }
        let fingerprint = self.args.fingerprint(field.args.as_ref());
        let value = object
            .get(field.result_name())
            .ok_or_else(|| CacheError::MissingField { path: path.clone() })?;
        let existing = bucket.get(&field.name, &fingerprint);

        let Some(depth) = field.list else {
            let entry = self.write_value(field, existing, value, scope, &path)?;
            return Ok(self.set_slot(bucket, scope, &field.name, &fingerprint, entry));
        };
        if value.is_null() {
            if depth == 0 {
                return Err(CacheError::InvalidListDepth { path });
            }
            return Ok(self.set_slot(bucket, scope, &field.name, &fingerprint, Entry::Null));
        }
        let items = value.as_array().ok_or_else(|| CacheError::UnexpectedShape {
            path: path.clone(),
            expected: "a list",
        })?;
        let is_equal = self.is_equal;
        let reconciled = reconcile(
            items,
            existing.and_then(Entry::as_list),
            depth,
            &path,
            &|a: &Entry, b: &Entry| is_equal.entries(a, b),
            &mut |prior: Option<&Entry>, leaf: &Json, indexes: &[usize]| {
                self.write_value(field, prior, leaf, scope, &path.indexed(indexes))
            },
        )?;
        if !reconciled.modified {
            return Ok(false);
        }
        Ok(self.set_slot(bucket, scope, &field.name, &fingerprint, Entry::List(reconciled.list)))
    }

    /// Entry for one non-list value (or one list leaf) of `field`.
    fn write_value(
        &mut self,
        field: &'m FieldMeta,
        existing: Option<&Entry>,
        value: &Json,
        scope: Scope,
        path: &FieldPath,
    ) -> Result<Entry, CacheError> {
        if value.is_null() {
            return Ok(Entry::Null);
        }
        if !field.has_selections() {
            return Ok(Entry::scalar(Value::from_json(value)));
        }
        let object = value.as_object().ok_or_else(|| CacheError::UnexpectedShape {
            path: path.clone(),
            expected: "an object",
        })?;
        let source_typename = object.get(TYPENAME).and_then(Json::as_str);
        let shape = object_shape(field, source_typename, path)?;

        if let Some(rule) = shape.rule {
            let rule = IdentityRule::parse(rule).map_err(|err| err.at(path))?;
            let key = rule.derive(object).map_err(|err| err.at(path))?;
            let typename = source_typename.or_else(|| {
                (key.as_str() != ROOT_KEY).then_some(rule.type_name())
            });
            self.write_entity(&key, typename, &shape.fields, object, path)?;
            return Ok(Entry::Ref(key));
        }

        let prior = match existing {
            Some(Entry::Embedded(bucket)) => Some(bucket),
            _ => None,
        };
        let mut bucket = prior.map(|bucket| bucket.as_ref().clone()).unwrap_or_default();
        let mut changed = false;
        // Polymorphic reads dispatch on the bucket's typename, selected or not.
        if field.possible.is_some() {
            if let Some(typename) = source_typename {
                changed |= self.record_typename(&mut bucket, typename, scope);
            }
        }
        changed |= self.write_fields(&mut bucket, scope, &shape.fields, object, path)?;
        match prior {
            Some(prior) if !changed => Ok(Entry::Embedded(Arc::clone(prior))),
            _ => Ok(Entry::Embedded(Arc::new(bucket))),
        }
    }

    fn record_typename(&mut self, bucket: &mut Bucket, typename: &str, scope: Scope) -> bool {
        if bucket.typename() == Some(typename) {
            return false;
        }
        if scope == Scope::Shared {
            self.count(bucket.typename().is_some());
        }
        bucket.set_typename(typename);
        true
    }

    /// Store `entry` unless it equals what is there. Returns true on change.
    fn set_slot(
        &mut self,
        bucket: &mut Bucket,
        scope: Scope,
        field: &str,
        fingerprint: &str,
        entry: Entry,
    ) -> bool {
        let existed = match bucket.get(field, fingerprint) {
            Some(existing) if self.is_equal.entries(existing, &entry) => return false,
            existing => existing.is_some(),
        };
        if scope == Scope::Shared && !matches!(entry, Entry::Embedded(_)) {
            self.count(existed);
        }
        bucket.insert(field, fingerprint, entry);
        true
    }

    fn count(&mut self, existed: bool) {
        if existed {
            self.updated += 1;
        } else {
            self.added += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::equality::SameHandle;
    use crate::test_support::{entity, selections};
    use serde_json::json;

    fn run(meta: &OperationMeta, store: &Store, result: Json) -> Normalized {
        normalize(meta, &Variables::new(), store, &result, &SameHandle).expect("normalize")
    }

    /// Leaves and typenames count as additions on first write, nothing on replay.
    #[test]
    fn counts_additions_then_nothing() {
        let meta = OperationMeta::query(vec![
            entity("viewer", "User:id", selections(&["__typename", "id", "name"])).into(),
        ]);
        let result = json!({ "viewer": { "__typename": "User", "id": 1, "name": "Ada" } });

        let first = run(&meta, &Store::new(), result.clone());
        // root.viewer ref, typename, id, name
        assert_eq!((first.added, first.updated), (4, 0));

        let second = run(&meta, &first.store, result);
        assert_eq!((second.added, second.updated), (0, 0));
        assert!(Arc::ptr_eq(first.store.root(), second.store.root()));
    }

    /// Changing one leaf counts one update and replaces only that bucket.
    #[test]
    fn changed_leaf_counts_update() {
        let meta = OperationMeta::query(vec![
            entity("viewer", "User:id", selections(&["id", "name"])).into(),
        ]);
        let first = run(&meta, &Store::new(), json!({ "viewer": { "id": 1, "name": "Ada" } }));
        let second = run(&meta, &first.store, json!({ "viewer": { "id": 1, "name": "Grace" } }));
        assert_eq!((second.added, second.updated), (0, 1));
        assert!(Arc::ptr_eq(first.store.root(), second.store.root()));
    }

    /// Mutation payload fields stay out of the root; nested entities do not.
    #[test]
    fn mutation_top_level_is_isolated() {
        let meta = OperationMeta::mutation(vec![
            crate::meta::FieldMeta::new("renameUser")
                .fields(vec![entity("user", "User:id", selections(&["id", "name"])).into()])
                .into(),
        ]);
        let out = run(
            &meta,
            &Store::new(),
            json!({ "renameUser": { "user": { "id": 1, "name": "Ada" } } }),
        );
        assert!(out.store.root().is_empty());
        assert!(out.store.entity(&CacheKey::from("User:1")).is_some());
        // typename, id, name on User:1
        assert_eq!((out.added, out.updated), (3, 0));
        assert!(out.top.get("renameUser", NO_ARGS).is_some());
    }

    /// An entity nested inside itself keeps the fields from both levels.
    #[test]
    fn self_nested_entity_merges() {
        let meta = OperationMeta::query(vec![
            entity(
                "viewer",
                "User:id",
                vec![
                    "id".into(),
                    entity("bestFriend", "User:id", selections(&["id", "email"])).into(),
                ],
            )
            .into(),
        ]);
        let out = run(
            &meta,
            &Store::new(),
            json!({ "viewer": { "id": 1, "bestFriend": { "id": 1, "email": "a@b" } } }),
        );
        let user = out.store.entity(&CacheKey::from("User:1")).expect("user");
        assert!(user.get("email", NO_ARGS).is_some());
        assert_eq!(
            user.get("bestFriend", NO_ARGS),
            Some(&Entry::Ref(CacheKey::from("User:1")))
        );
    }

    /// Absent selected fields are reported with their path.
    #[test]
    fn absent_field_is_missing() {
        let meta = OperationMeta::query(vec![
            entity("viewer", "User:id", selections(&["id", "name"])).into(),
        ]);
        let err = normalize(
            &meta,
            &Variables::new(),
            &Store::new(),
            &json!({ "viewer": { "id": 1 } }),
            &SameHandle,
        )
        .expect_err("missing");
        assert_eq!(err.to_string(), "[MISSING_FIELD] missing field for: viewer.name");
    }
}
