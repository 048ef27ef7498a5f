//! READ walk: project a view out of the store.
//!
//! Projection never touches the store. Each object and list of the prior view
//! is handed back as-is when everything under it compares equal, so repeated
//! reads of unrelated data keep their handles.

use std::sync::Arc;

use indexmap::IndexMap;

use super::args::{ArgContext, NO_ARGS};
use super::equality::IsEqual;
use super::error::{CacheError, FieldPath};
use super::list::reconcile;
use super::selection::object_shape;
use super::store::{Bucket, Store};
use super::value::{Entry, Value};
use crate::meta::{FieldMeta, FieldSelection, OperationMeta, Variables};

/// Project `meta` starting at `top` (normally the store's root bucket).
pub fn project(
    meta: &OperationMeta,
    variables: &Variables,
    store: &Store,
    top: &Bucket,
    prior: Option<&Value>,
    is_equal: &dyn IsEqual,
) -> Result<Value, CacheError> {
    let projector = Projector {
        args: ArgContext::new(meta, variables),
        is_equal,
        store,
    };
    let fields: Vec<&FieldSelection> = meta.fields.iter().collect();
    let prior = prior.and_then(Value::as_object);
    projector
        .project_fields(top, &fields, prior, &FieldPath::root())
        .map(Value::Object)
}

struct Projector<'m> {
    args: ArgContext<'m>,
    is_equal: &'m dyn IsEqual,
    store: &'m Store,
}

impl<'m> Projector<'m> {
    fn project_fields(
        &self,
        bucket: &Bucket,
        fields: &[&'m FieldSelection],
        prior: Option<&Arc<IndexMap<String, Value>>>,
        path: &FieldPath,
    ) -> Result<Arc<IndexMap<String, Value>>, CacheError> {
        let mut out = IndexMap::with_capacity(fields.len());
        let mut changed = prior.is_none();

        for selection in fields.iter().copied() {
            let key = selection.result_name();
            let previous = prior.and_then(|prior| prior.get(key));
            let value = match selection {
                FieldSelection::Typename => {
                    let typename = bucket.typename().ok_or_else(|| CacheError::MissingField {
                        path: path.child(key),
                    })?;
                    Value::String(typename.to_string())
                }
                FieldSelection::Scalar(name) => {
                    let entry = bucket.get(name, NO_ARGS).ok_or_else(|| CacheError::MissingField {
                        path: path.child(name),
                    })?;
                    plain(entry, &path.child(name))?
                }
                FieldSelection::Field(field) => {
                    let field_path = path.child(key);
                    // Excluded fields drop out of the view; the bucket keeps them.
                    if self.args.is_excluded(field, &field_path)? {
                        continue;
                    }
                    let fingerprint = self.args.fingerprint(field.args.as_ref());
                    let entry = bucket
                        .get(&field.name, &fingerprint)
                        .ok_or_else(|| CacheError::MissingField {
                            path: field_path.clone(),
                        })?;
                    self.project_field(field, entry, previous, &field_path)?
                }
                FieldSelection::FragmentSpread(fragment) => {
                    return Err(CacheError::FragmentsNotInlined {
                        path: path.clone(),
                        fragment: fragment.clone(),
                    });
                }
            };
            match previous {
                Some(previous) if self.is_equal.values(previous, &value) => {
                    out.insert(key.to_string(), previous.clone());
                }
                _ => {
                    changed = true;
                    out.insert(key.to_string(), value);
                }
            }
        }

        match prior {
            Some(prior) if !changed && prior.len() == out.len() => Ok(Arc::clone(prior)),
            _ => Ok(Arc::new(out)),
        }
    }

    fn project_field(
        &self,
        field: &'m FieldMeta,
        entry: &Entry,
        previous: Option<&Value>,
        path: &FieldPath,
    ) -> Result<Value, CacheError> {
        let Some(depth) = field.list else {
            return self.project_leaf(field, entry, previous, path);
        };
        if entry.is_null() {
            return Ok(Value::Null);
        }
        let items = entry.as_list().ok_or_else(|| CacheError::UnexpectedShape {
            path: path.clone(),
            expected: "a list",
        })?;
        let is_equal = self.is_equal;
        let reconciled = reconcile(
            items.as_slice(),
            previous.and_then(Value::as_list),
            depth,
            path,
            &|a: &Value, b: &Value| is_equal.values(a, b),
            &mut |prior: Option<&Value>, leaf: &Entry, indexes: &[usize]| {
                self.project_leaf(field, leaf, prior, &path.indexed(indexes))
            },
        )?;
        Ok(Value::List(reconciled.list))
    }

    fn project_leaf(
        &self,
        field: &'m FieldMeta,
        entry: &Entry,
        previous: Option<&Value>,
        path: &FieldPath,
    ) -> Result<Value, CacheError> {
        if entry.is_null() {
            return Ok(Value::Null);
        }
        if !field.has_selections() {
            return plain(entry, path);
        }
        let (bucket, typename): (&Bucket, Option<&str>) = match entry {
            // A dangling reference is absent data, never an empty object.
            Entry::Ref(key) => {
                let bucket = self
                    .store
                    .entity(key)
                    .ok_or_else(|| CacheError::MissingField { path: path.clone() })?;
                (&**bucket, Some(bucket.typename().unwrap_or_else(|| key.type_name())))
            }
            Entry::Embedded(bucket) => (&**bucket, bucket.typename()),
            Entry::Null | Entry::Scalar(_) | Entry::List(_) => {
                return Err(CacheError::UnexpectedShape {
                    path: path.clone(),
                    expected: "an object",
                });
            }
        };
        let shape = object_shape(field, typename, path)?;
        let prior = previous.and_then(Value::as_object);
        self.project_fields(bucket, &shape.fields, prior, path)
            .map(Value::Object)
    }
}

fn plain(entry: &Entry, path: &FieldPath) -> Result<Value, CacheError> {
    entry.to_plain().ok_or_else(|| CacheError::UnexpectedShape {
        path: path.clone(),
        expected: "a scalar",
    })
}
