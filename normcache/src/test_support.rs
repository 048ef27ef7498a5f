//! Test-only helpers for building metadata, variables and stores.

use serde_json::Value as Json;

use crate::core::store::Store;
use crate::engine;
use crate::meta::{FieldMeta, FieldSelection, OperationMeta, Variables};

/// Bare selections from names (`"__typename"`, scalars, `"...Spread"`).
pub fn selections(names: &[&str]) -> Vec<FieldSelection> {
    names.iter().map(|name| FieldSelection::from(*name)).collect()
}

/// Field descriptor for an identifiable object.
pub fn entity(name: &str, rule: &str, fields: Vec<FieldSelection>) -> FieldMeta {
    FieldMeta::new(name).cache_key(rule).fields(fields)
}

/// Field descriptor for an embedded (non-identity) object.
pub fn object(name: &str, fields: Vec<FieldSelection>) -> FieldMeta {
    FieldMeta::new(name).fields(fields)
}

/// Variables from a JSON object literal.
pub fn vars(value: Json) -> Variables {
    match value {
        Json::Object(map) => map,
        other => panic!("variables must be an object, got {other}"),
    }
}

/// Store after writing `result` for `meta` into an empty store.
pub fn store_with(meta: &OperationMeta, variables: &Variables, result: &Json) -> Store {
    engine::write(meta, variables, &Store::new(), result, None, None)
        .expect("seed write")
        .store
}

/// `viewer { __typename id name friends(first: $first) { id name } }`.
pub fn viewer_query() -> OperationMeta {
    use crate::meta::{ArgTemplate, VariableMeta};

    OperationMeta::query(vec![
        entity(
            "viewer",
            "User:id",
            vec![
                "__typename".into(),
                "id".into(),
                "name".into(),
                entity("friends", "User:id", selections(&["id", "name"]))
                    .args(ArgTemplate::variable("first", "first"))
                    .list(1)
                    .into(),
            ],
        )
        .into(),
    ])
    .with_variable(VariableMeta::new("first").with_default(Json::from(10)))
}

/// Result for [`viewer_query`] with `friend_count` friends.
pub fn viewer_result(name: &str, friend_count: usize) -> Json {
    let friends: Vec<Json> = (0..friend_count)
        .map(|i| serde_json::json!({ "id": 100 + i, "name": format!("friend {i}") }))
        .collect();
    serde_json::json!({
        "viewer": {
            "__typename": "User",
            "id": 1,
            "name": name,
            "friends": friends,
        }
    })
}
