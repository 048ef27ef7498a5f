//! Dispatch from a field descriptor and a runtime type to child selections.

use super::error::{CacheError, FieldPath};
use crate::meta::{FieldMeta, FieldSelection};

/// Child selections that apply to one object value.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectShape<'m> {
    /// Identity rule, if the object is an entity.
    pub rule: Option<&'m str>,
    /// Matched branch fields first, then the field's shared fields.
    pub fields: Vec<&'m FieldSelection>,
}

/// Resolve the shape of a non-null object under `field`.
///
/// Polymorphic fields must name a declared branch; their branch `cacheKey`
/// wins over the field's own.
pub fn object_shape<'m>(
    field: &'m FieldMeta,
    typename: Option<&str>,
    path: &FieldPath,
) -> Result<ObjectShape<'m>, CacheError> {
    let shared = field.fields.iter().flatten();
    let Some(possible) = &field.possible else {
        return Ok(ObjectShape {
            rule: field.cache_key.as_deref(),
            fields: shared.collect(),
        });
    };
    let branch = typename
        .and_then(|typename| possible.get(typename))
        .ok_or_else(|| CacheError::UnmatchedBranch {
            path: path.clone(),
            typename: typename.map(str::to_string),
        })?;
    Ok(ObjectShape {
        rule: branch.cache_key.as_deref().or(field.cache_key.as_deref()),
        fields: branch.fields.iter().chain(shared).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::UnionBranch;

    fn node_field() -> FieldMeta {
        FieldMeta::new("node")
            .cache_key("Node:id")
            .fields(vec!["__typename".into(), "id".into()])
            .possible("Post", UnionBranch::new(vec!["title".into()]).cache_key("Post:id"))
            .possible("Tag", UnionBranch::new(vec!["label".into()]))
    }

    /// Branch fields come before shared fields, and the branch rule wins.
    #[test]
    fn matched_branch_prepends_fields() {
        let field = node_field();
        let shape = object_shape(&field, Some("Post"), &FieldPath::root()).expect("shape");
        assert_eq!(shape.rule, Some("Post:id"));
        let names: Vec<&str> = shape.fields.iter().map(|s| s.result_name()).collect();
        assert_eq!(names, vec!["title", "__typename", "id"]);
    }

    /// Branches without their own rule fall back to the field rule.
    #[test]
    fn branch_without_rule_uses_field_rule() {
        let field = node_field();
        let shape = object_shape(&field, Some("Tag"), &FieldPath::root()).expect("shape");
        assert_eq!(shape.rule, Some("Node:id"));
    }

    /// Undeclared or missing runtime types are data errors.
    #[test]
    fn unmatched_type_is_an_error() {
        let field = node_field();
        let path = FieldPath::root().child("node");
        assert_eq!(
            object_shape(&field, Some("User"), &path).expect_err("unmatched"),
            CacheError::UnmatchedBranch {
                path: path.clone(),
                typename: Some("User".to_string()),
            }
        );
        assert!(object_shape(&field, None, &path).is_err());
    }
}
