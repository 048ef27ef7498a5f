//! Metadata invariants not expressible via JSON Schema.

use std::collections::BTreeSet;

use super::cache_key::IdentityRule;
use super::error::{CacheError, FieldPath};
use crate::meta::{ArgTemplate, FieldSelection, OperationMeta};

/// Check semantic invariants of operation metadata:
/// - No fragment spreads (fragments must be inlined)
/// - `list` depths are at least 1
/// - Every `cacheKey` rule parses
/// - `$variable` template entries name a declared variable
/// - Variables are declared once
///
/// Returns sorted, deduplicated messages; empty means valid.
pub fn validate_meta(meta: &OperationMeta) -> Vec<String> {
    let mut errors = BTreeSet::new();
    let mut declared = BTreeSet::new();
    for variable in &meta.variables {
        if !declared.insert(variable.name.as_str()) {
            errors.insert(format!("variable `{}` declared more than once", variable.name));
        }
    }
    for selection in &meta.fields {
        validate_selection(selection, &FieldPath::root(), &declared, &mut errors);
    }
    errors.into_iter().collect()
}

fn validate_selection(
    selection: &FieldSelection,
    parent: &FieldPath,
    declared: &BTreeSet<&str>,
    errors: &mut BTreeSet<String>,
) {
    let field = match selection {
        FieldSelection::FragmentSpread(name) => {
            errors.insert(format!("{parent}: fragment spread `...{name}` is not inlined"));
            return;
        }
        FieldSelection::Typename | FieldSelection::Scalar(_) => return,
        FieldSelection::Field(field) => field,
    };
    let path = parent.child(field.result_name());

    if field.list == Some(0) {
        errors.insert(format!("{path}: list depth must be at least 1"));
    }
    if let Some(rule) = &field.cache_key {
        check_rule(rule, &path, errors);
    }
    for template in [&field.args, &field.skip, &field.include].into_iter().flatten() {
        check_variables(template, &path, declared, errors);
    }
    for child in field.fields.iter().flatten() {
        validate_selection(child, &path, declared, errors);
    }
    for (type_name, branch) in field.possible.iter().flatten() {
        if let Some(rule) = &branch.cache_key {
            check_rule(rule, &path, errors);
        }
        let branch_path = path.child(type_name);
        for child in &branch.fields {
            validate_selection(child, &branch_path, declared, errors);
        }
    }
}

fn check_rule(rule: &str, path: &FieldPath, errors: &mut BTreeSet<String>) {
    if IdentityRule::parse(rule).is_err() {
        errors.insert(format!("{path}: cannot parse identity rule `{rule}`"));
    }
}

fn check_variables(
    template: &ArgTemplate,
    path: &FieldPath,
    declared: &BTreeSet<&str>,
    errors: &mut BTreeSet<String>,
) {
    let ArgTemplate::Template(entries) = template else {
        return;
    };
    for key in entries.keys() {
        if let Some(variable) = key.strip_prefix('$') {
            if !declared.contains(variable) {
                errors.insert(format!("{path}: variable `${variable}` is not declared"));
            }
        }
    }
}

/// Fail on the first fragment spread, in selection order.
pub fn ensure_inlined(meta: &OperationMeta) -> Result<(), CacheError> {
    meta.fields
        .iter()
        .try_for_each(|selection| ensure_selection_inlined(selection, &FieldPath::root()))
}

fn ensure_selection_inlined(selection: &FieldSelection, parent: &FieldPath) -> Result<(), CacheError> {
    let field = match selection {
        FieldSelection::FragmentSpread(fragment) => {
            return Err(CacheError::FragmentsNotInlined {
                path: parent.clone(),
                fragment: fragment.clone(),
            });
        }
        FieldSelection::Typename | FieldSelection::Scalar(_) => return Ok(()),
        FieldSelection::Field(field) => field,
    };
    let path = parent.child(field.result_name());
    for child in field.fields.iter().flatten() {
        ensure_selection_inlined(child, &path)?;
    }
    for branch in field.possible.iter().flat_map(|possible| possible.values()) {
        for child in &branch.fields {
            ensure_selection_inlined(child, &path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{FieldMeta, UnionBranch, VariableMeta};
    use pretty_assertions::assert_eq;

    /// Well-formed metadata produces no messages.
    #[test]
    fn valid_meta_has_no_errors() {
        let meta = OperationMeta::query(vec![
            FieldMeta::new("user")
                .cache_key("User:id")
                .args(ArgTemplate::variable("id", "id"))
                .fields(vec![FieldSelection::scalar("id")])
                .into(),
        ])
        .with_variable(VariableMeta::new("id"));
        assert!(validate_meta(&meta).is_empty());
    }

    /// Every problem is reported once, sorted.
    #[test]
    fn reports_all_problems_sorted() {
        let meta = OperationMeta::query(vec![
            FieldMeta::new("user")
                .cache_key("User:")
                .args(ArgTemplate::variable("id", "id"))
                .fields(vec![FieldSelection::FragmentSpread("UserFields".to_string())])
                .into(),
            FieldMeta::new("items")
                .list(0)
                .possible("Post", UnionBranch::new(vec!["title".into()]).cache_key("Post id"))
                .into(),
        ]);
        assert_eq!(
            validate_meta(&meta),
            vec![
                "items: cannot parse identity rule `Post id`".to_string(),
                "items: list depth must be at least 1".to_string(),
                "user: cannot parse identity rule `User:`".to_string(),
                "user: fragment spread `...UserFields` is not inlined".to_string(),
                "user: variable `$id` is not declared".to_string(),
            ]
        );
    }

    /// The engine guard reports where the first spread sits.
    #[test]
    fn ensure_inlined_reports_path() {
        let meta = OperationMeta::query(vec![
            FieldMeta::new("viewer")
                .fields(vec![FieldSelection::FragmentSpread("ViewerFields".to_string())])
                .into(),
        ]);
        let err = ensure_inlined(&meta).expect_err("spread");
        assert_eq!(
            err,
            CacheError::FragmentsNotInlined {
                path: FieldPath::root().child("viewer"),
                fragment: "ViewerFields".to_string(),
            }
        );
    }
}
