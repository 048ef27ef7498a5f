//! Selection metadata consumed by the engine.
//!
//! The metadata is produced by an external schema-aware generator and must
//! round-trip through JSON without loss. A selection is either a bare field
//! name (plain scalar leaf), the `__typename` marker, or a full [`FieldMeta`]
//! descriptor. Fragment spreads (`"...Name"`) parse so that they can be
//! reported, but the engine refuses to walk them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Variable bindings supplied with an operation.
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// Name of the runtime type marker field.
pub const TYPENAME: &str = "__typename";

/// Prefix used by the metadata format for unresolved fragment spreads.
pub const FRAGMENT_PREFIX: &str = "...";

/// Kind of operation the metadata describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

/// Top-level descriptor for a single operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMeta {
    pub operation: OperationKind,
    #[serde(default)]
    pub variables: Vec<VariableMeta>,
    pub fields: Vec<FieldSelection>,
}

impl OperationMeta {
    pub fn new(operation: OperationKind, fields: Vec<FieldSelection>) -> Self {
        Self {
            operation,
            variables: Vec::new(),
            fields,
        }
    }

    pub fn query(fields: Vec<FieldSelection>) -> Self {
        Self::new(OperationKind::Query, fields)
    }

    pub fn mutation(fields: Vec<FieldSelection>) -> Self {
        Self::new(OperationKind::Mutation, fields)
    }

    pub fn with_variable(mut self, variable: VariableMeta) -> Self {
        self.variables.push(variable);
        self
    }

    /// Look up a declared variable by name.
    pub fn variable(&self, name: &str) -> Option<&VariableMeta> {
        self.variables.iter().find(|variable| variable.name == name)
    }
}

/// Declared operation variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
}

impl VariableMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: None,
        }
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// One entry of a selection list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSelection", into = "RawSelection")]
pub enum FieldSelection {
    /// The `__typename` marker.
    Typename,
    /// Plain scalar leaf: no alias, arguments or directives.
    Scalar(String),
    /// Full field descriptor.
    Field(Box<FieldMeta>),
    /// Fragment spread left in place by the generator (never valid input).
    FragmentSpread(String),
}

impl FieldSelection {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::Scalar(name.into())
    }

    /// Key this selection occupies in a view object.
    pub fn result_name(&self) -> &str {
        match self {
            Self::Typename => TYPENAME,
            Self::Scalar(name) | Self::FragmentSpread(name) => name,
            Self::Field(field) => field.result_name(),
        }
    }
}

impl From<FieldMeta> for FieldSelection {
    fn from(field: FieldMeta) -> Self {
        Self::Field(Box::new(field))
    }
}

/// Parses a bare name the same way the JSON form does.
impl From<&str> for FieldSelection {
    fn from(name: &str) -> Self {
        RawSelection::Name(name.to_string()).into()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawSelection {
    Name(String),
    Field(Box<FieldMeta>),
}

impl From<RawSelection> for FieldSelection {
    fn from(raw: RawSelection) -> Self {
        match raw {
            RawSelection::Name(name) if name == TYPENAME => Self::Typename,
            RawSelection::Name(name) => match name.strip_prefix(FRAGMENT_PREFIX) {
                Some(fragment) => Self::FragmentSpread(fragment.to_string()),
                None => Self::Scalar(name),
            },
            RawSelection::Field(field) => Self::Field(field),
        }
    }
}

impl From<FieldSelection> for RawSelection {
    fn from(selection: FieldSelection) -> Self {
        match selection {
            FieldSelection::Typename => Self::Name(TYPENAME.to_string()),
            FieldSelection::Scalar(name) => Self::Name(name),
            FieldSelection::FragmentSpread(name) => Self::Name(format!("{FRAGMENT_PREFIX}{name}")),
            FieldSelection::Field(field) => Self::Field(field),
        }
    }
}

/// Argument template attached to a field or directive.
///
/// `Printed` carries the generator's canonical argument string verbatim.
/// `Template` maps `$variable` keys to the argument name they feed, and plain
/// keys to a literal printed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgTemplate {
    Printed(String),
    Template(IndexMap<String, serde_json::Value>),
}

impl ArgTemplate {
    /// Template feeding argument `arg` from variable `variable`.
    pub fn variable(arg: &str, variable: &str) -> Self {
        let mut entries = IndexMap::new();
        entries.insert(
            format!("${variable}"),
            serde_json::Value::String(arg.to_string()),
        );
        Self::Template(entries)
    }
}

/// Full descriptor for a field that is more than a plain scalar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<ArgTemplate>,
    /// Number of array levels before the entity/scalar level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possible: Option<IndexMap<String, UnionBranch>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<ArgTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<ArgTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldSelection>>,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Key the field occupies in the result and in views (`alias ?? name`).
    pub fn result_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// True when non-null values of this field descend into child selections.
    pub fn has_selections(&self) -> bool {
        self.fields.is_some() || self.possible.is_some() || self.cache_key.is_some()
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn cache_key(mut self, rule: impl Into<String>) -> Self {
        self.cache_key = Some(rule.into());
        self
    }

    pub fn args(mut self, args: ArgTemplate) -> Self {
        self.args = Some(args);
        self
    }

    pub fn list(mut self, depth: u32) -> Self {
        self.list = Some(depth);
        self
    }

    pub fn possible(mut self, type_name: impl Into<String>, branch: UnionBranch) -> Self {
        self.possible
            .get_or_insert_with(IndexMap::new)
            .insert(type_name.into(), branch);
        self
    }

    pub fn skip(mut self, template: ArgTemplate) -> Self {
        self.skip = Some(template);
        self
    }

    pub fn include(mut self, template: ArgTemplate) -> Self {
        self.include = Some(template);
        self
    }

    pub fn fields(mut self, fields: Vec<FieldSelection>) -> Self {
        self.fields = Some(fields);
        self
    }
}

/// Extra selections that apply when a polymorphic field resolves to one
/// concrete type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnionBranch {
    pub fields: Vec<FieldSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
}

impl UnionBranch {
    pub fn new(fields: Vec<FieldSelection>) -> Self {
        Self {
            fields,
            cache_key: None,
        }
    }

    pub fn cache_key(mut self, rule: impl Into<String>) -> Self {
        self.cache_key = Some(rule.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Generator output parses into typed selections and serializes back unchanged.
    #[test]
    fn metadata_round_trips_through_json() {
        let raw = json!({
            "operation": "query",
            "variables": [{ "name": "first", "defaultValue": "10" }],
            "fields": [
                "__typename",
                {
                    "name": "viewer",
                    "cacheKey": "User:id",
                    "fields": [
                        "id",
                        {
                            "name": "friends",
                            "alias": "pals",
                            "args": { "$first": "first" },
                            "list": 1,
                            "cacheKey": "User:id",
                            "fields": ["id", "name"]
                        },
                        {
                            "name": "node",
                            "args": "{\"id\":\"1\"}",
                            "possible": {
                                "Post": { "fields": ["title"], "cacheKey": "Post:id" }
                            },
                            "fields": ["__typename"]
                        }
                    ]
                }
            ]
        });

        let meta: OperationMeta = serde_json::from_value(raw.clone()).expect("parse");
        assert_eq!(meta.operation, OperationKind::Query);
        assert_eq!(meta.fields[0], FieldSelection::Typename);
        let FieldSelection::Field(viewer) = &meta.fields[1] else {
            panic!("expected viewer descriptor");
        };
        assert_eq!(viewer.cache_key.as_deref(), Some("User:id"));

        let back = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(back, raw);
    }

    /// Fragment spreads are kept as a distinct variant so they can be rejected.
    #[test]
    fn fragment_spread_strings_parse_as_spreads() {
        let selection: FieldSelection = serde_json::from_value(json!("...UserFields")).expect("parse");
        assert_eq!(selection, FieldSelection::FragmentSpread("UserFields".to_string()));
        assert_eq!(
            serde_json::to_value(&selection).expect("serialize"),
            json!("...UserFields")
        );
    }

    /// `result_name` prefers the alias over the schema name.
    #[test]
    fn result_name_prefers_alias() {
        let field = FieldMeta::new("friends").alias("pals");
        assert_eq!(field.result_name(), "pals");
        assert_eq!(FieldMeta::new("friends").result_name(), "friends");
    }
}
