//! Identity rules: `TypeName`, `TypeName:field` or `TypeName:f1,f2,...`.

use serde_json::{Map, Value};

use super::canonical::canonical_json;
use super::error::{CacheError, FieldPath};
use super::value::CacheKey;

/// Failure to turn a rule and an object into a key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("cannot parse identity rule `{0}`")]
    Unparseable(String),
    #[error("identity rule `{rule}` needs field `{field}`, which is absent or null")]
    Unresolved { rule: String, field: String },
}

impl RuleError {
    /// Attach the walk position.
    pub fn at(self, path: &FieldPath) -> CacheError {
        match self {
            Self::Unparseable(rule) => CacheError::InvalidIdentityRule {
                path: path.clone(),
                rule,
            },
            Self::Unresolved { rule, field } => CacheError::UnresolvedIdentity {
                path: path.clone(),
                rule,
                field,
            },
        }
    }
}

/// A parsed identity rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRule {
    source: String,
    type_name: String,
    /// Sorted so that declaration order never changes the key.
    fields: Vec<String>,
}

impl IdentityRule {
    pub fn parse(rule: &str) -> Result<Self, RuleError> {
        let unparseable = || RuleError::Unparseable(rule.to_string());
        let (type_name, fields) = match rule.split_once(':') {
            Some((type_name, fields)) => {
                let mut fields = fields
                    .split(',')
                    .map(|field| field.trim().to_string())
                    .collect::<Vec<_>>();
                if fields.iter().any(|field| !is_name(field)) {
                    return Err(unparseable());
                }
                fields.sort();
                fields.dedup();
                (type_name.trim(), fields)
            }
            None => (rule.trim(), Vec::new()),
        };
        if !is_name(type_name) {
            return Err(unparseable());
        }
        Ok(Self {
            source: rule.to_string(),
            type_name: type_name.to_string(),
            fields,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn derive(&self, object: &Map<String, Value>) -> Result<CacheKey, RuleError> {
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match object.get(field) {
                Some(value) if !value.is_null() => values.push(value.clone()),
                _ => {
                    return Err(RuleError::Unresolved {
                        rule: self.source.clone(),
                        field: field.clone(),
                    });
                }
            }
        }
        let key = match values.as_slice() {
            [] => self.type_name.clone(),
            [single] => format!("{}:{}", self.type_name, identity_value(single)),
            _ => format!("{}:{}", self.type_name, canonical_json(&Value::Array(values))),
        };
        Ok(CacheKey::new(key))
    }
}

/// Derive the cache key for `object` under `rule`.
pub fn derive_key(rule: &str, object: &Map<String, Value>) -> Result<CacheKey, RuleError> {
    IdentityRule::parse(rule)?.derive(object)
}

fn identity_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(_) | Value::Bool(_) => value.to_string(),
        _ => canonical_json(value),
    }
}

fn is_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
