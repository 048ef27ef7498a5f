//! Argument fingerprints and `@skip`/`@include` evaluation.

use serde_json::{Map, Value};

use super::canonical::canonical_json;
use super::error::{CacheError, FieldPath};
use crate::meta::{ArgTemplate, FieldMeta, OperationMeta, Variables};

/// Fingerprint for a field selected without arguments.
///
/// Starts with `^`, so it can never equal canonical JSON output.
pub const NO_ARGS: &str = "^NO_ARGS";

const VARIABLE_SIGIL: char = '$';

/// Variable bindings plus declared defaults for one operation.
#[derive(Debug, Clone, Copy)]
pub struct ArgContext<'a> {
    meta: &'a OperationMeta,
    variables: &'a Variables,
}

impl<'a> ArgContext<'a> {
    pub fn new(meta: &'a OperationMeta, variables: &'a Variables) -> Self {
        Self { meta, variables }
    }

    /// Second-level bucket index for a field with these arguments.
    pub fn fingerprint(&self, template: Option<&ArgTemplate>) -> String {
        match template {
            None => NO_ARGS.to_string(),
            Some(ArgTemplate::Printed(printed)) => printed.clone(),
            Some(ArgTemplate::Template(_)) => {
                canonical_json(&Value::Object(self.resolve(template).unwrap_or_default()))
            }
        }
    }

    /// True when `@skip`/`@include` removes the field from the view.
    pub fn is_excluded(&self, field: &FieldMeta, path: &FieldPath) -> Result<bool, CacheError> {
        if let Some(skip) = &field.skip {
            if self.condition(skip, "skip", path)? {
                return Ok(true);
            }
        }
        if let Some(include) = &field.include {
            if !self.condition(include, "include", path)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn condition(
        &self,
        template: &ArgTemplate,
        directive: &'static str,
        path: &FieldPath,
    ) -> Result<bool, CacheError> {
        let invalid = |found: String| CacheError::InvalidDirectiveArgument {
            path: path.clone(),
            directive,
            found,
        };
        let resolved = self
            .resolve(Some(template))
            .ok_or_else(|| invalid(format!("{template:?}")))?;
        match resolved.get("if") {
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(Value::String(s)) if s == "true" => Ok(true),
            Some(Value::String(s)) if s == "false" => Ok(false),
            Some(other) => Err(invalid(other.to_string())),
            None => Err(invalid("nothing".to_string())),
        }
    }

    /// Resolve a template to `{argName: value}`; `None` if a printed template
    /// is not a JSON object.
    fn resolve(&self, template: Option<&ArgTemplate>) -> Option<Map<String, Value>> {
        match template? {
            ArgTemplate::Printed(printed) => match serde_json::from_str::<Value>(printed) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            },
            ArgTemplate::Template(entries) => {
                let mut resolved = Map::new();
                for (key, value) in entries {
                    match key.strip_prefix(VARIABLE_SIGIL) {
                        Some(variable) => {
                            let arg = value.as_str().unwrap_or(variable);
                            if let Some(bound) = self.variable(variable) {
                                resolved.insert(arg.to_string(), bound);
                            }
                        }
                        None => {
                            resolved.insert(key.clone(), literal(value));
                        }
                    }
                }
                Some(resolved)
            }
        }
    }

    /// Bound value, falling back to the declared default. Unbound variables
    /// resolve to nothing.
    fn variable(&self, name: &str) -> Option<Value> {
        match self.variables.get(name) {
            Some(value) if !value.is_null() => Some(value.clone()),
            _ => self
                .meta
                .variable(name)
                .and_then(|declared| declared.default_value.clone()),
        }
    }
}

/// Literal template values arrive printed (`"10"`, `"true"`); parse them back
/// when they are valid JSON and keep enum-like tokens as strings.
fn literal(value: &Value) -> Value {
    match value {
        Value::String(printed) => {
            serde_json::from_str(printed).unwrap_or_else(|_| Value::String(printed.clone()))
        }
        other => other.clone(),
    }
}

/// Fingerprint a template without building an [`ArgContext`].
pub fn fingerprint(
    template: Option<&ArgTemplate>,
    meta: &OperationMeta,
    variables: &Variables,
) -> String {
    ArgContext::new(meta, variables).fingerprint(template)
}
