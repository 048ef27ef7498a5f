//! Typed failures raised while normalizing or projecting.
//!
//! None of these are transient: the engine never retries and never publishes a
//! partially written store. Every variant records the field path at which the
//! walk stopped; argument fingerprints never appear in the path.

use std::fmt;

/// Location inside a selection walk, rendered as `viewer.friends[2].name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<PathSegment>);

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Key(String),
    Index(usize),
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self(segments)
    }

    pub fn indexed(&self, indexes: &[usize]) -> Self {
        let mut segments = self.0.clone();
        segments.extend(indexes.iter().copied().map(PathSegment::Index));
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => f.write_str(key)?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Errors raised by the cache key deriver, the argument evaluator, the list
/// reconciler and the read/write walks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// An identity rule referenced a field the object does not carry.
    #[error("[UNRESOLVED_IDENTITY] {path}: rule `{rule}` needs field `{field}`, which is absent or null")]
    UnresolvedIdentity {
        path: FieldPath,
        rule: String,
        field: String,
    },

    /// An identity rule string could not be parsed.
    #[error("[INVALID_IDENTITY_RULE] {path}: cannot parse identity rule `{rule}`")]
    InvalidIdentityRule { path: FieldPath, rule: String },

    /// A selected field has no entry at all (distinct from a cached null).
    #[error("[MISSING_FIELD] missing field for: {path}")]
    MissingField { path: FieldPath },

    /// Metadata still contains a fragment spread.
    #[error("[FRAGMENTS_NOT_INLINED] {path}: fragment spread `...{fragment}` must be inlined before normalization")]
    FragmentsNotInlined { path: FieldPath, fragment: String },

    /// A `@skip`/`@include` condition did not resolve to a boolean.
    #[error("[INVALID_DIRECTIVE_ARGUMENT] {path}: @{directive}(if:) resolved to {found}, expected a boolean")]
    InvalidDirectiveArgument {
        path: FieldPath,
        directive: &'static str,
        found: String,
    },

    /// A polymorphic field resolved to a type outside its declared branches.
    #[error("[UNMATCHED_BRANCH] {path}: no branch declared for type `{}`", typename.as_deref().unwrap_or("<missing __typename>"))]
    UnmatchedBranch {
        path: FieldPath,
        typename: Option<String>,
    },

    /// A value does not have the shape its metadata declares.
    #[error("[UNEXPECTED_SHAPE] {path}: expected {expected}")]
    UnexpectedShape {
        path: FieldPath,
        expected: &'static str,
    },

    /// A `list` depth of zero.
    #[error("[INVALID_LIST_DEPTH] {path}: list depth must be at least 1")]
    InvalidListDepth { path: FieldPath },
}

impl CacheError {
    /// Path at which the walk stopped.
    pub fn path(&self) -> &FieldPath {
        match self {
            Self::UnresolvedIdentity { path, .. }
            | Self::InvalidIdentityRule { path, .. }
            | Self::MissingField { path }
            | Self::FragmentsNotInlined { path, .. }
            | Self::InvalidDirectiveArgument { path, .. }
            | Self::UnmatchedBranch { path, .. }
            | Self::UnexpectedShape { path, .. }
            | Self::InvalidListDepth { path } => path,
        }
    }

    pub fn is_missing_field(&self) -> bool {
        matches!(self, Self::MissingField { .. })
    }
}
