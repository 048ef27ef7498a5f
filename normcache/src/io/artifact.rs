//! Metadata artifacts: `{ operationName: OperationMeta }` JSON files.
//!
//! Artifacts are validated against the bundled JSON Schema and the metadata
//! invariants before use. Single operations can be re-emitted as raw JSON or
//! base64 payloads for embedding.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use jsonschema::validator_for;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::core::canonical::canonical_json;
use crate::core::invariants::validate_meta;
use crate::meta::OperationMeta;

/// Operations by name, in file order.
pub type Artifact = IndexMap<String, OperationMeta>;

pub const V1_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/operation_meta/v1.schema.json"
));

/// Name a decoded payload is validated under.
const PAYLOAD_NAME: &str = "payload";

/// Payload encoding for [`encode_operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Raw,
    Base64,
}

/// Load and validate an artifact from disk (schema + invariants).
pub fn load_artifact(path: &Path) -> Result<Artifact> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read artifact {}", path.display()))?;
    let artifact =
        parse_artifact(&contents).with_context(|| format!("load artifact {}", path.display()))?;
    debug!(path = %path.display(), operations = artifact.len(), "artifact loaded");
    Ok(artifact)
}

/// Parse and validate artifact JSON (schema + invariants).
pub fn parse_artifact(raw: &str) -> Result<Artifact> {
    let value: Value = serde_json::from_str(raw).context("parse artifact json")?;
    artifact_from_value(value)
}

fn artifact_from_value(value: Value) -> Result<Artifact> {
    validate_schema(&value)?;
    let artifact: Artifact =
        serde_json::from_value(value).context("deserialize artifact as v1 metadata")?;
    let errors: Vec<String> = artifact
        .iter()
        .flat_map(|(name, meta)| {
            validate_meta(meta)
                .into_iter()
                .map(move |err| format!("{name}: {err}"))
        })
        .collect();
    if !errors.is_empty() {
        bail!("metadata invariants failed:\n- {}", errors.join("\n- "));
    }
    Ok(artifact)
}

/// Look up one operation by name.
pub fn operation<'a>(artifact: &'a Artifact, name: &str) -> Result<&'a OperationMeta> {
    artifact.get(name).ok_or_else(|| {
        let known: Vec<&str> = artifact.keys().map(String::as_str).collect();
        anyhow!("unknown operation '{name}' (known: {})", known.join(", "))
    })
}

fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(V1_SCHEMA).context("parse bundled schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

/// Embeddable payload for one operation.
pub fn encode_operation(meta: &OperationMeta, encoding: Encoding) -> Result<String> {
    let json = serde_json::to_string(meta).context("serialize operation metadata")?;
    Ok(match encoding {
        Encoding::Raw => json,
        Encoding::Base64 => STANDARD.encode(json.as_bytes()),
    })
}

/// Decode a payload produced by [`encode_operation`], applying the same
/// schema and invariant checks as a whole artifact.
pub fn decode_operation(payload: &str, encoding: Encoding) -> Result<OperationMeta> {
    let json = match encoding {
        Encoding::Raw => payload.to_string(),
        Encoding::Base64 => {
            let bytes = STANDARD
                .decode(payload.trim())
                .context("decode base64 payload")?;
            String::from_utf8(bytes).context("payload is not utf-8")?
        }
    };
    let value: Value = serde_json::from_str(&json).context("parse operation metadata")?;
    let mut artifact = artifact_from_value(json!({ PAYLOAD_NAME: value }))?;
    artifact
        .shift_remove(PAYLOAD_NAME)
        .ok_or_else(|| anyhow!("payload decoded to no operation"))
}

/// Hex SHA-256 of the metadata's canonical JSON.
pub fn meta_hash(meta: &OperationMeta) -> Result<String> {
    let value = serde_json::to_value(meta).context("serialize operation metadata")?;
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(&value).as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
