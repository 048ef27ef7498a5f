//! Orchestration for `normcache` CLI commands.
//!
//! Each command loads its inputs through [`crate::io`], runs [`crate::engine`]
//! and returns a structured outcome; printing and exit codes live in `main`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::error::CacheError;
use crate::core::value::{CacheKey, Value};
use crate::engine;
use crate::io::artifact::{
    Encoding, decode_operation, encode_operation, load_artifact, operation,
};
use crate::io::config::CacheConfig;
use crate::io::snapshot::{load_snapshot, write_snapshot};
use crate::meta::{ArgTemplate, OperationMeta, Variables};

/// Counters and view of an applied write.
#[derive(Debug, Clone)]
pub struct WriteReport {
    pub added: usize,
    pub updated: usize,
    pub view: Value,
}

/// Outcome of `normcache read`.
#[derive(Debug, Clone)]
pub enum ReadReport {
    View(Value),
    /// A selected field has no cached entry.
    Missing(CacheError),
}

/// Validate an artifact file; returns the operation names it defines.
pub fn validate_artifact(meta_path: &Path) -> Result<Vec<String>> {
    let artifact = load_artifact(meta_path)?;
    Ok(artifact.keys().cloned().collect())
}

/// Apply a result file to the configured snapshot.
pub fn write_operation(
    cfg: &CacheConfig,
    meta_path: &Path,
    op: &str,
    result_path: &Path,
    vars_path: Option<&Path>,
) -> Result<WriteReport> {
    let artifact = load_artifact(meta_path)?;
    let meta = operation(&artifact, op)?;
    let variables = load_variables(vars_path)?;
    let result = read_json(result_path)?;
    let data = response_data(&result);

    let mut doc = load_snapshot(&cfg.snapshot_path)?;
    let outcome = engine::write(
        meta,
        &variables,
        &doc.store,
        data,
        None,
        Some(cfg.equality.capability()),
    )
    .with_context(|| format!("write operation '{op}'"))?;

    doc.store = outcome.store;
    doc.record(op, meta, &variables)?;
    write_snapshot(&cfg.snapshot_path, &doc, cfg.pretty)?;
    info!(op, added = outcome.added, updated = outcome.updated, "operation written");
    Ok(WriteReport {
        added: outcome.added,
        updated: outcome.updated,
        view: outcome.view,
    })
}

/// Project an operation's view out of the configured snapshot.
pub fn read_operation(
    cfg: &CacheConfig,
    meta_path: &Path,
    op: &str,
    vars_path: Option<&Path>,
) -> Result<ReadReport> {
    let artifact = load_artifact(meta_path)?;
    let meta = operation(&artifact, op)?;
    let variables = load_variables(vars_path)?;
    let doc = load_snapshot(&cfg.snapshot_path)?;
    match engine::read_with(meta, &variables, &doc.store, None, cfg.equality.capability()) {
        Ok(outcome) => Ok(ReadReport::View(outcome.view)),
        Err(err) if err.is_missing_field() => {
            debug!(op, path = %err.path(), "read hit a missing field");
            Ok(ReadReport::Missing(err))
        }
        Err(err) => Err(anyhow::Error::new(err).context(format!("read operation '{op}'"))),
    }
}

/// Derive a cache key from an identity rule and a JSON object literal.
pub fn cache_key(rule: &str, object_json: &str) -> Result<CacheKey> {
    let object: serde_json::Value = serde_json::from_str(object_json).context("parse --object")?;
    let object = object
        .as_object()
        .ok_or_else(|| anyhow!("--object must be a JSON object"))?;
    Ok(engine::cache_key(rule, object)?)
}

/// Fingerprint an argument template (printed string or template map).
pub fn fingerprint(args_json: &str, vars_path: Option<&Path>) -> Result<String> {
    let template: ArgTemplate = serde_json::from_str(args_json).context("parse --args")?;
    let variables = load_variables(vars_path)?;
    let meta = OperationMeta::query(Vec::new());
    Ok(engine::fingerprint(Some(&template), &meta, &variables))
}

/// Embeddable payload for one operation of an artifact.
pub fn encode(meta_path: &Path, op: &str, encoding: Encoding) -> Result<String> {
    let artifact = load_artifact(meta_path)?;
    encode_operation(operation(&artifact, op)?, encoding)
}

/// Metadata carried by an embedded payload file.
pub fn decode(payload_path: &Path, encoding: Encoding) -> Result<OperationMeta> {
    let payload = fs::read_to_string(payload_path)
        .with_context(|| format!("read {}", payload_path.display()))?;
    decode_operation(&payload, encoding)
        .with_context(|| format!("decode payload {}", payload_path.display()))
}

/// Variables from an optional JSON file; absent means none bound.
pub fn load_variables(path: Option<&Path>) -> Result<Variables> {
    let Some(path) = path else {
        return Ok(Variables::new());
    };
    match read_json(path)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(anyhow!(
            "variables in {} must be a JSON object, got {other}",
            path.display()
        )),
    }
}

/// Render JSON output honoring the `pretty` setting.
pub fn render_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.context("serialize json output")
}

/// The `data` member of a `{ data, errors, extensions }` response envelope,
/// or the value itself when it is a bare data object.
fn response_data(result: &serde_json::Value) -> &serde_json::Value {
    let is_envelope = result.as_object().is_some_and(|object| {
        object.contains_key("data")
            && object
                .keys()
                .all(|key| matches!(key.as_str(), "data" | "errors" | "extensions"))
    });
    if is_envelope { &result["data"] } else { result }
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}
