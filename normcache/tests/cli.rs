//! CLI tests for `normcache`.
//!
//! Spawns the binary in a temp directory and checks exit codes and output for
//! validate, write/read against the snapshot, and the key helpers.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use normcache::exit_codes;
use normcache::io::snapshot::load_snapshot;
use normcache::test_support::{viewer_query, viewer_result};
use serde_json::json;

fn normcache(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_normcache"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run normcache")
}

fn seed_files(dir: &Path) {
    let artifact = json!({ "Viewer": viewer_query() });
    fs::write(dir.join("ops.json"), artifact.to_string()).expect("write artifact");
    fs::write(dir.join("vars.json"), json!({ "first": 2 }).to_string()).expect("write vars");
    let envelope = json!({ "data": viewer_result("Ada", 2), "errors": [] });
    fs::write(dir.join("result.json"), envelope.to_string()).expect("write result");
}

#[test]
fn validate_accepts_well_formed_artifact() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_files(temp.path());

    let output = normcache(temp.path(), &["validate", "--meta", "ops.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok: 1 operation(s)");
}

#[test]
fn validate_rejects_unknown_keys_and_spreads() {
    let temp = tempfile::tempdir().expect("tempdir");
    let artifact = json!({
        "Broken": {
            "operation": "query",
            "fields": [{ "name": "viewer", "cacheKey": "User:id", "fields": ["...UserFields"] }]
        },
        "Typo": {
            "operation": "query",
            "fields": [{ "name": "viewer", "cachekey": "User:id" }]
        }
    });
    fs::write(temp.path().join("ops.json"), artifact.to_string()).expect("write artifact");

    let output = normcache(temp.path(), &["validate", "--meta", "ops.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn write_then_read_round_trips_through_snapshot() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_files(temp.path());

    let write = normcache(
        temp.path(),
        &[
            "write", "--meta", "ops.json", "--op", "Viewer", "--result", "result.json", "--vars",
            "vars.json",
        ],
    );
    assert_eq!(write.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&write.stdout).trim(), "added=11 updated=0");

    let doc = load_snapshot(&temp.path().join(".normcache/snapshot.json")).expect("snapshot");
    assert_eq!(doc.store.entity_count(), 3);
    assert!(doc.operations.contains_key("Viewer"));

    let read = normcache(
        temp.path(),
        &["read", "--meta", "ops.json", "--op", "Viewer", "--vars", "vars.json"],
    );
    assert_eq!(read.status.code(), Some(exit_codes::OK));
    let view: serde_json::Value = serde_json::from_slice(&read.stdout).expect("view json");
    assert_eq!(view, viewer_result("Ada", 2));
}

#[test]
fn read_of_uncached_page_exits_missing() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_files(temp.path());

    let write = normcache(
        temp.path(),
        &[
            "write", "--meta", "ops.json", "--op", "Viewer", "--result", "result.json", "--vars",
            "vars.json",
        ],
    );
    assert_eq!(write.status.code(), Some(exit_codes::OK));

    // No vars: `first` falls back to its default of 10, which was never written.
    let read = normcache(temp.path(), &["read", "--meta", "ops.json", "--op", "Viewer"]);
    assert_eq!(read.status.code(), Some(exit_codes::MISSING));
    assert!(String::from_utf8_lossy(&read.stderr).contains("viewer.friends"));
}

#[test]
fn read_without_snapshot_exits_missing() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_files(temp.path());

    let read = normcache(temp.path(), &["read", "--meta", "ops.json", "--op", "Viewer"]);
    assert_eq!(read.status.code(), Some(exit_codes::MISSING));
}

#[test]
fn config_redirects_snapshot_path() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_files(temp.path());
    fs::write(
        temp.path().join("normcache.toml"),
        "snapshot_path = \"state/cache.json\"\npretty = false\n",
    )
    .expect("write config");

    let write = normcache(
        temp.path(),
        &[
            "write", "--meta", "ops.json", "--op", "Viewer", "--result", "result.json", "--vars",
            "vars.json",
        ],
    );
    assert_eq!(write.status.code(), Some(exit_codes::OK));
    assert!(temp.path().join("state/cache.json").exists());
    assert!(!temp.path().join(".normcache").exists());
}

#[test]
fn key_prints_derived_cache_key() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = normcache(
        temp.path(),
        &["key", "--rule", "Tag:org,name", "--object", r#"{"org": 3, "name": "rust"}"#],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        r#"Tag:["rust",3]"#
    );

    let unresolved = normcache(temp.path(), &["key", "--rule", "User:id", "--object", "{}"]);
    assert_eq!(unresolved.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn unknown_operation_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_files(temp.path());

    let output = normcache(temp.path(), &["encode", "--meta", "ops.json", "--op", "Nope"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn encoded_payload_decodes_back() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_files(temp.path());

    let encoded = normcache(
        temp.path(),
        &["encode", "--meta", "ops.json", "--op", "Viewer", "--base64"],
    );
    assert_eq!(encoded.status.code(), Some(exit_codes::OK));
    fs::write(temp.path().join("viewer.b64"), &encoded.stdout).expect("write payload");

    let decoded = normcache(temp.path(), &["decode", "--payload", "viewer.b64", "--base64"]);
    assert_eq!(decoded.status.code(), Some(exit_codes::OK));
    let meta: serde_json::Value = serde_json::from_slice(&decoded.stdout).expect("meta json");
    assert_eq!(meta, json!(viewer_query()));

    let raw = normcache(temp.path(), &["decode", "--payload", "viewer.b64"]);
    assert_eq!(raw.status.code(), Some(exit_codes::INVALID));
}
