//! Cache configuration stored in `normcache.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::equality::EqualityMode;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "normcache.toml";

/// Cache configuration (TOML).
///
/// Missing fields take their defaults, so an absent file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Equality used to decide whether a write changes a slot.
    pub equality: EqualityMode,

    /// Snapshot document the CLI reads and writes.
    pub snapshot_path: PathBuf,

    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            equality: EqualityMode::SameHandle,
            snapshot_path: PathBuf::from(".normcache/snapshot.json"),
            pretty: true,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.snapshot_path.as_os_str().is_empty() {
            return Err(anyhow!("snapshot_path must be non-empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CacheConfig::default()`.
pub fn load_config(path: &Path) -> Result<CacheConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file; using defaults");
        let cfg = CacheConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CacheConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A missing file yields defaults.
    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, CacheConfig::default());
    }

    /// Serialized configs load back unchanged.
    #[test]
    fn serialized_config_loads_back() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        let cfg = CacheConfig {
            equality: EqualityMode::Deep,
            pretty: false,
            ..CacheConfig::default()
        };
        let toml = toml::to_string_pretty(&cfg).expect("serialize");
        fs::write(&path, toml).expect("write");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }

    /// Partial files keep defaults for omitted keys.
    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "equality = \"deep\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.equality, EqualityMode::Deep);
        assert_eq!(cfg.snapshot_path, CacheConfig::default().snapshot_path);
    }

    /// An empty snapshot path is rejected.
    #[test]
    fn empty_snapshot_path_is_invalid() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        fs::write(&path, "snapshot_path = \"\"\n").expect("write");
        assert!(load_config(&path).is_err());
    }
}
