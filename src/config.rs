//! Store configuration

use std::path::PathBuf;

use serde::Deserialize;

use crate::constants::{DEFAULT_DB_PATH, DEFAULT_MAP_SIZE, DEFAULT_MAX_DBS, ENV_DB_PATH, ENV_MAP_SIZE};

/// Where and how large the LMDB environment is
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub map_size: usize,
    pub max_dbs: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig { path: PathBuf::from(DEFAULT_DB_PATH), map_size: DEFAULT_MAP_SIZE, max_dbs: DEFAULT_MAX_DBS }
    }
}

impl StoreConfig {
    /// Defaults at `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        StoreConfig { path: path.into(), ..Self::default() }
    }

    /// Defaults overridden by `FLAGPERM_DB` and `FLAGPERM_MAP_SIZE`
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut cfg = Self::default();
        if let Some(path) = lookup(ENV_DB_PATH) {
            cfg.path = PathBuf::from(path);
        }
        if let Some(size) = lookup(ENV_MAP_SIZE).and_then(|s| s.parse().ok()) {
            cfg.map_size = size;
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides() {
        let cfg = StoreConfig::from_lookup(|k| match k {
            ENV_DB_PATH => Some("/tmp/perms".into()),
            ENV_MAP_SIZE => Some("4096".into()),
            _ => None,
        });
        assert_eq!(cfg.path, PathBuf::from("/tmp/perms"));
        assert_eq!(cfg.map_size, 4096);
        assert_eq!(cfg.max_dbs, DEFAULT_MAX_DBS);
    }

    #[test]
    fn bad_map_size_falls_back() {
        let cfg = StoreConfig::from_lookup(|k| (k == ENV_MAP_SIZE).then(|| "lots".to_string()));
        assert_eq!(cfg, StoreConfig::default());
    }

    #[test]
    fn deserialize_partial() {
        let cfg: StoreConfig = serde_json::from_str(r#"{"path": "perms.mdb"}"#).unwrap();
        assert_eq!(cfg.path, PathBuf::from("perms.mdb"));
        assert_eq!(cfg.map_size, DEFAULT_MAP_SIZE);
    }
}
