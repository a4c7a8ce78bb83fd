//! Runtime configuration read from the environment.

use std::env;
use std::path::PathBuf;

use crate::error::Result;
use crate::registry::Registry;

/// Base directory when `BENCH_DATA_ROOT` is unset.
pub const DEFAULT_DATA_ROOT: &str = "./data";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Where raw dataset files live and `<group>_benchmark` directories are created.
    pub data_root: PathBuf,
    /// Registry JSON replacing the built-in one.
    pub registry_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            registry_path: None,
        }
    }
}

impl Config {
    /// Snapshot of `BENCH_DATA_ROOT` and `BENCH_REGISTRY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            data_root: set("BENCH_DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT)),
            registry_path: set("BENCH_REGISTRY").map(PathBuf::from),
        }
    }

    /// The configured registry file, or the built-in registry.
    pub fn load_registry(&self) -> Result<Registry> {
        match &self.registry_path {
            Some(path) => Registry::from_path(path),
            None => Registry::builtin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_apply_when_unset_or_blank() {
        let vars = HashMap::from([("BENCH_REGISTRY", " ")]);
        let cfg = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn env_values_override_defaults() {
        let vars = HashMap::from([
            ("BENCH_DATA_ROOT", "/tmp/bench"),
            ("BENCH_REGISTRY", "reg.json"),
        ]);
        let cfg = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.data_root, PathBuf::from("/tmp/bench"));
        assert_eq!(cfg.registry_path, Some(PathBuf::from("reg.json")));
    }

    #[test]
    fn builtin_registry_without_path() {
        assert!(Config::default().load_registry().is_ok());
    }
}
