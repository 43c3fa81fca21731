/// `config.rs` - Script host settings
///
/// Loaded from a JSON file; every field is optional and falls back to its
/// default. `SCRIPT_BRIDGE_SYS_DIR` overrides the system directory.
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{HostError, Result};
use crate::scripting::sandbox::StdLibPolicy;

pub const SYS_DIR_ENV: &str = "SCRIPT_BRIDGE_SYS_DIR";
/// Floor applied to `wait_timeout_ms`.
pub const MIN_WAIT_TIMEOUT_MS: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory holding `Lua/<entry_module>.lua`.
    pub sys_dir: PathBuf,
    /// Module required by the bootstrap; its `main` is called once.
    pub entry_module: String,
    /// Upper bound on one idle `wait` on the script thread.
    pub wait_timeout_ms: u64,
    pub thread_name: String,
    pub stdlib: StdLibPolicy,
    /// Raise an alert (not just a log line) when a script fails.
    pub alert_on_error: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sys_dir: PathBuf::from("Sys"),
            entry_module: "host".to_string(),
            wait_timeout_ms: 100,
            thread_name: "Lua thread".to_string(),
            stdlib: StdLibPolicy::default(),
            alert_on_error: true,
        }
    }
}

impl HostConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| HostError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| HostError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = std::env::var_os(SYS_DIR_ENV).filter(|d| !d.is_empty()) {
            self.sys_dir = PathBuf::from(dir);
        }
        self
    }

    /// Never zero, so an idle script thread still sleeps between polls.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms.max(MIN_WAIT_TIMEOUT_MS))
    }

    /// System directory as handed to the bootstrap: absolute when it
    /// exists, always ending in `/` so `Lua/?.lua` can be appended.
    pub fn sys_dir_for_scripts(&self) -> String {
        let dir = std::fs::canonicalize(&self.sys_dir).unwrap_or_else(|_| self.sys_dir.clone());
        let mut s = dir.to_string_lossy().replace('\\', "/");
        if !s.ends_with('/') {
            s.push('/');
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.json");
        std::fs::write(&path, r#"{ "entry_module": "boot", "stdlib": "restricted" }"#).unwrap();

        let cfg = HostConfig::load(&path).unwrap();
        assert_eq!(cfg.entry_module, "boot");
        assert_eq!(cfg.stdlib, StdLibPolicy::Restricted);
        assert_eq!(cfg.wait_timeout_ms, 100);
        assert_eq!(cfg.thread_name, "Lua thread");
        assert!(cfg.alert_on_error);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = HostConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, HostError::ConfigRead { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.json");
        std::fs::write(&path, "{ wait_timeout_ms: ").unwrap();

        let err = HostConfig::load(&path).unwrap_err();
        assert!(matches!(err, HostError::ConfigParse { .. }));
        assert!(err.to_string().contains("host.json"));
    }

    #[test]
    fn zero_wait_timeout_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.json");
        std::fs::write(&path, r#"{ "wait_timeout_ms": 0 }"#).unwrap();

        let cfg = HostConfig::load(&path).unwrap();
        assert_eq!(cfg.wait_timeout(), Duration::from_millis(MIN_WAIT_TIMEOUT_MS));
        assert_eq!(HostConfig::default().wait_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn sys_dir_gets_trailing_slash() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = HostConfig {
            sys_dir: dir.path().to_path_buf(),
            ..HostConfig::default()
        };
        let s = cfg.sys_dir_for_scripts();
        assert!(s.ends_with('/'));
        assert!(!s.contains('\\'));

        let missing = HostConfig {
            sys_dir: PathBuf::from("does/not/exist"),
            ..HostConfig::default()
        };
        assert_eq!(missing.sys_dir_for_scripts(), "does/not/exist/");
    }
}
