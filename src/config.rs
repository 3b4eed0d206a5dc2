//! Tool configuration.
//!
//! Cutover reads an optional YAML config file (`--config`, or
//! `~/.cutover/config.yml`); every field has a default so the tool runs
//! without one. The data directory holds the environment registry and job
//! history and is resolved separately so tests can point it anywhere.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CutoverError, Result};
use crate::poll::WaitPolicy;

/// Configuration for a cutover invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Base URL of the provider gateway.
    pub provider_url: String,

    /// Seconds between progress checks on an asynchronous operation.
    pub poll_delay_secs: u64,

    /// Maximum number of followup checks before a wait times out.
    pub poll_max_waits: u32,

    /// Number of job records kept in history.
    pub history_retention: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            provider_url: "http://localhost:8484".to_string(),
            poll_delay_secs: WaitPolicy::DEFAULT_DELAY_SECS,
            poll_max_waits: WaitPolicy::DEFAULT_MAX_WAITS,
            history_retention: crate::history::HistoryStore::DEFAULT_RETENTION,
        }
    }
}

impl ToolConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".cutover").join("config.yml"))
    }

    /// Load configuration.
    ///
    /// An explicitly given path must exist and parse; the default path is
    /// optional and silently falls back to defaults when absent.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = match explicit_path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&path)?;
        serde_yaml::from_str(&content).map_err(|e| CutoverError::ConfigParseError {
            path,
            message: e.to_string(),
        })
    }

    /// The wait policy this config describes.
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(Duration::from_secs(self.poll_delay_secs), self.poll_max_waits)
    }
}

/// Resolve the data directory: the explicit flag wins, then
/// `CUTOVER_DATA_DIR`, then `~/.cutover`.
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Some(dir) = std::env::var_os("CUTOVER_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cutover")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_without_file() {
        let config = ToolConfig::default();
        assert_eq!(config.poll_delay_secs, 10);
        assert_eq!(config.poll_max_waits, 60);
        assert_eq!(config.history_retention, 50);
    }

    #[test]
    fn load_parses_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yml");
        fs::write(&path, "provider_url: http://gateway.internal:9000\npoll_delay_secs: 5\n")
            .unwrap();

        let config = ToolConfig::load(Some(&path)).unwrap();

        assert_eq!(config.provider_url, "http://gateway.internal:9000");
        assert_eq!(config.poll_delay_secs, 5);
        // unspecified fields keep defaults
        assert_eq!(config.poll_max_waits, 60);
    }

    #[test]
    fn load_errors_on_missing_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nope.yml");

        assert!(ToolConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn load_errors_on_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yml");
        fs::write(&path, "poll_delay_secs: [not a number").unwrap();

        let err = ToolConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, CutoverError::ConfigParseError { .. }));
    }

    #[test]
    fn wait_policy_reflects_config() {
        let config = ToolConfig {
            poll_delay_secs: 3,
            poll_max_waits: 7,
            ..Default::default()
        };
        let policy = config.wait_policy();

        assert_eq!(policy.delay, Duration::from_secs(3));
        assert_eq!(policy.max_waits, 7);
    }

    #[test]
    fn explicit_data_dir_wins() {
        let temp = TempDir::new().unwrap();
        assert_eq!(resolve_data_dir(Some(temp.path())), temp.path());
    }
}
