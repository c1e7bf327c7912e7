//! Engine Configuration
//!
//! Stored in `~/.config/agentflow/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`AGENTFLOW_MAX_DEPTH`, `AGENTFLOW_PROVIDER`,
//!    `AGENTFLOW_MODEL`, `AGENTFLOW_MAX_ITERATIONS`, `AGENTFLOW_CALL_TIMEOUT_SECS`)
//! 2. Config file
//! 3. Defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum nested sub-flow depth
    pub max_depth: usize,

    /// Provider used by agents that do not name one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,

    /// Model used by agents that do not name one (falls back to the provider's)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// `optimizeAgent` cap when the node has no `max_iterations`
    pub max_iterations: u32,

    /// Per provider/tool call timeout; unset means no timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            default_provider: None,
            default_model: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            call_timeout_secs: None,
        }
    }
}

impl EngineConfig {
    /// `~/.config/agentflow/` on Unix, `%APPDATA%/agentflow/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agentflow")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load the user config file, then apply env overrides
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())?.with_env()
    }

    /// Load a config file; a missing file yields defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to read {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to parse {}: {}", path.display(), e),
        })
    }

    /// Write the config, creating the parent directory
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Apply `AGENTFLOW_*` overrides; empty values are ignored
    pub fn with_env(mut self) -> Result<Self> {
        if let Some(v) = env_parse("AGENTFLOW_MAX_DEPTH")? {
            self.max_depth = v;
        }
        if let Some(v) = env_var("AGENTFLOW_PROVIDER") {
            self.default_provider = Some(v);
        }
        if let Some(v) = env_var("AGENTFLOW_MODEL") {
            self.default_model = Some(v);
        }
        if let Some(v) = env_parse("AGENTFLOW_MAX_ITERATIONS")? {
            self.max_iterations = v;
        }
        if let Some(v) = env_parse("AGENTFLOW_CALL_TIMEOUT_SECS")? {
            self.call_timeout_secs = Some(v);
        }
        Ok(self)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_call_timeout(mut self, secs: u64) -> Self {
        self.call_timeout_secs = Some(secs);
        self
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    env_var(key)
        .map(|raw| {
            raw.trim().parse().map_err(|_| FlowError::ConfigError {
                reason: format!("{} must be a non-negative integer, got '{}'", key, raw),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    const ENV_KEYS: [&str; 5] = [
        "AGENTFLOW_MAX_DEPTH",
        "AGENTFLOW_PROVIDER",
        "AGENTFLOW_MODEL",
        "AGENTFLOW_MAX_ITERATIONS",
        "AGENTFLOW_CALL_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_config_path_contains_agentflow() {
        let path = EngineConfig::config_path();
        assert!(path.to_string_lossy().contains("agentflow"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::load_from(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.call_timeout(), None);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_depth = 4\ndefault_provider = \"mock\"\n").unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.default_provider.as_deref(), Some("mock"));
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_depth = \"deep\"").unwrap();
        assert!(matches!(
            EngineConfig::load_from(&path),
            Err(FlowError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");
        let config = EngineConfig::default().with_max_depth(2).with_call_timeout(30);
        config.save_to(&path).unwrap();
        assert_eq!(EngineConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("AGENTFLOW_MAX_DEPTH", "3");
        env::set_var("AGENTFLOW_MODEL", "mock-large");
        env::set_var("AGENTFLOW_CALL_TIMEOUT_SECS", "12");
        env::set_var("AGENTFLOW_PROVIDER", "  ");

        let config = EngineConfig::default().with_env().unwrap();
        clear_env();

        assert_eq!(config.max_depth, 3);
        assert_eq!(config.default_model.as_deref(), Some("mock-large"));
        assert_eq!(config.call_timeout(), Some(Duration::from_secs(12)));
        assert_eq!(config.default_provider, None);
    }

    #[test]
    #[serial]
    fn test_invalid_env_number() {
        clear_env();
        env::set_var("AGENTFLOW_MAX_ITERATIONS", "many");
        let result = EngineConfig::default().with_env();
        clear_env();
        assert!(matches!(result, Err(FlowError::ConfigError { .. })));
    }
}
