//! Configuration for the ccm binary.
//!
//! Provides the [`CcmConfig`] struct that loads from TOML files,
//! environment variables, and defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `CCM_CONFIG` environment variable
//! 3. XDG default: `~/.config/ccm/config.toml`
//! 4. Built-in defaults
//!
//! `CCM_<SECTION>_<KEY>` variables overlay the `lifecycle` and `tools`
//! sections.

use std::path::PathBuf;
use std::time::Duration;

use ccm_core::util::paths::{default_store_dir, expand_tilde};
use ccm_core::{Error, Result};
use ccm_node::LifecycleTimings;
use confyg::{Confygery, env};
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CcmConfig {
    /// Root of the cluster store (default `~/.ccm`).
    pub config_dir: Option<String>,

    /// Timeouts of the node lifecycle.
    pub lifecycle: LifecycleConfig,

    /// External tool settings.
    pub tools: ToolsConfig,
}

/// Lifecycle polling bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub start_timeout_secs: u64,
    pub stop_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

/// External tool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Pager for `showlog` when `PAGER` is unset.
    pub pager: Option<String>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        let timings = LifecycleTimings::default();
        Self {
            start_timeout_secs: timings.start_timeout.as_secs(),
            stop_timeout_secs: timings.stop_timeout.as_secs(),
            poll_interval_ms: timings.poll_interval.as_millis() as u64,
        }
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl CcmConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path) {
            if path.exists() {
                log::debug!("Loading config from {}", path.display());
                builder
                    .add_file(&path.to_string_lossy())
                    .map_err(|e| Error::config(format!("config file: {e}")))?;
            }
        }

        let mut env_opts = env::Options::with_top_level("CCM");
        env_opts.add_section("lifecycle");
        env_opts.add_section("tools");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the lifecycle cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.lifecycle.poll_interval_ms == 0 {
            return Err(Error::config(
                "lifecycle.poll_interval_ms must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("CCM_CONFIG") {
            return Some(PathBuf::from(path));
        }
        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ccm").join("config.toml"))
    }

    /// Cluster store directory, with `~` expanded.
    pub fn store_dir(&self) -> Result<PathBuf> {
        match &self.config_dir {
            Some(dir) => Ok(expand_tilde(dir)),
            None => default_store_dir()
                .ok_or_else(|| Error::config("could not determine the home directory")),
        }
    }

    pub fn timings(&self) -> LifecycleTimings {
        LifecycleTimings {
            start_timeout: Duration::from_secs(self.lifecycle.start_timeout_secs),
            stop_timeout: Duration::from_secs(self.lifecycle.stop_timeout_secs),
            poll_interval: Duration::from_millis(self.lifecycle.poll_interval_ms),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// RAII guard for env var manipulation in tests.
    struct EnvGuard {
        key: String,
        prev: Option<String>,
    }

    // SAFETY (all blocks below): tests touching a variable hold a guard for
    // it and no other thread reads the environment concurrently.
    impl EnvGuard {
        fn new(key: &str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe { std::env::set_var(key, value) };
            Self {
                key: key.to_string(),
                prev,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(val) => unsafe { std::env::set_var(&self.key, val) },
                None => unsafe { std::env::remove_var(&self.key) },
            }
        }
    }

    #[test]
    fn test_ccm_config_default() {
        let config = CcmConfig::default();
        assert!(config.config_dir.is_none());
        assert_eq!(config.lifecycle.start_timeout_secs, 120);
        assert_eq!(config.lifecycle.stop_timeout_secs, 60);
        assert_eq!(config.lifecycle.poll_interval_ms, 500);
        assert!(config.tools.pager.is_none());
    }

    #[test]
    fn test_ccm_config_from_toml() {
        let toml_str = r#"
            config_dir = "/data/ccm"

            [lifecycle]
            start_timeout_secs = 300

            [tools]
            pager = "less -R"
        "#;

        let config: CcmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.config_dir.as_deref(), Some("/data/ccm"));
        assert_eq!(config.lifecycle.start_timeout_secs, 300);
        assert_eq!(config.lifecycle.stop_timeout_secs, 60);
        assert_eq!(config.tools.pager.as_deref(), Some("less -R"));
    }

    #[test]
    fn test_ccm_config_to_toml() {
        let toml_str = toml::to_string_pretty(&CcmConfig::default()).unwrap();
        assert!(toml_str.contains("[lifecycle]"));
        assert!(toml_str.contains("stop_timeout_secs = 60"));
    }

    #[test]
    fn test_ccm_config_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
                config_dir = "/srv/clusters"
                [lifecycle]
                poll_interval_ms = 50
            "#,
        )
        .unwrap();

        let config = CcmConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.config_dir.as_deref(), Some("/srv/clusters"));
        assert_eq!(config.timings().poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_ccm_config_load_rejects_zero_poll_interval() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[lifecycle]\npoll_interval_ms = 0\n").unwrap();

        let err = CcmConfig::load(Some(path.to_str().unwrap())).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("poll_interval_ms")));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_ccm_config_load_defaults() {
        let config = CcmConfig::load(Some("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.timings(), LifecycleTimings::default());
    }

    #[test]
    fn test_ccm_config_load_env_overlay() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tools]\npager = \"more\"\n").unwrap();

        let _guard = EnvGuard::new("CCM_TOOLS_PAGER", "most");
        let config = CcmConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.tools.pager.as_deref(), Some("most"));
    }

    #[test]
    fn test_resolve_config_path_explicit() {
        let path = CcmConfig::resolve_config_path(Some("/explicit/config.toml"));
        assert_eq!(path, Some(PathBuf::from("/explicit/config.toml")));
    }

    #[test]
    fn test_resolve_config_path_env() {
        let _guard = EnvGuard::new("CCM_CONFIG", "/env/config.toml");
        let path = CcmConfig::resolve_config_path(None);
        assert_eq!(path, Some(PathBuf::from("/env/config.toml")));
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = CcmConfig::default_config_path() {
            assert!(p.ends_with("ccm/config.toml"));
        }
    }

    #[test]
    fn test_store_dir_expands_tilde() {
        let config = CcmConfig {
            config_dir: Some("~/clusters".to_string()),
            ..CcmConfig::default()
        };
        let dir = config.store_dir().unwrap();
        assert!(!dir.starts_with("~"));
        assert!(dir.ends_with("clusters"));
    }
}
