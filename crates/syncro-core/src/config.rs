//! Engine configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/syncro/config.toml)
//! 3. Environment variables (SYNCRO_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "SYNCRO";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncroConfig {
    /// Coordination service base URL (optional)
    #[serde(default)]
    pub registry_url: Option<String>,

    /// Delay between presence heartbeats
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Debounce applied to local writes before they reach the realtime store
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Extra mount attempts after the first failure
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base delay for mount backoff
    #[serde(default = "default_retry_min_time_ms")]
    pub retry_min_time_ms: u64,
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_throttle_ms() -> u64 {
    250
}

fn default_retries() -> u32 {
    5
}

fn default_retry_min_time_ms() -> u64 {
    100
}

impl Default for SyncroConfig {
    fn default() -> Self {
        Self {
            registry_url: None,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            throttle_ms: default_throttle_ms(),
            retries: default_retries(),
            retry_min_time_ms: default_retry_min_time_ms(),
        }
    }
}

impl SyncroConfig {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SYNCRO_REGISTRY_URL, SYNCRO_THROTTLE_MS, ...)
    /// 2. Config file (~/.config/syncro/config.toml or SYNCRO_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: SyncroConfig =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable numbers are ignored.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_REGISTRY_URL", ENV_PREFIX)) {
            self.registry_url = if val.is_empty() { None } else { Some(val) };
        }

        if let Some(val) = env_number(&format!("{}_HEARTBEAT_INTERVAL_MS", ENV_PREFIX)) {
            self.heartbeat_interval_ms = val;
        }

        if let Some(val) = env_number(&format!("{}_THROTTLE_MS", ENV_PREFIX)) {
            self.throttle_ms = val;
        }

        if let Some(val) = env_number(&format!("{}_RETRIES", ENV_PREFIX)) {
            self.retries = val;
        }

        if let Some(val) = env_number(&format!("{}_RETRY_MIN_TIME_MS", ENV_PREFIX)) {
            self.retry_min_time_ms = val;
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SYNCRO_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("syncro")
            .join("config.toml")
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn retry_min_time(&self) -> Duration {
        Duration::from_millis(self.retry_min_time_ms)
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|val| val.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "SYNCRO_REGISTRY_URL",
        "SYNCRO_HEARTBEAT_INTERVAL_MS",
        "SYNCRO_THROTTLE_MS",
        "SYNCRO_RETRIES",
        "SYNCRO_RETRY_MIN_TIME_MS",
    ];

    #[test]
    fn test_default_config() {
        let config = SyncroConfig::default();
        assert!(config.registry_url.is_none());
        assert_eq!(config.throttle(), Duration::from_millis(250));
        assert_eq!(config.retries, 5);
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.retry_min_time(), Duration::from_millis(100));
    }

    #[test]
    fn test_env_override_registry_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = SyncroConfig::default();
        env::set_var("SYNCRO_REGISTRY_URL", "http://localhost:8787/syncro");
        config.apply_env_overrides();
        assert_eq!(
            config.registry_url.as_deref(),
            Some("http://localhost:8787/syncro")
        );

        // Empty string clears it
        env::set_var("SYNCRO_REGISTRY_URL", "");
        config.apply_env_overrides();
        assert!(config.registry_url.is_none());
    }

    #[test]
    fn test_env_override_numbers() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = SyncroConfig::default();
        env::set_var("SYNCRO_THROTTLE_MS", "40");
        env::set_var("SYNCRO_RETRIES", "2");
        env::set_var("SYNCRO_HEARTBEAT_INTERVAL_MS", "not-a-number");
        config.apply_env_overrides();

        assert_eq!(config.throttle_ms, 40);
        assert_eq!(config.retries, 2);
        assert_eq!(config.heartbeat_interval_ms, 30_000);
    }

    #[test]
    fn test_load_from_str_partial() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            registry_url = "https://api.example.com/syncro"
            throttle_ms = 100
        "#;

        let config = SyncroConfig::load_from_str(toml).unwrap();
        assert_eq!(
            config.registry_url.as_deref(),
            Some("https://api.example.com/syncro")
        );
        assert_eq!(config.throttle_ms, 100);
        assert_eq!(config.retries, 5);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let _guard = EnvGuard::new(ENV_VARS);

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = SyncroConfig {
            registry_url: Some("http://sync.example.com".to_string()),
            retries: 3,
            ..SyncroConfig::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = SyncroConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/syncro/config.toml");
        let config = SyncroConfig::load_from_path(&path).unwrap();
        assert_eq!(config, SyncroConfig::default());
    }
}
