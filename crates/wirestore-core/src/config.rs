//! Client configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/wirestore/config.toml)
//! 3. Environment variables (WIRESTORE_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "WIRESTORE";

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket endpoint of the remote side
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Client-visible display name, used in status notifications
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Directory for durable snapshots
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Initial reconnect delay in milliseconds
    #[serde(default = "default_initial_reconnect_delay_ms")]
    pub initial_reconnect_delay_ms: u64,

    /// Maximum reconnect delay in milliseconds
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            client_name: default_client_name(),
            data_dir: default_data_dir(),
            initial_reconnect_delay_ms: default_initial_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
        }
    }
}

impl Config {
    /// Load configuration from the default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (WIRESTORE_ENDPOINT, WIRESTORE_CLIENT_NAME,
    ///    WIRESTORE_DATA_DIR)
    /// 2. Config file (~/.config/wirestore/config.toml or WIRESTORE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides. If the file
    /// doesn't exist, defaults are used.
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
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_ENDPOINT", ENV_PREFIX)) {
            if !val.is_empty() {
                self.endpoint = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_CLIENT_NAME", ENV_PREFIX)) {
            if !val.is_empty() {
                self.client_name = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            if !val.is_empty() {
                self.data_dir = PathBuf::from(val);
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with the WIRESTORE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wirestore")
            .join("config.toml")
    }

    /// Directory where per-store snapshots are written
    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    /// Initial reconnect delay
    pub fn initial_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.initial_reconnect_delay_ms)
    }

    /// Maximum reconnect delay
    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }
}

fn default_endpoint() -> String {
    "ws://localhost:8000/ws".to_string()
}

fn default_client_name() -> String {
    "wirestore".to_string()
}

fn default_initial_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wirestore")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap();
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            // Clear all the vars
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
        "WIRESTORE_ENDPOINT",
        "WIRESTORE_CLIENT_NAME",
        "WIRESTORE_DATA_DIR",
    ];

    #[test]
    fn test_default_config() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::default();
        assert_eq!(config.endpoint, "ws://localhost:8000/ws");
        assert_eq!(config.client_name, "wirestore");
        assert!(config.data_dir.ends_with("wirestore"));
        assert_eq!(config.initial_reconnect_delay(), Duration::from_secs(1));
        assert_eq!(config.max_reconnect_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_env_override_endpoint() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("WIRESTORE_ENDPOINT", "ws://example.com/ws");
        config.apply_env_overrides();
        assert_eq!(config.endpoint, "ws://example.com/ws");
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("WIRESTORE_DATA_DIR", "/tmp/wirestore-test");
        config.apply_env_overrides();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/wirestore-test"));
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            endpoint = "ws://sync.example.com/ws"
            client_name = "Backend"
            data_dir = "/custom/data"
            initial_reconnect_delay_ms = 250
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.endpoint, "ws://sync.example.com/ws");
        assert_eq!(config.client_name, "Backend");
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.initial_reconnect_delay(), Duration::from_millis(250));
        // Unspecified fields fall back to defaults.
        assert_eq!(config.max_reconnect_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.endpoint, "ws://localhost:8000/ws");
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            endpoint: "ws://sync.example.com/ws".to_string(),
            client_name: "Backend".to_string(),
            data_dir: PathBuf::from("/data/wirestore"),
            initial_reconnect_delay_ms: 500,
            max_reconnect_delay_ms: 10_000,
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.endpoint, config.endpoint);
        assert_eq!(parsed.client_name, config.client_name);
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(
            parsed.initial_reconnect_delay_ms,
            config.initial_reconnect_delay_ms
        );
    }

    #[test]
    fn test_snapshot_dir() {
        let config = Config {
            data_dir: PathBuf::from("/data/wirestore"),
            ..Config::default()
        };
        assert_eq!(
            config.snapshot_dir(),
            PathBuf::from("/data/wirestore/snapshots")
        );
    }
}
