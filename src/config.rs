use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ToolboxResult;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "TOOLBOX_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub currency: CurrencyConfig,
    pub cleanup: CleanupConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upload cap applied to every request body, in megabytes.
    pub body_limit_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    /// Upstream URL; `{base}` is replaced with the base currency code.
    pub api_url: String,
    pub ttl_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub job_ttl_secs: u64,
    pub orphan_max_age_secs: u64,
    /// Directories under the data root swept for orphan files.
    pub directories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            body_limit_mb: 100,
        }
    }
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.exchangerate-api.com/v4/latest/{base}".to_string(),
            ttl_secs: 60 * 60,
            request_timeout_secs: 10,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 15 * 60,
            job_ttl_secs: 60 * 60,
            orphan_max_age_secs: 2 * 60 * 60,
            directories: vec![
                "uploads".to_string(),
                "temp_files".to_string(),
                "processed".to_string(),
            ],
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
        }
    }
}

impl CurrencyConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl CleanupConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn job_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.job_ttl_secs as i64)
    }

    pub fn orphan_max_age(&self) -> Duration {
        Duration::from_secs(self.orphan_max_age_secs)
    }
}

impl StorageConfig {
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.data_dir.join("temp_files")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
            })
            .join("toolbox")
            .join("config.toml")
    }

    /// Load config from file, or return defaults if not found.
    ///
    /// Environment overrides are applied after the file is read.
    pub fn load() -> Self {
        let path = Self::config_path();

        let mut config = if path.exists() {
            match Self::from_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.apply_env();
        config.validate();
        config
    }

    /// Parse a config file without applying overrides.
    pub fn from_file(path: &Path) -> ToolboxResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Ok(host) = std::env::var("TOOLBOX_HOST") {
            self.server.host = host;
        }
        if let Ok(dir) = std::env::var("TOOLBOX_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("CURRENCY_API_URL") {
            self.currency.api_url = url;
        }
    }

    /// Validate and clamp config values to acceptable ranges
    fn validate(&mut self) {
        self.server.body_limit_mb = self.server.body_limit_mb.clamp(1, 1024);

        // Never sweep more often than once a minute.
        self.cleanup.interval_secs = self.cleanup.interval_secs.max(60);
        self.cleanup.job_ttl_secs = self.cleanup.job_ttl_secs.max(60);
        // Orphan sweeps must not reach results of jobs that are still live.
        self.cleanup.orphan_max_age_secs = self
            .cleanup
            .orphan_max_age_secs
            .max(self.cleanup.job_ttl_secs);

        self.currency.request_timeout_secs = self.currency.request_timeout_secs.clamp(1, 120);
    }

    /// Directories swept for orphan files, resolved against the data root.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.cleanup
            .directories
            .iter()
            .map(|d| self.storage.data_dir.join(d))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolboxError;

    #[test]
    fn test_defaults_match_schedule() {
        let config = Config::default();
        assert_eq!(config.cleanup.interval(), Duration::from_secs(900));
        assert_eq!(config.cleanup.job_ttl(), chrono::Duration::hours(1));
        assert_eq!(config.cleanup.orphan_max_age(), Duration::from_secs(7200));
        assert_eq!(config.currency.ttl(), Duration::from_secs(3600));
        assert_eq!(config.server.body_limit_mb, 100);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server]\nport = 8088\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.cleanup.directories.len(), 3);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = Config::default();
        config.cleanup.interval_secs = 1;
        config.server.body_limit_mb = 0;
        config.validate();
        assert_eq!(config.cleanup.interval_secs, 60);
        assert_eq!(config.server.body_limit_mb, 1);
    }

    #[test]
    fn test_orphan_age_never_below_job_ttl() {
        let mut config = Config::default();
        config.cleanup.job_ttl_secs = 7200;
        config.cleanup.orphan_max_age_secs = 600;
        config.validate();
        assert_eq!(config.cleanup.orphan_max_age_secs, 7200);

        let mut config = Config::default();
        config.validate();
        assert_eq!(config.cleanup.orphan_max_age_secs, 7200);
        assert_eq!(config.cleanup.job_ttl_secs, 3600);
    }

    #[test]
    fn test_watched_dirs_resolve_against_data_dir() {
        let mut config = Config::default();
        config.storage.data_dir = PathBuf::from("/srv/toolbox");
        let dirs = config.watched_dirs();
        assert_eq!(dirs[0], PathBuf::from("/srv/toolbox/uploads"));
        assert_eq!(dirs[2], PathBuf::from("/srv/toolbox/processed"));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ToolboxError::TomlParse(_))
        ));
    }
}
