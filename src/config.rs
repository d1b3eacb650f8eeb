//! Configuration file parser for ~/.config/rss-mcp/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::feed::fetcher::{build_client, FetchError, Fetcher, RandomUserAgent};
use crate::feed::{FeedClient, InstanceRegistry};

/// Overrides `priority_instance` when set to a non-blank value.
pub const PRIORITY_INSTANCE_ENV: &str = "PRIORITY_RSSHUB_INSTANCE";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Server configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Mirror tried before the built-in list.
    pub priority_instance: Option<String>,

    /// Items returned when a tool call omits `count` (0 = all).
    pub default_count: usize,

    /// Default batch width for `get_feeds`.
    pub concurrency: usize,

    pub request_timeout_secs: u64,

    pub max_redirects: usize,

    /// Pause between failed candidate attempts.
    pub retry_delay_ms: u64,

    /// Listen address for `rss-mcp http`.
    pub http_bind: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            priority_instance: None,
            default_count: 1,
            concurrency: 5,
            request_timeout_secs: 15,
            max_redirects: 3,
            retry_delay_ms: 100,
            http_bind: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "priority_instance",
        "default_count",
        "concurrency",
        "request_timeout_secs",
        "max_redirects",
        "retry_delay_ms",
        "http_bind",
    ];

    /// `~/.config/rss-mcp/config.toml`, or `None` when `HOME` is unset.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("rss-mcp")
                .join("config.toml"),
        )
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            priority_instance = ?config.priority_instance,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses TOML text; blank text yields defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        Ok(toml::from_str(content)?)
    }

    /// Applies environment overrides (currently [`PRIORITY_INSTANCE_ENV`]).
    pub fn apply_env(&mut self) {
        self.override_priority(std::env::var(PRIORITY_INSTANCE_ENV).ok());
    }

    /// Replaces `priority_instance` when `value` is non-blank.
    pub fn override_priority(&mut self, value: Option<String>) {
        if let Some(v) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            tracing::debug!(instance = %v, "Priority RSSHub instance overridden");
            self.priority_instance = Some(v);
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn registry(&self) -> InstanceRegistry {
        InstanceRegistry::new(self.priority_instance.as_deref())
    }

    /// Builds the feed client described by this configuration.
    pub fn feed_client(&self) -> Result<FeedClient, FetchError> {
        let timeout = self.request_timeout();
        let fetcher = Fetcher::new(
            build_client(timeout, self.max_redirects)?,
            Arc::new(RandomUserAgent::default()),
            timeout,
        );
        Ok(FeedClient::new(fetcher, self.registry()).with_retry_delay(self.retry_delay()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::RSSHUB_INSTANCES;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.priority_instance, None);
        assert_eq!(config.default_count, 1);
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.max_redirects, 3);
        assert_eq!(config.retry_delay(), Duration::from_millis(100));
        assert_eq!(config.http_bind, "127.0.0.1:3000");
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/rss_mcp_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("rss_mcp_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "   \n  \n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::from_toml("concurrency = 8\n").unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.default_count, 1);
        assert_eq!(config.http_bind, "127.0.0.1:3000");
    }

    #[test]
    fn test_full_config() {
        let content = r#"
priority_instance = "https://rsshub.example.org"
default_count = 0
concurrency = 2
request_timeout_secs = 30
max_redirects = 5
retry_delay_ms = 0
http_bind = "0.0.0.0:8080"
"#;
        let config = Config::from_toml(content).unwrap();
        assert_eq!(
            config.priority_instance.as_deref(),
            Some("https://rsshub.example.org")
        );
        assert_eq!(config.default_count, 0);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.retry_delay(), Duration::ZERO);
        assert_eq!(config.http_bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml("concurrency = 3\ntotally_fake_key = 1\n").unwrap();
        assert_eq!(config.concurrency, 3);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::from_toml("concurrency = \"many\"\n").is_err());
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("rss_mcp_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_priority_override() {
        let mut config = Config::from_toml("priority_instance = \"https://a.example\"").unwrap();

        config.override_priority(Some("   ".into()));
        assert_eq!(config.priority_instance.as_deref(), Some("https://a.example"));

        config.override_priority(None);
        assert_eq!(config.priority_instance.as_deref(), Some("https://a.example"));

        config.override_priority(Some(" https://b.example ".into()));
        assert_eq!(config.priority_instance.as_deref(), Some("https://b.example"));
    }

    #[test]
    fn test_registry_puts_priority_first() {
        let config = Config {
            priority_instance: Some("https://mine.example".into()),
            ..Config::default()
        };
        let registry = config.registry();
        assert_eq!(registry.instances()[0], "https://mine.example");
        assert_eq!(registry.len(), RSSHUB_INSTANCES.len() + 1);
    }
}
