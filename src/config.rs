//! Service configuration.
//!
//! Settings come from an optional TOML file (missing file → defaults) and are
//! then overridden by environment variables, which is how deployments set the
//! port, database, AI key and feed list. A `.env` file is honoured by `main`
//! through `dotenvy` before this module reads the environment.
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level service configuration.
///
/// Every field has a default so any subset of keys can be given. The Gemini key
/// is masked in `Debug` output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listening port.
    pub port: u16,

    /// SQLite database location. `sqlite:` and `file:` prefixes are accepted.
    pub database_url: String,

    /// Gemini API key (`GEMINI_API_KEY`).
    pub gemini_api_key: Option<SecretString>,

    /// Gemini model name used for every generation call.
    pub gemini_model: String,

    /// Base URL of the Generative Language REST API.
    pub gemini_base_url: String,

    /// Feed URLs registered at startup when not already known.
    pub rss_feeds: Vec<String>,

    /// Minutes between scheduled feed checks.
    pub feed_check_interval_minutes: u64,

    /// Keyword that reports are restricted to (case-insensitive). `None` = all articles.
    pub report_topic: Option<String>,

    /// Number of latest articles the scheduled word-frequency job analyses.
    pub word_frequency_articles: i64,

    /// System log rows older than this many days are deleted by the cleanup job.
    pub log_retention_days: i64,

    /// Deployment environment name. Internal error detail is only exposed in "development".
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: "newsdesk.db".to_string(),
            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            rss_feeds: Vec::new(),
            feed_check_interval_minutes: 15,
            report_topic: None,
            word_frequency_articles: 10,
            log_retention_days: 30,
            environment: "development".to_string(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("rss_feeds", &self.rss_feeds)
            .field(
                "feed_check_interval_minutes",
                &self.feed_check_interval_minutes,
            )
            .field("report_topic", &self.report_topic)
            .field("word_frequency_articles", &self.word_frequency_articles)
            .field("log_retention_days", &self.log_retention_days)
            .field("environment", &self.environment)
            .finish()
    }
}

impl Config {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "port",
        "database_url",
        "gemini_api_key",
        "gemini_model",
        "gemini_base_url",
        "rss_feeds",
        "feed_check_interval_minutes",
        "report_topic",
        "word_frequency_articles",
        "log_retention_days",
        "environment",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warnings
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
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

        let content = std::fs::read_to_string(path)?;
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

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Load the file, apply process environment overrides and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from environment-style variables.
    ///
    /// `lookup` abstracts `std::env::var` so tests don't have to mutate the
    /// process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            self.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                reason: format!("'{port}' is not a port number"),
            })?;
        }
        if let Some(url) = get("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(key) = get("GEMINI_API_KEY") {
            self.gemini_api_key = Some(SecretString::from(key));
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.gemini_model = model;
        }
        if let Some(base) = get("GEMINI_BASE_URL") {
            self.gemini_base_url = base;
        }
        if let Some(feeds) = get("RSS_FEEDS") {
            self.rss_feeds = feeds
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(interval) = get("FEED_CHECK_INTERVAL") {
            self.feed_check_interval_minutes =
                interval.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: "FEED_CHECK_INTERVAL",
                    reason: format!("'{interval}' is not a number of minutes"),
                })?;
        }
        if let Some(topic) = get("REPORT_TOPIC") {
            self.report_topic = Some(topic.trim().to_string());
        }
        if let Some(env) = get("APP_ENV").or_else(|| get("NODE_ENV")) {
            self.environment = env;
        }
        Ok(())
    }

    /// Reject values the scheduler or storage layer can't work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=59).contains(&self.feed_check_interval_minutes) {
            return Err(ConfigError::Invalid {
                key: "feed_check_interval_minutes",
                reason: format!(
                    "{} is outside 1..=59 minutes",
                    self.feed_check_interval_minutes
                ),
            });
        }
        if self.word_frequency_articles <= 0 {
            return Err(ConfigError::Invalid {
                key: "word_frequency_articles",
                reason: "must be positive".to_string(),
            });
        }
        if self.log_retention_days <= 0 {
            return Err(ConfigError::Invalid {
                key: "log_retention_days",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Database path with any `sqlite:`/`file:` URL prefix removed.
    pub fn database_path(&self) -> &str {
        let url = self.database_url.trim();
        url.strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url)
    }

    /// The Gemini key, if one is set and not blank.
    pub fn gemini_key(&self) -> Option<SecretString> {
        self.gemini_api_key
            .as_ref()
            .filter(|k| !k.expose_secret().trim().is_empty())
            .cloned()
    }

    /// `GEMINI_API_KEY=mock` selects canned AI replies.
    pub fn uses_mock_ai(&self) -> bool {
        self.gemini_key()
            .is_some_and(|k| k.expose_secret().trim() == "mock")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Topic filter, ignoring blank values.
    pub fn report_topic(&self) -> Option<&str> {
        self.report_topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.feed_check_interval_minutes, 15);
        assert_eq!(config.word_frequency_articles, 10);
        assert_eq!(config.log_retention_days, 30);
        assert!(config.rss_feeds.is_empty());
        assert!(config.gemini_api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/newsdesk_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = std::env::temp_dir().join("newsdesk_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("newsdesk.toml");
        std::fs::write(
            &path,
            "port = 8080\nrss_feeds = [\"https://a.example/rss\"]\nunknown_key = 1\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.rss_feeds, vec!["https://a.example/rss".to_string()]);
        assert_eq!(config.feed_check_interval_minutes, 15);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("newsdesk_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("newsdesk.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("PORT", "4000"),
                ("DATABASE_URL", "file:./dev.db"),
                ("GEMINI_API_KEY", "secret"),
                ("RSS_FEEDS", " https://a.example/rss , ,https://b.example/rss"),
                ("FEED_CHECK_INTERVAL", "5"),
                ("REPORT_TOPIC", "Gaziantep"),
                ("NODE_ENV", "production"),
            ]))
            .unwrap();

        assert_eq!(config.port, 4000);
        assert_eq!(config.database_path(), "./dev.db");
        assert_eq!(
            config.gemini_key().map(|k| k.expose_secret().to_string()),
            Some("secret".to_string())
        );
        assert_eq!(
            config.rss_feeds,
            vec![
                "https://a.example/rss".to_string(),
                "https://b.example/rss".to_string()
            ]
        );
        assert_eq!(config.feed_check_interval_minutes, 5);
        assert_eq!(config.report_topic(), Some("Gaziantep"));
        assert!(!config.is_development());
    }

    #[test]
    fn test_env_invalid_interval() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("FEED_CHECK_INTERVAL", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "FEED_CHECK_INTERVAL",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_interval_bounds() {
        let mut config = Config::default();
        config.feed_check_interval_minutes = 0;
        assert!(config.validate().is_err());
        config.feed_check_interval_minutes = 60;
        assert!(config.validate().is_err());
        config.feed_check_interval_minutes = 59;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_path_prefixes() {
        let mut config = Config::default();
        config.database_url = "sqlite://data/news.db".to_string();
        assert_eq!(config.database_path(), "data/news.db");
        config.database_url = "sqlite:news.db".to_string();
        assert_eq!(config.database_path(), "news.db");
        config.database_url = "news.db".to_string();
        assert_eq!(config.database_path(), "news.db");
    }

    #[test]
    fn test_debug_masks_api_key() {
        let mut config = Config::default();
        config.gemini_api_key = Some(SecretString::from("super-secret-key-12345"));

        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-key-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_api_key_from_file_stays_secret() {
        let dir = std::env::temp_dir().join("newsdesk_config_test_key");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("newsdesk.toml");
        std::fs::write(&path, "gemini_api_key = \"dosya-anahtari\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.gemini_key().map(|k| k.expose_secret().to_string()),
            Some("dosya-anahtari".to_string())
        );
        assert!(!config.uses_mock_ai());
        assert!(!format!("{config:?}").contains("dosya-anahtari"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_mock_key_selects_canned_ai() {
        let mut config = Config::default();
        config.apply_env(env(&[("GEMINI_API_KEY", "mock")])).unwrap();
        assert!(config.uses_mock_ai());
        assert!(!Config::default().uses_mock_ai());
    }

    #[test]
    fn test_blank_topic_is_none() {
        let mut config = Config::default();
        config.report_topic = Some("   ".to_string());
        assert_eq!(config.report_topic(), None);
    }
}
