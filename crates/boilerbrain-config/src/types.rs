//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use boilerbrain_types::{
    ConfigProvider, HasQueryConfig, HasSessionConfig, ReadFailurePolicy, defaults,
};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Application name for directory resolution.
pub(crate) const APP_NAME: &str = "boilerbrain";

// ─────────────────────────────────────────────────────────────────────────────
// Root
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration.
///
/// Every section is optional; a missing section means defaults. When layers
/// are merged a section present in a later file replaces the earlier one
/// wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoilerbrainConfig {
    pub session: Option<SessionSection>,
    pub query: Option<QuerySection>,
    pub store: Option<StoreSection>,
    pub logging: Option<LoggingSection>,
}

impl BoilerbrainConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: BoilerbrainConfig) {
        if other.session.is_some() {
            self.session = other.session;
        }

        if other.query.is_some() {
            self.query = other.query;
        }

        if other.store.is_some() {
            self.store = other.store;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Session section, or defaults.
    pub fn session(&self) -> SessionSection {
        self.session.clone().unwrap_or_default()
    }

    /// Query section, or defaults.
    pub fn query(&self) -> QuerySection {
        self.query.clone().unwrap_or_default()
    }

    /// Store section, or defaults.
    pub fn store(&self) -> StoreSection {
        self.store.clone().unwrap_or_default()
    }

    /// Logging section, or defaults.
    pub fn logging(&self) -> LoggingSection {
        self.logging.clone().unwrap_or_default()
    }

    /// The fully-resolved config, with every section filled in.
    pub fn resolved(&self) -> Self {
        Self {
            session: Some(self.session()),
            query: Some(self.query()),
            store: Some(self.store()),
            logging: Some(self.logging()),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(session) = &self.session {
            if session.ttl_secs == 0 {
                return Err(invalid("session.ttl_secs", "must be greater than zero"));
            }
            if session.cleanup_interval_secs == Some(0) {
                return Err(invalid(
                    "session.cleanup_interval_secs",
                    "must be greater than zero",
                ));
            }
        }
        if let Some(query) = &self.query
            && query.max_retries == 0
        {
            return Err(invalid("query.max_retries", "at least one attempt is required"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Session cache configuration.
///
/// ```toml
/// [session]
/// max_sessions = 1000
/// ttl_secs = 3600
/// # cleanup_interval_secs = 1800   # defaults to half the TTL
/// table = "chat_sessions"
/// maintenance_hook = "cleanup_expired_sessions"   # "" disables
/// read_failure_policy = "cache_fresh"             # or "retry_next_access"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub max_sessions: usize,
    pub ttl_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_interval_secs: Option<u64>,
    pub table: String,
    pub maintenance_hook: String,
    pub read_failure_policy: ReadFailurePolicy,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_sessions: defaults::MAX_SESSIONS,
            ttl_secs: defaults::SESSION_TTL_SECS,
            cleanup_interval_secs: None,
            table: defaults::SESSIONS_TABLE.to_string(),
            maintenance_hook: defaults::MAINTENANCE_HOOK.to_string(),
            read_failure_policy: ReadFailurePolicy::default(),
        }
    }
}

impl ConfigProvider for SessionSection {}

impl HasSessionConfig for SessionSection {
    fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.session_ttl() / 2)
    }

    fn sessions_table(&self) -> String {
        self.table.clone()
    }

    fn maintenance_hook(&self) -> Option<String> {
        (!self.maintenance_hook.is_empty()).then(|| self.maintenance_hook.clone())
    }

    fn read_failure_policy(&self) -> ReadFailurePolicy {
        self.read_failure_policy
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query
// ─────────────────────────────────────────────────────────────────────────────

/// Cached query executor configuration.
///
/// ```toml
/// [query]
/// max_retries = 3
/// base_backoff_ms = 100
/// slow_query_ms = 500
/// cache_timeout_secs = 300   # 0 means cached results never expire
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySection {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub slow_query_ms: u64,
    pub cache_timeout_secs: u64,
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            base_backoff_ms: defaults::BASE_BACKOFF_MS,
            slow_query_ms: defaults::SLOW_QUERY_MS,
            cache_timeout_secs: defaults::CACHE_TIMEOUT_SECS,
        }
    }
}

impl ConfigProvider for QuerySection {}

impl HasQueryConfig for QuerySection {
    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_query_ms)
    }

    fn default_cache_timeout(&self) -> Option<Duration> {
        (self.cache_timeout_secs > 0).then(|| Duration::from_secs(self.cache_timeout_secs))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Backing store configuration.
///
/// ```toml
/// [store]
/// path = "/var/lib/boilerbrain/boilerbrain.db"
/// retention_days = 30
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// SQLite database file. Defaults to the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Session records not updated for this many days are deleted by the
    /// maintenance hook. 0 keeps them forever.
    pub retention_days: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: None,
            retention_days: 30,
        }
    }
}

impl StoreSection {
    /// Resolved database path.
    pub fn db_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| data_dir().join("boilerbrain.db"))
    }

    /// Retention window for durable session records.
    pub fn retention(&self) -> Option<Duration> {
        (self.retention_days > 0).then(|| Duration::from_secs(self.retention_days * 86_400))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration.
///
/// ```toml
/// [logging]
/// level = "info"
/// file = true
/// dir = "/var/log/boilerbrain"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default console filter when `RUST_LOG` is unset.
    pub level: String,

    /// Whether to write JSON logs to a daily-rolling file.
    pub file: bool,

    /// Directory for log files. Defaults to `<data dir>/logs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
            dir: None,
        }
    }
}

impl LoggingSection {
    /// Resolved log directory.
    pub fn log_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| data_dir().join("logs"))
    }
}

/// Platform data directory for boilerbrain, falling back to the working
/// directory when the platform has none.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from(".boilerbrain"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BoilerbrainConfig::from_toml("").unwrap();
        assert_eq!(config, BoilerbrainConfig::default());

        let session = config.session();
        assert_eq!(session.max_sessions(), 1_000);
        assert_eq!(session.session_ttl(), Duration::from_secs(3_600));
        assert_eq!(session.cleanup_interval(), Duration::from_secs(1_800));
        assert_eq!(session.maintenance_hook().as_deref(), Some("cleanup_expired_sessions"));

        let query = config.query();
        assert_eq!(query.max_retries(), 3);
        assert_eq!(query.base_backoff(), Duration::from_millis(100));
        assert_eq!(query.default_cache_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_parse_sections() {
        let config = BoilerbrainConfig::from_toml(
            r#"
[session]
max_sessions = 50
ttl_secs = 600
maintenance_hook = ""
read_failure_policy = "retry_next_access"

[query]
max_retries = 5
cache_timeout_secs = 0

[store]
path = "/tmp/bb.db"
retention_days = 0

[logging]
level = "debug"
file = false
"#,
        )
        .unwrap();

        let session = config.session();
        assert_eq!(session.max_sessions, 50);
        assert_eq!(session.cleanup_interval(), Duration::from_secs(300));
        assert_eq!(session.maintenance_hook(), None);
        assert_eq!(session.read_failure_policy(), ReadFailurePolicy::RetryNextAccess);
        assert_eq!(session.table, "chat_sessions");

        assert_eq!(config.query().max_retries(), 5);
        assert_eq!(config.query().default_cache_timeout(), None);

        assert_eq!(config.store().db_path(), PathBuf::from("/tmp/bb.db"));
        assert_eq!(config.store().retention(), None);
        assert!(!config.logging().file);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = BoilerbrainConfig::from_toml("[session]\nttl_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "session.ttl_secs", .. }));

        let err = BoilerbrainConfig::from_toml("[query]\nmax_retries = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_unknown_policy_is_a_parse_error() {
        let err =
            BoilerbrainConfig::from_toml("[session]\nread_failure_policy = \"panic\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_merge_replaces_sections() {
        let mut base = BoilerbrainConfig::from_toml("[session]\nmax_sessions = 10\n[query]\nmax_retries = 4\n")
            .unwrap();
        let overlay = BoilerbrainConfig::from_toml("[session]\nttl_secs = 60\n").unwrap();
        base.merge(overlay);

        assert_eq!(base.session().max_sessions, 1_000);
        assert_eq!(base.session().ttl_secs, 60);
        assert_eq!(base.query().max_retries, 4);
    }

    #[test]
    fn test_resolved_roundtrips_through_toml() {
        let resolved = BoilerbrainConfig::new().resolved();
        let text = resolved.to_toml().unwrap();
        assert!(text.contains("[session]"));
        assert!(text.contains("max_retries = 3"));

        let reparsed = BoilerbrainConfig::from_toml(&text).unwrap();
        assert_eq!(reparsed, resolved);
    }
}
