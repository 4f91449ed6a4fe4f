//! Configuration traits for decoupled config passing between crates.
//!
//! Components depend on a configuration capability rather than on the full
//! configuration structure. The config crate implements these traits for its
//! file-backed sections; tests use the standalone providers below.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Base trait for all configuration types.
pub trait ConfigProvider: Clone + Send + Sync + 'static {}

/// What the session layer does when a backing-store read fails.
///
/// A failed read always yields a usable fresh session. The policies differ
/// in whether that fresh session is cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Cache the fresh session, treating a failure exactly like "not found".
    #[default]
    CacheFresh,
    /// Return the fresh session without caching it, so the next access
    /// probes the backing store again.
    RetryNextAccess,
}

/// Session store configuration.
pub trait HasSessionConfig: ConfigProvider {
    /// Maximum number of sessions held in the LRU cache.
    fn max_sessions(&self) -> usize;

    /// Idle time after which a cached session is swept from the cache.
    fn session_ttl(&self) -> Duration;

    /// Interval between expiry sweeps. Defaults to half the TTL.
    fn cleanup_interval(&self) -> Duration {
        self.session_ttl() / 2
    }

    /// Backing-store table that holds session records.
    fn sessions_table(&self) -> String {
        defaults::SESSIONS_TABLE.to_string()
    }

    /// Backing-store maintenance hook invoked after each sweep.
    fn maintenance_hook(&self) -> Option<String> {
        Some(defaults::MAINTENANCE_HOOK.to_string())
    }

    /// Behaviour on backing-store read failure.
    fn read_failure_policy(&self) -> ReadFailurePolicy {
        ReadFailurePolicy::default()
    }
}

/// Cached query executor configuration.
pub trait HasQueryConfig: ConfigProvider {
    /// Maximum number of attempts for an operation that keeps failing transiently.
    fn max_retries(&self) -> u32;

    /// Base delay for exponential backoff.
    fn base_backoff(&self) -> Duration {
        defaults::base_backoff()
    }

    /// Latency above which a query is reported as slow.
    fn slow_query_threshold(&self) -> Duration {
        defaults::slow_query_threshold()
    }

    /// Cache timeout used when a caller does not give one. `None` never expires.
    fn default_cache_timeout(&self) -> Option<Duration> {
        Some(defaults::cache_timeout())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    pub const MAX_SESSIONS: usize = 1_000;
    pub const SESSION_TTL_SECS: u64 = 3_600;
    pub const SESSIONS_TABLE: &str = "chat_sessions";
    pub const MAINTENANCE_HOOK: &str = "cleanup_expired_sessions";
    pub const MAX_RETRIES: u32 = 3;
    pub const BASE_BACKOFF_MS: u64 = 100;
    pub const SLOW_QUERY_MS: u64 = 500;
    pub const CACHE_TIMEOUT_SECS: u64 = 300;

    pub fn session_ttl() -> Duration {
        Duration::from_secs(SESSION_TTL_SECS)
    }

    pub fn base_backoff() -> Duration {
        Duration::from_millis(BASE_BACKOFF_MS)
    }

    pub fn slow_query_threshold() -> Duration {
        Duration::from_millis(SLOW_QUERY_MS)
    }

    pub fn cache_timeout() -> Duration {
        Duration::from_secs(CACHE_TIMEOUT_SECS)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Standalone providers
// ─────────────────────────────────────────────────────────────────────────────

/// Standalone session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfigProvider {
    pub max_sessions: usize,
    pub session_ttl: Duration,
    pub cleanup_interval: Option<Duration>,
    pub read_failure_policy: ReadFailurePolicy,
}

impl Default for SessionConfigProvider {
    fn default() -> Self {
        Self {
            max_sessions: defaults::MAX_SESSIONS,
            session_ttl: defaults::session_ttl(),
            cleanup_interval: None,
            read_failure_policy: ReadFailurePolicy::default(),
        }
    }
}

impl ConfigProvider for SessionConfigProvider {}

impl HasSessionConfig for SessionConfigProvider {
    fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval.unwrap_or(self.session_ttl / 2)
    }

    fn read_failure_policy(&self) -> ReadFailurePolicy {
        self.read_failure_policy
    }
}

/// Standalone query configuration.
#[derive(Debug, Clone)]
pub struct QueryConfigProvider {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for QueryConfigProvider {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            base_backoff: defaults::base_backoff(),
        }
    }
}

impl ConfigProvider for QueryConfigProvider {}

impl HasQueryConfig for QueryConfigProvider {
    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn base_backoff(&self) -> Duration {
        self.base_backoff
    }
}
