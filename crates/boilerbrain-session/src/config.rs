//! Configuration for the session store.

use std::time::Duration;

use boilerbrain_types::{HasSessionConfig, ReadFailurePolicy, defaults};

/// Configuration for the session store.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum number of sessions to cache before LRU eviction.
    pub max_sessions: usize,

    /// Idle time after which the sweep drops a session from the cache.
    pub ttl: Duration,

    /// Interval for the sweep task. `None` means half the TTL.
    pub cleanup_interval: Option<Duration>,

    /// Backing-store table holding session records.
    pub table: String,

    /// Backing-store routine to run after each sweep, if any.
    pub maintenance_hook: Option<String>,

    /// What to do when a backing-store read fails.
    pub read_failure_policy: ReadFailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: defaults::MAX_SESSIONS,
            ttl: defaults::session_ttl(),
            cleanup_interval: None,
            table: defaults::SESSIONS_TABLE.to_string(),
            maintenance_hook: Some(defaults::MAINTENANCE_HOOK.to_string()),
            read_failure_policy: ReadFailurePolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from any session config provider.
    pub fn from_provider<C: HasSessionConfig>(config: &C) -> Self {
        Self {
            max_sessions: config.max_sessions(),
            ttl: config.session_ttl(),
            cleanup_interval: Some(config.cleanup_interval()),
            table: config.sessions_table(),
            maintenance_hook: config.maintenance_hook(),
            read_failure_policy: config.read_failure_policy(),
        }
    }

    /// Set the maximum number of sessions to cache.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the idle TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the sweep interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Set the sessions table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set or clear the post-sweep maintenance hook.
    pub fn with_maintenance_hook(mut self, hook: Option<String>) -> Self {
        self.maintenance_hook = hook;
        self
    }

    /// Set the read failure policy.
    pub fn with_read_failure_policy(mut self, policy: ReadFailurePolicy) -> Self {
        self.read_failure_policy = policy;
        self
    }

    /// Effective sweep interval.
    pub fn effective_cleanup_interval(&self) -> Duration {
        self.cleanup_interval.unwrap_or(self.ttl / 2)
    }
}
