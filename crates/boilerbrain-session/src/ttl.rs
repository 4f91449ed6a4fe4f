//! TTL policy for idle-session expiry.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Decides when a cached session has been idle too long.
///
/// Expiry is judged against the session's own `updated_at`, which is bumped
/// on every read through the cache, so a session only expires when nobody
/// has touched it for a full TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    ttl: Duration,
}

impl ExpiryPolicy {
    /// Create a policy with the given idle TTL.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Oldest `updated_at` that is still live at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now.checked_sub_signed(ttl).unwrap_or(DateTime::<Utc>::MIN_UTC),
            Err(_) => DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Check whether a session last touched at `updated_at` has expired at `now`.
    pub fn is_expired(&self, updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        updated_at < self.cutoff(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_not_expired() {
        let policy = ExpiryPolicy::new(Duration::from_secs(60));
        let now = Utc::now();
        assert!(!policy.is_expired(now, now));
        assert!(!policy.is_expired(now - chrono::Duration::seconds(59), now));
    }

    #[test]
    fn test_idle_session_expired() {
        let policy = ExpiryPolicy::new(Duration::from_secs(60));
        let now = Utc::now();
        assert!(policy.is_expired(now - chrono::Duration::seconds(61), now));
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let policy = ExpiryPolicy::new(Duration::from_secs(u64::MAX));
        let now = Utc::now();
        assert!(!policy.is_expired(DateTime::<Utc>::MIN_UTC, now));
    }
}
