//! Error types for session persistence.
//!
//! The public [`SessionStore`](crate::SessionStore) API never returns these:
//! they are produced internally, logged, counted and then masked.

use boilerbrain_types::StoreError;

/// Error type for session persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A stored session record could not be decoded.
    #[error("Malformed session record {id}: {reason}")]
    Decode { id: String, reason: String },

    /// A session could not be encoded for storage.
    #[error("Failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),

    /// Error from the backing store.
    #[error("Backing store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for session persistence operations.
pub type Result<T> = std::result::Result<T, SessionError>;
