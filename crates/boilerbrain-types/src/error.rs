//! Error taxonomy for backing-store calls.

/// Result type for backing-store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by a [`BackingStore`](crate::BackingStore).
///
/// The variants split into two families. Transient errors (`Unavailable`,
/// `Timeout`) describe the store being unreachable and are worth retrying.
/// Everything else is a business error: the store answered, and the answer
/// was "no". Business errors are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or refused the connection.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete in time.
    #[error("store timed out: {0}")]
    Timeout(String),

    /// No record exists under the given key.
    #[error("record not found: {table}/{key}")]
    NotFound { table: String, key: String },

    /// A record already exists under the given key.
    #[error("record already exists: {table}/{key}")]
    Conflict { table: String, key: String },

    /// The store rejected the request with a structured error.
    #[error("rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    /// A stored or supplied record could not be interpreted.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// The store does not implement the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl StoreError {
    /// Shorthand for a [`StoreError::NotFound`].
    pub fn not_found(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Shorthand for a [`StoreError::Conflict`].
    pub fn conflict(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Conflict {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Shorthand for a [`StoreError::Rejected`].
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true if the failure is transient and the call may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Rejected { code, .. } => code,
            Self::Malformed(_) => "malformed",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Malformed(err.to_string())
    }
}
