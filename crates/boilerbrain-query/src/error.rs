//! Error types for query execution.

use boilerbrain_types::StoreError;
use thiserror::Error;

/// Result type alias using the query error type.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Why a query produced no data.
///
/// Callers get exactly one failure shape: either the store answered with a
/// business error, or it stayed unreachable through every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The store answered with an error. Returned as-is, never retried.
    #[error("{0}")]
    Rejected(StoreError),

    /// Every attempt failed transiently.
    #[error("query failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: StoreError },
}

impl QueryError {
    /// The underlying store error.
    pub fn store_error(&self) -> &StoreError {
        match self {
            Self::Rejected(e) => e,
            Self::RetriesExhausted { last, .. } => last,
        }
    }

    /// Machine-readable code of the underlying store error.
    pub fn code(&self) -> &str {
        self.store_error().code()
    }

    /// Human-readable message of the underlying store error.
    pub fn message(&self) -> String {
        self.store_error().to_string()
    }

    /// Check if retries were exhausted.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}
