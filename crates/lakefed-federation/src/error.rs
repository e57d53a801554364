//! Error types for lakefed-federation
//!
//! Every failure surfaced to the host engine carries exactly one
//! classification from [`ErrorKind`]. The classification decides retry
//! behavior: throttling is retryable everywhere, connection failures are
//! retryable only while establishing a connection, and credential failures
//! are never retried.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for federation operations
pub type Result<T> = std::result::Result<T, FederationError>;

/// Failure classification surfaced to the host engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Authentication or authorization failure. Never retried.
    InvalidCredentials,
    /// Network-level failure reaching the warehouse. Retried only while
    /// establishing a connection.
    Connection,
    /// Catalog, schema, table, or column does not exist
    EntityNotFound,
    /// Rate limiting or temporary unavailability. Retried with backoff.
    Throttled,
    /// Malformed request, descriptor, or token
    InvalidInput,
    /// Unexpected failure with no more specific classification
    Internal,
}

impl ErrorKind {
    /// Wire code reported to the host in the failure payload
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Connection => "CONNECTION_ERROR",
            Self::EntityNotFound => "ENTITY_NOT_FOUND",
            Self::Throttled => "THROTTLED",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Whether the general retry policy may re-attempt this failure
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Throttled)
    }

    /// Whether a connection attempt may be re-attempted after this failure.
    ///
    /// Wider than [`is_retryable`](Self::is_retryable): transport-level
    /// failures are worth retrying while dialing, but never once a
    /// connection exists. Credential failures stay non-retryable in both
    /// policies.
    pub const fn is_retryable_for_connect(self) -> bool {
        matches!(self, Self::Throttled | Self::Connection)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Fixed failure payload handed back to the host engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Classification code
    pub error_code: ErrorKind,
    /// Human-readable message
    pub message: String,
}

/// Error type for all federation operations
#[derive(Error, Debug)]
pub enum FederationError {
    /// Authentication or authorization failure
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Network-level connection failure
    #[error("connection error: {0}")]
    Connection(String),

    /// Referenced entity does not exist
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// Rate limited or temporarily unavailable
    #[error("throttled: {0}")]
    Throttled(String),

    /// Malformed input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unexpected internal failure
    #[error("internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FederationError {
    /// Create an invalid-credentials error
    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::InvalidCredentials(message.into())
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create an entity-not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::EntityNotFound(message.into())
    }

    /// Create a throttled error
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::Throttled(message.into())
    }

    /// Create an invalid-input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an error with an explicit classification
    pub fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        match kind {
            ErrorKind::InvalidCredentials => Self::InvalidCredentials(message.into()),
            ErrorKind::Connection => Self::Connection(message.into()),
            ErrorKind::EntityNotFound => Self::EntityNotFound(message.into()),
            ErrorKind::Throttled => Self::Throttled(message.into()),
            ErrorKind::InvalidInput => Self::InvalidInput(message.into()),
            ErrorKind::Internal => Self::Internal(message.into()),
        }
    }

    /// Get the classification of this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredentials(_) => ErrorKind::InvalidCredentials,
            Self::Connection(_) => ErrorKind::Connection,
            Self::EntityNotFound(_) => ErrorKind::EntityNotFound,
            Self::Throttled(_) => ErrorKind::Throttled,
            Self::InvalidInput(_) | Self::Json(_) => ErrorKind::InvalidInput,
            Self::Internal(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Whether the general retry policy may re-attempt this error
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Whether a connection attempt may be re-attempted after this error
    pub const fn is_retryable_for_connect(&self) -> bool {
        self.kind().is_retryable_for_connect()
    }

    /// Fixed payload surfaced to the host on failure
    pub fn error_payload(&self) -> ErrorPayload {
        ErrorPayload {
            error_code: self.kind(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            FederationError::invalid_credentials("bad token").kind(),
            ErrorKind::InvalidCredentials
        );
        assert_eq!(
            FederationError::connection("refused").kind(),
            ErrorKind::Connection
        );
        assert_eq!(
            FederationError::not_found("no such table").kind(),
            ErrorKind::EntityNotFound
        );
        assert_eq!(
            FederationError::throttled("slow down").kind(),
            ErrorKind::Throttled
        );
        assert_eq!(
            FederationError::invalid_input("bad token text").kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            FederationError::internal("boom").kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_retry_policies() {
        assert!(ErrorKind::Throttled.is_retryable());
        assert!(!ErrorKind::Connection.is_retryable());
        assert!(!ErrorKind::InvalidCredentials.is_retryable());
        assert!(!ErrorKind::Internal.is_retryable());

        assert!(ErrorKind::Throttled.is_retryable_for_connect());
        assert!(ErrorKind::Connection.is_retryable_for_connect());
        assert!(!ErrorKind::InvalidCredentials.is_retryable_for_connect());
        assert!(!ErrorKind::EntityNotFound.is_retryable_for_connect());
    }

    #[test]
    fn test_error_payload() {
        let err = FederationError::throttled("rate limit exceeded");
        let payload = err.error_payload();
        assert_eq!(payload.error_code, ErrorKind::Throttled);
        assert!(payload.message.contains("rate limit exceeded"));
    }

    #[test]
    fn test_payload_code_serialization() {
        let json = serde_json::to_string(&ErrorKind::InvalidCredentials).unwrap();
        assert_eq!(json, "\"INVALID_CREDENTIALS\"");
        let json = serde_json::to_string(&ErrorKind::EntityNotFound).unwrap();
        assert_eq!(json, "\"ENTITY_NOT_FOUND\"");
    }

    #[test]
    fn test_json_error_classifies_as_invalid_input() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err = FederationError::from(parse_err);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
