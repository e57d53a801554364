//! Splits, spill descriptors, and continuation tokens
//!
//! A split is one independently executable unit of a table scan: a property
//! bag describing which slice of the table to read, plus where the executor
//! should spill oversized results and which key encrypts them. This crate
//! only constructs and propagates the spill/encryption descriptors; the
//! actual spill IO lives in the host runtime.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{FederationError, Result};

/// Split property recording the host-side partition ordinal.
///
/// Bookkeeping only; never rendered into a partition predicate.
pub const PROP_PARTITION_ID: &str = "partition_id";

/// Split property recording which part of a partition this split covers.
///
/// Bookkeeping only; never rendered into a partition predicate.
pub const PROP_SPLIT_PART: &str = "split_part";

/// Split property recording how many parts a partition was divided into.
///
/// Bookkeeping only; never rendered into a partition predicate.
pub const PROP_SPLIT_COUNT: &str = "split_count";

/// Location where an executor spills result blocks too large to inline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpillLocation {
    /// Object-store bucket
    pub bucket: String,
    /// Key or key prefix inside the bucket
    pub key: String,
    /// Whether the key is a directory prefix
    pub directory: bool,
}

impl SpillLocation {
    /// Create a directory-style spill location
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            directory: true,
        }
    }
}

/// Reference to the key encrypting spilled blocks
///
/// Only the identifier travels through the connector; key material never
/// does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKey {
    /// Key identifier in the host's key registry
    pub id: String,
}

impl EncryptionKey {
    /// Wrap a key identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// One independently executable unit of a table scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// Scan-scoping properties (partition coordinates, bookkeeping)
    pub properties: BTreeMap<String, String>,
    /// Where this split's oversized results spill
    pub spill: SpillLocation,
    /// Key reference for spill encryption, when enabled
    pub encryption_key: Option<EncryptionKey>,
}

impl Split {
    /// Start building a split
    pub fn builder(spill: SpillLocation) -> SplitBuilder {
        SplitBuilder {
            properties: BTreeMap::new(),
            spill,
            encryption_key: None,
        }
    }

    /// Get a property value
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Builder for [`Split`]
#[derive(Debug, Clone)]
pub struct SplitBuilder {
    properties: BTreeMap<String, String>,
    spill: SpillLocation,
    encryption_key: Option<EncryptionKey>,
}

impl SplitBuilder {
    /// Set the spill encryption key
    pub fn with_encryption(mut self, key: EncryptionKey) -> Self {
        self.encryption_key = Some(key);
        self
    }

    /// Add a scan property
    pub fn add_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Finish the split
    pub fn build(self) -> Split {
        Split {
            properties: self.properties,
            spill: self.spill,
            encryption_key: self.encryption_key,
        }
    }
}

/// Continuation token codec
///
/// Tokens are opaque to the host but internally a decimal offset: the next
/// page offset for table listings, or the next partition index for split
/// batches. The same encoding serves both.
pub struct ContinuationToken;

impl ContinuationToken {
    /// Decode a token into its offset. Absent tokens start at zero.
    pub fn parse(token: Option<&str>) -> Result<usize> {
        match token {
            None => Ok(0),
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                FederationError::invalid_input(format!("malformed continuation token: {raw:?}"))
            }),
        }
    }

    /// Encode the next offset as a token
    pub fn next(offset: usize) -> String {
        offset.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spill() -> SpillLocation {
        SpillLocation::new("results-bucket", "spill/query-1")
    }

    #[test]
    fn test_split_builder() {
        let split = Split::builder(spill())
            .with_encryption(EncryptionKey::new("key-1"))
            .add_property("partition_name", "2024-01-01")
            .add_property(PROP_SPLIT_PART, "0")
            .build();

        assert_eq!(split.property("partition_name"), Some("2024-01-01"));
        assert_eq!(split.property(PROP_SPLIT_PART), Some("0"));
        assert_eq!(split.property("missing"), None);
        assert!(split.encryption_key.is_some());
        assert_eq!(split.spill.bucket, "results-bucket");
    }

    #[test]
    fn test_continuation_token_roundtrip() {
        assert_eq!(ContinuationToken::parse(None).unwrap(), 0);
        assert_eq!(ContinuationToken::parse(Some("42")).unwrap(), 42);
        assert_eq!(ContinuationToken::next(42), "42");
    }

    #[test]
    fn test_continuation_token_malformed() {
        let err = ContinuationToken::parse(Some("abc")).unwrap_err();
        assert_eq!(
            err.kind(),
            crate::error::ErrorKind::InvalidInput
        );
        assert!(ContinuationToken::parse(Some("-1")).is_err());
    }
}
