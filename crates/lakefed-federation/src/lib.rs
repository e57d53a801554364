//! # lakefed-federation
//!
//! Federation model shared by lakefed connectors and the host engine.
//!
//! A connector's job splits into two conversations: the host describes what
//! it wants (tables, constraints, splits), and the connector answers in the
//! host's currency (capabilities, partition descriptors, Arrow blocks,
//! classified errors). This crate defines both sides of that contract;
//! dialect-specific SQL generation and wire drivers live in the connector
//! crates built on top of it.
//!
//! ## Features
//!
//! - **Query model**: table references, per-column constraint summaries,
//!   complex expression trees, sort and limit shaping
//! - **Split planning types**: spill locations, encryption key references,
//!   split property bags, continuation tokens
//! - **Request context**: explicit per-request identity with cooperative
//!   cancellation
//! - **Blocks**: Arrow-based columnar result writing
//! - **Error contract**: six-way failure classification with fixed retry
//!   semantics
//! - **Retry**: bounded exponential backoff with async, cancellable delays
//! - **Secrets**: redacting credential wrappers and a pluggable secret
//!   store

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod block;
pub mod capabilities;
pub mod context;
pub mod error;
pub mod model;
pub mod retry;
pub mod secret;
pub mod split;

pub use block::{BlockSink, BlockWriter, VecSink};
pub use capabilities::{DataSourceCapabilities, DialectCapabilities, FilterPushdownSubtype};
pub use context::{QueryStatus, RequestContext};
pub use error::{ErrorKind, ErrorPayload, FederationError, Result};
pub use model::{
    Bound, Constraints, Expression, NullOrdering, PassthroughQuery, ScalarValue, SortDirection,
    SortField, TableReference, ValueRange, ValueSet,
};
pub use retry::{retry, retry_if, RetryPolicy};
pub use secret::{SecretStore, SensitiveString, StaticSecretStore, WarehouseSecret};
pub use split::{ContinuationToken, EncryptionKey, SpillLocation, Split, SplitBuilder};

/// Commonly used types for connector implementations
pub mod prelude {
    pub use crate::block::{BlockSink, BlockWriter};
    pub use crate::capabilities::{DataSourceCapabilities, DialectCapabilities};
    pub use crate::context::{QueryStatus, RequestContext};
    pub use crate::error::{ErrorKind, FederationError, Result};
    pub use crate::model::{Constraints, Expression, ScalarValue, TableReference, ValueSet};
    pub use crate::retry::{retry_if, RetryPolicy};
    pub use crate::secret::{SecretStore, SensitiveString};
    pub use crate::split::{ContinuationToken, SpillLocation, Split};
}
