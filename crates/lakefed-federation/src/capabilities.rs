//! Capability advertisement
//!
//! At startup a connector tells the host exactly which pushdowns it can
//! honor. The host only offloads what is advertised, so the function
//! vocabulary here must match what the connector's translator actually
//! renders.

use serde::{Deserialize, Serialize};

/// Predicate pushdown variants a connector can evaluate remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterPushdownSubtype {
    /// Ordered range constraints (sorted range sets)
    SortedRangeSet,
    /// Comparisons that must respect NULL semantics
    NullableComparison,
}

/// What a data source connector can do on the host's behalf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceCapabilities {
    /// Supported predicate pushdown subtypes
    pub filter_pushdown: Vec<FilterPushdownSubtype>,
    /// Function vocabulary accepted for complex-expression pushdown
    pub supported_functions: Vec<String>,
    /// Whether LIMIT pushdown is honored
    pub limit_pushdown: bool,
    /// Whether ORDER BY + LIMIT (top-N) pushdown is honored
    pub top_n_pushdown: bool,
    /// Whether raw passthrough queries are accepted
    pub query_passthrough: bool,
}

impl DataSourceCapabilities {
    /// Capabilities of a connector that pushes nothing down
    pub fn minimal() -> Self {
        Self {
            filter_pushdown: Vec::new(),
            supported_functions: Vec::new(),
            limit_pushdown: false,
            top_n_pushdown: false,
            query_passthrough: false,
        }
    }
}

/// Static capabilities of one SQL dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectCapabilities {
    /// Whether the warehouse supports transactions at all.
    ///
    /// Consulted by connection managers instead of probing the remote;
    /// Spark-style warehouses answer false.
    pub supports_transactions: bool,
    /// Whether request-level LIMIT can be rendered
    pub supports_limit: bool,
    /// Whether ORDER BY with explicit null placement can be rendered
    pub supports_top_n: bool,
}
