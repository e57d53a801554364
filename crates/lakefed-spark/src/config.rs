//! Connector configuration.
//!
//! Deployments hand the connector a flat string-to-string property map;
//! [`SparkConnectorConfig::from_properties`] lifts that map into a typed,
//! validated struct. Unparseable numeric properties fall back to their
//! defaults rather than failing startup.

use std::collections::BTreeMap;
use std::time::Duration;

use lakefed_federation::{RetryPolicy, SensitiveString};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the Spark warehouse connector.
///
/// Endpoint resolution uses these fields in a fixed order: explicit
/// `host`/`http_path`, then the composite `default_connection` descriptor,
/// then a credential-store lookup via `secret_name`.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct SparkConnectorConfig {
    /// Warehouse hostname, e.g. `dbc-1234.cloud.databricks.com`
    #[serde(default)]
    pub host: Option<String>,

    /// Warehouse HTTP path, e.g. `/sql/1.0/warehouses/abc123`
    #[serde(default)]
    pub http_path: Option<String>,

    /// Personal access token for explicit host configuration
    #[serde(default)]
    pub token: Option<SensitiveString>,

    /// Composite connection descriptor
    ///
    /// Two shapes are accepted: `databricks://host:443/path` or a bare
    /// `host.databricks.com:443/path`.
    #[serde(default)]
    pub default_connection: Option<String>,

    /// Credential-store entry holding the warehouse coordinates
    #[serde(default)]
    pub secret_name: Option<String>,

    /// Remote catalog overrides, keyed by federated catalog name
    #[serde(default)]
    pub catalog_mappings: BTreeMap<String, String>,

    /// Schema preselected on every connection, as a driver property
    #[serde(default)]
    pub default_schema: Option<String>,

    /// Rows fetched per driver round trip
    #[serde(default = "default_fetch_size")]
    #[validate(range(min = 1, max = 100_000))]
    pub fetch_size: usize,

    /// Rows buffered before a block is flushed to the host
    #[serde(default = "default_rows_per_block")]
    #[validate(range(min = 1, max = 1_000_000))]
    pub rows_per_block: usize,

    /// Connection establishment timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 1_000, max = 300_000))]
    pub connect_timeout_ms: u64,

    /// Socket read timeout in milliseconds
    #[serde(default = "default_socket_timeout_ms")]
    #[validate(range(min = 1_000, max = 600_000))]
    pub socket_timeout_ms: u64,

    /// Budget for the post-open liveness probe, in seconds
    #[serde(default = "default_validation_timeout_secs")]
    #[validate(range(min = 1, max = 60))]
    pub validation_timeout_secs: u64,

    /// Total connection attempts, including the first
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    /// Initial backoff between attempts in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    #[validate(range(min = 100, max = 30_000))]
    pub initial_backoff_ms: u64,

    /// Maximum backoff between attempts in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    #[validate(range(min = 1_000, max = 120_000))]
    pub max_backoff_ms: u64,
}

// ── Default value functions ─────────────────────────────────────────────────

fn default_fetch_size() -> usize {
    1000
}

fn default_rows_per_block() -> usize {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_socket_timeout_ms() -> u64 {
    60_000
}

fn default_validation_timeout_secs() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for SparkConnectorConfig {
    fn default() -> Self {
        Self {
            host: None,
            http_path: None,
            token: None,
            default_connection: None,
            secret_name: None,
            catalog_mappings: BTreeMap::new(),
            default_schema: None,
            fetch_size: default_fetch_size(),
            rows_per_block: default_rows_per_block(),
            connect_timeout_ms: default_connect_timeout_ms(),
            socket_timeout_ms: default_socket_timeout_ms(),
            validation_timeout_secs: default_validation_timeout_secs(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Property-map key prefix for catalog mappings.
const CATALOG_MAPPING_PREFIX: &str = "catalog_";

impl SparkConnectorConfig {
    /// Build a configuration from a deployment property map.
    ///
    /// Recognized keys: `warehouse_host`, `warehouse_http_path`,
    /// `warehouse_token`, `default`, `secret_name`, `default_schema`, the
    /// numeric tuning knobs by field name, and `catalog_<name>` mapping
    /// entries.
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Self {
        let mut config = Self {
            host: non_empty(properties.get("warehouse_host")),
            http_path: non_empty(properties.get("warehouse_http_path")),
            token: non_empty(properties.get("warehouse_token")).map(SensitiveString::new),
            default_connection: non_empty(properties.get("default")),
            secret_name: non_empty(properties.get("secret_name")),
            default_schema: non_empty(properties.get("default_schema")),
            ..Self::default()
        };

        if let Some(v) = parse_number(properties.get("fetch_size")) {
            config.fetch_size = v;
        }
        if let Some(v) = parse_number(properties.get("rows_per_block")) {
            config.rows_per_block = v;
        }
        if let Some(v) = parse_number(properties.get("connect_timeout_ms")) {
            config.connect_timeout_ms = v;
        }
        if let Some(v) = parse_number(properties.get("socket_timeout_ms")) {
            config.socket_timeout_ms = v;
        }
        if let Some(v) = parse_number(properties.get("max_attempts")) {
            config.max_attempts = v;
        }

        for (key, value) in properties {
            if let Some(catalog) = key.strip_prefix(CATALOG_MAPPING_PREFIX) {
                if !catalog.is_empty() && !value.is_empty() {
                    config
                        .catalog_mappings
                        .insert(catalog.to_string(), value.clone());
                }
            }
        }

        config
    }

    /// Remote catalog mapped to a federated catalog name, if any.
    ///
    /// Mapping keys are normalized: hyphens in the federated name become
    /// underscores before lookup.
    pub fn remote_catalog(&self, catalog: &str) -> Option<&str> {
        let key = catalog.replace('-', "_");
        self.catalog_mappings.get(&key).map(String::as_str)
    }

    /// Retry policy derived from the backoff knobs.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_initial_delay(Duration::from_millis(self.initial_backoff_ms))
            .with_max_delay(Duration::from_millis(self.max_backoff_ms))
    }

    /// Connection establishment timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Socket read timeout.
    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    /// Liveness probe budget.
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_secs)
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

fn parse_number<T: std::str::FromStr>(value: Option<&String>) -> Option<T> {
    value.and_then(|v| v.parse().ok())
}
