//! Warehouse connection management and remote error classification.
//!
//! Endpoint resolution tries three sources in a fixed order: explicit
//! host/path configuration, the composite default descriptor, then a
//! credential-store secret. Resolution failures are fatal; connection
//! attempts run under the bounded retry policy and must pass a liveness
//! probe before they are handed out.
//!
//! Classification turns a driver failure surface (message, SQLSTATE,
//! numeric code) into one of the federation error kinds. Message patterns
//! win over SQLSTATE prefixes, and authentication patterns win over
//! connection patterns.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lakefed_federation::{
    retry_if, ErrorKind, FederationError, RequestContext, Result, SecretStore, SensitiveString,
    WarehouseSecret,
};
use metrics::{counter, histogram};
use regex::Regex;
use tracing::{debug, error, info};

use crate::config::SparkConnectorConfig;
use crate::stats::{AtomicConnectorStats, ConnectorStats};
use crate::types::{QueryResult, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Error classification
// ─────────────────────────────────────────────────────────────────────────────

const AUTHENTICATION_ERROR_PATTERNS: &[&str] = &[
    "authentication failed",
    "invalid token",
    "access denied",
    "unauthorized",
    "invalid credentials",
    "token expired",
];

const CONNECTION_ERROR_PATTERNS: &[&str] = &[
    "connection refused",
    "connection timed out",
    "network is unreachable",
    "no route to host",
    "connection reset",
    "unable to connect",
];

const NOT_FOUND_ERROR_PATTERNS: &[&str] = &[
    "table not found",
    "schema not found",
    "database not found",
    "column not found",
    "catalog not found",
];

const TRANSIENT_ERROR_PATTERNS: &[&str] = &[
    "temporary failure",
    "service unavailable",
    "too many requests",
    "rate limit exceeded",
    "cluster is starting",
    "cluster is terminating",
    "resource temporarily unavailable",
];

/// Failure surface reported by the warehouse driver.
#[derive(Debug, Clone, Default)]
pub struct RemoteFailure {
    /// Driver message text
    pub message: String,
    /// Five-character SQLSTATE, when the driver supplies one
    pub sql_state: Option<String>,
    /// Driver-specific numeric code
    pub error_code: Option<i32>,
}

impl RemoteFailure {
    /// Failure with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql_state: None,
            error_code: None,
        }
    }

    /// Attach the SQLSTATE.
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    /// Attach the numeric driver code.
    pub fn with_error_code(mut self, error_code: i32) -> Self {
        self.error_code = Some(error_code);
        self
    }
}

fn matches_any(message: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| message.contains(p))
}

/// Classify a driver failure into a federation error kind.
///
/// Checked in order: authentication patterns, connection patterns,
/// not-found patterns, transient patterns, SQLSTATE class prefixes, and
/// finally [`ErrorKind::Internal`]. A message matching both an
/// authentication and a connection pattern classifies as authentication.
pub fn classify_remote_error(failure: &RemoteFailure) -> ErrorKind {
    let message = failure.message.to_lowercase();
    if matches_any(&message, AUTHENTICATION_ERROR_PATTERNS) {
        return ErrorKind::InvalidCredentials;
    }
    if matches_any(&message, CONNECTION_ERROR_PATTERNS) {
        return ErrorKind::Connection;
    }
    if matches_any(&message, NOT_FOUND_ERROR_PATTERNS) {
        return ErrorKind::EntityNotFound;
    }
    if matches_any(&message, TRANSIENT_ERROR_PATTERNS) {
        return ErrorKind::Throttled;
    }
    if let Some(state) = &failure.sql_state {
        if state.starts_with("08") {
            return ErrorKind::Connection;
        }
        if state.starts_with("28") {
            return ErrorKind::InvalidCredentials;
        }
        if state.starts_with("42") {
            return ErrorKind::InvalidInput;
        }
    }
    ErrorKind::Internal
}

/// True when the failure is worth another attempt.
///
/// Transient message patterns qualify directly; a SQLSTATE 08 class
/// qualifies only when the message also points at a timeout or a reset.
pub fn is_transient_failure(failure: &RemoteFailure) -> bool {
    let message = failure.message.to_lowercase();
    if matches_any(&message, TRANSIENT_ERROR_PATTERNS) {
        return true;
    }
    if let Some(state) = &failure.sql_state {
        if state.starts_with("08") {
            return message.contains("timeout")
                || message.contains("connection reset")
                || message.contains("connection refused");
        }
    }
    false
}

/// Classify and wrap a driver failure for one named operation.
pub fn map_remote_error(operation: &str, failure: &RemoteFailure) -> FederationError {
    let kind = classify_remote_error(failure);
    error!(
        operation,
        sql_state = failure.sql_state.as_deref().unwrap_or(""),
        error_code = failure.error_code.unwrap_or(0),
        kind = kind.code(),
        "remote operation failed: {}",
        failure.message
    );
    FederationError::with_kind(kind, format!("{} failed: {}", operation, failure.message))
}

// ─────────────────────────────────────────────────────────────────────────────
// Endpoint resolution
// ─────────────────────────────────────────────────────────────────────────────

static SENSITIVE_URL_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(token|pwd|password)=([^;&]+)").unwrap());

/// Mask credential-bearing parameters in a driver URL for logging.
pub fn mask_url(url: &str) -> String {
    SENSITIVE_URL_PARAM.replace_all(url, "${1}=***").into_owned()
}

/// Fully resolved warehouse endpoint: driver URL, token, driver properties.
#[derive(Clone)]
pub struct ResolvedEndpoint {
    url: String,
    token: Option<SensitiveString>,
    properties: BTreeMap<String, String>,
}

impl ResolvedEndpoint {
    /// Endpoint for a driver URL, with the standard token-auth properties.
    pub fn new(url: impl Into<String>) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("UID".to_string(), "token".to_string());
        properties.insert("AuthMech".to_string(), "3".to_string());
        properties.insert("SSL".to_string(), "1".to_string());
        Self {
            url: url.into(),
            token: None,
            properties,
        }
    }

    /// Attach the access token.
    pub fn with_token(mut self, token: SensitiveString) -> Self {
        self.token = Some(token);
        self
    }

    /// Attach one driver property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The driver URL. May embed credentials; use [`Self::masked_url`] in logs.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The driver URL with credential parameters masked.
    pub fn masked_url(&self) -> String {
        mask_url(&self.url)
    }

    /// The access token, when one was resolved.
    pub fn token(&self) -> Option<&SensitiveString> {
        self.token.as_ref()
    }

    /// Non-secret driver properties.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

impl std::fmt::Debug for ResolvedEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedEndpoint")
            .field("url", &self.masked_url())
            .field("token", &self.token)
            .field("properties", &self.properties)
            .finish()
    }
}

/// Resolve the warehouse endpoint from configuration.
///
/// Tries explicit `host`/`http_path` first, then the composite default
/// descriptor, then the credential store. No fallback runs after a source
/// is selected: a malformed descriptor or an unusable secret is fatal.
pub async fn resolve_endpoint(
    config: &SparkConnectorConfig,
    secrets: &dyn SecretStore,
) -> Result<ResolvedEndpoint> {
    if let (Some(host), Some(path)) = (&config.host, &config.http_path) {
        let url = format!("jdbc:databricks://{}:443{}", host, path);
        debug!(url = %mask_url(&url), "resolved endpoint from explicit host and path");
        let mut endpoint = ResolvedEndpoint::new(url);
        if let Some(token) = &config.token {
            endpoint = endpoint.with_token(token.clone());
        }
        return Ok(endpoint);
    }

    if let Some(descriptor) = &config.default_connection {
        let url = if descriptor.starts_with("databricks://") {
            format!("jdbc:{}", descriptor)
        } else if descriptor.contains(".databricks.com") {
            format!("jdbc:databricks://{}", descriptor)
        } else {
            return Err(FederationError::invalid_input(format!(
                "Invalid connection string format: {}",
                mask_url(descriptor)
            )));
        };
        debug!(url = %mask_url(&url), "resolved endpoint from default descriptor");
        let mut endpoint = ResolvedEndpoint::new(url);
        if let Some(token) = &config.token {
            endpoint = endpoint.with_token(token.clone());
        }
        return Ok(endpoint);
    }

    if let Some(name) = &config.secret_name {
        let payload = secrets.get_secret(name).await?;
        let secret = WarehouseSecret::from_json(&payload)?;
        let url = format!(
            "jdbc:databricks://{}:443;httpPath={}",
            secret.host, secret.http_path
        );
        debug!(secret = %name, url = %mask_url(&url), "resolved endpoint from credential store");
        return Ok(ResolvedEndpoint::new(url).with_token(secret.token));
    }

    Err(FederationError::invalid_input(
        "warehouse endpoint is not configured: set host and http_path, \
         a default connection, or a secret name",
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection traits
// ─────────────────────────────────────────────────────────────────────────────

/// One open warehouse connection.
///
/// The remote dialect has no transactional support, so the transaction
/// surface is a shim: `commit`, `rollback`, and `set_autocommit` accept the
/// call and do nothing instead of letting the driver throw.
#[async_trait]
pub trait WarehouseConnection: Send + Sync {
    /// Execute a parameterized statement and collect the full result.
    async fn execute_query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Probe liveness within the given budget.
    async fn is_valid(&self, timeout: Duration) -> Result<bool>;

    /// Accepted and ignored; the warehouse is non-transactional.
    async fn commit(&self) -> Result<()> {
        debug!("commit ignored, warehouse is non-transactional");
        Ok(())
    }

    /// Accepted and ignored; the warehouse is non-transactional.
    async fn rollback(&self) -> Result<()> {
        debug!("rollback ignored, warehouse is non-transactional");
        Ok(())
    }

    /// Accepted and ignored; the warehouse is non-transactional.
    async fn set_autocommit(&self, _enabled: bool) -> Result<()> {
        debug!("autocommit change ignored, warehouse is non-transactional");
        Ok(())
    }

    /// Release driver resources.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn WarehouseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConnection").finish_non_exhaustive()
    }
}

/// Opens driver connections for resolved endpoints.
#[async_trait]
pub trait ConnectionOpener: Send + Sync {
    /// Open a connection to the endpoint.
    async fn open(&self, endpoint: &ResolvedEndpoint) -> Result<Box<dyn WarehouseConnection>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection manager
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves, opens, validates, and retries warehouse connections.
pub struct ConnectionManager {
    config: SparkConnectorConfig,
    opener: Arc<dyn ConnectionOpener>,
    secrets: Arc<dyn SecretStore>,
    stats: Arc<AtomicConnectorStats>,
}

impl ConnectionManager {
    /// Create a manager over the given opener and credential store.
    pub fn new(
        config: SparkConnectorConfig,
        opener: Arc<dyn ConnectionOpener>,
        secrets: Arc<dyn SecretStore>,
        stats: Arc<AtomicConnectorStats>,
    ) -> Self {
        Self {
            config,
            opener,
            secrets,
            stats,
        }
    }

    /// The configuration this manager runs under.
    pub fn config(&self) -> &SparkConnectorConfig {
        &self.config
    }

    /// Snapshot of the shared connector statistics.
    pub fn stats(&self) -> ConnectorStats {
        self.stats.snapshot()
    }

    /// Open a validated connection for the request.
    ///
    /// Only transport-level failures are retried; credential failures
    /// propagate immediately. The fetch window and, when configured, the
    /// catalog mapping and default schema travel as driver properties.
    pub async fn acquire(&self, ctx: &RequestContext) -> Result<Box<dyn WarehouseConnection>> {
        let mut endpoint = resolve_endpoint(&self.config, self.secrets.as_ref()).await?;
        endpoint =
            endpoint.with_property("RowsFetchedPerBlock", self.config.fetch_size.to_string());
        if let Some(remote) = self.config.remote_catalog(&ctx.catalog) {
            endpoint = endpoint.with_property("ConnCatalog", remote);
        }
        if let Some(schema) = self.config.default_schema.as_deref() {
            endpoint = endpoint.with_property("ConnSchema", schema);
        }
        debug!(
            query_id = %ctx.query_id,
            url = %endpoint.masked_url(),
            "opening warehouse connection"
        );

        let policy = self.config.retry_policy();
        let started = Instant::now();
        let attempts = AtomicU32::new(0);
        let result = retry_if(
            &policy,
            &ctx.status,
            "open connection",
            || {
                if attempts.fetch_add(1, Ordering::Relaxed) > 0 {
                    self.stats.record_retry();
                    counter!("spark.connections.retried").increment(1);
                }
                self.open_validated(&endpoint)
            },
            FederationError::is_retryable_for_connect,
        )
        .await;

        let elapsed_ms = started.elapsed().as_millis() as f64;
        match result {
            Ok(connection) => {
                self.stats.record_connection(true);
                counter!("spark.connections.opened").increment(1);
                histogram!("spark.connection.duration_ms").record(elapsed_ms);
                info!(
                    query_id = %ctx.query_id,
                    elapsed_ms,
                    "warehouse connection established"
                );
                Ok(connection)
            }
            Err(err) => {
                self.stats.record_connection(false);
                counter!("spark.connections.failed").increment(1);
                error!(
                    query_id = %ctx.query_id,
                    url = %endpoint.masked_url(),
                    elapsed_ms,
                    error = %err,
                    "warehouse connection failed"
                );
                Err(err)
            }
        }
    }

    async fn open_validated(
        &self,
        endpoint: &ResolvedEndpoint,
    ) -> Result<Box<dyn WarehouseConnection>> {
        let connection = self.opener.open(endpoint).await?;
        if !connection.is_valid(self.config.validation_timeout()).await? {
            return Err(FederationError::connection("connection validation failed"));
        }
        Ok(connection)
    }
}
