//! Credential handling
//!
//! Secrets are wrapped in [`SensitiveString`] the moment they enter the
//! process: Debug, Display, and Serialize all redact, so a credential can
//! only leak through a deliberate [`expose`](SensitiveString::expose) call.
//! The [`SecretStore`] trait abstracts wherever the deployment keeps its
//! secrets; connectors fetch by name and parse the payload themselves.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use crate::error::{FederationError, Result};

/// String wrapper that redacts its value in Debug, Display, and Serialize
#[derive(Clone)]
pub struct SensitiveString(SecretString);

impl SensitiveString {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into().into_boxed_str()))
    }

    /// Access the secret value
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl PartialEq for SensitiveString {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl From<String> for SensitiveString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SensitiveString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for SensitiveString {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str("***REDACTED***")
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

impl schemars::JsonSchema for SensitiveString {
    fn schema_name() -> String {
        "SensitiveString".to_string()
    }

    fn json_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        schemars::schema::SchemaObject {
            instance_type: Some(schemars::schema::InstanceType::String.into()),
            format: Some("password".to_string()),
            ..Default::default()
        }
        .into()
    }
}

/// Named secret lookup
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the raw payload stored under `name`
    async fn get_secret(&self, name: &str) -> Result<String>;
}

/// In-memory secret store for tests and embedded deployments
#[derive(Debug, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret
    pub fn with_secret(mut self, name: impl Into<String>, payload: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), payload.into());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, name: &str) -> Result<String> {
        self.secrets.get(name).cloned().ok_or_else(|| {
            FederationError::invalid_credentials(format!("secret not found: {name}"))
        })
    }
}

/// Warehouse credential payload
///
/// The stored JSON shape is `{"password": ..., "server_hostname": ...,
/// "http_path": ...}`; the password field carries the access token.
#[derive(Clone, Deserialize)]
pub struct WarehouseSecret {
    /// Access token
    #[serde(rename = "password")]
    pub token: SensitiveString,
    /// Warehouse hostname
    #[serde(rename = "server_hostname")]
    pub host: String,
    /// HTTP path of the SQL endpoint
    pub http_path: String,
}

impl WarehouseSecret {
    /// Parse a stored secret payload
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| {
            FederationError::invalid_credentials(format!("malformed secret payload: {e}"))
        })
    }
}

impl fmt::Debug for WarehouseSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseSecret")
            .field("token", &"[REDACTED]")
            .field("host", &self.host)
            .field("http_path", &self.http_path)
            .finish()
    }
}
