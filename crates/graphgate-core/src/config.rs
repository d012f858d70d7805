//! Configuration management for graphgate services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`GRAPHGATE_` prefix, `__` between nested keys,
//!    e.g. `GRAPHGATE_NEO4J__HOST` or `GRAPHGATE_QUERY__READ_QUERY_TIMEOUT_SECS`)
//! 2. Config file (`graphgate.toml`, optional)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

use crate::error::GatewayError;

/// Top-level gateway settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewaySettings {
    /// Neo4j connection and pool settings.
    #[serde(default)]
    pub neo4j: Neo4jSettings,

    /// Query execution limits.
    #[serde(default)]
    pub query: QuerySettings,
}

/// Connection settings for the shared Neo4j server.
#[derive(Debug, Clone, Deserialize)]
pub struct Neo4jSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Account holding only the reader role. Read-mode sessions authenticate
    /// as this user so the server itself rejects writes.
    #[serde(default)]
    pub read_user: Option<String>,

    #[serde(default)]
    pub read_password: Option<String>,

    /// Maximum number of pooled Bolt connections.
    #[serde(default = "default_pool_size")]
    pub max_connection_pool_size: usize,

    /// Upper bound on establishing the pool and checking connectivity.
    #[serde(default = "default_acquisition_timeout")]
    pub connection_acquisition_timeout_secs: u64,

    /// Rows pulled per Bolt PULL message.
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

/// Limits applied to query execution.
#[derive(Debug, Clone, Deserialize)]
pub struct QuerySettings {
    /// Retries after the first attempt when the server is unavailable.
    #[serde(default = "default_max_retries")]
    pub service_unavailable_max_retries: u32,

    #[serde(default = "default_read_timeout")]
    pub read_query_timeout_secs: u64,

    /// Node cap applied to ad-hoc query results.
    #[serde(default = "default_max_custom_nodes")]
    pub max_custom_query_nodes: usize,

    /// Nodes deleted per batch when dropping a provider subgraph.
    #[serde(default = "default_batch_size")]
    pub delete_batch_size: i64,
}

impl Neo4jSettings {
    /// Bolt URI for the configured host and port.
    pub fn uri(&self) -> String {
        format!("bolt://{}:{}", self.host, self.port)
    }

    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_acquisition_timeout_secs)
    }

    /// Reader-role credentials, when both halves are configured.
    pub fn read_credentials(&self) -> Option<(&str, &str)> {
        match (&self.read_user, &self.read_password) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        }
    }
}

impl QuerySettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_query_timeout_secs)
    }
}

impl GatewaySettings {
    /// Load settings from `<file_prefix>.toml` (if present) and `GRAPHGATE_` variables.
    pub fn load(file_prefix: &str) -> Result<Self, GatewayError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("GRAPHGATE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: GatewaySettings = cfg.try_deserialize()?;
        tracing::debug!(
            uri = %settings.neo4j.uri(),
            max_retries = settings.query.service_unavailable_max_retries,
            read_timeout_secs = settings.query.read_query_timeout_secs,
            "Loaded gateway settings"
        );
        Ok(settings)
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    7687
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "neo4j_password".to_string()
}

fn default_pool_size() -> usize {
    50
}

fn default_acquisition_timeout() -> u64 {
    120
}

fn default_fetch_size() -> usize {
    500
}

fn default_max_retries() -> u32 {
    3
}

fn default_read_timeout() -> u64 {
    30
}

fn default_max_custom_nodes() -> usize {
    250
}

fn default_batch_size() -> i64 {
    1000
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: default_password(),
            read_user: None,
            read_password: None,
            max_connection_pool_size: default_pool_size(),
            connection_acquisition_timeout_secs: default_acquisition_timeout(),
            fetch_size: default_fetch_size(),
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            service_unavailable_max_retries: default_max_retries(),
            read_query_timeout_secs: default_read_timeout(),
            max_custom_query_nodes: default_max_custom_nodes(),
            delete_batch_size: default_batch_size(),
        }
    }
}
