//! Backend seam between the connection manager and a concrete Bolt driver.
//!
//! [`GraphClient`](crate::GraphClient) only talks to these traits. The
//! production implementation lives in [`crate::neo4j`]; tests use the
//! scripted backend in `testing`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::GraphConfig;
use crate::error::BackendError;
use crate::raw::{NativeValue, RawGraph};

/// Bound query parameters, keyed by `$name`.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// One result row, column name to value.
pub type Record = BTreeMap<String, NativeValue>;

/// How a session is allowed to touch the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Read-only. Writes are rejected by the server or rolled back.
    Read,
    #[default]
    Write,
}

/// Query text plus its bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub text: String,
    pub parameters: Parameters,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Parameters::new(),
        }
    }

    /// Bind a single parameter.
    pub fn param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Replace all bound parameters.
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Builds a driver (connection pool) from configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &GraphConfig) -> Result<Arc<dyn Driver>, BackendError>;
}

/// A process-wide connection pool.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Round-trip to the server; called once right after construction.
    async fn verify_connectivity(&self) -> Result<(), BackendError>;

    /// Open a session bound to `database` (server default when `None`).
    ///
    /// The session is released when dropped.
    async fn session(
        &self,
        database: Option<&str>,
        mode: AccessMode,
    ) -> Result<Box<dyn Session>, BackendError>;

    async fn close(&self) -> Result<(), BackendError>;
}

/// A short-lived handle used for one logical operation.
#[async_trait]
pub trait Session: Send {
    /// Run `statement` in a managed read transaction bounded by `timeout`
    /// and return every node and relationship it produced.
    async fn execute_read(
        &mut self,
        statement: &Statement,
        timeout: Duration,
    ) -> Result<RawGraph, BackendError>;

    /// Run `statement` in an auto-commit transaction and collect its rows.
    async fn run(&mut self, statement: &Statement) -> Result<Vec<Record>, BackendError>;
}
