//! Neo4j connection management and the shared graph client.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use graphgate_core::GatewaySettings;

use crate::backend::{AccessMode, Connector, Driver};
use crate::error::{translate, GraphError};
use crate::neo4j::Neo4jConnector;
use crate::session::ScopedSession;

/// Configuration for connecting to Neo4j and bounding query execution.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Reader-role account used for every read-mode session. Without it
    /// read-mode sessions cannot be opened.
    pub read_user: Option<String>,
    pub read_password: Option<String>,
    pub max_connections: usize,
    pub fetch_size: usize,
    pub acquisition_timeout: Duration,
    /// Retries after the first attempt on service unavailability.
    pub max_retries: u32,
    pub read_timeout: Duration,
    pub delete_batch_size: i64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::from_settings(&GatewaySettings::default())
    }
}

impl GraphConfig {
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            uri: settings.neo4j.uri(),
            user: settings.neo4j.user.clone(),
            password: settings.neo4j.password.clone(),
            read_user: settings.neo4j.read_user.clone(),
            read_password: settings.neo4j.read_password.clone(),
            max_connections: settings.neo4j.max_connection_pool_size,
            fetch_size: settings.neo4j.fetch_size,
            acquisition_timeout: settings.neo4j.acquisition_timeout(),
            max_retries: settings.query.service_unavailable_max_retries,
            read_timeout: settings.query.read_timeout(),
            delete_batch_size: settings.query.delete_batch_size,
        }
    }

    /// Reader-role credentials, when both halves are set.
    pub fn read_credentials(&self) -> Option<(&str, &str)> {
        match (&self.read_user, &self.read_password) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        }
    }
}

struct Inner {
    config: GraphConfig,
    connector: Box<dyn Connector>,
    driver: RwLock<Option<Arc<dyn Driver>>>,
    /// Serializes construction and close. Never held on the cached path.
    init: Mutex<()>,
}

/// Thread-safe graph client with a lazily constructed, shared driver.
///
/// Construct one at startup and hand clones to every worker. Clone is cheap
/// (inner Arc) and all clones share the same driver slot.
#[derive(Clone)]
pub struct GraphClient {
    inner: Arc<Inner>,
}

impl GraphClient {
    /// Create a client backed by Neo4j. No connection is made until first use.
    pub fn new(config: GraphConfig) -> Self {
        Self::with_connector(config, Neo4jConnector)
    }

    /// Create a client over an arbitrary backend.
    pub fn with_connector(config: GraphConfig, connector: impl Connector + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                connector: Box::new(connector),
                driver: RwLock::new(None),
                init: Mutex::new(()),
            }),
        }
    }

    /// Create a Neo4j-backed client and construct its driver immediately.
    pub async fn connect(config: GraphConfig) -> Result<Self, GraphError> {
        let client = Self::new(config);
        client.driver().await?;
        Ok(client)
    }

    pub fn config(&self) -> &GraphConfig {
        &self.inner.config
    }

    /// Return the shared driver, constructing it on first call.
    ///
    /// A cached driver is returned under a short read lock. Otherwise the
    /// construction lock is held across construction, so concurrent first
    /// callers wait for the single in-flight construction and then share its
    /// result. A failed connectivity check leaves the slot empty.
    pub async fn driver(&self) -> Result<Arc<dyn Driver>, GraphError> {
        if let Some(driver) = self.cached_driver() {
            return Ok(driver);
        }

        let _init = self.inner.init.lock().await;
        if let Some(driver) = self.cached_driver() {
            return Ok(driver);
        }

        let config = &self.inner.config;
        let driver = self
            .inner
            .connector
            .connect(config)
            .await
            .map_err(|e| GraphError::ServiceUnavailable(e.to_string()))?;

        if let Err(e) = driver.verify_connectivity().await {
            if let Err(close_err) = driver.close().await {
                tracing::debug!(error = %close_err, "Failed to close unverified driver");
            }
            return Err(GraphError::ServiceUnavailable(e.to_string()));
        }

        tracing::info!(uri = %config.uri, max_connections = config.max_connections, "Connected to Neo4j");
        *self.inner.driver.write() = Some(Arc::clone(&driver));
        Ok(driver)
    }

    fn cached_driver(&self) -> Option<Arc<dyn Driver>> {
        self.inner.driver.read().as_ref().map(Arc::clone)
    }

    /// Close the driver if one exists. Idempotent.
    ///
    /// The slot is cleared before the underlying close runs, so a failing close
    /// still leaves the client ready to construct a fresh driver.
    pub async fn close(&self) -> Result<(), GraphError> {
        let driver = {
            let _init = self.inner.init.lock().await;
            self.inner.driver.write().take()
        };
        let Some(driver) = driver else {
            return Ok(());
        };

        driver
            .close()
            .await
            .map_err(|e| translate(e, AccessMode::Write))?;
        tracing::info!(uri = %self.inner.config.uri, "Closed Neo4j driver");
        Ok(())
    }

    /// Open a retrying session bound to `database` and `mode`.
    ///
    /// The underlying session is released when the returned value is dropped,
    /// on every exit path.
    pub async fn session(
        &self,
        database: Option<&str>,
        mode: AccessMode,
    ) -> Result<ScopedSession, GraphError> {
        let driver = self.driver().await?;
        Ok(ScopedSession::new(
            driver,
            database.map(str::to_string),
            mode,
            self.inner.config.max_retries,
        ))
    }
}
