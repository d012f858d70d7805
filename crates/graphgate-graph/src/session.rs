//! Scoped sessions with bounded retries on service unavailability.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{AccessMode, Driver, Record, Session, Statement};
use crate::error::{translate, BackendError, GraphError};
use crate::raw::RawGraph;

/// A unit of work replayed in full on a fresh session when retried.
#[async_trait]
trait SessionCall: Sync {
    type Output: Send;

    async fn call(&self, session: &mut dyn Session) -> Result<Self::Output, BackendError>;
}

struct ReadGraph<'a> {
    statement: &'a Statement,
    timeout: Duration,
}

#[async_trait]
impl SessionCall for ReadGraph<'_> {
    type Output = RawGraph;

    async fn call(&self, session: &mut dyn Session) -> Result<RawGraph, BackendError> {
        session.execute_read(self.statement, self.timeout).await
    }
}

struct RunStatement<'a> {
    statement: &'a Statement,
}

#[async_trait]
impl SessionCall for RunStatement<'_> {
    type Output = Vec<Record>;

    async fn call(&self, session: &mut dyn Session) -> Result<Vec<Record>, BackendError> {
        session.run(self.statement).await
    }
}

/// A session bound to one database and access mode.
///
/// Each operation opens the underlying session on demand. When the server is
/// unavailable the session is discarded and the whole operation is replayed
/// on a new one, up to `max_retries` times after the first attempt. Any other
/// failure is returned immediately, translated into [`GraphError`].
pub struct ScopedSession {
    driver: Arc<dyn Driver>,
    database: Option<String>,
    mode: AccessMode,
    max_retries: u32,
    current: Option<Box<dyn Session>>,
}

impl ScopedSession {
    pub(crate) fn new(
        driver: Arc<dyn Driver>,
        database: Option<String>,
        mode: AccessMode,
        max_retries: u32,
    ) -> Self {
        Self {
            driver,
            database,
            mode,
            max_retries,
            current: None,
        }
    }

    /// Run `statement` in a managed read transaction and return its graph.
    pub async fn execute_read(
        &mut self,
        statement: &Statement,
        timeout: Duration,
    ) -> Result<RawGraph, GraphError> {
        self.call(&ReadGraph { statement, timeout }).await
    }

    /// Run `statement` in an auto-commit transaction and return its rows.
    pub async fn run(&mut self, statement: &Statement) -> Result<Vec<Record>, GraphError> {
        self.call(&RunStatement { statement }).await
    }

    async fn call<C: SessionCall>(&mut self, op: &C) -> Result<C::Output, GraphError> {
        let mut attempt: u32 = 0;
        loop {
            let result = match self.open().await {
                Ok(session) => op.call(session.as_mut()).await,
                Err(e) => Err(e),
            };

            match result {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        database = self.database.as_deref().unwrap_or("<default>"),
                        error = %e,
                        "Neo4j unavailable, retrying on a fresh session"
                    );
                    // Drop the broken session before reopening.
                    self.current = None;
                }
                Err(e) => return Err(translate(e, self.mode)),
                Ok(output) => return Ok(output),
            }
        }
    }

    async fn open(&mut self) -> Result<&mut Box<dyn Session>, BackendError> {
        let session = match self.current.take() {
            Some(session) => session,
            None => {
                self.driver
                    .session(self.database.as_deref(), self.mode)
                    .await?
            }
        };
        Ok(self.current.insert(session))
    }
}
