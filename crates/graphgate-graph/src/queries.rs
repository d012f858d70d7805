//! Read-only query execution against tenant databases.

use crate::backend::{AccessMode, Parameters, Record, Statement};
use crate::client::GraphClient;
use crate::error::GraphError;
use crate::raw::RawGraph;

impl GraphClient {
    // ── Graph Reads ──────────────────────────────────────────────

    /// Execute `cypher` in a read-only session against `database` and return
    /// every node and relationship it produced.
    ///
    /// The transaction is bounded by the configured read timeout. A statement
    /// that tries to write fails with [`GraphError::WriteNotAllowed`].
    pub async fn execute_read_query(
        &self,
        database: &str,
        cypher: &str,
        parameters: Option<Parameters>,
    ) -> Result<RawGraph, GraphError> {
        let statement = Statement::new(cypher).with_parameters(parameters.unwrap_or_default());
        let mut session = self.session(Some(database), AccessMode::Read).await?;
        session
            .execute_read(&statement, self.config().read_timeout)
            .await
    }

    // ── Row Reads ────────────────────────────────────────────────

    /// Execute `statement` in a read-only session and return the first row, if any.
    pub async fn read_one(
        &self,
        database: &str,
        statement: &Statement,
    ) -> Result<Option<Record>, GraphError> {
        let mut session = self.session(Some(database), AccessMode::Read).await?;
        let rows = session.run(statement).await?;
        Ok(rows.into_iter().next())
    }
}
