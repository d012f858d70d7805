//! Administrative write operations on tenant databases.
//!
//! Provisioning and cleanup only; query traffic never goes through here.

use crate::backend::{AccessMode, Statement};
use crate::client::GraphClient;
use crate::error::GraphError;

/// Label carried by every node written by the ingestion pipeline.
pub const PROVIDER_RESOURCE_LABEL: &str = "ProviderResource";

const SYSTEM_DATABASE: &str = "system";

impl GraphClient {
    // ── Databases ────────────────────────────────────────────────

    /// Create a database unless it already exists.
    pub async fn create_database(&self, database: &str) -> Result<(), GraphError> {
        let stmt =
            Statement::new("CREATE DATABASE $database IF NOT EXISTS").param("database", database);
        let mut session = self.session(Some(SYSTEM_DATABASE), AccessMode::Write).await?;
        session.run(&stmt).await?;
        tracing::info!(database, "Created graph database");
        Ok(())
    }

    /// Drop a database and its data if it exists.
    pub async fn drop_database(&self, database: &str) -> Result<(), GraphError> {
        let stmt = Statement::new(format!(
            "DROP DATABASE `{database}` IF EXISTS DESTROY DATA"
        ));
        let mut session = self.session(Some(SYSTEM_DATABASE), AccessMode::Write).await?;
        session.run(&stmt).await?;
        tracing::info!(database, "Dropped graph database");
        Ok(())
    }

    // ── Subgraphs ────────────────────────────────────────────────

    /// Delete every node of `provider_id` from `database`, in batches.
    ///
    /// Returns the number of deleted nodes. A database that does not exist
    /// counts as already empty.
    pub async fn drop_subgraph(&self, database: &str, provider_id: &str) -> Result<u64, GraphError> {
        let stmt = Statement::new(format!(
            "MATCH (n:{PROVIDER_RESOURCE_LABEL} {{provider_id: $provider_id}})
             WITH n LIMIT $batch_size
             DETACH DELETE n
             RETURN COUNT(n) AS deleted_nodes_count"
        ))
        .param("provider_id", provider_id)
        .param("batch_size", self.config().delete_batch_size);

        match self.delete_in_batches(database, &stmt).await {
            Ok(deleted) => {
                tracing::info!(database, provider_id, deleted, "Dropped provider subgraph");
                Ok(deleted)
            }
            Err(e) if e.is_database_not_found() => {
                tracing::debug!(database, provider_id, "Database missing, nothing to drop");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_in_batches(&self, database: &str, stmt: &Statement) -> Result<u64, GraphError> {
        let mut session = self.session(Some(database), AccessMode::Write).await?;
        let mut total: u64 = 0;
        loop {
            let rows = session.run(stmt).await?;
            let deleted = rows
                .first()
                .and_then(|row| row.get("deleted_nodes_count"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0);
            if deleted <= 0 {
                return Ok(total);
            }
            total += deleted as u64;
        }
    }

    // ── Maintenance ──────────────────────────────────────────────

    /// Clear the query plan cache of `database`. Failures are logged, not returned.
    pub async fn clear_query_cache(&self, database: &str) {
        let stmt = Statement::new("CALL db.clearQueryCaches()");
        let result = match self.session(Some(database), AccessMode::Write).await {
            Ok(mut session) => session.run(&stmt).await.map(|_| ()),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::warn!(database, error = %e, "Failed to clear query cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::backend::{AccessMode, Record};
    use crate::client::{GraphClient, GraphConfig};
    use crate::error::{BackendError, GraphError, DATABASE_NOT_FOUND_CODE};
    use crate::raw::NativeValue;
    use crate::testing::{MockConnector, Outcome};

    fn deleted(count: i64) -> Outcome {
        let mut row = Record::new();
        row.insert("deleted_nodes_count".to_string(), NativeValue::Integer(count));
        Outcome::Records(vec![row])
    }

    fn client(connector: &MockConnector, batch_size: i64) -> GraphClient {
        let config = GraphConfig {
            delete_batch_size: batch_size,
            ..GraphConfig::default()
        };
        GraphClient::with_connector(config, connector.clone())
    }

    #[tokio::test]
    async fn test_drop_subgraph_loops_until_empty_batch() {
        let connector = MockConnector::new();
        let state = connector.state();
        state.push(deleted(2));
        state.push(deleted(2));
        state.push(deleted(1));
        state.push(deleted(0));

        let total = client(&connector, 2)
            .drop_subgraph("db-tenant-a", "provider-1")
            .await
            .unwrap();

        assert_eq!(total, 5);
        let calls = state.statements();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].database.as_deref(), Some("db-tenant-a"));
        assert_eq!(calls[0].mode, AccessMode::Write);
        assert_eq!(calls[0].statement.parameters.get("batch_size"), Some(&json!(2)));
        assert_eq!(
            calls[0].statement.parameters.get("provider_id"),
            Some(&json!("provider-1"))
        );
        assert!(calls[0].statement.text.contains("ProviderResource"));
    }

    #[tokio::test]
    async fn test_drop_subgraph_missing_database_returns_zero() {
        let connector = MockConnector::new();
        connector.state().push(Outcome::Fail(BackendError::database(
            DATABASE_NOT_FOUND_CODE,
            "Database does not exist: db-tenant-gone",
        )));

        let total = client(&connector, 1000)
            .drop_subgraph("db-tenant-gone", "provider-1")
            .await
            .unwrap();

        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_drop_subgraph_propagates_other_errors() {
        let connector = MockConnector::new();
        connector.state().push(Outcome::Fail(BackendError::database(
            "Neo.DatabaseError.General.UnknownError",
            "disk full",
        )));

        let err = client(&connector, 1000)
            .drop_subgraph("db-tenant-a", "provider-1")
            .await
            .unwrap_err();

        assert!(matches!(err, GraphError::Query { .. }));
    }

    #[tokio::test]
    async fn test_clear_query_cache_swallows_failures() {
        let connector = MockConnector::new();
        let state = connector.state();
        state.push(Outcome::Fail(BackendError::database(
            DATABASE_NOT_FOUND_CODE,
            "Database does not exist",
        )));

        client(&connector, 1000).clear_query_cache("db-tenant-a").await;

        assert_eq!(state.statements()[0].statement.text, "CALL db.clearQueryCaches()");
    }

    #[tokio::test]
    async fn test_create_and_drop_database_run_on_system() {
        let connector = MockConnector::new();
        let state = connector.state();
        let client = client(&connector, 1000);

        client.create_database("db-tenant-a").await.unwrap();
        client.drop_database("db-tenant-a").await.unwrap();

        let calls = state.statements();
        assert!(calls.iter().all(|c| c.database.as_deref() == Some("system")));
        assert_eq!(
            calls[0].statement.parameters.get("database"),
            Some(&json!("db-tenant-a"))
        );
        assert_eq!(
            calls[1].statement.text,
            "DROP DATABASE `db-tenant-a` IF EXISTS DESTROY DATA"
        );
    }
}
