//! Query entry points exposed to the API layer.

use serde::{Deserialize, Serialize};

use graphgate_core::GatewaySettings;
use graphgate_graph::mutations::PROVIDER_RESOURCE_LABEL;
use graphgate_graph::{GraphClient, GraphConfig, GraphError, Parameters, Statement};

use crate::error::{QueryError, Result};
use crate::model::SerializedGraph;
use crate::params::QueryDefinition;
use crate::serialize::{serialize_graph, truncate_graph};

const GITHUB_SCHEMA_URL: &str = "https://github.com/cartography-cncf/cartography/blob";
const RAW_SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/cartography-cncf/cartography/refs/tags";

/// Ingestion schema a provider's subgraph was written with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionSchema {
    pub id: String,
    pub provider: String,
    pub cartography_version: String,
    pub schema_url: String,
    pub raw_schema_url: String,
}

impl IngestionSchema {
    fn new(provider: &str, version: &str) -> Self {
        let doc = format!("docs/root/modules/{provider}/schema.md");
        Self {
            id: format!("{provider}-{version}"),
            provider: provider.to_string(),
            cartography_version: version.to_string(),
            schema_url: format!("{GITHUB_SCHEMA_URL}/{version}/{doc}"),
            raw_schema_url: format!("{RAW_SCHEMA_URL}/{version}/{doc}"),
        }
    }
}

/// Runs read-only queries against tenant databases and scopes the results
/// to one provider.
#[derive(Clone)]
pub struct QueryService {
    client: GraphClient,
    max_custom_query_nodes: usize,
}

impl QueryService {
    pub fn new(client: GraphClient, max_custom_query_nodes: usize) -> Self {
        Self {
            client,
            max_custom_query_nodes,
        }
    }

    /// Build a service with a lazily connecting client.
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        let client = GraphClient::new(GraphConfig::from_settings(settings));
        Self::new(client, settings.query.max_custom_query_nodes)
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    /// Run a catalog query with already prepared parameters.
    pub async fn execute_defined_query(
        &self,
        database: &str,
        definition: &QueryDefinition,
        parameters: Parameters,
        provider_id: &str,
    ) -> Result<SerializedGraph> {
        let graph = self
            .client
            .execute_read_query(database, &definition.cypher, Some(parameters))
            .await
            .map_err(|e| {
                tracing::error!(query_id = %definition.id, database, error = %e, "Defined query failed");
                surface(e, "Query execution")
            })?;
        Ok(serialize_graph(&graph, provider_id))
    }

    /// Run caller-written Cypher. The result is capped at the configured
    /// node limit.
    pub async fn execute_adhoc_query(
        &self,
        database: &str,
        cypher: &str,
        provider_id: &str,
    ) -> Result<SerializedGraph> {
        let graph = self
            .client
            .execute_read_query(database, cypher, None)
            .await
            .map_err(|e| {
                tracing::error!(database, error = %e, "Custom query failed");
                surface(e, "Query execution")
            })?;
        let serialized = serialize_graph(&graph, provider_id);
        Ok(truncate_graph(serialized, self.max_custom_query_nodes))
    }

    /// Look up which ingestion module version wrote the provider's subgraph.
    ///
    /// Returns `None` when the provider has no versioned nodes.
    pub async fn ingestion_schema(
        &self,
        database: &str,
        provider_id: &str,
    ) -> Result<Option<IngestionSchema>> {
        let stmt = Statement::new(format!(
            "MATCH (n:{PROVIDER_RESOURCE_LABEL} {{provider_id: $provider_id}})
             WHERE n._module_name STARTS WITH 'cartography:'
               AND NOT n._module_name IN ['cartography:ontology', 'cartography:prowler']
               AND n._module_version IS NOT NULL
             RETURN n._module_name AS module_name, n._module_version AS module_version
             LIMIT 1"
        ))
        .param("provider_id", provider_id);

        let row = self.client.read_one(database, &stmt).await.map_err(|e| {
            tracing::error!(database, provider_id, error = %e, "Ingestion schema lookup failed");
            surface(e, "Ingestion schema lookup")
        })?;

        let Some(row) = row else {
            return Ok(None);
        };
        let module = row.get("module_name").and_then(|v| v.as_str());
        let version = row.get("module_version").and_then(|v| v.as_str());
        let schema = match (module.and_then(|m| m.split_once(':')), version) {
            (Some((_, provider)), Some(version)) => Some(IngestionSchema::new(provider, version)),
            _ => None,
        };
        Ok(schema)
    }
}

fn surface(err: GraphError, operation: &'static str) -> QueryError {
    match err {
        GraphError::WriteNotAllowed { code } => QueryError::PermissionDenied { code },
        other => QueryError::Database {
            operation,
            source: other,
        },
    }
}
