//! Integration tests for graphgate-graph against a live Neo4j instance.
//!
//! These tests require a Neo4j server on bolt://localhost:7687 and an account
//! holding only the `reader` role, passed as `GRAPHGATE_NEO4J__READ_USER` and
//! `GRAPHGATE_NEO4J__READ_PASSWORD`.
//! Run with: cargo test --package graphgate-graph --test integration -- --ignored
//!
//! Skipped automatically if Neo4j or the reader account is not available.

use graphgate_core::GatewaySettings;
use graphgate_graph::{AccessMode, GraphClient, GraphConfig, GraphError, Statement};
use uuid::Uuid;

/// Community edition only serves the default database.
const DATABASE: &str = "neo4j";

async fn connect_or_skip() -> Option<GraphClient> {
    let settings = match GatewaySettings::load("graphgate") {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Skipping integration test (bad settings): {e}");
            return None;
        }
    };
    let config = GraphConfig::from_settings(&settings);
    if config.read_credentials().is_none() {
        eprintln!("Skipping integration test (no reader credentials configured)");
        return None;
    }
    match GraphClient::connect(config).await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test (Neo4j not available): {e}");
            None
        }
    }
}

fn unique_provider() -> String {
    Uuid::new_v4().to_string()
}

async fn seed_path(client: &GraphClient, provider_id: &str) {
    let stmt = Statement::new(
        "CREATE (a:ProviderResource:AWSAccount {provider_id: $pid, name: 'acct'})
         CREATE (b:ProviderResource:EC2Instance {provider_id: $pid, name: 'web'})
         CREATE (a)-[:RESOURCE {since: 2024}]->(b)",
    )
    .param("pid", provider_id);
    let mut session = client.session(Some(DATABASE), AccessMode::Write).await.unwrap();
    session.run(&stmt).await.unwrap();
}

#[tokio::test]
#[ignore = "requires live Neo4j: cargo test --package graphgate-graph --test integration -- --ignored"]
async fn test_read_query_returns_nodes_and_relationships() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let pid = unique_provider();
    seed_path(&client, &pid).await;

    let mut params = serde_json::Map::new();
    params.insert("pid".to_string(), serde_json::json!(pid));
    let graph = client
        .execute_read_query(
            DATABASE,
            "MATCH p = (a:AWSAccount {provider_id: $pid})-[:RESOURCE]->(:EC2Instance) RETURN p",
            Some(params),
        )
        .await
        .unwrap();

    assert_eq!(graph.nodes().len(), 2);
    assert_eq!(graph.relationships().len(), 1);
    let rel = &graph.relationships()[0];
    let account = graph
        .nodes()
        .iter()
        .find(|n| n.labels.iter().any(|l| l == "AWSAccount"))
        .unwrap();
    assert_eq!(rel.start_node_id, account.element_id);
    assert_eq!(rel.rel_type, "RESOURCE");

    client.drop_subgraph(DATABASE, &pid).await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires live Neo4j: cargo test --package graphgate-graph --test integration -- --ignored"]
async fn test_write_in_read_query_is_rejected() {
    let Some(client) = connect_or_skip().await else {
        return;
    };

    let result = client
        .execute_read_query(DATABASE, "CREATE (n:ShouldNotExist) RETURN n", None)
        .await;
    assert!(
        matches!(result, Err(GraphError::WriteNotAllowed { .. })),
        "expected WriteNotAllowed, got {result:?}"
    );

    let leftover = client
        .read_one(
            DATABASE,
            &Statement::new("MATCH (n:ShouldNotExist) RETURN count(n) AS c"),
        )
        .await
        .unwrap()
        .and_then(|row| row.get("c").and_then(|v| v.as_i64()))
        .unwrap_or(0);
    assert_eq!(leftover, 0);
    client.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires live Neo4j: cargo test --package graphgate-graph --test integration -- --ignored"]
async fn test_write_procedure_in_read_query_is_rejected() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let pid = unique_provider();
    let mut session = client.session(Some(DATABASE), AccessMode::Write).await.unwrap();
    session
        .run(&Statement::new("CREATE (:GraphgateCanary {provider_id: $pid})").param("pid", pid.as_str()))
        .await
        .unwrap();
    drop(session);

    // The procedure commits its own inner transactions, so a rolled-back
    // outer transaction would not stop it. Only the server may refuse it.
    let mut params = serde_json::Map::new();
    params.insert("pid".to_string(), serde_json::json!(pid));
    let result = client
        .execute_read_query(
            DATABASE,
            "CALL apoc.periodic.iterate(
               'MATCH (n:GraphgateCanary {provider_id: $pid}) RETURN n',
               'DETACH DELETE n',
               {params: {pid: $pid}})",
            Some(params),
        )
        .await;
    assert!(
        matches!(result, Err(GraphError::WriteNotAllowed { .. })),
        "expected WriteNotAllowed, got {result:?}"
    );

    let survivors = client
        .read_one(
            DATABASE,
            &Statement::new("MATCH (n:GraphgateCanary {provider_id: $pid}) RETURN count(n) AS c")
                .param("pid", pid.as_str()),
        )
        .await
        .unwrap()
        .and_then(|row| row.get("c").and_then(|v| v.as_i64()));
    assert_eq!(survivors, Some(1));

    let mut session = client.session(Some(DATABASE), AccessMode::Write).await.unwrap();
    session
        .run(&Statement::new("MATCH (n:GraphgateCanary {provider_id: $pid}) DELETE n").param("pid", pid.as_str()))
        .await
        .unwrap();
    drop(session);
    client.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires live Neo4j: cargo test --package graphgate-graph --test integration -- --ignored"]
async fn test_syntax_error_carries_code() {
    let Some(client) = connect_or_skip().await else {
        return;
    };

    let err = client
        .execute_read_query(DATABASE, "MATCH (n RETURN n", None)
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some("Neo.ClientError.Statement.SyntaxError"));
    client.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires live Neo4j: cargo test --package graphgate-graph --test integration -- --ignored"]
async fn test_drop_subgraph_removes_only_provider_nodes() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let kept = unique_provider();
    let dropped = unique_provider();
    seed_path(&client, &kept).await;
    seed_path(&client, &dropped).await;

    let deleted = client.drop_subgraph(DATABASE, &dropped).await.unwrap();
    assert_eq!(deleted, 2);

    let remaining = client
        .read_one(
            DATABASE,
            &Statement::new("MATCH (n:ProviderResource {provider_id: $pid}) RETURN count(n) AS c")
                .param("pid", kept.as_str()),
        )
        .await
        .unwrap()
        .and_then(|row| row.get("c").and_then(|v| v.as_i64()));
    assert_eq!(remaining, Some(2));

    client.drop_subgraph(DATABASE, &kept).await.unwrap();
    client.close().await.unwrap();
}
