//! Neo4j backend built on `neo4rs`.
//!
//! `neo4rs` pools connections inside [`neo4rs::Graph`], so a "session" here is
//! a cheap handle pairing a pool with a database name and access mode.
//!
//! `neo4rs` 0.8 cannot open a server-side read transaction, so read mode is
//! enforced by identity: read-mode sessions use a second pool authenticated
//! as the configured reader-role account, and the server refuses its writes.
//! Without reader credentials read-mode sessions are refused outright. Read
//! transactions are also rolled back, never committed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use neo4rs::{BoltMap, BoltNode, BoltPath, BoltRelation, BoltType, ConfigBuilder, Graph, Query, Row};

use crate::backend::{AccessMode, Connector, Driver, Record, Session, Statement};
use crate::client::GraphConfig;
use crate::error::BackendError;
use crate::raw::{NativeValue, Properties, RawGraph, RawNode, RawRelationship};

const UNAVAILABLE_CODE_PREFIX: &str = "Neo.TransientError.General.DatabaseUnavailable";

/// Connects to Neo4j over Bolt.
#[derive(Debug, Clone, Copy, Default)]
pub struct Neo4jConnector;

#[async_trait]
impl Connector for Neo4jConnector {
    async fn connect(&self, config: &GraphConfig) -> Result<Arc<dyn Driver>, BackendError> {
        let writer = connect_pool(config, &config.user, &config.password).await?;
        let reader = match config.read_credentials() {
            Some((user, password)) => Some(connect_pool(config, user, password).await?),
            None => {
                tracing::warn!("No reader credentials configured, read-mode sessions are disabled");
                None
            }
        };

        Ok(Arc::new(Neo4jDriver { writer, reader }))
    }
}

async fn connect_pool(config: &GraphConfig, user: &str, password: &str) -> Result<Graph, BackendError> {
    let neo_config = ConfigBuilder::default()
        .uri(&config.uri)
        .user(user)
        .password(password)
        .max_connections(config.max_connections)
        .fetch_size(config.fetch_size)
        .build()
        .map_err(native_error)?;

    tokio::time::timeout(config.acquisition_timeout, Graph::connect(neo_config))
        .await
        .map_err(|_| {
            BackendError::Unavailable(format!(
                "timed out after {}s connecting to {}",
                config.acquisition_timeout.as_secs(),
                config.uri
            ))
        })?
        .map_err(native_error)
}

struct Neo4jDriver {
    writer: Graph,
    /// Pool authenticated as the reader-role account.
    reader: Option<Graph>,
}

#[async_trait]
impl Driver for Neo4jDriver {
    async fn verify_connectivity(&self) -> Result<(), BackendError> {
        for graph in std::iter::once(&self.writer).chain(self.reader.as_ref()) {
            graph
                .run(neo4rs::query("RETURN 1"))
                .await
                .map_err(native_error)?;
        }
        Ok(())
    }

    async fn session(
        &self,
        database: Option<&str>,
        mode: AccessMode,
    ) -> Result<Box<dyn Session>, BackendError> {
        let graph = match mode {
            AccessMode::Write => self.writer.clone(),
            AccessMode::Read => self.reader.clone().ok_or_else(|| BackendError::Database {
                code: None,
                message: Some("read-only credentials are not configured".to_string()),
            })?,
        };
        Ok(Box::new(Neo4jSession {
            graph,
            database: database.map(str::to_string),
            mode,
        }))
    }

    async fn close(&self) -> Result<(), BackendError> {
        // Each pool shuts down when its last `Graph` clone is dropped.
        Ok(())
    }
}

struct Neo4jSession {
    graph: Graph,
    database: Option<String>,
    mode: AccessMode,
}

impl Neo4jSession {
    /// Stream every row of `query` inside a transaction that is rolled back.
    async fn read_rows<F>(&self, query: Query, mut on_row: F) -> Result<(), BackendError>
    where
        F: FnMut(&Row) + Send,
    {
        let mut txn = match self.database.as_deref() {
            Some(db) => self.graph.start_txn_on(db).await,
            None => self.graph.start_txn().await,
        }
        .map_err(native_error)?;

        let mut stream = txn.execute(query).await.map_err(native_error)?;
        while let Some(row) = stream.next(txn.handle()).await.map_err(native_error)? {
            on_row(&row);
        }

        txn.rollback().await.map_err(native_error)
    }
}

#[async_trait]
impl Session for Neo4jSession {
    async fn execute_read(
        &mut self,
        statement: &Statement,
        timeout: Duration,
    ) -> Result<RawGraph, BackendError> {
        let query = to_query(statement);
        let work = async {
            let mut graph = RawGraph::new();
            self.read_rows(query, |row| collect_row(row, &mut graph))
                .await?;
            Ok::<_, BackendError>(graph)
        };

        match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(timeout)),
        }
    }

    async fn run(&mut self, statement: &Statement) -> Result<Vec<Record>, BackendError> {
        let query = to_query(statement);
        let mut rows = Vec::new();

        if self.mode == AccessMode::Read {
            self.read_rows(query, |row| rows.push(record_from_row(row)))
                .await?;
            return Ok(rows);
        }

        let mut stream = match self.database.as_deref() {
            Some(db) => self.graph.execute_on(db, query).await,
            None => self.graph.execute(query).await,
        }
        .map_err(native_error)?;
        while let Some(row) = stream.next().await.map_err(native_error)? {
            rows.push(record_from_row(&row));
        }
        Ok(rows)
    }
}

// ── Errors ───────────────────────────────────────────────────────

fn native_error(err: neo4rs::Error) -> BackendError {
    match &err {
        neo4rs::Error::Neo4j(e) => {
            let code = e.code().to_string();
            if code.starts_with(UNAVAILABLE_CODE_PREFIX) {
                return BackendError::Unavailable(e.message().to_string());
            }
            let message = e.message();
            BackendError::Database {
                code: Some(code),
                message: (!message.is_empty()).then(|| message.to_string()),
            }
        }
        neo4rs::Error::ConnectionError | neo4rs::Error::IOError { .. } => {
            BackendError::Unavailable(err.to_string())
        }
        _ => BackendError::Database {
            code: None,
            message: Some(err.to_string()),
        },
    }
}

// ── Parameters ───────────────────────────────────────────────────

fn to_query(statement: &Statement) -> Query {
    statement
        .parameters
        .iter()
        .fold(neo4rs::query(&statement.text), |q, (key, value)| {
            q.param(key, json_to_bolt(value))
        })
}

fn json_to_bolt(value: &serde_json::Value) -> BoltType {
    use serde_json::Value;

    match value {
        Value::Null => BoltType::Null(neo4rs::BoltNull),
        Value::Bool(b) => BoltType::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => BoltType::from(s.as_str()),
        Value::Array(items) => BoltType::from(items.iter().map(json_to_bolt).collect::<Vec<_>>()),
        Value::Object(map) => BoltType::from(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_bolt(v)))
                .collect::<HashMap<String, BoltType>>(),
        ),
    }
}

// ── Result Hydration ─────────────────────────────────────────────

/// Columns of a row, ordered by name so hydration does not depend on map order.
fn row_columns(row: &Row) -> Vec<(String, BoltType)> {
    match row.to::<HashMap<String, BoltType>>() {
        Ok(columns) => {
            let mut columns: Vec<_> = columns.into_iter().collect();
            columns.sort_by(|a, b| a.0.cmp(&b.0));
            columns
        }
        Err(e) => {
            tracing::debug!(error = %e, "Skipping undecodable row");
            Vec::new()
        }
    }
}

fn collect_row(row: &Row, graph: &mut RawGraph) {
    for (_, value) in row_columns(row) {
        collect_entities(value, graph);
    }
}

/// Walk a result value and add every node and relationship found in it.
fn collect_entities(value: BoltType, graph: &mut RawGraph) {
    match value {
        BoltType::Node(node) => graph.add_node(node_from_bolt(node)),
        BoltType::Relation(rel) => graph.add_relationship(relationship_from_bolt(rel)),
        BoltType::Path(path) => collect_path(path, graph),
        BoltType::List(list) => {
            for item in list.value {
                collect_entities(item, graph);
            }
        }
        BoltType::Map(map) => {
            for (_, item) in map.value {
                collect_entities(item, graph);
            }
        }
        _ => {}
    }
}

/// Paths carry unbound relationships; direction comes from the sign of each
/// relationship index in the `[rel, node, rel, node, ..]` index sequence.
fn collect_path(path: BoltPath, graph: &mut RawGraph) {
    let nodes: Vec<BoltNode> = path
        .nodes
        .value
        .into_iter()
        .filter_map(|n| match n {
            BoltType::Node(n) => Some(n),
            _ => None,
        })
        .collect();
    let rels: Vec<_> = path
        .rels
        .value
        .into_iter()
        .filter_map(|r| match r {
            BoltType::UnboundedRelation(r) => Some(r),
            _ => None,
        })
        .collect();
    let indices: Vec<i64> = path
        .indices
        .value
        .iter()
        .filter_map(|i| match i {
            BoltType::Integer(i) => Some(i.value),
            _ => None,
        })
        .collect();

    let node_ids: Vec<String> = nodes.iter().map(|n| n.id.value.to_string()).collect();
    for node in nodes {
        graph.add_node(node_from_bolt(node));
    }

    let mut previous = 0usize;
    for pair in indices.chunks_exact(2) {
        let (rel_index, next) = (pair[0], pair[1] as usize);
        let Some(rel) = rels.get((rel_index.unsigned_abs() as usize).wrapping_sub(1)) else {
            break;
        };
        let (start, end) = if rel_index > 0 {
            (previous, next)
        } else {
            (next, previous)
        };
        if let (Some(start), Some(end)) = (node_ids.get(start), node_ids.get(end)) {
            graph.add_relationship(RawRelationship {
                element_id: rel.id.value.to_string(),
                rel_type: rel.typ.value.clone(),
                start_node_id: start.clone(),
                end_node_id: end.clone(),
                properties: properties_from_bolt(rel.properties.clone()),
            });
        }
        previous = next;
    }
}

fn node_from_bolt(node: BoltNode) -> RawNode {
    RawNode {
        element_id: node.id.value.to_string(),
        labels: node
            .labels
            .value
            .into_iter()
            .filter_map(|label| match label {
                BoltType::String(s) => Some(s.value),
                _ => None,
            })
            .collect(),
        properties: properties_from_bolt(node.properties),
    }
}

fn relationship_from_bolt(rel: BoltRelation) -> RawRelationship {
    RawRelationship {
        element_id: rel.id.value.to_string(),
        rel_type: rel.typ.value,
        start_node_id: rel.start_node_id.value.to_string(),
        end_node_id: rel.end_node_id.value.to_string(),
        properties: properties_from_bolt(rel.properties),
    }
}

fn record_from_row(row: &Row) -> Record {
    row_columns(row)
        .into_iter()
        .map(|(key, value)| (key, native_from_bolt(value)))
        .collect()
}

fn properties_from_bolt(map: BoltMap) -> Properties {
    map.value
        .into_iter()
        .map(|(k, v)| (k.value, native_from_bolt(v)))
        .collect()
}

fn native_from_bolt(value: BoltType) -> NativeValue {
    match value {
        BoltType::Null(_) => NativeValue::Null,
        BoltType::Boolean(b) => NativeValue::Boolean(b.value),
        BoltType::Integer(i) => NativeValue::Integer(i.value),
        BoltType::Float(f) => NativeValue::Float(f.value),
        BoltType::String(s) => NativeValue::String(s.value),
        BoltType::Bytes(b) => NativeValue::Bytes(b.value.to_vec()),
        BoltType::List(list) => {
            NativeValue::List(list.value.into_iter().map(native_from_bolt).collect())
        }
        BoltType::Map(map) => NativeValue::Map(properties_from_bolt(map)),
        BoltType::Point2D(p) => NativeValue::Point2D {
            srid: p.sr_id.value,
            x: p.x.value,
            y: p.y.value,
        },
        BoltType::Point3D(p) => NativeValue::Point3D {
            srid: p.sr_id.value,
            x: p.x.value,
            y: p.y.value,
            z: p.z.value,
        },
        // Graph entities nested in rows are reduced to their properties.
        BoltType::Node(n) => NativeValue::Map(properties_from_bolt(n.properties)),
        BoltType::Relation(r) => NativeValue::Map(properties_from_bolt(r.properties)),
        BoltType::UnboundedRelation(r) => NativeValue::Map(properties_from_bolt(r.properties)),
        other => temporal_from_bolt(other),
    }
}

fn temporal_from_bolt(value: BoltType) -> NativeValue {
    let converted = match value {
        BoltType::Date(d) => d.try_into().ok().map(|d: NaiveDate| NativeValue::Date(d)),
        BoltType::LocalTime(t) => t.try_into().ok().map(|t: NaiveTime| NativeValue::LocalTime(t)),
        BoltType::Time(t) => t
            .try_into()
            .ok()
            .map(|(time, offset): (NaiveTime, FixedOffset)| NativeValue::Time { time, offset }),
        BoltType::DateTime(dt) => dt
            .try_into()
            .ok()
            .map(|dt: DateTime<FixedOffset>| NativeValue::DateTime(dt)),
        BoltType::LocalDateTime(dt) => dt
            .try_into()
            .ok()
            .map(|dt: NaiveDateTime| NativeValue::LocalDateTime(dt)),
        BoltType::Duration(d) => {
            let duration: Duration = d.into();
            Some(NativeValue::Duration(duration))
        }
        _ => None,
    };

    converted.unwrap_or_else(|| {
        tracing::debug!("Unsupported or out-of-range temporal value, using null");
        NativeValue::Null
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo4rs::{BoltInteger, BoltList, BoltString, BoltUnboundedRelation};
    use serde_json::json;

    fn list(items: Vec<BoltType>) -> BoltList {
        BoltList { value: items }
    }

    fn props(entries: &[(&str, BoltType)]) -> BoltMap {
        let mut map = BoltMap::new();
        for (key, value) in entries {
            map.put(BoltString::new(key), value.clone());
        }
        map
    }

    fn node(id: i64, label: &str, entries: &[(&str, BoltType)]) -> BoltNode {
        BoltNode::new(
            BoltInteger::new(id),
            list(vec![BoltType::from(label)]),
            props(entries),
        )
    }

    fn row(columns: Vec<(&str, BoltType)>) -> Row {
        let (fields, data): (Vec<_>, Vec<_>) = columns
            .into_iter()
            .map(|(key, value)| (BoltType::from(key), value))
            .unzip();
        Row::new(list(fields), list(data))
    }

    /// `(1)-[10]->(2)<-[11]-(3)`
    fn mixed_direction_path() -> BoltPath {
        BoltPath {
            nodes: list(vec![
                BoltType::Node(node(1, "AWSRole", &[])),
                BoltType::Node(node(2, "AWSRole", &[])),
                BoltType::Node(node(3, "AWSPrincipal", &[])),
            ]),
            rels: list(vec![
                BoltType::UnboundedRelation(BoltUnboundedRelation::new(
                    BoltInteger::new(10),
                    BoltString::new("STS_ASSUMEROLE_ALLOW"),
                    props(&[]),
                )),
                BoltType::UnboundedRelation(BoltUnboundedRelation::new(
                    BoltInteger::new(11),
                    BoltString::new("TRUSTS_AWS_PRINCIPAL"),
                    props(&[("provider_id", BoltType::from("p1"))]),
                )),
            ]),
            indices: list(vec![
                BoltType::from(1i64),
                BoltType::from(1i64),
                BoltType::from(-2i64),
                BoltType::from(2i64),
            ]),
        }
    }

    #[test]
    fn test_path_relationships_follow_index_sign() {
        let mut graph = RawGraph::new();
        collect_path(mixed_direction_path(), &mut graph);

        let node_ids: Vec<_> = graph.nodes().iter().map(|n| n.element_id.as_str()).collect();
        assert_eq!(node_ids, ["1", "2", "3"]);

        let rels = graph.relationships();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].element_id, "10");
        assert_eq!(rels[0].rel_type, "STS_ASSUMEROLE_ALLOW");
        assert_eq!((rels[0].start_node_id.as_str(), rels[0].end_node_id.as_str()), ("1", "2"));
        assert_eq!(rels[1].element_id, "11");
        assert_eq!((rels[1].start_node_id.as_str(), rels[1].end_node_id.as_str()), ("3", "2"));
        assert_eq!(rels[1].property("provider_id"), Some(&NativeValue::from("p1")));
    }

    #[test]
    fn test_collect_row_walks_every_column() {
        let row = row(vec![
            ("n", BoltType::Node(node(7, "EC2Instance", &[("name", BoltType::from("web"))]))),
            ("p", BoltType::Path(mixed_direction_path())),
            ("count", BoltType::from(3i64)),
        ]);

        let mut graph = RawGraph::new();
        collect_row(&row, &mut graph);

        assert_eq!(graph.nodes().len(), 4);
        assert_eq!(graph.relationships().len(), 2);
        let web = graph
            .nodes()
            .iter()
            .find(|n| n.element_id == "7")
            .expect("node column collected");
        assert_eq!(web.labels, ["EC2Instance"]);
        assert_eq!(web.property("name"), Some(&NativeValue::from("web")));
    }

    #[test]
    fn test_record_from_row_converts_columns() {
        let row = row(vec![
            ("module_name", BoltType::from("cartography:aws")),
            ("module_version", BoltType::from("0.98.0")),
            ("missing", BoltType::Null(neo4rs::BoltNull)),
        ]);

        let record = record_from_row(&row);

        assert_eq!(record.len(), 3);
        assert_eq!(record.get("module_name"), Some(&NativeValue::from("cartography:aws")));
        assert_eq!(record.get("module_version"), Some(&NativeValue::from("0.98.0")));
        assert_eq!(record.get("missing"), Some(&NativeValue::Null));
    }

    #[test]
    fn test_node_ids_are_bolt_identities() {
        let raw = node_from_bolt(node(42, "AWSAccount", &[]));
        assert_eq!(raw.element_id, "42");
    }

    #[test]
    fn test_native_from_bolt_primitives_and_collections() {
        let list = BoltType::from(vec![BoltType::from(1i64), BoltType::from("a")]);
        assert_eq!(
            native_from_bolt(list),
            NativeValue::List(vec![NativeValue::Integer(1), NativeValue::from("a")])
        );
        assert_eq!(native_from_bolt(BoltType::from(true)), NativeValue::Boolean(true));
        assert_eq!(native_from_bolt(BoltType::Null(neo4rs::BoltNull)), NativeValue::Null);
    }

    #[test]
    fn test_json_parameters_convert_to_bolt() {
        let value = json!({"ports": [80, 443], "name": "web", "ratio": 0.5});
        let bolt = json_to_bolt(&value);
        let BoltType::Map(map) = bolt else {
            panic!("expected a map");
        };
        let native = properties_from_bolt(map);
        assert_eq!(
            native.get("ports"),
            Some(&NativeValue::List(vec![
                NativeValue::Integer(80),
                NativeValue::Integer(443)
            ]))
        );
        assert_eq!(native.get("ratio"), Some(&NativeValue::Float(0.5)));
    }
}
