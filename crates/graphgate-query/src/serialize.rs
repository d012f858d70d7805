//! Provider-scoped serialization and truncation of raw query results.

use std::collections::HashSet;
use std::time::Duration;

use graphgate_graph::mutations::PROVIDER_RESOURCE_LABEL;
use graphgate_graph::raw::Properties;
use graphgate_graph::{NativeValue, RawGraph};
use serde_json::{Map, Number, Value};

use crate::model::{SerializedGraph, SerializedNode, SerializedRelationship};

/// Labels added by ingestion for bookkeeping. Never shown to callers.
pub const INTERNAL_LABELS: &[&str] = &[PROVIDER_RESOURCE_LABEL, "_ProviderResource"];

/// Ingestion metadata and provider-isolation properties. Never shown to callers.
pub const INTERNAL_PROPERTIES: &[&str] = &[
    "lastupdated",
    "firstseen",
    "_module_name",
    "_module_version",
    "_provider_id",
    "_provider_element_id",
    "provider_id",
    "provider_element_id",
];

const PROVIDER_ID_PROPERTY: &str = "provider_id";

// ── Serialization ────────────────────────────────────────────────

/// Keep only what belongs to `provider_id` and convert it to plain values.
///
/// A relationship survives only if it is tagged with the provider and both
/// of its endpoints survived. `total_nodes` counts the kept nodes.
pub fn serialize_graph(graph: &RawGraph, provider_id: &str) -> SerializedGraph {
    let mut kept_ids: HashSet<&str> = HashSet::new();
    let mut nodes = Vec::new();
    for node in graph.nodes() {
        if !belongs_to(&node.properties, provider_id) {
            continue;
        }
        kept_ids.insert(node.element_id.as_str());
        nodes.push(SerializedNode {
            id: node.element_id.clone(),
            labels: node
                .labels
                .iter()
                .filter(|l| !INTERNAL_LABELS.contains(&l.as_str()))
                .cloned()
                .collect(),
            properties: serialize_properties(&node.properties),
        });
    }

    let relationships = graph
        .relationships()
        .iter()
        .filter(|rel| belongs_to(&rel.properties, provider_id))
        .filter(|rel| {
            kept_ids.contains(rel.start_node_id.as_str())
                && kept_ids.contains(rel.end_node_id.as_str())
        })
        .map(|rel| SerializedRelationship {
            id: rel.element_id.clone(),
            label: rel.rel_type.clone(),
            source: rel.start_node_id.clone(),
            target: rel.end_node_id.clone(),
            properties: serialize_properties(&rel.properties),
        })
        .collect();

    SerializedGraph {
        total_nodes: nodes.len(),
        nodes,
        relationships,
        truncated: false,
    }
}

fn belongs_to(properties: &Properties, provider_id: &str) -> bool {
    properties
        .get(PROVIDER_ID_PROPERTY)
        .and_then(NativeValue::as_str)
        == Some(provider_id)
}

/// Normalize every property except the internal ones.
pub fn serialize_properties(properties: &Properties) -> Map<String, Value> {
    properties
        .iter()
        .filter(|(key, _)| !INTERNAL_PROPERTIES.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), normalize_value(value)))
        .collect()
}

/// Convert a driver value into its plain JSON equivalent.
///
/// Temporal values become ISO-8601 strings, points become coordinate
/// arrays, bytes become integer arrays. Non-finite floats become null.
pub fn normalize_value(value: &NativeValue) -> Value {
    match value {
        NativeValue::Null => Value::Null,
        NativeValue::Boolean(b) => Value::Bool(*b),
        NativeValue::Integer(i) => Value::from(*i),
        NativeValue::Float(f) => float(*f),
        NativeValue::String(s) => Value::String(s.clone()),
        NativeValue::Bytes(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
        NativeValue::List(items) => Value::Array(items.iter().map(normalize_value).collect()),
        NativeValue::Map(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize_value(v)))
                .collect(),
        ),
        NativeValue::Date(date) => Value::String(date.format("%Y-%m-%d").to_string()),
        NativeValue::LocalTime(time) => Value::String(time.format("%H:%M:%S%.f").to_string()),
        NativeValue::Time { time, offset } => {
            Value::String(format!("{}{offset}", time.format("%H:%M:%S%.f")))
        }
        NativeValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
        NativeValue::LocalDateTime(dt) => {
            Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }
        NativeValue::Duration(d) => Value::String(iso_duration(*d)),
        NativeValue::Point2D { x, y, .. } => Value::Array(vec![float(*x), float(*y)]),
        NativeValue::Point3D { x, y, z, .. } => {
            Value::Array(vec![float(*x), float(*y), float(*z)])
        }
    }
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn iso_duration(d: Duration) -> String {
    let nanos = d.subsec_nanos();
    if nanos == 0 {
        return format!("PT{}S", d.as_secs());
    }
    let fraction = format!("{nanos:09}");
    format!("PT{}.{}S", d.as_secs(), fraction.trim_end_matches('0'))
}

// ── Truncation ───────────────────────────────────────────────────

/// Cap the graph at `max_nodes` nodes, keeping the first ones.
///
/// Relationships touching a removed node are dropped. `total_nodes` keeps
/// the pre-truncation count. A graph within the limit is returned as is.
pub fn truncate_graph(mut graph: SerializedGraph, max_nodes: usize) -> SerializedGraph {
    if graph.total_nodes <= max_nodes {
        return graph;
    }

    graph.truncated = true;
    graph.nodes.truncate(max_nodes);
    let kept_ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    let relationships = std::mem::take(&mut graph.relationships)
        .into_iter()
        .filter(|rel| {
            kept_ids.contains(rel.source.as_str()) && kept_ids.contains(rel.target.as_str())
        })
        .collect();
    graph.relationships = relationships;

    tracing::debug!(
        total_nodes = graph.total_nodes,
        kept_nodes = graph.nodes.len(),
        "Truncated query result"
    );
    graph
}
