//! Plain-text rendering of a serialized graph.
//!
//! The layout is stable and order-preserving so the same graph always
//! renders to the same bytes. Property values use Cypher literal syntax.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::model::{SerializedGraph, SerializedNode};

/// Render `graph` as Markdown-flavoured text.
///
/// ```text
/// ## Nodes (2)
/// - AWSAccount "n1" (name: "prod")
/// - EC2Instance "n2"
///
/// ## Relationships (1)
/// - AWSAccount "n1" -[RESOURCE]-> EC2Instance "n2"
///
/// ## Summary
/// - Total nodes: 2
/// - Truncated: false
/// ```
pub fn render_as_text(graph: &SerializedGraph) -> String {
    let by_id: HashMap<&str, &SerializedNode> =
        graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let signature_of = |id: &str| match by_id.get(id) {
        Some(node) => node_signature(node),
        None => quote(id),
    };

    let mut lines = Vec::with_capacity(graph.nodes.len() + graph.relationships.len() + 8);

    lines.push(format!("## Nodes ({})", graph.nodes.len()));
    for node in &graph.nodes {
        lines.push(format!(
            "- {}{}",
            node_signature(node),
            property_suffix(&node.properties)
        ));
    }

    lines.push(String::new());
    lines.push(format!("## Relationships ({})", graph.relationships.len()));
    for rel in &graph.relationships {
        lines.push(format!(
            "- {} -[{}{}]-> {}",
            signature_of(&rel.source),
            rel.label,
            property_suffix(&rel.properties),
            signature_of(&rel.target)
        ));
    }

    lines.push(String::new());
    lines.push("## Summary".to_string());
    lines.push(format!("- Total nodes: {}", graph.total_nodes));
    lines.push(format!("- Truncated: {}", graph.truncated));

    lines.join("\n")
}

fn node_signature(node: &SerializedNode) -> String {
    if node.labels.is_empty() {
        quote(&node.id)
    } else {
        format!("{} {}", node.labels.join(", "), quote(&node.id))
    }
}

/// ` (k: v, ...)`, or nothing when there are no properties.
fn property_suffix(properties: &Map<String, Value>) -> String {
    if properties.is_empty() {
        String::new()
    } else {
        format!(" ({})", format_entries(properties))
    }
}

/// Entries in the map's own order.
fn format_entries(map: &Map<String, Value>) -> String {
    map.iter()
        .map(|(key, value)| format!("{key}: {}", format_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(format_value).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => format!("{{{}}}", format_entries(map)),
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
