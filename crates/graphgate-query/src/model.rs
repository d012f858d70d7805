//! Transport-ready graph shapes returned to callers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A node visible to the requesting provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNode {
    pub id: String,
    pub labels: Vec<String>,
    pub properties: Map<String, Value>,
}

/// A relationship between two nodes of the same serialized graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedRelationship {
    pub id: String,
    /// Relationship type.
    pub label: String,
    pub source: String,
    pub target: String,
    pub properties: Map<String, Value>,
}

/// Result of a query, scoped to one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedGraph {
    pub nodes: Vec<SerializedNode>,
    pub relationships: Vec<SerializedRelationship>,
    /// Node count before any truncation.
    pub total_nodes: usize,
    pub truncated: bool,
}

impl SerializedNode {
    pub fn new(id: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            id: id.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

impl SerializedRelationship {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            source: source.into(),
            target: target.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}
