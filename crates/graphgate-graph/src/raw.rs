//! Raw graph returned by one query execution, before any tenant filtering.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

/// A property value as the driver hands it over.
///
/// This is the complete set of Bolt value kinds that can appear in node or
/// relationship properties (and in nested lists/maps of query results).
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<NativeValue>),
    Map(BTreeMap<String, NativeValue>),
    Date(NaiveDate),
    Time { time: NaiveTime, offset: FixedOffset },
    LocalTime(NaiveTime),
    DateTime(DateTime<FixedOffset>),
    LocalDateTime(NaiveDateTime),
    Duration(Duration),
    Point2D { srid: i64, x: f64, y: f64 },
    Point3D { srid: i64, x: f64, y: f64, z: f64 },
}

impl NativeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

pub type Properties = BTreeMap<String, NativeValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct RawNode {
    /// Driver-native element identifier.
    pub element_id: String,
    pub labels: Vec<String>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRelationship {
    pub element_id: String,
    pub rel_type: String,
    pub start_node_id: String,
    pub end_node_id: String,
    pub properties: Properties,
}

impl RawNode {
    pub fn new(element_id: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            element_id: element_id.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<NativeValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&NativeValue> {
        self.properties.get(key)
    }
}

impl RawRelationship {
    pub fn new(
        element_id: impl Into<String>,
        rel_type: &str,
        start_node_id: impl Into<String>,
        end_node_id: impl Into<String>,
    ) -> Self {
        Self {
            element_id: element_id.into(),
            rel_type: rel_type.to_string(),
            start_node_id: start_node_id.into(),
            end_node_id: end_node_id.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<NativeValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&NativeValue> {
        self.properties.get(key)
    }
}

/// Every distinct node and relationship seen in a result, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct RawGraph {
    nodes: Vec<RawNode>,
    relationships: Vec<RawRelationship>,
    seen_nodes: HashSet<String>,
    seen_relationships: HashSet<String>,
}

impl RawGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node unless one with the same element id was already added.
    pub fn add_node(&mut self, node: RawNode) {
        if self.seen_nodes.insert(node.element_id.clone()) {
            self.nodes.push(node);
        }
    }

    /// Add a relationship unless one with the same element id was already added.
    pub fn add_relationship(&mut self, relationship: RawRelationship) {
        if self.seen_relationships.insert(relationship.element_id.clone()) {
            self.relationships.push(relationship);
        }
    }

    pub fn nodes(&self) -> &[RawNode] {
        &self.nodes
    }

    pub fn relationships(&self) -> &[RawRelationship] {
        &self.relationships
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}

impl PartialEq for RawGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.relationships == other.relationships
    }
}
