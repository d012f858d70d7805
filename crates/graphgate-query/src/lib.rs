//! graphgate-query: provider-scoped read-only graph queries.
//!
//! Executes catalog and caller-written Cypher through `graphgate-graph`,
//! keeps only what belongs to the requesting provider, strips ingestion
//! bookkeeping, and renders the result as JSON-ready structures or as
//! plain text for language-model consumption.

pub mod catalog;
pub mod error;
pub mod model;
pub mod params;
pub mod serialize;
pub mod service;
pub mod text;

pub use catalog::QueryCatalog;
pub use error::{ParameterError, QueryError};
pub use model::{SerializedGraph, SerializedNode, SerializedRelationship};
pub use params::{prepare_parameters, Caster, ParameterType, QueryDefinition, QueryParameterDefinition};
pub use serialize::{normalize_value, serialize_graph, truncate_graph};
pub use service::{IngestionSchema, QueryService};
pub use text::render_as_text;
