//! Error types for the graphgate-query crate.

use thiserror::Error;

use graphgate_graph::GraphError;

/// Caller-supplied parameters do not fit a query definition.
///
/// These are input errors; they are never logged as server failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Unknown parameter(s): {}", .0.join(", "))]
    UnknownParameter(Vec<String>),

    #[error("Missing required parameter(s): {}", .0.join(", "))]
    MissingParameter(Vec<String>),

    #[error("Invalid value for parameter `{name}`: {reason}")]
    InvalidParameterValue { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum QueryError {
    /// The query tried to write through a read-only session.
    #[error("Query execution failed: read-only queries are enforced")]
    PermissionDenied { code: String },

    /// The database rejected or failed the query. Details stay in the logs.
    #[error("{operation} failed due to a database error")]
    Database {
        operation: &'static str,
        #[source]
        source: GraphError,
    },

    #[error(transparent)]
    InvalidParameters(#[from] ParameterError),

    #[error("Query catalog error: {0}")]
    Catalog(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;
