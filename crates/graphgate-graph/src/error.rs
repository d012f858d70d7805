//! Error taxonomy for graph access and translation of native failures.

use std::fmt;
use std::time::Duration;

use crate::backend::AccessMode;

/// Server codes that mean "a read-only transaction tried to write".
///
/// `ProcedureNotFound` is included because write-capable procedures are not
/// registered for read transactions. `Security.Forbidden` is what the server
/// reports when the read-only role attempts a write, including writes issued
/// from inside a procedure's own transactions.
pub const READ_VIOLATION_CODES: &[&str] = &[
    "Neo.ClientError.Statement.AccessMode",
    "Neo.ClientError.Procedure.ProcedureNotFound",
    "Neo.ClientError.Security.Forbidden",
];

pub const DATABASE_NOT_FOUND_CODE: &str = "Neo.ClientError.Database.DatabaseNotFound";

pub const TRANSACTION_TIMED_OUT_CODE: &str = "Neo.ClientError.Transaction.TransactionTimedOut";

/// Failures reported by a backend. Never leaves this crate's public operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// Connection-level failure; the operation may succeed on a fresh session.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The server rejected the statement.
    #[error("database error {}: {}", .code.as_deref().unwrap_or("<none>"), .message.as_deref().unwrap_or("<none>"))]
    Database {
        code: Option<String>,
        message: Option<String>,
    },

    /// The transaction did not finish within the read timeout.
    #[error("transaction exceeded {0:?}")]
    Timeout(Duration),
}

impl BackendError {
    pub fn database(code: &str, message: impl Into<String>) -> Self {
        Self::Database {
            code: Some(code.to_string()),
            message: Some(message.into()),
        }
    }

    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors from graph operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// A read-only session attempted a write or a write-capable procedure.
    #[error("Write query not allowed in read-only session ({code})")]
    WriteNotAllowed { code: String },

    /// Any other failure reported by the database.
    #[error("{}", QueryDisplay { message, code: code.as_deref() })]
    Query {
        message: String,
        code: Option<String>,
    },

    /// The driver could not be constructed or reached at first use.
    #[error("Neo4j connection error: {0}")]
    ServiceUnavailable(String),
}

struct QueryDisplay<'a> {
    message: &'a str,
    code: Option<&'a str>,
}

impl fmt::Display for QueryDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(self.message),
        }
    }
}

impl GraphError {
    /// Reported server code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::WriteNotAllowed { code } => Some(code),
            Self::Query { code, .. } => code.as_deref(),
            Self::ServiceUnavailable(_) => None,
        }
    }

    pub fn is_database_not_found(&self) -> bool {
        self.code() == Some(DATABASE_NOT_FOUND_CODE)
    }
}

/// Map a backend failure into the public taxonomy.
///
/// Read-violation codes only become [`GraphError::WriteNotAllowed`] when the
/// session was opened read-only. Unavailability reaching this point has
/// already exhausted its retries.
pub fn translate(err: BackendError, mode: AccessMode) -> GraphError {
    match err {
        BackendError::Database { code, message } => {
            if let Some(c) = code.as_deref() {
                if mode == AccessMode::Read && READ_VIOLATION_CODES.contains(&c) {
                    return GraphError::WriteNotAllowed {
                        code: c.to_string(),
                    };
                }
            }
            let message = message
                .or_else(|| code.clone())
                .unwrap_or_else(|| "unknown database error".to_string());
            GraphError::Query { message, code }
        }
        BackendError::Unavailable(message) => GraphError::Query {
            message: format!("service unavailable: {message}"),
            code: None,
        },
        BackendError::Timeout(limit) => GraphError::Query {
            message: format!(
                "transaction exceeded the {}s read timeout",
                limit.as_secs()
            ),
            code: Some(TRANSACTION_TIMED_OUT_CODE.to_string()),
        },
    }
}
