//! graphgate Graph — read-enforced Neo4j access for tenant databases.
//!
//! This crate is the single point of contact with the shared Neo4j server.
//! It owns the lazily constructed driver, hands out retrying sessions bound
//! to one database and access mode, and translates every native failure
//! into the small [`GraphError`] taxonomy before it leaves the crate.

pub mod backend;
pub mod client;
pub mod error;
pub mod mutations;
pub mod neo4j;
pub mod queries;
pub mod raw;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{AccessMode, Connector, Driver, Parameters, Record, Session, Statement};
pub use client::{GraphClient, GraphConfig};
pub use error::{BackendError, GraphError, READ_VIOLATION_CODES};
pub use raw::{NativeValue, RawGraph, RawNode, RawRelationship};
pub use session::ScopedSession;
