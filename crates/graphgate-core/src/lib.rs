//! graphgate-core: Shared configuration, identifiers, and error handling for graphgate.
//!
//! This crate provides the foundational pieces used by the gateway crates:
//! - Settings for the Neo4j connection and query limits, loaded from file and environment
//! - Tenant and scan identifiers and the per-tenant database naming convention
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{GatewaySettings, Neo4jSettings, QuerySettings};
pub use error::GatewayError;
pub use types::{database_name, DatabaseKind, ScanId, TenantId};
