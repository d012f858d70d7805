//! Identifiers shared across graphgate services.
//!
//! Every tenant owns one long-lived graph database, and every in-flight
//! scan may write to a temporary database before it is promoted. Both are
//! provisioned elsewhere; this module only knows how they are named.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatewayError;

// ── Identifiers ───────────────────────────────────────────────────

/// Identifier of a tenant owning a graph database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        parse_uuid(raw).map(Self)
    }

    /// Name of the tenant's long-lived graph database.
    pub fn database_name(&self) -> String {
        database_name(self.0, DatabaseKind::Tenant)
    }
}

/// Identifier of a scan whose results land in a temporary database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ScanId(pub Uuid);

impl ScanId {
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        parse_uuid(raw).map(Self)
    }

    /// Name of the scan's temporary graph database.
    pub fn database_name(&self) -> String {
        database_name(self.0, DatabaseKind::TemporaryScan)
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, GatewayError> {
    Uuid::parse_str(raw.trim()).map_err(|e| GatewayError::InvalidIdentifier {
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

// ── Database Naming ───────────────────────────────────────────────

/// Which family of per-tenant database a name refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseKind {
    Tenant,
    TemporaryScan,
}

impl DatabaseKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::TemporaryScan => "tmp-scan",
        }
    }
}

/// Format the graph database name for an entity: `db-tenant-<id>` or `db-tmp-scan-<id>`.
pub fn database_name(entity_id: impl fmt::Display, kind: DatabaseKind) -> String {
    format!(
        "db-{}-{}",
        kind.prefix(),
        entity_id.to_string().to_lowercase()
    )
}
