//! Catalog of predefined queries, loaded from JSON.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{QueryError, Result};
use crate::params::QueryDefinition;

/// Predefined queries, looked up by id.
#[derive(Debug, Clone, Default)]
pub struct QueryCatalog {
    queries: Vec<QueryDefinition>,
}

impl QueryCatalog {
    pub fn new(queries: Vec<QueryDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for query in &queries {
            if !seen.insert(query.id.as_str()) {
                return Err(QueryError::Catalog(format!("duplicate query id `{}`", query.id)));
            }
        }
        Ok(Self { queries })
    }

    /// Parse a JSON array of query definitions.
    pub fn from_json(json: &str) -> Result<Self> {
        let queries: Vec<QueryDefinition> = serde_json::from_str(json)
            .map_err(|e| QueryError::Catalog(format!("invalid catalog: {e}")))?;
        Self::new(queries)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| QueryError::Catalog(format!("cannot read {}: {e}", path.display())))?;
        let catalog = Self::from_json(&json)?;
        tracing::debug!(path = %path.display(), queries = catalog.len(), "Loaded query catalog");
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Result<&QueryDefinition> {
        self.queries
            .iter()
            .find(|q| q.id == id)
            .ok_or_else(|| QueryError::Catalog(format!("unknown query id `{id}`")))
    }

    /// Queries written for `provider` (e.g. `aws`).
    pub fn for_provider<'a>(&'a self, provider: &'a str) -> impl Iterator<Item = &'a QueryDefinition> {
        self.queries.iter().filter(move |q| q.provider == provider)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
