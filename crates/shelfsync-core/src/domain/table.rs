//! Table descriptors and the sync registry
//!
//! Every mirrored table is described by a [`TableDescriptor`] and registered
//! in a [`TableRegistry`]. The orchestrator iterates the registry uniformly,
//! so adding a table is a data change, not an orchestration-logic change.

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Describes one remote table mirrored into the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Registry name, used in cursors, reports, and the public API.
    pub name: String,
    /// Path segment of the remote row endpoint (e.g. `"books"`).
    pub remote_endpoint: String,
    /// Name of the local SQLite table rows are upserted into.
    pub local_table: String,
    /// Remote column the incremental watermark filters and orders on.
    pub cursor_key: String,
    /// Column names, in local schema order. The first column is the primary
    /// key; every column must be present as a field on fetched remote rows.
    pub columns: Vec<String>,
}

impl TableDescriptor {
    /// Convenience constructor for the common case where the registry name,
    /// endpoint, and local table coincide and the watermark column is
    /// `updated_at`.
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            remote_endpoint: name.to_string(),
            local_table: name.to_string(),
            cursor_key: "updated_at".to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// The primary-key column (first column by convention).
    pub fn primary_key(&self) -> &str {
        self.columns
            .first()
            .map(String::as_str)
            .unwrap_or("id")
    }
}

fn is_safe_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Ordered collection of table descriptors.
///
/// Order is significant: it is the order tables are synced in, configured
/// once at engine construction (e.g. books before chapters). Tables remain
/// independent; ordering only makes runs deterministic.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: Vec<TableDescriptor>,
}

impl TableRegistry {
    /// Builds a registry from descriptors, rejecting duplicates, descriptors
    /// without columns, and identifiers that are not plain `[A-Za-z0-9_]`
    /// words. Identifiers end up interpolated into SQL, so anything else is
    /// refused at construction.
    pub fn new(tables: Vec<TableDescriptor>) -> Result<Self, DomainError> {
        for (i, table) in tables.iter().enumerate() {
            if table.name.is_empty() {
                return Err(DomainError::InvalidDescriptor(
                    "table name must not be empty".to_string(),
                ));
            }
            if table.columns.is_empty() {
                return Err(DomainError::InvalidDescriptor(format!(
                    "table '{}' has no columns",
                    table.name
                )));
            }
            for identifier in [&table.name, &table.local_table, &table.cursor_key]
                .into_iter()
                .chain(table.columns.iter())
            {
                if !is_safe_identifier(identifier) {
                    return Err(DomainError::InvalidDescriptor(format!(
                        "identifier '{}' in table '{}' is not a plain word",
                        identifier, table.name
                    )));
                }
            }
            if tables[..i].iter().any(|t| t.name == table.name) {
                return Err(DomainError::InvalidDescriptor(format!(
                    "duplicate table '{}'",
                    table.name
                )));
            }
        }
        Ok(Self { tables })
    }

    /// Looks up a descriptor; unknown names are a programming error surfaced
    /// as [`DomainError::UnknownTable`], never silently ignored.
    pub fn get(&self, name: &str) -> Result<&TableDescriptor, DomainError> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| DomainError::UnknownTable(name.to_string()))
    }

    /// Iterates descriptors in sync order.
    pub fn iter(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.iter()
    }

    /// Registry names in sync order.
    pub fn names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
