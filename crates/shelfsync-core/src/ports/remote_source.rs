//! Remote read port (driven/secondary port)
//!
//! Row-level read access to the authoritative remote service. The engine
//! never writes to the remote; the only operations are a paged fetch of
//! rows modified after a watermark and a cheap existence probe.
//!
//! ## Design Notes
//!
//! - Errors are a structured [`RemoteError`] rather than `anyhow::Error`
//!   because the orchestrator's retry policy branches on the error kind:
//!   auth-class failures get exactly one retry after a refresh signal,
//!   everything else fails the table. Matching on message substrings is
//!   deliberately not supported.
//! - [`RemoteRow`] is a port-level DTO; the store maps its JSON fields onto
//!   local columns using the table descriptor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::TableDescriptor;

/// A single row returned by the remote read interface.
///
/// `id` and `updated_at` are extracted eagerly because the engine depends
/// on them (primary key and change-detection field); the remaining fields
/// stay as a JSON object and are mapped to columns by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRow {
    /// Stable remote primary key.
    pub id: String,
    /// Remote last-modified timestamp (change-detection field).
    pub updated_at: DateTime<Utc>,
    /// Full row payload as a JSON object, `id` and `updated_at` included.
    pub fields: serde_json::Value,
}

impl RemoteRow {
    /// Looks up a field from the row payload.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.as_object().and_then(|obj| obj.get(name))
    }
}

/// Structured error kinds for remote read operations.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Credentials were rejected (expired/invalid token). The orchestrator
    /// recovers with a single retry after signaling the auth layer.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The remote asked us to back off (HTTP 429).
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The remote reported a server-side failure (HTTP 5xx).
    #[error("Server error (HTTP {status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// Transport-level failure (DNS, connect, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// The response body could not be decoded into rows.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether this error is auth-class and eligible for the
    /// refresh-then-retry-once recovery path.
    pub fn is_auth(&self) -> bool {
        matches!(self, RemoteError::Auth(_))
    }
}

/// Port trait for the remote read interface.
///
/// Implementations are expected to order rows by `updated_at` ascending so
/// the orchestrator can advance cursors batch by batch.
#[async_trait::async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetches up to `limit` rows with `updated_at > since`, ordered by
    /// `updated_at` ascending, skipping the first `offset` rows.
    async fn fetch_page(
        &self,
        table: &TableDescriptor,
        since: DateTime<Utc>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<RemoteRow>, RemoteError>;

    /// Cheap existence probe: whether any row has `updated_at > since`.
    ///
    /// Implementations should request at most one row; the engine uses this
    /// to skip full sync runs when nothing changed.
    async fn has_changes(
        &self,
        table: &TableDescriptor,
        since: DateTime<Utc>,
    ) -> Result<bool, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_auth_only_for_auth_kind() {
        assert!(RemoteError::Auth("JWT expired".to_string()).is_auth());
        assert!(!RemoteError::Network("connection refused".to_string()).is_auth());
        assert!(!RemoteError::Server {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_auth());
    }

    #[test]
    fn test_remote_row_field_lookup() {
        let row = RemoteRow {
            id: "b1".to_string(),
            updated_at: Utc::now(),
            fields: serde_json::json!({"id": "b1", "title": "Dune"}),
        };
        assert_eq!(
            row.field("title"),
            Some(&serde_json::Value::String("Dune".to_string()))
        );
        assert!(row.field("missing").is_none());
    }
}
