//! Domain error types
//!
//! Errors for domain-level validation: unknown tables, malformed
//! descriptors, and unparsable persisted values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A table name was passed that is not in the registry
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// A table descriptor failed validation
    #[error("Invalid table descriptor: {0}")]
    InvalidDescriptor(String),

    /// A persisted timestamp could not be parsed
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A persisted cursor status string was not recognized
    #[error("Invalid cursor status: {0}")]
    InvalidCursorStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::UnknownTable("playlists".to_string());
        assert_eq!(err.to_string(), "Unknown table: playlists");

        let err = DomainError::InvalidTimestamp("not-a-date".to_string());
        assert_eq!(err.to_string(), "Invalid timestamp: not-a-date");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::UnknownTable("books".to_string());
        let err2 = DomainError::UnknownTable("books".to_string());
        assert_eq!(err1, err2);
    }
}
