// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Error types for metadata operations
//!
//! This module defines the error types used throughout the catalog layer.
//! Remote failures carry the database and operation they happened in so the
//! transport layer can report them without extra context.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur during catalog operations
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum CatalogError {
    /// A remote query failed for a reason other than an expired credential
    #[error("Query '{operation}' failed on database '{database}': {message}")]
    DataAccess {
        database: String,
        operation: String,
        message: String,
    },

    /// The remote source still rejected the credential after one refresh
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The existence check determined that the object does not exist
    #[error("Object '{0}' was not found")]
    NotFound(String),

    /// The caller asked for something the cache can never be in a state to answer
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The operation is not defined for the given object kind
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller cancelled the operation before it completed
    #[error("Operation was cancelled")]
    Cancelled,

    /// A credential could not be acquired
    #[error("Failed to acquire token: {0}")]
    Token(String),

    /// A result set did not have the shape the caller asked for
    #[error("Failed to deserialize result: {0}")]
    Deserialize(String),
}

impl CatalogError {
    /// Build a [`CatalogError::DataAccess`] from its parts
    pub fn data_access(
        database: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::DataAccess {
            database: database.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from caller cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_access_display_includes_context() {
        let err = CatalogError::data_access("Samples", "list functions", "timeout");
        let msg = err.to_string();
        assert!(msg.contains("Samples"));
        assert!(msg.contains("list functions"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn test_cancelled_is_distinct_from_data_access() {
        assert!(CatalogError::Cancelled.is_cancelled());
        assert!(!CatalogError::data_access("db", "op", "msg").is_cancelled());
    }
}
