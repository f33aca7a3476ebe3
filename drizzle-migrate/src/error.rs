//! Error types for the migration engine.

use drizzle_schema::{Dialect, SchemaError};
use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur while diffing snapshots or preparing a push.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Snapshot loading or validation failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A rename resolver failed (prompt aborted, bad input).
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// The live connection failed during push.
    #[error("Connection error: {0}")]
    Connection(String),

    /// No SQL convertor exists for a statement in this dialect.
    #[error("No convertor for statement '{statement}' in dialect {dialect}")]
    MissingConvertor {
        /// Statement type.
        statement: String,
        /// Target dialect.
        dialect: Dialect,
    },

    /// Orchestrator called with snapshots of another dialect.
    #[error("Expected {expected} snapshots, got {found}")]
    DialectMismatch {
        /// Dialect the orchestrator handles.
        expected: Dialect,
        /// Dialect found in the snapshot.
        found: Dialect,
    },

    /// General migration error.
    #[error("Migration error: {0}")]
    Other(String),
}

impl MigrationError {
    /// Create a resolver error.
    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether the user can retry after fixing input (as opposed to a bug).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Resolver(_) | Self::Connection(_) | Self::Schema(_)
        )
    }
}
