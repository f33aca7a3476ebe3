//! Error types for snapshot loading and configuration.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while loading, upgrading or validating snapshots.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading or writing a file.
    #[error("failed to access file: {path}")]
    #[diagnostic(code(drizzle::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot JSON could not be parsed.
    #[error("failed to parse snapshot JSON")]
    #[diagnostic(
        code(drizzle::schema::json_error),
        help("snapshot files are produced by the kit; hand edits must keep the JSON shape intact")
    )]
    JsonError {
        #[source]
        source: serde_json::Error,
    },

    /// Error parsing the TOML config file.
    #[error("failed to parse TOML")]
    #[diagnostic(code(drizzle::schema::toml_error))]
    TomlError {
        #[source]
        source: toml::de::Error,
    },

    /// Snapshot was written by a newer release.
    #[error("snapshot version {found} is not supported for {dialect} (latest is {latest})")]
    #[diagnostic(
        code(drizzle::schema::unsupported_version),
        help("upgrade drizzle-kit to read this snapshot")
    )]
    UnsupportedVersion {
        dialect: String,
        found: String,
        latest: String,
    },

    /// Two snapshots of different dialects were compared.
    #[error("cannot compare a {left} snapshot with a {right} snapshot")]
    #[diagnostic(code(drizzle::schema::dialect_mismatch))]
    DialectMismatch { left: String, right: String },

    /// A legacy squashed value could not be decoded.
    #[error("malformed squashed {kind}: `{value}`")]
    #[diagnostic(code(drizzle::schema::malformed_squash))]
    MalformedSquash { kind: &'static str, value: String },

    /// Snapshot content breaks a structural invariant.
    #[error("invalid snapshot: {message}")]
    #[diagnostic(code(drizzle::schema::invalid_snapshot))]
    InvalidSnapshot { message: String },

    /// Invalid configuration.
    #[error("invalid config: {message}")]
    #[diagnostic(code(drizzle::schema::invalid_config))]
    InvalidConfig { message: String },
}

impl SchemaError {
    /// Create an invalid snapshot error.
    pub fn invalid_snapshot(message: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            message: message.into(),
        }
    }

    /// Create a malformed squash error.
    pub fn malformed_squash(kind: &'static str, value: impl Into<String>) -> Self {
        Self::MalformedSquash {
            kind,
            value: value.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(source: serde_json::Error) -> Self {
        Self::JsonError { source }
    }
}
