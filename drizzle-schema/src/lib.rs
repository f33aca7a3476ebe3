//! # drizzle-schema
//!
//! Snapshot model and configuration for drizzle-kit.
//!
//! A [`Snapshot`] describes the full declared schema of one dialect at one point
//! in time: tables with their columns, indexes, keys and constraints, plus the
//! Postgres-only enums, sequences, roles, policies and schemas, and views.
//!
//! Snapshot files written by older releases are upgraded on load, including the
//! legacy delimited-string ("squashed") encoding of indexes and constraints.
//!
//! ## Example
//!
//! ```rust,no_run
//! use drizzle_schema::{KitConfig, Snapshot};
//!
//! let config = KitConfig::from_file("drizzle.toml")?;
//! let prev = Snapshot::from_file("drizzle/meta/0000_snapshot.json")?;
//! assert_eq!(prev.dialect.snapshot_family(), config.dialect.snapshot_family());
//! # Ok::<(), drizzle_schema::SchemaError>(())
//! ```

pub mod config;
pub mod error;
pub mod snapshot;

pub use config::{KitConfig, STATEMENT_BREAKPOINT};
pub use error::{SchemaError, SchemaResult};
pub use snapshot::{
    CheckConstraint, Column, Dialect, Enum, ExpressionColumn, ForeignKey, Generated,
    GeneratedKind, Identity, IdentityKind, Index, IndexColumn, Policy, PrimaryKey, Role, Sequence,
    SequenceOptions, Snapshot, SnapshotMeta, Table, UniqueConstraint, View,
};
