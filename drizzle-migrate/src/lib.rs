//! # drizzle-migrate
//!
//! Schema diffing and migration generation for drizzle-kit.
//!
//! This crate provides functionality for:
//! - Structural diffing of two schema snapshots
//! - Rename and schema-move resolution through pluggable resolvers
//! - Ordered, dialect-agnostic migration statements
//! - SQL rendering for PostgreSQL, MySQL, SQLite, LibSQL and SingleStore
//! - Data-loss checks before pushing straight to a live database
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐     ┌────────────┐     ┌──────────────┐     ┌────────────┐
//! │ Snapshots  │────▶│ Resolvers  │────▶│ Orchestrator │────▶│ Convertors │
//! └────────────┘     └────────────┘     └──────────────┘     └────────────┘
//!                                              │                    │
//!                                              ▼                    ▼
//!                                       ┌──────────────┐     ┌────────────┐
//!                                       │   Combiner   │     │ Push checks│
//!                                       └──────────────┘     └────────────┘
//! ```
//!
//! Each orchestrator resolves renames first, patching the previous snapshot
//! so that renamed entities compare as equal, then diffs what is left and
//! emits statements in an order the database accepts.
//!
//! ## Example
//!
//! ```rust,no_run
//! use drizzle_migrate::{Action, NoRenames, Resolvers, apply_pg_snapshots_diff};
//! use drizzle_schema::Snapshot;
//!
//! async fn generate() -> Result<(), Box<dyn std::error::Error>> {
//!     let prev = Snapshot::from_file("drizzle/meta/0000_snapshot.json")?;
//!     let cur = Snapshot::from_file("drizzle/meta/0001_snapshot.json")?;
//!
//!     let resolvers = Resolvers::uniform(&NoRenames);
//!     let output = apply_pg_snapshots_diff(&prev, &cur, &resolvers, Action::Generate).await?;
//!     println!("{}", output.to_migration_sql(true));
//!     Ok(())
//! }
//! ```

pub mod combine;
pub mod differ;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod push;
pub mod resolver;
pub mod sql;
pub mod statement;

// Re-exports
pub use differ::{AlteredColumn, AlteredTable, DiffResult, FieldChange, apply_json_diff};
pub use error::{MigrateResult, MigrationError};
pub use orchestrator::{
    Action, DiffOutput, apply_libsql_snapshots_diff, apply_mysql_snapshots_diff,
    apply_pg_snapshots_diff, apply_singlestore_snapshots_diff, apply_sqlite_snapshots_diff,
};
pub use push::{
    PushConnection, PushSuggestions, libsql_suggestions, mysql_suggestions, pg_suggestions,
    singlestore_suggestions, sqlite_suggestions,
};
pub use resolver::{
    Moved, NoRenames, RenameResolver, Renamed, ResolverInput, ResolverOutput, Resolvers,
    StaticResolver,
};
pub use sql::{ConvertContext, ConvertorRegistry, StatementConvertor, from_json};
pub use statement::JsonStatement;
