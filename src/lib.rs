//! # drizzle-kit
//!
//! Schema snapshot diffing and SQL migration generation.
//!
//! drizzle-kit provides:
//! - A typed snapshot model with loading of legacy snapshot files
//! - Structural diffing with pluggable rename resolution
//! - Migration SQL for PostgreSQL, MySQL, SQLite, LibSQL and SingleStore
//! - Data-loss checks for pushing a schema straight to a live database
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drizzle_kit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = KitConfig::from_file("drizzle.toml")?;
//!     let prev = Snapshot::from_file("drizzle/meta/0000_snapshot.json")?;
//!     let cur = Snapshot::from_file("drizzle/meta/0001_snapshot.json")?;
//!
//!     let output = generate_migration(&config, &prev, &cur, &Resolvers::uniform(&NoRenames)).await?;
//!     println!("{}", config.join_statements(&output.sql_statements));
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::borrow::Cow;

/// Snapshot model and configuration.
pub mod schema {
    pub use drizzle_schema::*;
}

/// Differ, orchestrators, convertors and push checks.
pub mod migrate {
    pub use drizzle_migrate::*;
}

pub use drizzle_migrate::{
    Action, DiffOutput, MigrateResult, MigrationError, PushConnection, PushSuggestions, Resolvers,
};
pub use drizzle_schema::{Dialect, KitConfig, SchemaError, Snapshot};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{generate_migration, push_suggestions};
    pub use drizzle_migrate::{
        Action, DiffOutput, JsonStatement, MigrateResult, MigrationError, NoRenames,
        PushConnection, PushSuggestions, RenameResolver, Resolvers, StaticResolver,
    };
    pub use drizzle_schema::{Column, Dialect, KitConfig, Snapshot, Table};
}

/// Drop the classes of entities the config does not manage.
fn managed<'a>(config: &KitConfig, snapshot: &'a Snapshot) -> Cow<'a, Snapshot> {
    if config.entities.roles || snapshot.roles.is_empty() {
        return Cow::Borrowed(snapshot);
    }
    let mut owned = snapshot.clone();
    owned.roles.clear();
    Cow::Owned(owned)
}

async fn diff(
    config: &KitConfig,
    prev: &Snapshot,
    cur: &Snapshot,
    resolvers: &Resolvers<'_>,
    action: Action,
) -> MigrateResult<DiffOutput> {
    if config.verbose {
        drizzle_migrate::logging::init_verbose(true);
    }
    let prev = managed(config, prev);
    let cur = managed(config, cur);
    tracing::debug!(dialect = %config.dialect, action = ?action, "Diffing snapshots");

    match config.dialect {
        Dialect::Postgresql => {
            drizzle_migrate::apply_pg_snapshots_diff(&prev, &cur, resolvers, action).await
        }
        Dialect::Mysql => {
            drizzle_migrate::apply_mysql_snapshots_diff(&prev, &cur, resolvers, action).await
        }
        Dialect::Sqlite => {
            drizzle_migrate::apply_sqlite_snapshots_diff(&prev, &cur, resolvers, action).await
        }
        Dialect::Turso => {
            drizzle_migrate::apply_libsql_snapshots_diff(&prev, &cur, resolvers, action).await
        }
        Dialect::Singlestore => {
            drizzle_migrate::apply_singlestore_snapshots_diff(&prev, &cur, resolvers, action).await
        }
    }
}

/// Diff two snapshots into migration statements for the configured dialect.
///
/// With `config.verbose` set, the generated SQL is logged at `info`; a
/// subscriber is installed when the `tracing-subscriber` feature is on.
pub async fn generate_migration(
    config: &KitConfig,
    prev: &Snapshot,
    cur: &Snapshot,
    resolvers: &Resolvers<'_>,
) -> MigrateResult<DiffOutput> {
    let output = diff(config, prev, cur, resolvers, Action::Generate).await?;
    if config.verbose {
        for sql in &output.sql_statements {
            tracing::info!(sql = %sql, "Generated statement");
        }
    }
    Ok(output)
}

/// Diff two snapshots for push and check the result against a live database.
///
/// `prev` is the snapshot introspected from the database, `cur` the declared
/// schema. With `config.strict` set, approval is required whenever anything
/// would run.
pub async fn push_suggestions(
    config: &KitConfig,
    db: &dyn PushConnection,
    prev: &Snapshot,
    cur: &Snapshot,
    resolvers: &Resolvers<'_>,
) -> MigrateResult<PushSuggestions> {
    let output = diff(config, prev, cur, resolvers, Action::Push).await?;
    let statements = &output.statements;
    // Statements use new names; the live database still has the old ones.
    let meta = &output.meta;

    let mut suggestions = match config.dialect {
        Dialect::Postgresql => drizzle_migrate::pg_suggestions(db, statements, meta).await?,
        Dialect::Mysql => drizzle_migrate::mysql_suggestions(db, statements, prev, meta).await?,
        Dialect::Sqlite => drizzle_migrate::sqlite_suggestions(db, statements, prev, meta).await?,
        Dialect::Turso => drizzle_migrate::libsql_suggestions(db, statements, prev, meta).await?,
        Dialect::Singlestore => {
            drizzle_migrate::singlestore_suggestions(db, statements, prev, meta).await?
        }
    };

    if !suggestions.info_to_print.is_empty() {
        tracing::warn!(
            findings = suggestions.info_to_print.len(),
            "Push would lose data"
        );
    }
    suggestions.enforce_strict(config.strict);
    Ok(suggestions)
}
