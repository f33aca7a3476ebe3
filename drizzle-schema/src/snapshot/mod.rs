//! Versioned schema snapshots.
//!
//! A snapshot is the full declared schema at one point in time. Two snapshots
//! (`json1` before, `json2` after) are compared by the migration engine.
//! Collections are ordered maps so generated DDL follows declaration order.

pub mod entity;
pub mod squash;
pub mod upgrade;

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use entity::*;

use crate::error::{SchemaError, SchemaResult};

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL.
    #[serde(alias = "postgres", alias = "pg")]
    Postgresql,
    /// MySQL / MariaDB.
    Mysql,
    /// SQLite.
    Sqlite,
    /// LibSQL / Turso.
    #[serde(alias = "libsql")]
    Turso,
    /// SingleStore.
    Singlestore,
}

impl Dialect {
    /// Dialect name as written in snapshots and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgresql => "postgresql",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Turso => "turso",
            Self::Singlestore => "singlestore",
        }
    }

    /// Dialect whose snapshot shape this dialect shares.
    pub fn snapshot_family(&self) -> Dialect {
        match self {
            Self::Turso => Self::Sqlite,
            other => *other,
        }
    }

    /// Latest snapshot version written for this dialect.
    pub fn latest_version(&self) -> &'static str {
        match self.snapshot_family() {
            Self::Postgresql => "7",
            Self::Mysql => "5",
            Self::Singlestore => "1",
            _ => "6",
        }
    }

    /// Whether tables live in named schemas.
    pub fn has_schemas(&self) -> bool {
        matches!(self, Self::Postgresql)
    }

    /// Key under which a table or view is stored in a snapshot.
    pub fn entity_key(&self, schema: &str, name: &str) -> String {
        if self.has_schemas() {
            let schema = if schema.is_empty() { "public" } else { schema };
            format!("{}.{}", schema, name)
        } else {
            name.to_string()
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full schema state for one dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Snapshot format version.
    pub version: String,
    /// Dialect the snapshot was taken for.
    pub dialect: Dialect,
    /// Snapshot id.
    #[serde(default)]
    pub id: String,
    /// Id of the previous snapshot in the chain.
    #[serde(default)]
    pub prev_id: String,
    /// Tables keyed by qualified name.
    #[serde(default)]
    pub tables: IndexMap<String, Table>,
    /// Enums keyed by `schema.name` (Postgres).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub enums: IndexMap<String, Enum>,
    /// Schemas, name to name (Postgres).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub schemas: IndexMap<String, String>,
    /// Sequences keyed by `schema.name` (Postgres).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub sequences: IndexMap<String, Sequence>,
    /// Roles keyed by name (Postgres).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub roles: IndexMap<String, Role>,
    /// Policies declared outside of a table, keyed by name (Postgres).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub policies: IndexMap<String, Policy>,
    /// Views keyed by qualified name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub views: IndexMap<String, View>,
    /// Renames applied by the migration that produced this snapshot.
    #[serde(rename = "_meta", default)]
    pub meta: SnapshotMeta,
}

impl Snapshot {
    /// An empty snapshot at the latest version.
    pub fn empty(dialect: Dialect) -> Self {
        Self {
            version: dialect.latest_version().to_string(),
            dialect,
            id: String::new(),
            prev_id: String::new(),
            tables: IndexMap::new(),
            enums: IndexMap::new(),
            schemas: IndexMap::new(),
            sequences: IndexMap::new(),
            roles: IndexMap::new(),
            policies: IndexMap::new(),
            views: IndexMap::new(),
            meta: SnapshotMeta::default(),
        }
    }

    /// Add a table under its qualified key.
    pub fn with_table(mut self, table: Table) -> Self {
        let key = self.dialect.entity_key(&table.schema, &table.name);
        self.tables.insert(key, table);
        self
    }

    /// Add an enum under its qualified key.
    pub fn with_enum(mut self, e: Enum) -> Self {
        self.enums.insert(format!("{}.{}", e.schema, e.name), e);
        self
    }

    /// Add a view under its qualified key.
    pub fn with_view(mut self, view: View) -> Self {
        let key = self.dialect.entity_key(&view.schema, &view.name);
        self.views.insert(key, view);
        self
    }

    /// Add a role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role.name.clone(), role);
        self
    }

    /// Add a sequence under its qualified key.
    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.sequences
            .insert(format!("{}.{}", sequence.schema, sequence.name), sequence);
        self
    }

    /// Add a schema.
    pub fn with_schema(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.schemas.insert(name.clone(), name);
        self
    }

    /// Parse a snapshot, upgrading older formats first.
    pub fn from_json_str(content: &str) -> SchemaResult<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        Self::from_value(value)
    }

    /// Build a snapshot from untyped JSON, upgrading older formats first.
    pub fn from_value(value: serde_json::Value) -> SchemaResult<Self> {
        let upgraded = upgrade::upgrade(value)?;
        let snapshot: Snapshot = serde_json::from_value(upgraded)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Load a snapshot file.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        tracing::debug!(path = %path.display(), "Loading snapshot");
        Self::from_json_str(&content)
    }

    /// Serialize as pretty JSON.
    pub fn to_json_pretty(&self) -> SchemaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the snapshot to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> SchemaResult<()> {
        let path = path.as_ref();
        let content = self.to_json_pretty()?;
        std::fs::write(path, content).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Check the structural invariants the differ relies on.
    pub fn validate(&self) -> SchemaResult<()> {
        for (key, table) in &self.tables {
            let expected = self.dialect.entity_key(&table.schema, &table.name);
            if *key != expected {
                return Err(SchemaError::invalid_snapshot(format!(
                    "table key `{}` does not match table `{}`",
                    key, expected
                )));
            }
            for (col_key, column) in &table.columns {
                if *col_key != column.name {
                    return Err(SchemaError::invalid_snapshot(format!(
                        "column key `{}` in `{}` does not match column `{}`",
                        col_key, key, column.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Ensure another snapshot can be diffed against this one.
    pub fn ensure_same_dialect(&self, other: &Snapshot) -> SchemaResult<()> {
        if self.dialect.snapshot_family() != other.dialect.snapshot_family() {
            return Err(SchemaError::DialectMismatch {
                left: self.dialect.to_string(),
                right: other.dialect.to_string(),
            });
        }
        Ok(())
    }
}
