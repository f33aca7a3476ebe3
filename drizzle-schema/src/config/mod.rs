//! Configuration file parsing for `drizzle.toml`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SchemaError, SchemaResult};
use crate::snapshot::Dialect;

/// Separator written between statements when breakpoints are enabled.
pub const STATEMENT_BREAKPOINT: &str = "--> statement-breakpoint";

/// Main configuration structure for `drizzle.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KitConfig {
    /// Target dialect.
    pub dialect: Dialect,

    /// Output directory for migrations and snapshots. See
    /// [`KitConfig::migration_path`] and [`KitConfig::snapshot_path`].
    #[serde(default = "default_out")]
    pub out: String,

    /// Join generated statements with a breakpoint marker.
    #[serde(default = "default_true")]
    pub breakpoints: bool,

    /// Ask for approval before running any push statement.
    #[serde(default)]
    pub strict: bool,

    /// Log every generated statement.
    #[serde(default)]
    pub verbose: bool,

    /// Migration bookkeeping table.
    #[serde(default)]
    pub migrations: MigrationsConfig,

    /// Which entity classes the kit manages.
    #[serde(default)]
    pub entities: EntitiesConfig,
}

impl KitConfig {
    /// Config with defaults for a dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            out: default_out(),
            breakpoints: true,
            strict: false,
            verbose: false,
            migrations: MigrationsConfig::default(),
            entities: EntitiesConfig::default(),
        }
    }

    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> SchemaResult<Self> {
        let expanded = expand_env_vars(content);
        let config: KitConfig =
            toml::from_str(&expanded).map_err(|e| SchemaError::TomlError { source: e })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that only make sense for another dialect.
    pub fn validate(&self) -> SchemaResult<()> {
        if self.migrations.schema.is_some() && self.dialect != Dialect::Postgresql {
            return Err(SchemaError::invalid_config(format!(
                "`migrations.schema` is only supported for postgresql, not {}",
                self.dialect
            )));
        }
        if self.entities.roles && self.dialect != Dialect::Postgresql {
            return Err(SchemaError::invalid_config(format!(
                "`entities.roles` is only supported for postgresql, not {}",
                self.dialect
            )));
        }
        Ok(())
    }

    /// Where the SQL of the migration at `index` (zero-based) is written.
    pub fn migration_path(&self, index: usize, tag: &str, now: DateTime<Utc>) -> PathBuf {
        let file = format!("{}{}.sql", self.migrations.prefix.render(index, now), tag);
        Path::new(&self.out).join(file)
    }

    /// Where the snapshot recorded with the migration at `index` is written.
    pub fn snapshot_path(&self, index: usize) -> PathBuf {
        Path::new(&self.out)
            .join("meta")
            .join(format!("{:04}_snapshot.json", index))
    }

    /// Join statements the way migration files are written.
    pub fn join_statements(&self, statements: &[String]) -> String {
        if self.breakpoints {
            statements.join(&format!("\n{}\n", STATEMENT_BREAKPOINT))
        } else {
            statements.join("\n")
        }
    }
}

/// Migration bookkeeping settings.
///
/// `table` and `schema` are not read while diffing; they are carried for the
/// migrator that records applied files.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationsConfig {
    /// Table that records applied migrations.
    #[serde(default = "default_migrations_table")]
    pub table: String,

    /// Schema of that table (Postgres).
    #[serde(default)]
    pub schema: Option<String>,

    /// Migration file prefix style.
    #[serde(default)]
    pub prefix: MigrationPrefix,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            table: default_migrations_table(),
            schema: None,
            prefix: MigrationPrefix::default(),
        }
    }
}

/// How migration files are numbered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationPrefix {
    /// `0000_`, `0001_`, ...
    #[default]
    Index,
    /// Millisecond timestamp.
    Timestamp,
    /// Supabase style `YYYYMMDDHHMMSS`.
    Supabase,
    /// Unix seconds.
    Unix,
    /// No prefix.
    None,
}

impl MigrationPrefix {
    /// File name prefix, including the trailing `_`.
    pub fn render(&self, index: usize, now: DateTime<Utc>) -> String {
        match self {
            Self::Index => format!("{:04}_", index),
            Self::Timestamp => format!("{}_", now.timestamp_millis()),
            Self::Supabase => format!("{}_", now.format("%Y%m%d%H%M%S")),
            Self::Unix => format!("{}_", now.timestamp()),
            Self::None => String::new(),
        }
    }
}

/// Entity classes managed by the kit.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EntitiesConfig {
    /// Diff roles (Postgres).
    #[serde(default)]
    pub roles: bool,
}

fn default_out() -> String {
    "drizzle".to_string()
}

fn default_true() -> bool {
    true
}

fn default_migrations_table() -> String {
    "__drizzle_migrations".to_string()
}

/// Expand `${VAR}` references from the environment.
fn expand_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
