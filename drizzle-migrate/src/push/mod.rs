//! Data-loss checks for pushing statements straight to a live database.
//!
//! A diff alone cannot tell whether dropping a column loses anything; the
//! table might be empty. Each risky statement is checked with a row count
//! against the live connection, one query at a time, and only statements that
//! would actually destroy rows produce a warning and ask for approval.
//!
//! The checks also rewrite the batch: tables that must be emptied get a
//! `TRUNCATE` or `DELETE FROM` in front of the statement that needs it.
//!
//! Statements carry the new names of renamed tables and columns, but the
//! counts run before anything is executed. The rename map of the diff
//! (`SnapshotMeta`) translates them back to what the database holds.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::{mysql_suggestions, singlestore_suggestions};
pub use postgres::pg_suggestions;
pub use sqlite::{libsql_suggestions, sqlite_suggestions};

use std::borrow::Cow;

use async_trait::async_trait;
use drizzle_schema::{Dialect, Snapshot, SnapshotMeta, Table};
use serde::Serialize;

use crate::error::MigrateResult;
use crate::orchestrator::{Action, meta_name};
use crate::sql::ConvertorRegistry;
use crate::statement::JsonStatement;

/// A live database connection.
#[async_trait]
pub trait PushConnection: Send + Sync {
    /// Run one parameterless statement and return its rows as JSON objects.
    async fn query(&self, sql: &str) -> MigrateResult<Vec<serde_json::Value>>;
}

/// What a push would do, and whether the user has to confirm it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSuggestions {
    /// Final SQL, in execution order.
    pub statements_to_execute: Vec<String>,
    /// Whether rows would be lost.
    pub should_ask_for_approve: bool,
    /// Warnings for the user, one per risky statement.
    pub info_to_print: Vec<String>,
    /// `table_column` for every dropped column that holds data.
    pub columns_to_remove: Vec<String>,
    /// Tables that are emptied before a statement that needs it.
    pub tables_to_truncate: Vec<String>,
    /// Dropped tables that hold data.
    pub tables_to_remove: Vec<String>,
    /// Dropped schemas that still contain tables.
    pub schemas_to_remove: Vec<String>,
}

impl PushSuggestions {
    /// In strict mode every non-empty push needs approval.
    pub fn enforce_strict(&mut self, strict: bool) {
        if strict && !self.statements_to_execute.is_empty() {
            self.should_ask_for_approve = true;
        }
    }

    /// Whether nothing would be executed.
    pub fn is_empty(&self) -> bool {
        self.statements_to_execute.is_empty()
    }
}

/// Read the `count` column of the first row. Drivers return bigint counts as
/// numbers or strings.
pub(crate) fn count_from_rows(rows: &[serde_json::Value]) -> u64 {
    rows.first()
        .and_then(|row| row.get("count"))
        .and_then(|count| match count {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        })
        .unwrap_or(0)
}

/// Shared state of one suggestions pass.
pub(crate) struct Inspector<'a> {
    db: &'a dyn PushConnection,
    dialect: Dialect,
    meta: &'a SnapshotMeta,
    registry: ConvertorRegistry,
    pub(crate) out: PushSuggestions,
}

impl<'a> Inspector<'a> {
    pub(crate) fn new(db: &'a dyn PushConnection, dialect: Dialect, meta: &'a SnapshotMeta) -> Self {
        Self {
            db,
            dialect,
            meta,
            registry: ConvertorRegistry::for_dialect(dialect),
            out: PushSuggestions::default(),
        }
    }

    /// Schema and name the table has in the live database, before this push
    /// renames or moves it.
    pub(crate) fn previous_table(&self, schema: &str, table: &str) -> (String, String) {
        let current = meta_name(self.dialect, schema, &[table]);
        if let Some((from, _)) = self.meta.tables.iter().find(|(_, to)| **to == current) {
            let mut parts = unquote(from);
            let name = parts.pop().unwrap_or_else(|| table.to_string());
            let schema = parts.pop().unwrap_or_default();
            return (schema, name);
        }
        let schema = self
            .meta
            .schemas
            .iter()
            .find(|(_, to)| to.as_str() == schema)
            .map_or(schema, |(from, _)| from.as_str());
        (schema.to_string(), table.to_string())
    }

    /// Name `column` of `table` had before this push renamed it.
    pub(crate) fn previous_column<'c>(&self, schema: &str, table: &str, column: &'c str) -> Cow<'c, str> {
        let current = meta_name(self.dialect, schema, &[table, column]);
        self.meta
            .columns
            .iter()
            .find(|(_, to)| **to == current)
            .and_then(|(from, _)| unquote(from).pop())
            .map_or(Cow::Borrowed(column), Cow::Owned)
    }

    /// Quoted table reference for count queries.
    pub(crate) fn table_ref(&self, schema: &str, table: &str) -> String {
        match self.dialect {
            Dialect::Postgresql => {
                let schema = if schema.is_empty() { "public" } else { schema };
                format!("\"{}\".\"{}\"", schema, table)
            }
            _ => format!("`{}`", table),
        }
    }

    fn quote_column(&self, column: &str) -> String {
        match self.dialect {
            Dialect::Postgresql => format!("\"{}\"", column),
            _ => format!("`{}`", column),
        }
    }

    pub(crate) async fn query_count(&self, sql: &str) -> MigrateResult<u64> {
        tracing::debug!(sql = %sql, "Counting rows");
        let rows = self.db.query(sql).await?;
        Ok(count_from_rows(&rows))
    }

    pub(crate) async fn count_rows(&self, schema: &str, table: &str) -> MigrateResult<u64> {
        let (schema, table) = self.previous_table(schema, table);
        let sql = format!("select count(*) as count from {}", self.table_ref(&schema, &table));
        self.query_count(&sql).await
    }

    async fn count_distinct(&self, schema: &str, table: &str, columns: &[String]) -> MigrateResult<u64> {
        let columns: Vec<String> = columns
            .iter()
            .map(|c| self.quote_column(&self.previous_column(schema, table, c)))
            .collect();
        let (schema, table) = self.previous_table(schema, table);
        let sql = format!(
            "select count(*) as count from (select distinct {} from {}) as d",
            columns.join(", "),
            self.table_ref(&schema, &table)
        );
        self.query_count(&sql).await
    }

    pub(crate) fn warn(&mut self, message: String) {
        tracing::warn!(message = %message, "Push would lose data");
        self.out.info_to_print.push(message);
        self.out.should_ask_for_approve = true;
    }

    pub(crate) async fn check_drop_table(&mut self, schema: &str, table: &str) -> MigrateResult<()> {
        let count = self.count_rows(schema, table).await?;
        if count > 0 {
            self.warn(format!(
                "You're about to delete {} table with {} items",
                table, count
            ));
            self.out.tables_to_remove.push(table.to_string());
        }
        Ok(())
    }

    pub(crate) async fn check_drop_column(
        &mut self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> MigrateResult<()> {
        let count = self.count_rows(schema, table).await?;
        if count > 0 {
            self.warn(format!(
                "You're about to delete {} column in {} table with {} items",
                column, table, count
            ));
            self.out.columns_to_remove.push(format!("{}_{}", table, column));
        }
        Ok(())
    }

    /// Warn when `table` has rows; the table is then emptied before the
    /// statement runs. Returns whether it will be emptied.
    pub(crate) async fn check_truncate(
        &mut self,
        schema: &str,
        table: &str,
        message: impl FnOnce(u64) -> String,
    ) -> MigrateResult<bool> {
        let count = self.count_rows(schema, table).await?;
        if count == 0 {
            return Ok(false);
        }
        self.warn(message(count));
        if !self.out.tables_to_truncate.iter().any(|t| t == table) {
            self.out.tables_to_truncate.push(table.to_string());
        }
        Ok(true)
    }

    /// Warn when existing rows are not unique over `columns`.
    pub(crate) async fn check_unique(
        &mut self,
        schema: &str,
        table: &str,
        name: &str,
        columns: &[String],
    ) -> MigrateResult<()> {
        let count = self.count_rows(schema, table).await?;
        if count == 0 {
            return Ok(());
        }
        let distinct = self.count_distinct(schema, table, columns).await?;
        if distinct < count {
            self.warn(format!(
                "You're about to add {} unique constraint to the table, which contains {} items. If this statement fails, you will receive an error from the database",
                name, count
            ));
        }
        Ok(())
    }

    /// Check a table rebuild against the rows it holds. Columns that vanish
    /// lose their data; a new column that needs a backfill value forces the
    /// old rows to be deleted instead of copied. Renamed tables and columns
    /// are matched by their name in `json1`.
    pub(crate) async fn check_recreate(
        &mut self,
        statement: &JsonStatement,
        json1: &Snapshot,
    ) -> MigrateResult<JsonStatement> {
        let JsonStatement::RecreateTable {
            table_name,
            columns,
            ..
        } = statement
        else {
            return Ok(statement.clone());
        };
        let (_, previous_name) = self.previous_table("", table_name);
        let Some(old) = find_table(json1, &previous_name) else {
            return Ok(statement.clone());
        };

        let previous: Vec<Cow<'_, str>> = columns
            .iter()
            .map(|c| self.previous_column("", table_name, &c.name))
            .collect();
        let removed: Vec<&str> = old
            .columns
            .keys()
            .filter(|name| !previous.iter().any(|p| **p == **name))
            .map(String::as_str)
            .collect();
        let backfilled: Vec<&str> = columns
            .iter()
            .zip(&previous)
            .filter(|(c, p)| !old.columns.contains_key(&p[..]) && c.needs_backfill())
            .map(|(c, _)| c.name.as_str())
            .collect();
        if removed.is_empty() && backfilled.is_empty() {
            return Ok(statement.clone());
        }

        let count = self.count_rows("", table_name).await?;
        if count == 0 {
            return Ok(statement.clone());
        }

        for column in &removed {
            self.warn(format!(
                "You're about to delete {} column in {} table with {} items",
                column, table_name, count
            ));
            self.out.columns_to_remove.push(format!("{}_{}", table_name, column));
        }

        let mut rewritten = statement.clone();
        if !backfilled.is_empty() {
            for column in &backfilled {
                self.warn(format!(
                    "You're about to add not-null {} column without default value to a table which contains {} items",
                    column, count
                ));
            }
            if !self.out.tables_to_truncate.iter().any(|t| t == table_name) {
                self.out.tables_to_truncate.push(table_name.clone());
            }
            if let JsonStatement::RecreateTable { data_loss, .. } = &mut rewritten {
                *data_loss = true;
            }
        }
        Ok(rewritten)
    }

    /// Render one statement for execution.
    pub(crate) fn render(&mut self, statement: &JsonStatement) -> MigrateResult<()> {
        let sql = self
            .registry
            .convert_all(std::slice::from_ref(statement), Action::Push)?;
        self.out.statements_to_execute.extend(sql);
        Ok(())
    }

    pub(crate) fn push_sql(&mut self, sql: String) {
        self.out.statements_to_execute.push(sql);
    }

    pub(crate) fn finish(self) -> PushSuggestions {
        tracing::debug!(
            statements = self.out.statements_to_execute.len(),
            ask = self.out.should_ask_for_approve,
            "Push suggestions ready"
        );
        self.out
    }
}

pub(crate) fn find_table<'s>(snapshot: &'s Snapshot, name: &str) -> Option<&'s Table> {
    snapshot.tables.values().find(|t| t.name == name)
}

/// `"public"."users"` -> `["public", "users"]`.
fn unquote(meta_name: &str) -> Vec<String> {
    meta_name
        .trim_matches('"')
        .split("\".\"")
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Connection answering count queries from a fixed table of row counts.
    #[derive(Default)]
    pub(crate) struct CountingConnection {
        counts: Vec<(String, u64)>,
        pub(crate) queries: Mutex<Vec<String>>,
    }

    impl CountingConnection {
        pub(crate) fn with(mut self, table: &str, count: u64) -> Self {
            self.counts.push((table.to_string(), count));
            self
        }
    }

    #[async_trait]
    impl PushConnection for CountingConnection {
        async fn query(&self, sql: &str) -> MigrateResult<Vec<serde_json::Value>> {
            self.queries.lock().unwrap().push(sql.to_string());
            let count = self
                .counts
                .iter()
                .find(|(table, _)| {
                    sql.contains(&format!("\"{}\"", table)) || sql.contains(&format!("`{}`", table))
                })
                .map(|(_, count)| *count)
                .unwrap_or(0);
            Ok(vec![serde_json::json!({ "count": count })])
        }
    }
}
