//! Push checks for PostgreSQL.

use drizzle_schema::{Dialect, SnapshotMeta};

use super::{Inspector, PushConnection, PushSuggestions};
use crate::error::MigrateResult;
use crate::statement::JsonStatement;

fn truncate(schema: &str, table: &str) -> String {
    let schema = if schema.is_empty() { "public" } else { schema };
    format!("TRUNCATE TABLE \"{}\".\"{}\" CASCADE;", schema, table)
}

/// Check PostgreSQL statements against the live database.
pub async fn pg_suggestions(
    db: &dyn PushConnection,
    statements: &[JsonStatement],
    meta: &SnapshotMeta,
) -> MigrateResult<PushSuggestions> {
    let mut inspector = Inspector::new(db, Dialect::Postgresql, meta);
    let mut truncated: Vec<(String, String)> = Vec::new();

    for statement in statements {
        let needs_truncate = match statement {
            JsonStatement::DropTable {
                table_name, schema, ..
            } => {
                inspector.check_drop_table(schema, table_name).await?;
                None
            }
            JsonStatement::AlterTableDropColumn {
                table_name,
                schema,
                column_name,
            } => {
                inspector
                    .check_drop_column(schema, table_name, column_name)
                    .await?;
                None
            }
            JsonStatement::DropSchema { name } => {
                let count = inspector
                    .query_count(&format!(
                        "select count(*) as count from information_schema.tables where table_schema = '{}';",
                        name
                    ))
                    .await?;
                if count > 0 {
                    inspector.warn(format!(
                        "You're about to delete {} schema with {} tables",
                        name, count
                    ));
                    inspector.out.schemas_to_remove.push(name.clone());
                }
                None
            }
            JsonStatement::AlterTableAlterColumnSetType(a) => {
                let emptied = inspector
                    .check_truncate(&a.schema, &a.table_name, |count| {
                        format!(
                            "You're about to change {} column type from {} to {} with {} items",
                            a.column.name, a.previous.sql_type, a.column.sql_type, count
                        )
                    })
                    .await?;
                emptied.then(|| (a.schema.clone(), a.table_name.clone()))
            }
            JsonStatement::AlterTableAddColumn {
                table_name,
                schema,
                column,
            } if column.needs_backfill() => {
                let emptied = inspector
                    .check_truncate(schema, table_name, |count| {
                        format!(
                            "You're about to add not-null {} column without default value, which contains {} items",
                            column.name, count
                        )
                    })
                    .await?;
                emptied.then(|| (schema.clone(), table_name.clone()))
            }
            JsonStatement::AlterTableAlterColumnSetNotnull(a) if a.column.default.is_none() => {
                let emptied = inspector
                    .check_truncate(&a.schema, &a.table_name, |count| {
                        format!(
                            "You're about to set not-null constraint to {} column without default, which contains {} items",
                            a.column.name, count
                        )
                    })
                    .await?;
                emptied.then(|| (a.schema.clone(), a.table_name.clone()))
            }
            JsonStatement::CreateCompositePk {
                table_name, schema, ..
            }
            | JsonStatement::AlterCompositePk {
                table_name, schema, ..
            } => {
                let emptied = inspector
                    .check_truncate(schema, table_name, |count| {
                        format!(
                            "You're about to change {} primary key, which contains {} items",
                            table_name, count
                        )
                    })
                    .await?;
                emptied.then(|| (schema.clone(), table_name.clone()))
            }
            JsonStatement::CreateUniqueConstraint {
                table_name,
                schema,
                unique,
            } => {
                inspector
                    .check_unique(schema, table_name, &unique.name, &unique.columns)
                    .await?;
                None
            }
            _ => None,
        };

        if let Some(key) = needs_truncate {
            if !truncated.contains(&key) {
                inspector.push_sql(truncate(&key.0, &key.1));
                truncated.push(key);
            }
        }
        inspector.render(statement)?;
    }

    Ok(inspector.finish())
}
