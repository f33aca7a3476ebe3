//! Push checks for MySQL and SingleStore.

use drizzle_schema::{Column, Dialect, GeneratedKind, Snapshot, SnapshotMeta};

use super::{Inspector, PushConnection, PushSuggestions};
use crate::error::MigrateResult;
use crate::statement::{self, JsonStatement};

async fn mysql_family(
    dialect: Dialect,
    db: &dyn PushConnection,
    statements: &[JsonStatement],
    json1: &Snapshot,
    meta: &SnapshotMeta,
) -> MigrateResult<PushSuggestions> {
    let mut inspector = Inspector::new(db, dialect, meta);
    let mut truncated: Vec<String> = Vec::new();

    for statement in statements {
        let mut rendered = statement.clone();
        let needs_truncate = match statement {
            JsonStatement::DropTable { table_name, .. } => {
                inspector.check_drop_table("", table_name).await?;
                None
            }
            JsonStatement::AlterTableDropColumn {
                table_name,
                column_name,
                ..
            } => {
                inspector.check_drop_column("", table_name, column_name).await?;
                None
            }
            JsonStatement::AlterTableAlterColumnSetType(a) => {
                let emptied = inspector
                    .check_truncate("", &a.table_name, |count| {
                        format!(
                            "You're about to change {} column type from {} to {} with {} items",
                            a.column.name, a.previous.sql_type, a.column.sql_type, count
                        )
                    })
                    .await?;
                emptied.then(|| a.table_name.clone())
            }
            JsonStatement::AlterTableAddColumn {
                table_name, column, ..
            } if column.needs_backfill() => {
                let emptied = inspector
                    .check_truncate("", table_name, |count| {
                        format!(
                            "You're about to add not-null {} column without default value, which contains {} items",
                            column.name, count
                        )
                    })
                    .await?;
                emptied.then(|| table_name.clone())
            }
            JsonStatement::AlterTableAlterColumnSetNotnull(a) if a.column.default.is_none() => {
                let emptied = inspector
                    .check_truncate("", &a.table_name, |count| {
                        format!(
                            "You're about to set not-null constraint to {} column without default, which contains {} items",
                            a.column.name, count
                        )
                    })
                    .await?;
                emptied.then(|| a.table_name.clone())
            }
            JsonStatement::AlterTableAlterColumnSetGenerated(a) => {
                // The column is dropped and added back with the expression.
                check_replaced_column(&mut inspector, a, |count| {
                    format!(
                        "You're about to replace the data of {} column in {} table with a generated expression, which contains {} items",
                        a.column.name, a.table_name, count
                    )
                })
                .await?;
                None
            }
            JsonStatement::AlterTableAlterColumnAlterGenerated(a) => {
                check_replaced_column(&mut inspector, a, |count| {
                    format!(
                        "You're about to change the generated expression of {} column in {} table, which contains {} items. The column is dropped and its values are recomputed",
                        a.column.name, a.table_name, count
                    )
                })
                .await?;
                None
            }
            JsonStatement::AlterTableAlterColumnDropGenerated(a) if is_virtual(&a.previous) => {
                // Stored values survive MODIFY COLUMN; virtual ones were never written.
                check_replaced_column(&mut inspector, a, |count| {
                    format!(
                        "You're about to drop the generated expression of virtual {} column in {} table, which contains {} items. Its values are not stored and will be lost",
                        a.column.name, a.table_name, count
                    )
                })
                .await?;
                None
            }
            JsonStatement::CreateCompositePk { table_name, .. }
            | JsonStatement::AlterCompositePk { table_name, .. }
            | JsonStatement::AlterTableAlterColumnSetPk(statement::ColumnAlter {
                table_name, ..
            }) => {
                let count = inspector.count_rows("", table_name).await?;
                if count > 0 {
                    inspector.warn(format!(
                        "You're about to change {} primary key, which contains {} items. This statement may fail and leave the table without a primary key",
                        table_name, count
                    ));
                }
                None
            }
            JsonStatement::CreateUniqueConstraint {
                table_name, unique, ..
            } => {
                inspector
                    .check_unique("", table_name, &unique.name, &unique.columns)
                    .await?;
                None
            }
            JsonStatement::RecreateTable { .. } => {
                rendered = inspector.check_recreate(statement, json1).await?;
                None
            }
            _ => None,
        };

        if let Some(table) = needs_truncate {
            if !truncated.contains(&table) {
                inspector.push_sql(format!("TRUNCATE TABLE `{}`;", table));
                truncated.push(table);
            }
        }
        inspector.render(&rendered)?;
    }

    let mut out = inspector.finish();
    // Several column changes render to the same MODIFY COLUMN.
    out.statements_to_execute = statement::dedupe(out.statements_to_execute);
    Ok(out)
}

fn is_virtual(column: &Column) -> bool {
    column
        .generated
        .as_ref()
        .is_some_and(|g| g.kind == GeneratedKind::Virtual)
}

/// Warn when `alter` replaces the values of a column that holds rows.
async fn check_replaced_column(
    inspector: &mut Inspector<'_>,
    alter: &statement::ColumnAlter,
    message: impl FnOnce(u64) -> String,
) -> MigrateResult<()> {
    let count = inspector.count_rows("", &alter.table_name).await?;
    if count > 0 {
        inspector.warn(message(count));
        inspector
            .out
            .columns_to_remove
            .push(format!("{}_{}", alter.table_name, alter.column.name));
    }
    Ok(())
}

/// Check MySQL statements against the live database.
pub async fn mysql_suggestions(
    db: &dyn PushConnection,
    statements: &[JsonStatement],
    json1: &Snapshot,
    meta: &SnapshotMeta,
) -> MigrateResult<PushSuggestions> {
    mysql_family(Dialect::Mysql, db, statements, json1, meta).await
}

/// Check SingleStore statements against the live database.
pub async fn singlestore_suggestions(
    db: &dyn PushConnection,
    statements: &[JsonStatement],
    json1: &Snapshot,
    meta: &SnapshotMeta,
) -> MigrateResult<PushSuggestions> {
    mysql_family(Dialect::Singlestore, db, statements, json1, meta).await
}
