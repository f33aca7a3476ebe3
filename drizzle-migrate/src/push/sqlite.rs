//! Push checks for SQLite and LibSQL.

use drizzle_schema::{Dialect, Snapshot, SnapshotMeta};

use super::{Inspector, PushConnection, PushSuggestions};
use crate::error::MigrateResult;
use crate::statement::JsonStatement;

async fn sqlite_family(
    dialect: Dialect,
    db: &dyn PushConnection,
    statements: &[JsonStatement],
    json1: &Snapshot,
    meta: &SnapshotMeta,
) -> MigrateResult<PushSuggestions> {
    let mut inspector = Inspector::new(db, dialect, meta);
    let mut emptied_tables: Vec<String> = Vec::new();
    let mut rebuilds = false;

    for statement in statements {
        let mut rendered = statement.clone();
        let needs_delete = match statement {
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
            JsonStatement::SqliteAlterTableAddColumn {
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
            JsonStatement::AlterTableAlterColumnSetNotnull(a)
                if dialect == Dialect::Turso && a.column.default.is_none() =>
            {
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
            JsonStatement::RecreateTable { .. } => {
                rebuilds = true;
                rendered = inspector.check_recreate(statement, json1).await?;
                None
            }
            _ => None,
        };

        if let Some(table) = needs_delete {
            if !emptied_tables.contains(&table) {
                inspector.push_sql(format!("DELETE FROM `{}`;", table));
                emptied_tables.push(table);
            }
        }
        inspector.render(&rendered)?;
    }

    let mut out = inspector.finish();
    if rebuilds {
        out.statements_to_execute.insert(0, "PRAGMA foreign_keys=OFF;".to_string());
        out.statements_to_execute.push("PRAGMA foreign_keys=ON;".to_string());
    }
    Ok(out)
}

/// Check SQLite statements against the live database.
pub async fn sqlite_suggestions(
    db: &dyn PushConnection,
    statements: &[JsonStatement],
    json1: &Snapshot,
    meta: &SnapshotMeta,
) -> MigrateResult<PushSuggestions> {
    sqlite_family(Dialect::Sqlite, db, statements, json1, meta).await
}

/// Check LibSQL statements against the live database.
pub async fn libsql_suggestions(
    db: &dyn PushConnection,
    statements: &[JsonStatement],
    json1: &Snapshot,
    meta: &SnapshotMeta,
) -> MigrateResult<PushSuggestions> {
    sqlite_family(Dialect::Turso, db, statements, json1, meta).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{Action, apply_libsql_snapshots_diff, apply_sqlite_snapshots_diff};
    use crate::push::testing::CountingConnection;
    use crate::resolver::{Resolvers, StaticResolver};
    use crate::statement;
    use drizzle_schema::{CheckConstraint, Column, Table};
    use pretty_assertions::assert_eq;

    fn users() -> Table {
        Table::new("users")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("name", "text"))
    }

    #[tokio::test]
    async fn test_recreate_with_rows_deletes_instead_of_copying() {
        let json1 = Snapshot::empty(Dialect::Sqlite).with_table(users());
        let new = users().column(Column::new("age", "integer").not_null());
        let recreate = statement::prepare_recreate_table(json1.tables.get("users"), &new);

        let db = CountingConnection::default().with("users", 7);
        let out = sqlite_suggestions(&db, &[recreate], &json1, &SnapshotMeta::default())
            .await
            .unwrap();

        assert!(out.should_ask_for_approve);
        assert_eq!(out.tables_to_truncate, vec!["users"]);
        assert_eq!(out.statements_to_execute.first().unwrap(), "PRAGMA foreign_keys=OFF;");
        assert_eq!(out.statements_to_execute.last().unwrap(), "PRAGMA foreign_keys=ON;");
        let pragmas = out
            .statements_to_execute
            .iter()
            .filter(|s| s.starts_with("PRAGMA"))
            .count();
        assert_eq!(pragmas, 2);
        assert!(out.statements_to_execute.contains(&"DELETE FROM `users`;".to_string()));
        assert!(!out.statements_to_execute.iter().any(|s| s.starts_with("INSERT INTO")));
    }

    #[tokio::test]
    async fn test_recreate_on_empty_table_copies() {
        let json1 = Snapshot::empty(Dialect::Sqlite).with_table(users());
        let new = users().column(Column::new("age", "integer").not_null());
        let recreate = statement::prepare_recreate_table(json1.tables.get("users"), &new);

        let db = CountingConnection::default();
        let out = sqlite_suggestions(&db, &[recreate], &json1, &SnapshotMeta::default())
            .await
            .unwrap();
        assert!(!out.should_ask_for_approve);
        assert!(out.statements_to_execute.iter().any(|s| s.starts_with("INSERT INTO `__new_users`")));
    }

    #[tokio::test]
    async fn test_add_not_null_column_deletes_rows() {
        let db = CountingConnection::default().with("users", 1);
        let statements = vec![JsonStatement::SqliteAlterTableAddColumn {
            table_name: "users".to_string(),
            column: Column::new("age", "integer").not_null(),
            reference: None,
        }];
        let json1 = Snapshot::empty(Dialect::Turso);
        let out = libsql_suggestions(&db, &statements, &json1, &SnapshotMeta::default())
            .await
            .unwrap();
        assert_eq!(
            out.statements_to_execute,
            vec![
                "DELETE FROM `users`;",
                "ALTER TABLE `users` ADD `age` integer NOT NULL;",
            ]
        );
    }

    #[tokio::test]
    async fn test_renamed_table_rebuild_counts_previous_name() {
        let json1 = Snapshot::empty(Dialect::Sqlite).with_table(users());
        let people = Table::new("people")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("name", "text"))
            .column(Column::new("age", "integer").not_null());
        let json2 = Snapshot::empty(Dialect::Sqlite).with_table(people);

        let resolver = StaticResolver::new(["users->people"]);
        let diff = apply_sqlite_snapshots_diff(&json1, &json2, &Resolvers::uniform(&resolver), Action::Push)
            .await
            .unwrap();

        let db = CountingConnection::default().with("users", 3);
        let out = sqlite_suggestions(&db, &diff.statements, &json1, &diff.meta)
            .await
            .unwrap();

        assert_eq!(
            *db.queries.lock().unwrap(),
            vec!["select count(*) as count from `users`"]
        );
        assert!(out.should_ask_for_approve);
        assert_eq!(out.tables_to_truncate, vec!["people"]);
        assert!(out.statements_to_execute.contains(&"DELETE FROM `people`;".to_string()));
        assert!(!out.statements_to_execute.iter().any(|s| s.starts_with("INSERT INTO")));
    }

    #[tokio::test]
    async fn test_renamed_not_null_column_is_copied() {
        let old = Table::new("users")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("name", "text").not_null());
        let json1 = Snapshot::empty(Dialect::Turso).with_table(old);
        let people = Table::new("people")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("full_name", "text").not_null())
            .check(CheckConstraint {
                name: "people_full_name_check".to_string(),
                value: "length(\"full_name\") > 0".to_string(),
            });
        let json2 = Snapshot::empty(Dialect::Turso).with_table(people);

        let resolver = StaticResolver::new(["users->people", "people.name->people.full_name"]);
        let diff = apply_libsql_snapshots_diff(&json1, &json2, &Resolvers::uniform(&resolver), Action::Push)
            .await
            .unwrap();
        assert!(diff.statements.iter().any(|s| s.type_name() == "recreate_table"));

        let db = CountingConnection::default().with("users", 3);
        let out = libsql_suggestions(&db, &diff.statements, &json1, &diff.meta)
            .await
            .unwrap();

        assert!(!out.should_ask_for_approve);
        assert!(out.info_to_print.is_empty());
        assert!(db.queries.lock().unwrap().is_empty());
        assert!(out.statements_to_execute.contains(
            &"INSERT INTO `__new_people`(\"id\", \"full_name\") SELECT \"id\", \"full_name\" FROM `people`;"
                .to_string()
        ));
    }
}
