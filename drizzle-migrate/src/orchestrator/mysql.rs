//! MySQL orchestrator.

use drizzle_schema::{Dialect, Snapshot, View};

use super::{
    Action, CommonStatements, DiffOutput, TableChanges, added_columns, build_meta,
    created_table_indexes, created_table_references, dropped_columns, ensure_dialect,
    renamed_columns, resolve_columns, resolve_tables, resolve_views, view_lifecycle, view_renames,
};
use crate::differ::{Altered, apply_json_diff};
use crate::error::MigrateResult;
use crate::resolver::Resolvers;
use crate::sql;
use crate::statement::{self, JsonStatement};

fn view_meta_changed(old: &View, new: &View) -> bool {
    old.algorithm != new.algorithm
        || old.sql_security != new.sql_security
        || old.with_check_option != new.with_check_option
}

/// `ALTER VIEW` for views whose options or body changed.
pub(crate) fn alter_views(altered: &[Altered<View>], action: Action) -> Vec<JsonStatement> {
    altered
        .iter()
        .filter(|a| !a.new.is_existing)
        .filter(|a| {
            let definition = a.old.definition != a.new.definition && action == Action::Generate;
            definition || view_meta_changed(&a.old, &a.new)
        })
        .map(|a| JsonStatement::AlterMysqlView { view: a.new.clone() })
        .collect()
}

/// Diff two MySQL snapshots.
pub async fn apply_mysql_snapshots_diff(
    json1: &Snapshot,
    json2: &Snapshot,
    resolvers: &Resolvers<'_>,
    action: Action,
) -> MigrateResult<DiffOutput> {
    ensure_dialect(Dialect::Mysql, json1, json2)?;
    tracing::debug!(action = ?action, "Diffing mysql snapshots");

    let tables = resolve_tables(json1.clone(), json2, resolvers.tables).await?;
    let columns = resolve_columns(tables.patched.clone(), json2, resolvers.columns).await?;
    let views = resolve_views(columns.patched.clone(), json2, resolvers.views).await?;
    let patched = &views.patched;

    let diff = apply_json_diff(patched, json2);
    let (create_views, drop_views) = view_lifecycle(&views);

    let common = CommonStatements {
        create_tables: tables
            .created
            .iter()
            .map(|t| statement::prepare_create_table(t, false))
            .collect(),
        drop_tables: tables.deleted.iter().map(statement::prepare_drop_table).collect(),
        rename_tables: tables
            .renamed
            .iter()
            .map(|r| statement::prepare_rename_table(&r.from, &r.to))
            .collect(),
        rename_columns: renamed_columns(&columns),
        changes: TableChanges::collect(&diff.altered_tables_with_columns, patched, json2),
        add_columns: added_columns(&columns, json2, false),
        drop_columns: dropped_columns(&columns, json2),
        created_indexes: created_table_indexes(&tables.created),
        created_references: created_table_references(&tables.created),
        drop_views,
        rename_views: view_renames(&views),
        alter_views: alter_views(&diff.altered_views, action),
        create_views,
    };

    let statements = statement::dedupe(common.into_ordered());
    // Several column changes render to the same MODIFY COLUMN.
    let sql_statements = statement::dedupe(sql::from_json(&statements, Dialect::Mysql, action)?);
    let meta = build_meta(Dialect::Mysql, &[], &tables, &columns);

    tracing::debug!(statements = statements.len(), "MySQL diff complete");

    Ok(DiffOutput {
        statements,
        sql_statements,
        meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{NoRenames, StaticResolver};
    use drizzle_schema::{Column, Table};
    use pretty_assertions::assert_eq;

    fn mysql() -> Snapshot {
        Snapshot::empty(Dialect::Mysql)
    }

    fn users() -> Table {
        Table::new("users")
            .column(Column::new("id", "int").primary_key().autoincrement())
            .column(Column::new("name", "varchar(255)"))
    }

    #[tokio::test]
    async fn test_create_table() {
        let resolvers = Resolvers::uniform(&NoRenames);
        let output = apply_mysql_snapshots_diff(&mysql(), &mysql().with_table(users()), &resolvers, Action::Generate)
            .await
            .unwrap();
        assert_eq!(output.sql_statements.len(), 1);
        assert!(output.sql_statements[0].starts_with("CREATE TABLE `users` ("));
        assert!(output.sql_statements[0].contains("`id` int AUTO_INCREMENT PRIMARY KEY NOT NULL"));
    }

    #[tokio::test]
    async fn test_column_changes_collapse_to_one_modify() {
        let prev = mysql().with_table(users());
        let mut changed = users();
        changed.columns.insert(
            "name".to_string(),
            Column::new("name", "varchar(64)").not_null().default_value("'x'"),
        );
        let next = mysql().with_table(changed);

        let resolvers = Resolvers::uniform(&NoRenames);
        let output = apply_mysql_snapshots_diff(&prev, &next, &resolvers, Action::Generate)
            .await
            .unwrap();
        assert_eq!(output.statements.len(), 3);
        assert_eq!(
            output.sql_statements,
            vec!["ALTER TABLE `users` MODIFY COLUMN `name` varchar(64) NOT NULL DEFAULT 'x';"]
        );
    }

    #[tokio::test]
    async fn test_column_rename() {
        let prev = mysql().with_table(users());
        let mut renamed = users();
        renamed.columns.shift_remove("name");
        let renamed = renamed.column(Column::new("full_name", "varchar(255)"));
        let next = mysql().with_table(renamed);

        let resolver = StaticResolver::new(["users.name->users.full_name"]);
        let resolvers = Resolvers::uniform(&resolver);
        let output = apply_mysql_snapshots_diff(&prev, &next, &resolvers, Action::Generate)
            .await
            .unwrap();
        assert_eq!(
            output.sql_statements,
            vec!["ALTER TABLE `users` RENAME COLUMN `name` TO `full_name`;"]
        );
        assert_eq!(output.meta.columns["\"users\".\"name\""], "\"users\".\"full_name\"");
    }
}
