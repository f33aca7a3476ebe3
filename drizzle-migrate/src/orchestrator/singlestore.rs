//! SingleStore orchestrator.

use drizzle_schema::{Dialect, Snapshot, UniqueConstraint};

use super::{
    Action, CommonStatements, DiffOutput, TableChanges, added_columns, build_meta,
    created_table_indexes, dropped_columns, ensure_dialect, renamed_columns, resolve_columns,
    resolve_tables, resolve_views, view_lifecycle, view_renames,
};
use crate::combine;
use crate::differ::apply_json_diff;
use crate::error::MigrateResult;
use crate::resolver::Resolvers;
use crate::sql;
use crate::statement;

/// Move unique indexes into the unique constraint collection. SingleStore has
/// no unique index distinct from a unique key.
pub fn normalize_unique_indexes(mut snapshot: Snapshot) -> Snapshot {
    for table in snapshot.tables.values_mut() {
        let (unique, plain): (Vec<_>, Vec<_>) = table
            .indexes
            .drain(..)
            .partition(|(_, index)| index.is_unique);
        table.indexes = plain.into_iter().collect();
        for (name, index) in unique {
            table.unique_constraints.insert(
                name.clone(),
                UniqueConstraint {
                    name,
                    columns: index.column_names().into_iter().map(str::to_string).collect(),
                    nulls_not_distinct: false,
                },
            );
        }
    }
    snapshot
}

/// Diff two SingleStore snapshots.
pub async fn apply_singlestore_snapshots_diff(
    json1: &Snapshot,
    json2: &Snapshot,
    resolvers: &Resolvers<'_>,
    action: Action,
) -> MigrateResult<DiffOutput> {
    ensure_dialect(Dialect::Singlestore, json1, json2)?;
    tracing::debug!(action = ?action, "Diffing singlestore snapshots");

    let json1 = normalize_unique_indexes(json1.clone());
    let json2 = &normalize_unique_indexes(json2.clone());

    let tables = resolve_tables(json1, json2, resolvers.tables).await?;
    let columns = resolve_columns(tables.patched.clone(), json2, resolvers.columns).await?;
    let views = resolve_views(columns.patched.clone(), json2, resolvers.views).await?;
    let patched = &views.patched;

    let diff = apply_json_diff(patched, json2);
    let mut changes = TableChanges::collect(&diff.altered_tables_with_columns, patched, json2);
    // No foreign keys or check constraints.
    changes.drop_references.clear();
    changes.create_references.clear();
    changes.drop_checks.clear();
    changes.create_checks.clear();

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
        changes,
        add_columns: added_columns(&columns, json2, false),
        drop_columns: dropped_columns(&columns, json2),
        created_indexes: created_table_indexes(&tables.created),
        created_references: Vec::new(),
        drop_views,
        rename_views: view_renames(&views),
        alter_views: super::mysql::alter_views(&diff.altered_views, action),
        create_views,
    };

    let ordered = statement::dedupe(common.into_ordered());
    let statements = combine::singlestore_combine_statements(ordered, patched, json2);
    let sql_statements = statement::dedupe(sql::from_json(&statements, Dialect::Singlestore, action)?);
    let meta = build_meta(Dialect::Singlestore, &[], &tables, &columns);

    tracing::debug!(statements = statements.len(), "SingleStore diff complete");

    Ok(DiffOutput {
        statements,
        sql_statements,
        meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::NoRenames;
    use drizzle_schema::{Column, Index, Table};
    use pretty_assertions::assert_eq;

    fn users() -> Table {
        Table::new("users")
            .column(Column::new("id", "int").primary_key())
            .column(Column::new("email", "varchar(255)"))
    }

    #[test]
    fn test_unique_index_becomes_constraint() {
        let snapshot = Snapshot::empty(Dialect::Singlestore)
            .with_table(users().index(Index::new("users_email_idx", ["email"]).unique()));
        let normalized = normalize_unique_indexes(snapshot);
        let table = &normalized.tables["users"];
        assert!(table.indexes.is_empty());
        assert_eq!(table.unique_constraints["users_email_idx"].columns, vec!["email"]);
    }

    #[tokio::test]
    async fn test_unique_index_to_constraint_is_a_no_op() {
        let prev = Snapshot::empty(Dialect::Singlestore)
            .with_table(users().index(Index::new("users_email_idx", ["email"]).unique()));
        let next = Snapshot::empty(Dialect::Singlestore).with_table(users().unique(UniqueConstraint {
            name: "users_email_idx".to_string(),
            columns: vec!["email".to_string()],
            nulls_not_distinct: false,
        }));
        let resolvers = Resolvers::uniform(&NoRenames);
        let output = apply_singlestore_snapshots_diff(&prev, &next, &resolvers, Action::Generate)
            .await
            .unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_column_change_recreates() {
        let prev = Snapshot::empty(Dialect::Singlestore).with_table(users());
        let mut changed = users();
        changed
            .columns
            .insert("email".to_string(), Column::new("email", "varchar(64)"));
        let next = Snapshot::empty(Dialect::Singlestore).with_table(changed);

        let resolvers = Resolvers::uniform(&NoRenames);
        let output = apply_singlestore_snapshots_diff(&prev, &next, &resolvers, Action::Generate)
            .await
            .unwrap();
        let types: Vec<_> = output.statements.iter().map(|s| s.type_name()).collect();
        assert_eq!(types, vec!["recreate_table"]);
        assert_eq!(
            output.sql_statements.last().unwrap(),
            "ALTER TABLE `__new_users` RENAME TO `users`;"
        );
    }
}
