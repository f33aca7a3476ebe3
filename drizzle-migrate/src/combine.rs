//! Folding of unsupported alterations into table rebuilds.
//!
//! SQLite, LibSQL and SingleStore cannot change most column or constraint
//! properties in place. Any table touched by such a change is rebuilt once,
//! with a single `recreate_table` statement placed where the first affected
//! statement was, followed by its indexes. Statements the rebuild makes
//! redundant are removed; renames stay, since the copy step relies on them.

use drizzle_schema::{ForeignKey, GeneratedKind, Snapshot, Table};

use crate::statement::{self, JsonStatement};

/// Whether the statement survives a rebuild of its table.
fn runs_before_rebuild(statement: &JsonStatement) -> bool {
    matches!(
        statement,
        JsonStatement::RenameTable { .. }
            | JsonStatement::AlterTableRenameColumn { .. }
            | JsonStatement::CreateTable { .. }
            | JsonStatement::DropTable { .. }
    )
}

fn inline_references(statements: &[JsonStatement]) -> Vec<(String, ForeignKey)> {
    statements
        .iter()
        .filter_map(|s| match s {
            JsonStatement::SqliteAlterTableAddColumn {
                table_name,
                reference: Some(fk),
                ..
            } => Some((table_name.clone(), fk.clone())),
            _ => None,
        })
        .collect()
}

fn column_needs_rebuild(statement: &JsonStatement) -> bool {
    match statement {
        JsonStatement::SqliteAlterTableAddColumn { column, .. } => {
            let stored = column
                .generated
                .as_ref()
                .is_some_and(|g| g.kind == GeneratedKind::Stored);
            column.primary_key || stored || column.needs_backfill()
        }
        _ => false,
    }
}

fn sqlite_needs_rebuild(statement: &JsonStatement, inline: &[(String, ForeignKey)]) -> bool {
    match statement {
        JsonStatement::CreateReference { table_name, fk, .. } => {
            !inline.iter().any(|(t, f)| t == table_name && f == fk)
        }
        JsonStatement::DeleteReference { .. }
        | JsonStatement::CreateCompositePk { .. }
        | JsonStatement::DeleteCompositePk { .. }
        | JsonStatement::AlterCompositePk { .. }
        | JsonStatement::CreateUniqueConstraint { .. }
        | JsonStatement::DeleteUniqueConstraint { .. }
        | JsonStatement::AlterUniqueConstraint { .. }
        | JsonStatement::CreateCheckConstraint { .. }
        | JsonStatement::DeleteCheckConstraint { .. } => true,
        other => other.column_alter().is_some() || column_needs_rebuild(other),
    }
}

/// Whether LibSQL's `ALTER COLUMN ... TO` covers this alteration.
fn libsql_alters_in_place(statement: &JsonStatement, new: &Snapshot) -> bool {
    let Some(alter) = statement.column_alter() else {
        return false;
    };
    let simple = matches!(
        statement,
        JsonStatement::AlterTableAlterColumnSetType(_)
            | JsonStatement::AlterTableAlterColumnSetDefault(_)
            | JsonStatement::AlterTableAlterColumnDropDefault(_)
            | JsonStatement::AlterTableAlterColumnSetNotnull(_)
            | JsonStatement::AlterTableAlterColumnDropNotnull(_)
    );
    let in_foreign_key = new.tables.get(&alter.table_name).is_some_and(|table| {
        table
            .foreign_keys
            .values()
            .any(|fk| fk.columns_from.contains(&alter.column.name))
    });
    simple && !in_foreign_key && !alter.column.primary_key && !alter.in_composite_pk
}

fn singlestore_needs_rebuild(statement: &JsonStatement) -> bool {
    matches!(
        statement,
        JsonStatement::CreateCompositePk { .. }
            | JsonStatement::DeleteCompositePk { .. }
            | JsonStatement::AlterCompositePk { .. }
            | JsonStatement::CreateUniqueConstraint { .. }
            | JsonStatement::DeleteUniqueConstraint { .. }
            | JsonStatement::AlterUniqueConstraint { .. }
    ) || statement.column_alter().is_some()
}

fn rebuild(
    statements: Vec<JsonStatement>,
    old: &Snapshot,
    new: &Snapshot,
    needs_rebuild: impl Fn(&JsonStatement) -> bool,
) -> Vec<JsonStatement> {
    let mut targets: Vec<String> = Vec::new();
    for statement in statements.iter().filter(|s| needs_rebuild(s)) {
        if let Some(table) = statement.table_name() {
            if !targets.iter().any(|t| t == table) {
                targets.push(table.to_string());
            }
        }
    }
    if targets.is_empty() {
        return statements;
    }

    let find = |snapshot: &Snapshot, name: &str| -> Option<Table> {
        snapshot.tables.values().find(|t| t.name == name).cloned()
    };

    let mut emitted: Vec<String> = Vec::new();
    let mut combined = Vec::with_capacity(statements.len());

    for statement in statements {
        let target = statement
            .table_name()
            .filter(|name| targets.iter().any(|t| t == name))
            .map(str::to_string);
        let Some(table_name) = target else {
            combined.push(statement);
            continue;
        };
        if runs_before_rebuild(&statement) {
            combined.push(statement);
            continue;
        }
        if emitted.contains(&table_name) {
            continue;
        }
        let Some(new_table) = find(new, &table_name) else {
            combined.push(statement);
            continue;
        };

        tracing::debug!(table = %table_name, trigger = %statement.type_name(), "Rebuilding table");
        let old_table = find(old, &table_name);
        combined.push(statement::prepare_recreate_table(old_table.as_ref(), &new_table));
        combined.extend(statement::prepare_create_indexes(
            &new_table.name,
            &new_table.schema,
            new_table.indexes.values(),
        ));
        emitted.push(table_name);
    }

    combined
}

/// Combine statements for SQLite.
pub fn sqlite_combine_statements(
    statements: Vec<JsonStatement>,
    old: &Snapshot,
    new: &Snapshot,
) -> Vec<JsonStatement> {
    let inline = inline_references(&statements);
    let statements: Vec<JsonStatement> = statements
        .into_iter()
        .filter(|s| !is_inline_reference(s, &inline))
        .collect();
    rebuild(statements, old, new, |s| sqlite_needs_rebuild(s, &inline))
}

/// Combine statements for LibSQL, keeping column changes that
/// `ALTER COLUMN ... TO` supports.
pub fn libsql_combine_statements(
    statements: Vec<JsonStatement>,
    old: &Snapshot,
    new: &Snapshot,
) -> Vec<JsonStatement> {
    let inline = inline_references(&statements);
    let statements: Vec<JsonStatement> = statements
        .into_iter()
        .filter(|s| !is_inline_reference(s, &inline))
        .collect();
    let combined = rebuild(statements, old, new, |s| {
        sqlite_needs_rebuild(s, &inline) && !libsql_alters_in_place(s, new)
    });
    // Each in-place alteration renders the full column definition once.
    let mut seen: Vec<(String, String)> = Vec::new();
    combined
        .into_iter()
        .filter(|s| match s.column_alter() {
            Some(alter) => {
                let key = (alter.table_name.clone(), alter.column.name.clone());
                if seen.contains(&key) {
                    false
                } else {
                    seen.push(key);
                    true
                }
            }
            None => true,
        })
        .collect()
}

/// Combine statements for SingleStore.
pub fn singlestore_combine_statements(
    statements: Vec<JsonStatement>,
    old: &Snapshot,
    new: &Snapshot,
) -> Vec<JsonStatement> {
    rebuild(statements, old, new, singlestore_needs_rebuild)
}

fn is_inline_reference(statement: &JsonStatement, inline: &[(String, ForeignKey)]) -> bool {
    match statement {
        JsonStatement::CreateReference { table_name, fk, .. } => {
            inline.iter().any(|(t, f)| t == table_name && f == fk)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drizzle_schema::{Column, Dialect, Index};
    use pretty_assertions::assert_eq;

    fn snapshot(table: Table) -> Snapshot {
        Snapshot::empty(Dialect::Sqlite).with_table(table)
    }

    fn users() -> Table {
        Table::new("users")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("name", "text"))
            .index(Index::new("users_name_idx", ["name"]))
    }

    #[test]
    fn test_rebuild_replaces_alterations() {
        let old = snapshot(users());
        let mut table = users().column(Column::new("age", "integer").not_null());
        table.columns.insert("name".to_string(), Column::new("name", "text").not_null());
        let new = snapshot(table.clone());

        let statements = vec![
            JsonStatement::AlterTableRenameColumn {
                table_name: "users".to_string(),
                schema: String::new(),
                old_column_name: "nick".to_string(),
                new_column_name: "name".to_string(),
            },
            JsonStatement::DropIndex {
                table_name: "users".to_string(),
                schema: String::new(),
                index: Index::new("old_idx", ["name"]),
            },
        ]
        .into_iter()
        .chain(statement::prepare_alter_columns(
            &old.tables["users"],
            &table,
            &[crate::differ::alternations_in_column(
                &old.tables["users"].columns["name"],
                &table.columns["name"],
            )
            .unwrap()],
        ))
        .chain(statement::prepare_sqlite_add_columns(
            &table,
            &[Column::new("age", "integer").not_null()],
        ))
        .collect();

        let combined = sqlite_combine_statements(statements, &old, &new);
        let types: Vec<_> = combined.iter().map(|s| s.type_name()).collect();
        assert_eq!(
            types,
            vec!["alter_table_rename_column", "recreate_table", "create_index"]
        );
        match &combined[1] {
            JsonStatement::RecreateTable { copied_columns, .. } => {
                assert_eq!(copied_columns, &vec!["id".to_string(), "name".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_untouched_tables_pass_through() {
        let old = snapshot(users());
        let new = snapshot(users().column(Column::new("age", "integer")));
        let statements = statement::prepare_sqlite_add_columns(
            &new.tables["users"],
            &[Column::new("age", "integer")],
        );
        let combined = sqlite_combine_statements(statements.clone(), &old, &new);
        assert_eq!(combined, statements);
    }

    #[test]
    fn test_libsql_keeps_in_place_alter() {
        let old = snapshot(users());
        let mut table = users();
        table.columns.insert("name".to_string(), Column::new("name", "varchar").not_null());
        let new = snapshot(table.clone());

        let altered = crate::differ::alternations_in_column(
            &old.tables["users"].columns["name"],
            &table.columns["name"],
        )
        .unwrap();
        let statements = statement::prepare_alter_columns(&old.tables["users"], &table, &[altered]);
        assert_eq!(statements.len(), 2);

        let combined = libsql_combine_statements(statements, &old, &new);
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].type_name(), "alter_table_alter_column_set_type");
    }
}
