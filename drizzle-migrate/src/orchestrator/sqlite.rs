//! SQLite and LibSQL orchestrators.
//!
//! Both engines share the snapshot shape. Statements they cannot run in place
//! are folded into table rebuilds by [`crate::combine`].

use drizzle_schema::{Dialect, Snapshot};

use super::{
    Action, CommonStatements, DiffOutput, TableChanges, added_columns, build_meta,
    created_table_indexes, dropped_columns, ensure_dialect, recreate_altered_views,
    renamed_columns, resolve_columns, resolve_tables, resolve_views, view_lifecycle,
};
use crate::combine;
use crate::error::MigrateResult;
use crate::resolver::Resolvers;
use crate::sql;
use crate::statement::{self, JsonStatement};
use crate::differ::apply_json_diff;

/// Drop composite primary key pairs that only differ by name. The column lists
/// are compared in order.
fn skip_regenerated_pks(changes: &mut TableChanges) {
    let pk_columns = |stmt: &JsonStatement| match stmt {
        JsonStatement::CreateCompositePk { table_name, pk, .. }
        | JsonStatement::DeleteCompositePk { table_name, pk, .. } => {
            Some((table_name.clone(), pk.columns.clone()))
        }
        _ => None,
    };

    let created: Vec<_> = changes.create_pks.iter().filter_map(pk_columns).collect();
    let deleted: Vec<_> = changes.drop_pks.iter().filter_map(pk_columns).collect();

    changes
        .create_pks
        .retain(|stmt| pk_columns(stmt).is_none_or(|key| !deleted.contains(&key)));
    changes
        .drop_pks
        .retain(|stmt| pk_columns(stmt).is_none_or(|key| !created.contains(&key)));
}

async fn diff_sqlite_family(
    dialect: Dialect,
    json1: &Snapshot,
    json2: &Snapshot,
    resolvers: &Resolvers<'_>,
    action: Action,
) -> MigrateResult<DiffOutput> {
    ensure_dialect(dialect, json1, json2)?;
    tracing::debug!(dialect = %dialect, action = ?action, "Diffing sqlite snapshots");

    let tables = resolve_tables(json1.clone(), json2, resolvers.tables).await?;
    let columns = resolve_columns(tables.patched.clone(), json2, resolvers.columns).await?;
    let views = resolve_views(columns.patched.clone(), json2, resolvers.views).await?;
    let patched = &views.patched;

    let diff = apply_json_diff(patched, json2);
    let mut changes = TableChanges::collect(&diff.altered_tables_with_columns, patched, json2);
    if dialect == Dialect::Turso {
        skip_regenerated_pks(&mut changes);
    }

    let (create_views, mut drop_views) = view_lifecycle(&views);
    let (altered_drops, altered_creates) = recreate_altered_views(&diff.altered_views, action);
    drop_views.extend(altered_drops);

    // SQLite has no ALTER VIEW ... RENAME; renamed views are rebuilt.
    let mut rename_drops = Vec::new();
    let mut rename_creates = Vec::new();
    for renamed in views.renamed.iter().filter(|r| !r.to.is_existing) {
        rename_drops.push(JsonStatement::DropView {
            name: renamed.from.name.clone(),
            schema: String::new(),
            materialized: false,
        });
        rename_creates.push(JsonStatement::CreateView {
            view: renamed.to.clone(),
        });
    }
    drop_views.extend(rename_drops);

    let common = CommonStatements {
        create_tables: tables
            .created
            .iter()
            .map(|t| statement::prepare_create_table(t, true))
            .collect(),
        drop_tables: tables.deleted.iter().map(statement::prepare_drop_table).collect(),
        rename_tables: tables
            .renamed
            .iter()
            .map(|r| statement::prepare_rename_table(&r.from, &r.to))
            .collect(),
        rename_columns: renamed_columns(&columns),
        changes,
        add_columns: added_columns(&columns, json2, true),
        drop_columns: dropped_columns(&columns, json2),
        created_indexes: created_table_indexes(&tables.created),
        created_references: Vec::new(),
        drop_views,
        rename_views: Vec::new(),
        alter_views: Vec::new(),
        create_views: create_views
            .into_iter()
            .chain(altered_creates)
            .chain(rename_creates)
            .collect(),
    };

    let ordered = statement::dedupe(common.into_ordered());
    let statements = if dialect == Dialect::Turso {
        combine::libsql_combine_statements(ordered, patched, json2)
    } else {
        combine::sqlite_combine_statements(ordered, patched, json2)
    };
    let sql_statements = sql::from_json(&statements, dialect, action)?;
    let meta = build_meta(dialect, &[], &tables, &columns);

    tracing::debug!(statements = statements.len(), "SQLite diff complete");

    Ok(DiffOutput {
        statements,
        sql_statements,
        meta,
    })
}

/// Diff two SQLite snapshots.
pub async fn apply_sqlite_snapshots_diff(
    json1: &Snapshot,
    json2: &Snapshot,
    resolvers: &Resolvers<'_>,
    action: Action,
) -> MigrateResult<DiffOutput> {
    diff_sqlite_family(Dialect::Sqlite, json1, json2, resolvers, action).await
}

/// Diff two LibSQL (Turso) snapshots.
pub async fn apply_libsql_snapshots_diff(
    json1: &Snapshot,
    json2: &Snapshot,
    resolvers: &Resolvers<'_>,
    action: Action,
) -> MigrateResult<DiffOutput> {
    diff_sqlite_family(Dialect::Turso, json1, json2, resolvers, action).await
}
