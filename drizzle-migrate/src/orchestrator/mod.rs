//! Snapshot differ orchestrators.
//!
//! One async entry point per dialect. Each runs the same pipeline:
//!
//! 1. partition tables, resolve renames and moves, patch the old snapshot
//! 2. partition columns per table, resolve renames, patch again
//! 3. (dialect-dependent) resolve views, enums, sequences, roles, policies
//! 4. run [`apply_json_diff`](crate::differ::apply_json_diff) on the patched pair
//! 5. emit [`JsonStatement`]s in dependency order and render them to SQL
//!
//! Patching never mutates the caller's snapshots: every transform takes a
//! [`Snapshot`] by value and returns the rewritten one.

mod mysql;
mod postgres;
mod singlestore;
mod sqlite;

pub use mysql::apply_mysql_snapshots_diff;
pub use postgres::apply_pg_snapshots_diff;
pub use singlestore::apply_singlestore_snapshots_diff;
pub use sqlite::{apply_libsql_snapshots_diff, apply_sqlite_snapshots_diff};

use indexmap::IndexMap;
use serde::Serialize;

use drizzle_schema::{
    Column, Dialect, IndexColumn, Snapshot, SnapshotMeta, STATEMENT_BREAKPOINT, Table, View,
};

use crate::differ::{AlteredTable, diff_columns, diff_schemas_or_tables};
use crate::error::{MigrateResult, MigrationError};
use crate::resolver::{Moved, RenameResolver, Renamed, ResolverInput, ResolverItem, ResolverOutput};
use crate::statement::{self, JsonStatement};

/// What the generated statements are for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Written to a migration file.
    #[default]
    Generate,
    /// Executed immediately against a live database.
    Push,
}

/// Result of diffing two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffOutput {
    /// Ordered DDL intents.
    pub statements: Vec<JsonStatement>,
    /// Rendered SQL, in the same order.
    pub sql_statements: Vec<String>,
    /// Renames applied, for the next snapshot's `_meta`.
    #[serde(rename = "_meta")]
    pub meta: SnapshotMeta,
}

impl DiffOutput {
    /// Whether the snapshots were equivalent.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty() && self.sql_statements.is_empty()
    }

    /// Migration file body.
    pub fn to_migration_sql(&self, breakpoints: bool) -> String {
        let separator = if breakpoints {
            format!("\n{}\n", STATEMENT_BREAKPOINT)
        } else {
            "\n".to_string()
        };
        self.sql_statements.join(&separator)
    }
}

pub(crate) fn ensure_dialect(expected: Dialect, json1: &Snapshot, json2: &Snapshot) -> MigrateResult<()> {
    for snapshot in [json1, json2] {
        if snapshot.dialect.snapshot_family() != expected.snapshot_family() {
            return Err(MigrationError::DialectMismatch {
                expected,
                found: snapshot.dialect,
            });
        }
    }
    Ok(())
}

/// Postgres treats an empty schema as `public`.
pub(crate) fn schema_eq(a: &str, b: &str) -> bool {
    let norm = |s: &str| if s.is_empty() { "public" } else { s }.to_string();
    norm(a) == norm(b)
}

/// Rebuild a map replacing one entry, keeping its position.
pub(crate) fn rekey<T>(
    map: &IndexMap<String, T>,
    old_key: &str,
    new_key: &str,
    mut update: impl FnMut(T) -> T,
) -> IndexMap<String, T>
where
    T: Clone,
{
    map.iter()
        .map(|(key, value)| {
            if key == old_key {
                (new_key.to_string(), update(value.clone()))
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect()
}

/// Snapshot with `table` renamed. Foreign keys on either side follow it.
pub fn rename_table(mut snapshot: Snapshot, from: &Table, to: &Table) -> Snapshot {
    let dialect = snapshot.dialect;
    let old_key = [
        dialect.entity_key(&from.schema, &from.name),
        dialect.entity_key(&to.schema, &from.name),
    ]
    .into_iter()
    .find(|key| snapshot.tables.contains_key(key));
    let Some(old_key) = old_key else {
        return snapshot;
    };
    let new_key = dialect.entity_key(&to.schema, &to.name);

    let mut tables = rekey(&snapshot.tables, &old_key, &new_key, |mut table| {
        table.name = to.name.clone();
        table.schema = to.schema.clone();
        table
    });

    for table in tables.values_mut() {
        for fk in table.foreign_keys.values_mut() {
            if fk.table_from == from.name && table.name == to.name {
                fk.table_from = to.name.clone();
            }
            let target_schema = fk.schema_to.as_deref().unwrap_or("");
            if fk.table_to == from.name && schema_eq(target_schema, &to.schema) {
                fk.table_to = to.name.clone();
            }
        }
    }

    snapshot.tables = tables;
    snapshot
}

/// Snapshot with a table moved to another schema.
pub fn move_table(mut snapshot: Snapshot, moved: &Moved) -> Snapshot {
    let dialect = snapshot.dialect;
    let old_key = dialect.entity_key(&moved.schema_from, &moved.name);
    if !snapshot.tables.contains_key(&old_key) {
        return snapshot;
    }
    let new_key = dialect.entity_key(&moved.schema_to, &moved.name);

    let mut tables = rekey(&snapshot.tables, &old_key, &new_key, |mut table| {
        table.schema = moved.schema_to.clone();
        table
    });
    for table in tables.values_mut() {
        for fk in table.foreign_keys.values_mut() {
            let target_schema = fk.schema_to.clone().unwrap_or_default();
            if fk.table_to == moved.name && schema_eq(&target_schema, &moved.schema_from) {
                fk.schema_to = Some(moved.schema_to.clone());
            }
        }
    }

    snapshot.tables = tables;
    snapshot
}

fn rename_in(columns: &mut [String], from: &str, to: &str) {
    for column in columns.iter_mut().filter(|c| c.as_str() == from) {
        *column = to.to_string();
    }
}

/// Snapshot with a column of the table at `table_key` renamed. Indexes,
/// constraints and foreign keys that name the column follow it.
pub fn rename_column(mut snapshot: Snapshot, table_key: &str, from: &str, to: &str) -> Snapshot {
    let Some(table) = snapshot.tables.get(table_key).cloned() else {
        return snapshot;
    };

    let mut renamed = rekey(&snapshot.tables, table_key, table_key, |mut table| {
        table.columns = rekey(&table.columns, from, to, |mut column| {
            column.name = to.to_string();
            column
        });
        for index in table.indexes.values_mut() {
            for column in index.columns.iter_mut() {
                match column {
                    IndexColumn::Name(name) if *name == from => *name = to.to_string(),
                    IndexColumn::Expression(expr) if !expr.is_expression && expr.expression == from => {
                        expr.expression = to.to_string()
                    }
                    _ => {}
                }
            }
        }
        for fk in table.foreign_keys.values_mut() {
            rename_in(&mut fk.columns_from, from, to);
        }
        for pk in table.composite_primary_keys.values_mut() {
            rename_in(&mut pk.columns, from, to);
        }
        for unique in table.unique_constraints.values_mut() {
            rename_in(&mut unique.columns, from, to);
        }
        table
    });

    for other in renamed.values_mut() {
        for fk in other.foreign_keys.values_mut() {
            let target_schema = fk.schema_to.as_deref().unwrap_or("");
            if fk.table_to == table.name && schema_eq(target_schema, &table.schema) {
                rename_in(&mut fk.columns_to, from, to);
            }
        }
    }

    snapshot.tables = renamed;
    snapshot
}

/// Snapshot with a view renamed or moved.
pub fn rename_view(mut snapshot: Snapshot, from: &View, to: &View) -> Snapshot {
    let dialect = snapshot.dialect;
    let old_key = [
        dialect.entity_key(&from.schema, &from.name),
        dialect.entity_key(&to.schema, &from.name),
    ]
    .into_iter()
    .find(|key| snapshot.views.contains_key(key));
    let Some(old_key) = old_key else {
        return snapshot;
    };
    let new_key = dialect.entity_key(&to.schema, &to.name);
    snapshot.views = rekey(&snapshot.views, &old_key, &new_key, |mut view| {
        view.name = to.name.clone();
        view.schema = to.schema.clone();
        view
    });
    snapshot
}

/// Snapshot with a view moved to another schema.
pub fn move_view(mut snapshot: Snapshot, moved: &Moved) -> Snapshot {
    let dialect = snapshot.dialect;
    let old_key = dialect.entity_key(&moved.schema_from, &moved.name);
    let new_key = dialect.entity_key(&moved.schema_to, &moved.name);
    snapshot.views = rekey(&snapshot.views, &old_key, &new_key, |mut view| {
        view.schema = moved.schema_to.clone();
        view
    });
    snapshot
}

/// Call a resolver, skipping it when there is nothing to decide.
pub(crate) async fn resolve<T: ResolverItem>(
    resolver: &dyn RenameResolver<T>,
    input: ResolverInput<T>,
) -> MigrateResult<ResolverOutput<T>> {
    if input.created.is_empty() || input.deleted.is_empty() {
        return Ok(ResolverOutput::unchanged(input));
    }
    let output = resolver.resolve(input).await?;
    if !output.renamed.is_empty() || !output.moved.is_empty() {
        tracing::debug!(
            renamed = output.renamed.len(),
            moved = output.moved.len(),
            "Resolver reported renames"
        );
    }
    Ok(output)
}

/// Table partition after rename resolution.
#[derive(Debug, Clone)]
pub(crate) struct TablesPass {
    pub created: Vec<Table>,
    pub deleted: Vec<Table>,
    pub renamed: Vec<Renamed<Table>>,
    pub moved: Vec<Moved>,
    pub patched: Snapshot,
}

pub(crate) async fn resolve_tables(
    json1: Snapshot,
    json2: &Snapshot,
    resolver: &dyn RenameResolver<Table>,
) -> MigrateResult<TablesPass> {
    let partition = diff_schemas_or_tables(&json1.tables, &json2.tables);
    let output = resolve(resolver, ResolverInput::new(partition.added, partition.deleted)).await?;

    let mut patched = json1;
    for moved in &output.moved {
        patched = move_table(patched, moved);
    }
    for renamed in &output.renamed {
        patched = rename_table(patched, &renamed.from, &renamed.to);
    }

    Ok(TablesPass {
        created: output.created,
        deleted: output.deleted,
        renamed: output.renamed,
        moved: output.moved,
        patched,
    })
}

/// Column renames of one table.
#[derive(Debug, Clone)]
pub(crate) struct ColumnRenames {
    pub table_name: String,
    pub schema: String,
    pub renames: Vec<(String, String)>,
}

/// Column partition after rename resolution, keyed by table.
#[derive(Debug, Clone)]
pub(crate) struct ColumnsPass {
    pub renamed: Vec<ColumnRenames>,
    pub added: IndexMap<String, Vec<Column>>,
    pub deleted: IndexMap<String, Vec<Column>>,
    pub patched: Snapshot,
}

pub(crate) async fn resolve_columns(
    patched: Snapshot,
    json2: &Snapshot,
    resolver: &dyn RenameResolver<Column>,
) -> MigrateResult<ColumnsPass> {
    let diffs = diff_columns(&patched.tables, &json2.tables);

    let mut pass = ColumnsPass {
        renamed: Vec::new(),
        added: IndexMap::new(),
        deleted: IndexMap::new(),
        patched,
    };

    for (key, diff) in diffs {
        let input = ResolverInput::for_table(&diff.name, &diff.schema, diff.added, diff.deleted);
        let output = resolve(resolver, input).await?;

        let renames: Vec<(String, String)> = output
            .renamed
            .iter()
            .map(|r| (r.from.name.clone(), r.to.name.clone()))
            .collect();
        for (from, to) in &renames {
            pass.patched = rename_column(pass.patched, &key, from, to);
        }
        if !renames.is_empty() {
            pass.renamed.push(ColumnRenames {
                table_name: diff.name.clone(),
                schema: diff.schema.clone(),
                renames,
            });
        }
        if !output.created.is_empty() {
            pass.added.insert(key.clone(), output.created);
        }
        if !output.deleted.is_empty() {
            pass.deleted.insert(key, output.deleted);
        }
    }

    Ok(pass)
}

/// View partition after rename resolution.
#[derive(Debug, Clone)]
pub(crate) struct ViewsPass {
    pub created: Vec<View>,
    pub deleted: Vec<View>,
    pub renamed: Vec<Renamed<View>>,
    pub moved: Vec<Moved>,
    pub patched: Snapshot,
}

pub(crate) async fn resolve_views(
    patched: Snapshot,
    json2: &Snapshot,
    resolver: &dyn RenameResolver<View>,
) -> MigrateResult<ViewsPass> {
    let partition = diff_schemas_or_tables(&patched.views, &json2.views);
    let output = resolve(resolver, ResolverInput::new(partition.added, partition.deleted)).await?;

    let mut patched = patched;
    for moved in &output.moved {
        patched = move_view(patched, moved);
    }
    for renamed in &output.renamed {
        patched = rename_view(patched, &renamed.from, &renamed.to);
    }

    Ok(ViewsPass {
        created: output.created,
        deleted: output.deleted,
        renamed: output.renamed,
        moved: output.moved,
        patched,
    })
}

/// Quoted, qualified name used in `_meta`.
pub(crate) fn meta_name(dialect: Dialect, schema: &str, parts: &[&str]) -> String {
    let mut quoted = Vec::with_capacity(parts.len() + 1);
    if dialect.has_schemas() {
        let schema = if schema.is_empty() { "public" } else { schema };
        quoted.push(format!("\"{}\"", schema));
    }
    quoted.extend(parts.iter().map(|p| format!("\"{}\"", p)));
    quoted.join(".")
}

pub(crate) fn build_meta(
    dialect: Dialect,
    schemas: &[Renamed<String>],
    tables: &TablesPass,
    columns: &ColumnsPass,
) -> SnapshotMeta {
    let mut meta = SnapshotMeta::default();
    for renamed in schemas {
        meta.schemas.insert(renamed.from.clone(), renamed.to.clone());
    }
    for renamed in &tables.renamed {
        meta.tables.insert(
            meta_name(dialect, &renamed.from.schema, &[&renamed.from.name]),
            meta_name(dialect, &renamed.to.schema, &[&renamed.to.name]),
        );
    }
    for table in &columns.renamed {
        for (from, to) in &table.renames {
            meta.columns.insert(
                meta_name(dialect, &table.schema, &[&table.table_name, from]),
                meta_name(dialect, &table.schema, &[&table.table_name, to]),
            );
        }
    }
    meta
}

/// Statements derived from tables present on both sides, grouped so each
/// orchestrator can interleave them in its own order.
#[derive(Debug, Clone, Default)]
pub(crate) struct TableChanges {
    pub drop_references: Vec<JsonStatement>,
    pub create_references: Vec<JsonStatement>,
    pub drop_checks: Vec<JsonStatement>,
    pub create_checks: Vec<JsonStatement>,
    pub drop_indexes: Vec<JsonStatement>,
    pub create_indexes: Vec<JsonStatement>,
    pub drop_pks: Vec<JsonStatement>,
    pub create_pks: Vec<JsonStatement>,
    pub alter_pks: Vec<JsonStatement>,
    pub drop_uniques: Vec<JsonStatement>,
    pub create_uniques: Vec<JsonStatement>,
    pub alter_uniques: Vec<JsonStatement>,
    pub alter_columns: Vec<JsonStatement>,
    pub drop_policies: Vec<JsonStatement>,
    pub create_policies: Vec<JsonStatement>,
    pub alter_policies: Vec<JsonStatement>,
    pub rls: Vec<JsonStatement>,
}

impl TableChanges {
    pub(crate) fn collect(altered: &[AlteredTable], old: &Snapshot, new: &Snapshot) -> Self {
        let mut changes = Self::default();
        let dialect = new.dialect;

        for table in altered {
            let key = dialect.entity_key(&table.schema, &table.name);
            let (Some(old_table), Some(new_table)) = (old.tables.get(&key), new.tables.get(&key))
            else {
                continue;
            };
            let (name, schema) = (table.name.as_str(), table.schema.as_str());

            // Altered foreign keys are dropped and re-added.
            changes.drop_references.extend(statement::prepare_drop_references(
                name,
                schema,
                table
                    .foreign_keys
                    .deleted
                    .values()
                    .chain(table.foreign_keys.altered.values().map(|a| &a.old)),
            ));
            changes.create_references.extend(statement::prepare_create_references(
                name,
                schema,
                table
                    .foreign_keys
                    .added
                    .values()
                    .chain(table.foreign_keys.altered.values().map(|a| &a.new)),
            ));

            for check in table
                .check_constraints
                .deleted
                .values()
                .chain(table.check_constraints.altered.values().map(|a| &a.old))
            {
                changes.drop_checks.push(JsonStatement::DeleteCheckConstraint {
                    table_name: name.to_string(),
                    schema: schema.to_string(),
                    check: check.clone(),
                });
            }
            for check in table
                .check_constraints
                .added
                .values()
                .chain(table.check_constraints.altered.values().map(|a| &a.new))
            {
                changes.create_checks.push(JsonStatement::CreateCheckConstraint {
                    table_name: name.to_string(),
                    schema: schema.to_string(),
                    check: check.clone(),
                });
            }

            changes.drop_indexes.extend(statement::prepare_drop_indexes(
                name,
                schema,
                table
                    .indexes
                    .deleted
                    .values()
                    .chain(table.indexes.altered.values().map(|a| &a.old)),
            ));
            changes.create_indexes.extend(statement::prepare_create_indexes(
                name,
                schema,
                table
                    .indexes
                    .added
                    .values()
                    .chain(table.indexes.altered.values().map(|a| &a.new)),
            ));

            for pk in table.composite_pks.deleted.values() {
                changes.drop_pks.push(JsonStatement::DeleteCompositePk {
                    table_name: name.to_string(),
                    schema: schema.to_string(),
                    pk: pk.clone(),
                });
            }
            for pk in table.composite_pks.added.values() {
                changes.create_pks.push(JsonStatement::CreateCompositePk {
                    table_name: name.to_string(),
                    schema: schema.to_string(),
                    pk: pk.clone(),
                });
            }
            for pk in table.composite_pks.altered.values() {
                changes.alter_pks.push(JsonStatement::AlterCompositePk {
                    table_name: name.to_string(),
                    schema: schema.to_string(),
                    old: pk.old.clone(),
                    new: pk.new.clone(),
                });
            }

            for unique in table.unique_constraints.deleted.values() {
                changes.drop_uniques.push(JsonStatement::DeleteUniqueConstraint {
                    table_name: name.to_string(),
                    schema: schema.to_string(),
                    unique: unique.clone(),
                });
            }
            for unique in table.unique_constraints.added.values() {
                changes.create_uniques.push(JsonStatement::CreateUniqueConstraint {
                    table_name: name.to_string(),
                    schema: schema.to_string(),
                    unique: unique.clone(),
                });
            }
            for unique in table.unique_constraints.altered.values() {
                changes.alter_uniques.push(JsonStatement::AlterUniqueConstraint {
                    table_name: name.to_string(),
                    schema: schema.to_string(),
                    old: unique.old.clone(),
                    new: unique.new.clone(),
                });
            }

            changes.alter_columns.extend(statement::prepare_alter_columns(
                old_table,
                new_table,
                &table.altered,
            ));

            for policy in table.policies.deleted.values() {
                changes.drop_policies.push(JsonStatement::DropPolicy {
                    table_name: name.to_string(),
                    schema: schema.to_string(),
                    policy: policy.clone(),
                });
            }
            for policy in table.policies.added.values() {
                changes.create_policies.push(JsonStatement::CreatePolicy {
                    table_name: name.to_string(),
                    schema: schema.to_string(),
                    policy: policy.clone(),
                });
            }
            for policy in table.policies.altered.values() {
                changes.alter_policies.push(JsonStatement::AlterPolicy {
                    table_name: name.to_string(),
                    schema: schema.to_string(),
                    old: policy.old.clone(),
                    new: policy.new.clone(),
                });
            }

            match table.rls.as_ref().and_then(|rls| rls.new_value()) {
                Some(true) => changes.rls.push(JsonStatement::EnableRls {
                    table_name: name.to_string(),
                    schema: schema.to_string(),
                }),
                Some(false) => changes.rls.push(JsonStatement::DisableRls {
                    table_name: name.to_string(),
                    schema: schema.to_string(),
                }),
                None => {}
            }
        }

        changes
    }
}

/// `ADD COLUMN` statements for every table that gained columns.
pub(crate) fn added_columns(columns: &ColumnsPass, new: &Snapshot, sqlite: bool) -> Vec<JsonStatement> {
    columns
        .added
        .iter()
        .filter_map(|(key, added)| new.tables.get(key).map(|table| (table, added)))
        .flat_map(|(table, added)| {
            if sqlite {
                statement::prepare_sqlite_add_columns(table, added)
            } else {
                statement::prepare_add_columns(table, added)
            }
        })
        .collect()
}

/// `DROP COLUMN` statements for every table that lost columns.
pub(crate) fn dropped_columns(columns: &ColumnsPass, new: &Snapshot) -> Vec<JsonStatement> {
    columns
        .deleted
        .iter()
        .filter_map(|(key, deleted)| new.tables.get(key).map(|table| (table, deleted)))
        .flat_map(|(table, deleted)| statement::prepare_drop_columns(&table.name, &table.schema, deleted))
        .collect()
}

/// `RENAME COLUMN` statements.
pub(crate) fn renamed_columns(columns: &ColumnsPass) -> Vec<JsonStatement> {
    columns
        .renamed
        .iter()
        .flat_map(|t| statement::prepare_rename_columns(&t.table_name, &t.schema, &t.renames))
        .collect()
}

/// Statements for brand new tables' indexes.
pub(crate) fn created_table_indexes(tables: &[Table]) -> Vec<JsonStatement> {
    tables
        .iter()
        .flat_map(|t| statement::prepare_create_indexes(&t.name, &t.schema, t.indexes.values()))
        .collect()
}

/// Statements for brand new tables' foreign keys.
pub(crate) fn created_table_references(tables: &[Table]) -> Vec<JsonStatement> {
    tables
        .iter()
        .flat_map(|t| statement::prepare_create_references(&t.name, &t.schema, t.foreign_keys.values()))
        .collect()
}

/// Views to create and drop, skipping views managed outside of migrations.
pub(crate) fn view_lifecycle(views: &ViewsPass) -> (Vec<JsonStatement>, Vec<JsonStatement>) {
    let create = views
        .created
        .iter()
        .filter(|v| !v.is_existing)
        .map(|view| JsonStatement::CreateView { view: view.clone() })
        .collect();
    let drop = views
        .deleted
        .iter()
        .filter(|v| !v.is_existing)
        .map(|view| JsonStatement::DropView {
            name: view.name.clone(),
            schema: view.schema.clone(),
            materialized: view.materialized,
        })
        .collect();
    (create, drop)
}

/// Renamed views.
pub(crate) fn view_renames(views: &ViewsPass) -> Vec<JsonStatement> {
    views
        .renamed
        .iter()
        .filter(|r| !r.to.is_existing)
        .map(|r| JsonStatement::RenameView {
            name_from: r.from.name.clone(),
            name_to: r.to.name.clone(),
            schema: r.to.schema.clone(),
            materialized: r.to.materialized,
        })
        .collect()
}

/// Altered views rebuilt by drop and create. In push mode a changed definition
/// alone is ignored, since introspected view bodies rarely match byte for byte.
pub(crate) fn recreate_altered_views(
    altered: &[crate::differ::Altered<View>],
    action: Action,
) -> (Vec<JsonStatement>, Vec<JsonStatement>) {
    let mut drops = Vec::new();
    let mut creates = Vec::new();
    for view in altered {
        let (old, new) = (&view.old, &view.new);
        if new.is_existing {
            continue;
        }
        let only_definition = View {
            definition: new.definition.clone(),
            ..old.clone()
        } == *new;
        if action == Action::Push && only_definition {
            continue;
        }
        if !old.is_existing {
            drops.push(JsonStatement::DropView {
                name: old.name.clone(),
                schema: old.schema.clone(),
                materialized: old.materialized,
            });
        }
        creates.push(JsonStatement::CreateView { view: new.clone() });
    }
    (drops, creates)
}

/// Statement groups shared by the MySQL, SQLite, LibSQL and SingleStore
/// orchestrators.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommonStatements {
    pub create_tables: Vec<JsonStatement>,
    pub drop_tables: Vec<JsonStatement>,
    pub rename_tables: Vec<JsonStatement>,
    pub rename_columns: Vec<JsonStatement>,
    pub changes: TableChanges,
    pub add_columns: Vec<JsonStatement>,
    pub drop_columns: Vec<JsonStatement>,
    pub created_indexes: Vec<JsonStatement>,
    pub created_references: Vec<JsonStatement>,
    pub drop_views: Vec<JsonStatement>,
    pub rename_views: Vec<JsonStatement>,
    pub alter_views: Vec<JsonStatement>,
    pub create_views: Vec<JsonStatement>,
}

impl CommonStatements {
    /// Flatten in dependency order: tables and renames, constraint drops,
    /// column changes, index and check creation, views, foreign keys and
    /// column drops, then altered keys and uniques.
    pub(crate) fn into_ordered(self) -> Vec<JsonStatement> {
        let Self {
            create_tables,
            drop_tables,
            rename_tables,
            rename_columns,
            changes,
            add_columns,
            drop_columns,
            created_indexes,
            created_references,
            drop_views,
            rename_views,
            alter_views,
            create_views,
        } = self;

        [
            create_tables,
            drop_tables,
            rename_tables,
            rename_columns,
            changes.drop_references,
            changes.drop_checks,
            changes.drop_uniques,
            changes.drop_indexes,
            changes.drop_pks,
            changes.alter_columns,
            changes.create_pks,
            add_columns,
            created_indexes,
            changes.create_indexes,
            changes.create_checks,
            drop_views,
            rename_views,
            alter_views,
            create_views,
            created_references,
            changes.create_references,
            drop_columns,
            changes.alter_pks,
            changes.create_uniques,
            changes.alter_uniques,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drizzle_schema::{ForeignKey, Index};
    use pretty_assertions::assert_eq;

    fn snapshot() -> Snapshot {
        Snapshot::empty(Dialect::Postgresql)
            .with_table(
                Table::new("users")
                    .column(Column::new("id", "serial").primary_key())
                    .column(Column::new("name", "text"))
                    .index(Index::new("users_name_idx", ["name"])),
            )
            .with_table(
                Table::new("posts")
                    .column(Column::new("id", "serial").primary_key())
                    .column(Column::new("author", "integer"))
                    .foreign_key(ForeignKey {
                        name: "posts_author_fk".to_string(),
                        table_from: "posts".to_string(),
                        columns_from: vec!["author".to_string()],
                        table_to: "users".to_string(),
                        columns_to: vec!["name".to_string()],
                        schema_to: Some("public".to_string()),
                        on_update: None,
                        on_delete: None,
                    }),
            )
    }

    #[test]
    fn test_rename_table_rewrites_references() {
        let original = snapshot();
        let from = original.tables["public.users"].clone();
        let mut to = from.clone();
        to.name = "people".to_string();

        let patched = rename_table(original.clone(), &from, &to);
        assert!(patched.tables.contains_key("public.people"));
        assert!(!patched.tables.contains_key("public.users"));
        assert_eq!(patched.tables.get_index_of("public.people"), Some(0));
        assert_eq!(
            patched.tables["public.posts"].foreign_keys["posts_author_fk"].table_to,
            "people"
        );
        // The input is left alone.
        assert!(original.tables.contains_key("public.users"));
    }

    #[test]
    fn test_rename_column_follows_dependents() {
        let patched = rename_column(snapshot(), "public.users", "name", "full_name");
        let users = &patched.tables["public.users"];
        assert_eq!(users.columns.keys().collect::<Vec<_>>(), vec!["id", "full_name"]);
        assert_eq!(users.indexes["users_name_idx"].column_names(), vec!["full_name"]);
        assert_eq!(
            patched.tables["public.posts"].foreign_keys["posts_author_fk"].columns_to,
            vec!["full_name"]
        );
    }

    #[test]
    fn test_move_table() {
        let moved = Moved {
            name: "users".to_string(),
            schema_from: String::new(),
            schema_to: "auth".to_string(),
        };
        let patched = move_table(snapshot(), &moved);
        assert_eq!(patched.tables["auth.users"].schema, "auth");
        assert_eq!(
            patched.tables["public.posts"].foreign_keys["posts_author_fk"].schema_to,
            Some("auth".to_string())
        );
    }

    #[test]
    fn test_migration_sql_breakpoints() {
        let output = DiffOutput {
            sql_statements: vec!["CREATE TABLE a;".to_string(), "DROP TABLE b;".to_string()],
            ..Default::default()
        };
        assert_eq!(
            output.to_migration_sql(true),
            "CREATE TABLE a;\n--> statement-breakpoint\nDROP TABLE b;"
        );
        assert_eq!(output.to_migration_sql(false), "CREATE TABLE a;\nDROP TABLE b;");
    }

    #[test]
    fn test_meta_names() {
        assert_eq!(meta_name(Dialect::Postgresql, "", &["users"]), "\"public\".\"users\"");
        assert_eq!(meta_name(Dialect::Sqlite, "", &["users", "id"]), "\"users\".\"id\"");
    }
}
