//! PostgreSQL orchestrator.

use drizzle_schema::{Dialect, Enum, Policy, Sequence, Snapshot, View};

use super::{
    Action, DiffOutput, TableChanges, added_columns, build_meta, created_table_indexes,
    created_table_references, dropped_columns, ensure_dialect, rekey, renamed_columns, resolve,
    resolve_columns, resolve_tables, resolve_views, schema_eq, view_lifecycle, view_renames,
};
use crate::differ::{Altered, AlteredEnum, apply_json_diff, diff_schemas_or_tables};
use crate::error::MigrateResult;
use crate::resolver::{Moved, Renamed, ResolverInput, Resolvers};
use crate::sql;
use crate::statement::{self, EnumColumnRef, JsonStatement};

fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", if schema.is_empty() { "public" } else { schema }, name)
}

/// Snapshot with a schema renamed, re-homing everything that lived in it.
pub(crate) fn rename_schema(mut snapshot: Snapshot, from: &str, to: &str) -> Snapshot {
    let dialect = snapshot.dialect;
    snapshot.schemas = rekey(&snapshot.schemas, from, to, |_| to.to_string());

    snapshot.tables = snapshot
        .tables
        .into_iter()
        .map(|(key, mut table)| {
            for column in table.columns.values_mut() {
                if column.type_schema.as_deref() == Some(from) {
                    column.type_schema = Some(to.to_string());
                }
            }
            for fk in table.foreign_keys.values_mut() {
                if fk.schema_to.as_deref() == Some(from) {
                    fk.schema_to = Some(to.to_string());
                }
            }
            if table.schema == from {
                table.schema = to.to_string();
                (dialect.entity_key(to, &table.name), table)
            } else {
                (key, table)
            }
        })
        .collect();

    snapshot.enums = snapshot
        .enums
        .into_iter()
        .map(|(key, mut e)| {
            if e.schema == from {
                e.schema = to.to_string();
                (qualified(to, &e.name), e)
            } else {
                (key, e)
            }
        })
        .collect();

    snapshot.sequences = snapshot
        .sequences
        .into_iter()
        .map(|(key, mut s)| {
            if s.schema == from {
                s.schema = to.to_string();
                (qualified(to, &s.name), s)
            } else {
                (key, s)
            }
        })
        .collect();

    snapshot.views = snapshot
        .views
        .into_iter()
        .map(|(key, mut v)| {
            if v.schema == from {
                v.schema = to.to_string();
                (dialect.entity_key(to, &v.name), v)
            } else {
                (key, v)
            }
        })
        .collect();

    snapshot
}

fn uses_enum(column_type: &str, type_schema: Option<&str>, e: &Enum) -> bool {
    let base = column_type.split('[').next().unwrap_or(column_type);
    base == e.name && schema_eq(type_schema.unwrap_or("public"), &e.schema)
}

/// Snapshot with an enum renamed and/or moved. Columns typed with it follow.
pub(crate) fn rename_enum(mut snapshot: Snapshot, from: &Enum, to_name: &str, to_schema: &str) -> Snapshot {
    let old_key = qualified(&from.schema, &from.name);
    let new_key = qualified(to_schema, to_name);
    snapshot.enums = rekey(&snapshot.enums, &old_key, &new_key, |mut e| {
        e.name = to_name.to_string();
        e.schema = to_schema.to_string();
        e
    });

    for table in snapshot.tables.values_mut() {
        for column in table.columns.values_mut() {
            if uses_enum(&column.sql_type, column.type_schema.as_deref(), from) {
                column.sql_type = column.sql_type.replacen(&from.name, to_name, 1);
                column.type_schema = Some(to_schema.to_string());
            }
        }
    }
    snapshot
}

/// Snapshot with a sequence renamed and/or moved.
pub(crate) fn rename_sequence(mut snapshot: Snapshot, from: &Sequence, to_name: &str, to_schema: &str) -> Snapshot {
    let old_key = qualified(&from.schema, &from.name);
    let new_key = qualified(to_schema, to_name);
    snapshot.sequences = rekey(&snapshot.sequences, &old_key, &new_key, |mut s| {
        s.name = to_name.to_string();
        s.schema = to_schema.to_string();
        s
    });
    snapshot
}

/// Snapshot with a role renamed.
pub(crate) fn rename_role(mut snapshot: Snapshot, from: &str, to: &str) -> Snapshot {
    snapshot.roles = rekey(&snapshot.roles, from, to, |mut role| {
        role.name = to.to_string();
        role
    });
    for table in snapshot.tables.values_mut() {
        for policy in table.policies.values_mut() {
            super::rename_in(&mut policy.to, from, to);
        }
    }
    for policy in snapshot.policies.values_mut() {
        super::rename_in(&mut policy.to, from, to);
    }
    snapshot
}

/// Snapshot with a table policy renamed.
pub(crate) fn rename_policy(mut snapshot: Snapshot, table_key: &str, from: &str, to: &str) -> Snapshot {
    if let Some(table) = snapshot.tables.get_mut(table_key) {
        table.policies = rekey(&table.policies, from, to, |mut policy| {
            policy.name = to.to_string();
            policy
        });
    }
    snapshot
}

/// Snapshot with an independent policy renamed.
pub(crate) fn rename_ind_policy(mut snapshot: Snapshot, from: &str, to: &str) -> Snapshot {
    snapshot.policies = rekey(&snapshot.policies, from, to, |mut policy| {
        policy.name = to.to_string();
        policy
    });
    snapshot
}

fn enum_columns(snapshot: &Snapshot, e: &Enum) -> Vec<EnumColumnRef> {
    snapshot
        .tables
        .values()
        .flat_map(|table| {
            table
                .columns
                .values()
                .filter(|c| uses_enum(&c.sql_type, c.type_schema.as_deref(), e))
                .map(|c| EnumColumnRef {
                    table_name: table.name.clone(),
                    schema: table.schema.clone(),
                    column: c.name.clone(),
                    default: c.default.clone(),
                    is_array: c.sql_type.ends_with(']'),
                })
        })
        .collect()
}

fn altered_enum_statements(altered: &AlteredEnum, json2: &Snapshot) -> (Vec<JsonStatement>, Vec<JsonStatement>) {
    let mut add_values = Vec::new();
    let mut drop_values = Vec::new();

    if altered.values.deleted.is_empty() {
        for added in &altered.values.added {
            add_values.push(JsonStatement::AlterEnumAddValue {
                name: altered.name.clone(),
                schema: altered.schema.clone(),
                value: added.value.clone(),
                before: added.before.clone(),
            });
        }
    } else {
        let e = Enum {
            name: altered.name.clone(),
            schema: altered.schema.clone(),
            values: altered.new_values.clone(),
        };
        drop_values.push(JsonStatement::AlterEnumDropValue {
            name: altered.name.clone(),
            schema: altered.schema.clone(),
            deleted_values: altered.values.deleted.clone(),
            new_values: altered.new_values.clone(),
            columns_with_enum: enum_columns(json2, &e),
        });
    }

    (add_values, drop_values)
}

/// Statements for a view present on both sides.
fn altered_view_statements(
    altered: &Altered<View>,
    action: Action,
    drops: &mut Vec<JsonStatement>,
    creates: &mut Vec<JsonStatement>,
    alters: &mut Vec<JsonStatement>,
) {
    let (old, new) = (&altered.old, &altered.new);
    if new.is_existing {
        return;
    }

    let definition_changed = old.definition != new.definition;
    if old.materialized != new.materialized || old.is_existing || (definition_changed && action == Action::Generate) {
        drops.push(JsonStatement::DropView {
            name: old.name.clone(),
            schema: old.schema.clone(),
            materialized: old.materialized,
        });
        creates.push(JsonStatement::CreateView { view: new.clone() });
        return;
    }

    let added: std::collections::BTreeMap<_, _> = new
        .with
        .iter()
        .filter(|(key, value)| old.with.get(*key) != Some(*value))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let removed: std::collections::BTreeMap<_, _> = old
        .with
        .iter()
        .filter(|(key, _)| !new.with.contains_key(*key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    if !added.is_empty() {
        alters.push(JsonStatement::AlterViewAddWithOption {
            name: new.name.clone(),
            schema: new.schema.clone(),
            materialized: new.materialized,
            with: added,
        });
    }
    if !removed.is_empty() {
        alters.push(JsonStatement::AlterViewDropWithOption {
            name: new.name.clone(),
            schema: new.schema.clone(),
            materialized: new.materialized,
            with: removed,
        });
    }
    if old.tablespace != new.tablespace {
        alters.push(JsonStatement::AlterViewAlterTablespace {
            name: new.name.clone(),
            schema: new.schema.clone(),
            to_tablespace: new.tablespace.clone().unwrap_or_else(|| "pg_default".to_string()),
        });
    }
    if old.using != new.using {
        alters.push(JsonStatement::AlterViewAlterUsing {
            name: new.name.clone(),
            schema: new.schema.clone(),
            to_using: new.using.clone().unwrap_or_else(|| "heap".to_string()),
        });
    }
}

fn move_statements(moved: &[Moved], build: impl Fn(&Moved) -> JsonStatement) -> Vec<JsonStatement> {
    moved.iter().map(build).collect()
}

/// Diff two Postgres snapshots.
pub async fn apply_pg_snapshots_diff(
    json1: &Snapshot,
    json2: &Snapshot,
    resolvers: &Resolvers<'_>,
    action: Action,
) -> MigrateResult<DiffOutput> {
    ensure_dialect(Dialect::Postgresql, json1, json2)?;
    tracing::debug!(action = ?action, "Diffing postgres snapshots");

    // Schemas
    let partition = diff_schemas_or_tables(&json1.schemas, &json2.schemas);
    let schemas = resolve(resolvers.schemas, ResolverInput::new(partition.added, partition.deleted)).await?;
    let mut patched = json1.clone();
    for renamed in &schemas.renamed {
        patched = rename_schema(patched, &renamed.from, &renamed.to);
    }

    // Enums
    let partition = diff_schemas_or_tables(&patched.enums, &json2.enums);
    let enums = resolve(resolvers.enums, ResolverInput::new(partition.added, partition.deleted)).await?;
    for moved in &enums.moved {
        let key = qualified(&moved.schema_from, &moved.name);
        if let Some(e) = patched.enums.get(&key).cloned() {
            patched = rename_enum(patched, &e, &moved.name, &moved.schema_to);
        }
    }
    for renamed in &enums.renamed {
        let from = Enum {
            schema: renamed.to.schema.clone(),
            ..renamed.from.clone()
        };
        patched = rename_enum(patched, &from, &renamed.to.name, &renamed.to.schema);
    }

    // Sequences
    let partition = diff_schemas_or_tables(&patched.sequences, &json2.sequences);
    let sequences = resolve(resolvers.sequences, ResolverInput::new(partition.added, partition.deleted)).await?;
    for moved in &sequences.moved {
        let key = qualified(&moved.schema_from, &moved.name);
        if let Some(s) = patched.sequences.get(&key).cloned() {
            patched = rename_sequence(patched, &s, &moved.name, &moved.schema_to);
        }
    }
    for renamed in &sequences.renamed {
        let from = Sequence {
            schema: renamed.to.schema.clone(),
            ..renamed.from.clone()
        };
        patched = rename_sequence(patched, &from, &renamed.to.name, &renamed.to.schema);
    }

    // Roles
    let partition = diff_schemas_or_tables(&patched.roles, &json2.roles);
    let roles = resolve(resolvers.roles, ResolverInput::new(partition.added, partition.deleted)).await?;
    for renamed in &roles.renamed {
        patched = rename_role(patched, &renamed.from.name, &renamed.to.name);
    }

    // Tables and columns
    let tables = resolve_tables(patched, json2, resolvers.tables).await?;
    let columns = resolve_columns(tables.patched.clone(), json2, resolvers.columns).await?;
    let mut patched = columns.patched.clone();

    // Table policies
    let mut policy_renames = Vec::new();
    let keys: Vec<String> = json2.tables.keys().cloned().collect();
    for key in keys {
        let (Some(old), Some(new)) = (patched.tables.get(&key), json2.tables.get(&key)) else {
            continue;
        };
        let partition = diff_schemas_or_tables(&old.policies, &new.policies);
        let input = ResolverInput::for_table(&new.name, &new.schema, partition.added, partition.deleted);
        let (name, schema) = (new.name.clone(), new.schema.clone());
        let output = resolve(resolvers.policies, input).await?;
        for renamed in output.renamed {
            patched = rename_policy(patched, &key, &renamed.from.name, &renamed.to.name);
            policy_renames.push(JsonStatement::RenamePolicy {
                table_name: name.clone(),
                schema: schema.clone(),
                old_name: renamed.from.name,
                new_name: renamed.to.name,
            });
        }
    }

    // Independent policies
    let partition = diff_schemas_or_tables(&patched.policies, &json2.policies);
    let ind_policies = resolve(resolvers.ind_policies, ResolverInput::new(partition.added, partition.deleted)).await?;
    for renamed in &ind_policies.renamed {
        patched = rename_ind_policy(patched, &renamed.from.name, &renamed.to.name);
    }

    // Views
    let views = resolve_views(patched, json2, resolvers.views).await?;
    let patched = views.patched.clone();

    let diff = apply_json_diff(&patched, json2);
    let changes = TableChanges::collect(&diff.altered_tables_with_columns, &patched, json2);

    let mut statements: Vec<JsonStatement> = Vec::new();

    // Schemas, enums, sequences, roles
    statements.extend(
        schemas
            .created
            .iter()
            .map(|name| JsonStatement::CreateSchema { name: name.clone() }),
    );
    statements.extend(schemas.renamed.iter().map(|r: &Renamed<String>| JsonStatement::RenameSchema {
        from: r.from.clone(),
        to: r.to.clone(),
    }));

    let mut enum_add_values = Vec::new();
    let mut enum_drop_values = Vec::new();
    for altered in &diff.altered_enums {
        let (add, drop) = altered_enum_statements(altered, json2);
        enum_add_values.extend(add);
        enum_drop_values.extend(drop);
    }
    statements.extend(enums.created.iter().map(|e| JsonStatement::CreateEnum {
        name: e.name.clone(),
        schema: e.schema.clone(),
        values: e.values.clone(),
    }));
    statements.extend(move_statements(&enums.moved, |m| JsonStatement::MoveEnum {
        name: m.name.clone(),
        schema_from: m.schema_from.clone(),
        schema_to: m.schema_to.clone(),
    }));
    statements.extend(enums.renamed.iter().map(|r| JsonStatement::RenameEnum {
        name_from: r.from.name.clone(),
        name_to: r.to.name.clone(),
        schema: r.to.schema.clone(),
    }));
    statements.extend(enum_add_values);

    statements.extend(sequences.created.iter().map(|s| JsonStatement::CreateSequence {
        name: s.name.clone(),
        schema: s.schema.clone(),
        values: s.options.clone(),
    }));
    statements.extend(move_statements(&sequences.moved, |m| JsonStatement::MoveSequence {
        name: m.name.clone(),
        schema_from: m.schema_from.clone(),
        schema_to: m.schema_to.clone(),
    }));
    statements.extend(sequences.renamed.iter().map(|r| JsonStatement::RenameSequence {
        name_from: r.from.name.clone(),
        name_to: r.to.name.clone(),
        schema: r.to.schema.clone(),
    }));
    statements.extend(diff.altered_sequences.iter().map(|s| JsonStatement::AlterSequence {
        name: s.name.clone(),
        schema: s.schema.clone(),
        values: s.options.clone(),
    }));

    statements.extend(roles.renamed.iter().map(|r| JsonStatement::RenameRole {
        name_from: r.from.name.clone(),
        name_to: r.to.name.clone(),
    }));
    statements.extend(
        roles
            .created
            .iter()
            .map(|role| JsonStatement::CreateRole { role: role.clone() }),
    );
    statements.extend(
        diff.altered_roles
            .iter()
            .map(|a| JsonStatement::AlterRole { role: a.new.clone() }),
    );

    // Tables
    statements.extend(tables.created.iter().map(|t| statement::prepare_create_table(t, false)));
    statements.extend(changes.rls.iter().cloned());

    // Views that depend on dropped or altered tables go first.
    let (created_views, dropped_views) = view_lifecycle(&views);
    let mut view_drops = dropped_views;
    let mut view_creates = created_views;
    let mut view_alters = Vec::new();
    for altered in &diff.altered_views {
        altered_view_statements(altered, action, &mut view_drops, &mut view_creates, &mut view_alters);
    }
    statements.extend(view_drops);
    statements.extend(view_renames(&views));
    statements.extend(move_statements(&views.moved, |m| {
        let materialized = json2
            .views
            .get(&Dialect::Postgresql.entity_key(&m.schema_to, &m.name))
            .is_some_and(|v| v.materialized);
        JsonStatement::AlterViewAlterSchema {
            name: m.name.clone(),
            from_schema: m.schema_from.clone(),
            to_schema: m.schema_to.clone(),
            materialized,
        }
    }));
    statements.extend(view_alters);

    statements.extend(tables.deleted.iter().map(statement::prepare_drop_table));
    statements.extend(move_statements(&tables.moved, |m| JsonStatement::MoveTable {
        table_name: m.name.clone(),
        schema_from: m.schema_from.clone(),
        schema_to: m.schema_to.clone(),
    }));
    statements.extend(tables.renamed.iter().map(|r| {
        // Moves run first, so the rename happens in the target schema.
        let from = drizzle_schema::Table {
            schema: r.to.schema.clone(),
            ..r.from.clone()
        };
        statement::prepare_rename_table(&from, &r.to)
    }));
    statements.extend(renamed_columns(&columns));

    statements.extend(changes.drop_uniques);
    statements.extend(changes.drop_checks);
    statements.extend(changes.drop_references);
    statements.extend(changes.drop_indexes);

    statements.extend(changes.drop_pks);
    statements.extend(changes.alter_columns);
    statements.extend(changes.create_pks);
    statements.extend(added_columns(&columns, json2, false));

    statements.extend(created_table_indexes(&tables.created));
    statements.extend(changes.create_indexes);
    statements.extend(changes.create_checks);

    statements.extend(created_table_references(&tables.created));
    statements.extend(changes.create_references);
    statements.extend(dropped_columns(&columns, json2));

    statements.extend(changes.alter_pks);
    statements.extend(changes.create_uniques);
    statements.extend(changes.alter_uniques);

    statements.extend(enum_drop_values);
    statements.extend(view_creates);

    // Policies
    statements.extend(policy_renames);
    statements.extend(changes.drop_policies);
    for table in &tables.created {
        statements.extend(table.policies.values().map(|policy| JsonStatement::CreatePolicy {
            table_name: table.name.clone(),
            schema: table.schema.clone(),
            policy: policy.clone(),
        }));
    }
    statements.extend(changes.create_policies);
    statements.extend(changes.alter_policies);

    statements.extend(ind_policies.renamed.iter().map(|r: &Renamed<Policy>| JsonStatement::RenameIndPolicy {
        table_key: r.to.on.clone().unwrap_or_default(),
        old_name: r.from.name.clone(),
        new_name: r.to.name.clone(),
    }));
    statements.extend(
        ind_policies
            .deleted
            .iter()
            .map(|p| JsonStatement::DropIndPolicy { policy: p.clone() }),
    );
    statements.extend(
        ind_policies
            .created
            .iter()
            .map(|p| JsonStatement::CreateIndPolicy { policy: p.clone() }),
    );
    statements.extend(diff.altered_policies.iter().map(|a| JsonStatement::AlterIndPolicy {
        old: a.old.clone(),
        new: a.new.clone(),
    }));

    // Drops of shared objects come last.
    statements.extend(
        roles
            .deleted
            .iter()
            .map(|role| JsonStatement::DropRole { name: role.name.clone() }),
    );
    statements.extend(enums.deleted.iter().map(|e| JsonStatement::DropEnum {
        name: e.name.clone(),
        schema: e.schema.clone(),
    }));
    statements.extend(sequences.deleted.iter().map(|s| JsonStatement::DropSequence {
        name: s.name.clone(),
        schema: s.schema.clone(),
    }));
    statements.extend(
        schemas
            .deleted
            .iter()
            .map(|name| JsonStatement::DropSchema { name: name.clone() }),
    );

    let statements = statement::dedupe(statements);
    let sql_statements = sql::from_json(&statements, Dialect::Postgresql, action)?;
    let meta = build_meta(Dialect::Postgresql, &schemas.renamed, &tables, &columns);

    tracing::debug!(
        statements = statements.len(),
        sql = sql_statements.len(),
        "Postgres diff complete"
    );

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
    use drizzle_schema::{Column, Index, Table};
    use pretty_assertions::assert_eq;

    fn pg() -> Snapshot {
        Snapshot::empty(Dialect::Postgresql)
    }

    fn users() -> Table {
        Table::new("users")
            .column(Column::new("id", "serial").primary_key())
            .column(Column::new("name", "text"))
    }

    fn types(output: &DiffOutput) -> Vec<String> {
        output.statements.iter().map(|s| s.type_name()).collect()
    }

    #[tokio::test]
    async fn test_no_changes() {
        let snapshot = pg().with_table(users());
        let resolvers = Resolvers::uniform(&NoRenames);
        let output = apply_pg_snapshots_diff(&snapshot, &snapshot, &resolvers, Action::Generate)
            .await
            .unwrap();
        assert!(output.is_empty());
        assert!(output.meta.is_empty());
    }

    #[tokio::test]
    async fn test_create_table_with_enum() {
        let mood = Enum {
            name: "mood".to_string(),
            schema: "public".to_string(),
            values: vec!["sad".to_string(), "ok".to_string()],
        };
        let next = pg().with_enum(mood).with_table(
            users().column(Column::new("mood", "mood").type_schema("public")),
        );
        let resolvers = Resolvers::uniform(&NoRenames);
        let output = apply_pg_snapshots_diff(&pg(), &next, &resolvers, Action::Generate)
            .await
            .unwrap();
        assert_eq!(types(&output), vec!["create_type_enum", "create_table"]);
        assert_eq!(
            output.sql_statements[0],
            "CREATE TYPE \"public\".\"mood\" AS ENUM('sad', 'ok');"
        );
        assert!(output.sql_statements[1].contains("\"mood\" \"mood\""));
    }

    #[tokio::test]
    async fn test_rename_table_round_trip() {
        let prev = pg().with_table(users());
        let mut people = users();
        people.name = "people".to_string();
        let next = pg().with_table(people);

        let resolver = StaticResolver::new(["users->people"]);
        let resolvers = Resolvers::uniform(&resolver);
        let output = apply_pg_snapshots_diff(&prev, &next, &resolvers, Action::Generate)
            .await
            .unwrap();
        assert_eq!(types(&output), vec!["rename_table"]);
        assert_eq!(
            output.sql_statements,
            vec!["ALTER TABLE \"users\" RENAME TO \"people\";"]
        );
        assert_eq!(output.meta.tables["\"public\".\"users\""], "\"public\".\"people\"");
    }

    #[tokio::test]
    async fn test_drop_index_before_alter_column() {
        let prev = pg().with_table(users().index(Index::new("users_name_idx", ["name"])));
        let mut changed = users();
        changed.columns.insert("name".to_string(), Column::new("name", "varchar(64)"));
        let next = pg().with_table(changed);

        let resolvers = Resolvers::uniform(&NoRenames);
        let output = apply_pg_snapshots_diff(&prev, &next, &resolvers, Action::Generate)
            .await
            .unwrap();
        let order = types(&output);
        let drop = order.iter().position(|t| t == "drop_index").unwrap();
        let alter = order
            .iter()
            .position(|t| t == "alter_table_alter_column_set_type")
            .unwrap();
        assert!(drop < alter);
    }

    #[tokio::test]
    async fn test_enum_value_added_in_position() {
        let mood = |values: &[&str]| Enum {
            name: "mood".to_string(),
            schema: "public".to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        };
        let prev = pg().with_enum(mood(&["sad", "happy"]));
        let next = pg().with_enum(mood(&["sad", "ok", "happy"]));
        let resolvers = Resolvers::uniform(&NoRenames);
        let output = apply_pg_snapshots_diff(&prev, &next, &resolvers, Action::Generate)
            .await
            .unwrap();
        assert_eq!(
            output.sql_statements,
            vec!["ALTER TYPE \"public\".\"mood\" ADD VALUE 'ok' BEFORE 'happy';"]
        );
    }

    #[tokio::test]
    async fn test_schema_rename_moves_tables() {
        let prev = pg()
            .with_schema("auth")
            .with_table(users().in_schema("auth"));
        let next = pg()
            .with_schema("identity")
            .with_table(users().in_schema("identity"));
        let resolver = StaticResolver::new(["auth->identity"]);
        let resolvers = Resolvers::uniform(&resolver);
        let output = apply_pg_snapshots_diff(&prev, &next, &resolvers, Action::Generate)
            .await
            .unwrap();
        assert_eq!(types(&output), vec!["rename_schema"]);
        assert_eq!(output.meta.schemas["auth"], "identity");
    }

    #[tokio::test]
    async fn test_rejects_other_dialects() {
        let resolvers = Resolvers::uniform(&NoRenames);
        let mysql = Snapshot::empty(Dialect::Mysql);
        let err = apply_pg_snapshots_diff(&mysql, &pg(), &resolvers, Action::Generate)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::MigrationError::DialectMismatch { .. }));
    }
}
