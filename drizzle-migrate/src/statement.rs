//! Dialect-agnostic DDL intents.
//!
//! Orchestrators emit [`JsonStatement`]s in dependency order; the convertors in
//! [`crate::sql`] turn each one into SQL for a dialect. Statements are plain
//! values and serialize with a `type` tag so they can be inspected or stored.

use std::collections::BTreeMap;

use serde::Serialize;

use drizzle_schema::{
    CheckConstraint, Column, ForeignKey, Index, Policy, PrimaryKey, Role, SequenceOptions, Table,
    UniqueConstraint, View,
};

use crate::differ::{AlteredColumn, FieldChange};

/// A column alteration, carrying the column before and after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnAlter {
    /// Table name.
    pub table_name: String,
    /// Table schema.
    pub schema: String,
    /// Column after the change.
    pub column: Column,
    /// Column before the change.
    pub previous: Column,
    /// Whether the column is part of a composite primary key of the new table.
    pub in_composite_pk: bool,
}

/// A column whose type is an enum being recreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumColumnRef {
    /// Table name.
    pub table_name: String,
    /// Table schema.
    pub schema: String,
    /// Column name.
    pub column: String,
    /// Column default, restored after the type swap.
    pub default: Option<String>,
    /// Whether the column is an array of the enum.
    pub is_array: bool,
}

/// One DDL intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum JsonStatement {
    CreateSchema {
        name: String,
    },
    DropSchema {
        name: String,
    },
    RenameSchema {
        from: String,
        to: String,
    },

    #[serde(rename = "create_type_enum")]
    CreateEnum {
        name: String,
        schema: String,
        values: Vec<String>,
    },
    #[serde(rename = "drop_type_enum")]
    DropEnum {
        name: String,
        schema: String,
    },
    #[serde(rename = "rename_type_enum")]
    RenameEnum {
        name_from: String,
        name_to: String,
        schema: String,
    },
    #[serde(rename = "move_type_enum")]
    MoveEnum {
        name: String,
        schema_from: String,
        schema_to: String,
    },
    #[serde(rename = "alter_type_add_value")]
    AlterEnumAddValue {
        name: String,
        schema: String,
        value: String,
        before: String,
    },
    #[serde(rename = "alter_type_drop_value")]
    AlterEnumDropValue {
        name: String,
        schema: String,
        deleted_values: Vec<String>,
        new_values: Vec<String>,
        columns_with_enum: Vec<EnumColumnRef>,
    },

    CreateSequence {
        name: String,
        schema: String,
        values: SequenceOptions,
    },
    DropSequence {
        name: String,
        schema: String,
    },
    RenameSequence {
        name_from: String,
        name_to: String,
        schema: String,
    },
    MoveSequence {
        name: String,
        schema_from: String,
        schema_to: String,
    },
    AlterSequence {
        name: String,
        schema: String,
        values: SequenceOptions,
    },

    CreateRole {
        role: Role,
    },
    DropRole {
        name: String,
    },
    RenameRole {
        name_from: String,
        name_to: String,
    },
    AlterRole {
        role: Role,
    },

    CreateTable {
        table_name: String,
        schema: String,
        columns: Vec<Column>,
        composite_pks: Vec<PrimaryKey>,
        unique_constraints: Vec<UniqueConstraint>,
        check_constraints: Vec<CheckConstraint>,
        /// Foreign keys declared inline (SQLite and LibSQL only).
        references: Vec<ForeignKey>,
        is_rls_enabled: bool,
    },
    DropTable {
        table_name: String,
        schema: String,
        policies: Vec<Policy>,
    },
    RenameTable {
        table_name_from: String,
        table_name_to: String,
        from_schema: String,
        to_schema: String,
    },
    #[serde(rename = "alter_table_set_schema")]
    MoveTable {
        table_name: String,
        schema_from: String,
        schema_to: String,
    },
    RecreateTable {
        table_name: String,
        columns: Vec<Column>,
        composite_pks: Vec<PrimaryKey>,
        unique_constraints: Vec<UniqueConstraint>,
        check_constraints: Vec<CheckConstraint>,
        references: Vec<ForeignKey>,
        /// Columns present before and after, copied into the new table.
        copied_columns: Vec<String>,
        /// Rows cannot be carried over; they are deleted instead.
        data_loss: bool,
    },

    AlterTableAddColumn {
        table_name: String,
        schema: String,
        column: Column,
    },
    SqliteAlterTableAddColumn {
        table_name: String,
        column: Column,
        reference: Option<ForeignKey>,
    },
    AlterTableDropColumn {
        table_name: String,
        schema: String,
        column_name: String,
    },
    AlterTableRenameColumn {
        table_name: String,
        schema: String,
        old_column_name: String,
        new_column_name: String,
    },
    AlterTableAlterColumnSetType(ColumnAlter),
    AlterTableAlterColumnSetDefault(ColumnAlter),
    AlterTableAlterColumnDropDefault(ColumnAlter),
    AlterTableAlterColumnSetNotnull(ColumnAlter),
    AlterTableAlterColumnDropNotnull(ColumnAlter),
    AlterTableAlterColumnSetPk(ColumnAlter),
    AlterTableAlterColumnDropPk(ColumnAlter),
    AlterTableAlterColumnSetAutoincrement(ColumnAlter),
    AlterTableAlterColumnDropAutoincrement(ColumnAlter),
    AlterTableAlterColumnSetOnUpdate(ColumnAlter),
    AlterTableAlterColumnDropOnUpdate(ColumnAlter),
    AlterTableAlterColumnSetGenerated(ColumnAlter),
    AlterTableAlterColumnDropGenerated(ColumnAlter),
    AlterTableAlterColumnAlterGenerated(ColumnAlter),
    AlterTableAlterColumnSetIdentity(ColumnAlter),
    AlterTableAlterColumnDropIdentity(ColumnAlter),
    AlterTableAlterColumnChangeIdentity(ColumnAlter),

    CreateIndex {
        table_name: String,
        schema: String,
        index: Index,
    },
    DropIndex {
        table_name: String,
        schema: String,
        index: Index,
    },

    CreateReference {
        table_name: String,
        schema: String,
        fk: ForeignKey,
    },
    DeleteReference {
        table_name: String,
        schema: String,
        fk: ForeignKey,
    },

    CreateCompositePk {
        table_name: String,
        schema: String,
        pk: PrimaryKey,
    },
    DeleteCompositePk {
        table_name: String,
        schema: String,
        pk: PrimaryKey,
    },
    AlterCompositePk {
        table_name: String,
        schema: String,
        old: PrimaryKey,
        new: PrimaryKey,
    },

    CreateUniqueConstraint {
        table_name: String,
        schema: String,
        unique: UniqueConstraint,
    },
    DeleteUniqueConstraint {
        table_name: String,
        schema: String,
        unique: UniqueConstraint,
    },
    AlterUniqueConstraint {
        table_name: String,
        schema: String,
        old: UniqueConstraint,
        new: UniqueConstraint,
    },

    CreateCheckConstraint {
        table_name: String,
        schema: String,
        check: CheckConstraint,
    },
    DeleteCheckConstraint {
        table_name: String,
        schema: String,
        check: CheckConstraint,
    },

    CreatePolicy {
        table_name: String,
        schema: String,
        policy: Policy,
    },
    DropPolicy {
        table_name: String,
        schema: String,
        policy: Policy,
    },
    RenamePolicy {
        table_name: String,
        schema: String,
        old_name: String,
        new_name: String,
    },
    AlterPolicy {
        table_name: String,
        schema: String,
        old: Policy,
        new: Policy,
    },
    CreateIndPolicy {
        policy: Policy,
    },
    DropIndPolicy {
        policy: Policy,
    },
    RenameIndPolicy {
        table_key: String,
        old_name: String,
        new_name: String,
    },
    AlterIndPolicy {
        old: Policy,
        new: Policy,
    },
    EnableRls {
        table_name: String,
        schema: String,
    },
    DisableRls {
        table_name: String,
        schema: String,
    },

    CreateView {
        view: View,
    },
    DropView {
        name: String,
        schema: String,
        materialized: bool,
    },
    RenameView {
        name_from: String,
        name_to: String,
        schema: String,
        materialized: bool,
    },
    AlterViewAlterSchema {
        name: String,
        from_schema: String,
        to_schema: String,
        materialized: bool,
    },
    AlterViewAddWithOption {
        name: String,
        schema: String,
        materialized: bool,
        with: BTreeMap<String, String>,
    },
    AlterViewDropWithOption {
        name: String,
        schema: String,
        materialized: bool,
        with: BTreeMap<String, String>,
    },
    AlterViewAlterTablespace {
        name: String,
        schema: String,
        to_tablespace: String,
    },
    AlterViewAlterUsing {
        name: String,
        schema: String,
        to_using: String,
    },
    AlterMysqlView {
        view: View,
    },
}

impl JsonStatement {
    /// The `type` tag, as serialized.
    pub fn type_name(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Table the statement operates on, if it is table-scoped.
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Self::CreateTable { table_name, .. }
            | Self::DropTable { table_name, .. }
            | Self::MoveTable { table_name, .. }
            | Self::RecreateTable { table_name, .. }
            | Self::AlterTableAddColumn { table_name, .. }
            | Self::SqliteAlterTableAddColumn { table_name, .. }
            | Self::AlterTableDropColumn { table_name, .. }
            | Self::AlterTableRenameColumn { table_name, .. }
            | Self::CreateIndex { table_name, .. }
            | Self::DropIndex { table_name, .. }
            | Self::CreateReference { table_name, .. }
            | Self::DeleteReference { table_name, .. }
            | Self::CreateCompositePk { table_name, .. }
            | Self::DeleteCompositePk { table_name, .. }
            | Self::AlterCompositePk { table_name, .. }
            | Self::CreateUniqueConstraint { table_name, .. }
            | Self::DeleteUniqueConstraint { table_name, .. }
            | Self::AlterUniqueConstraint { table_name, .. }
            | Self::CreateCheckConstraint { table_name, .. }
            | Self::DeleteCheckConstraint { table_name, .. }
            | Self::CreatePolicy { table_name, .. }
            | Self::DropPolicy { table_name, .. }
            | Self::RenamePolicy { table_name, .. }
            | Self::AlterPolicy { table_name, .. }
            | Self::EnableRls { table_name, .. }
            | Self::DisableRls { table_name, .. } => Some(table_name),
            Self::RenameTable { table_name_to, .. } => Some(table_name_to),
            other => other.column_alter().map(|a| a.table_name.as_str()),
        }
    }

    /// Payload of a column alteration statement.
    pub fn column_alter(&self) -> Option<&ColumnAlter> {
        match self {
            Self::AlterTableAlterColumnSetType(a)
            | Self::AlterTableAlterColumnSetDefault(a)
            | Self::AlterTableAlterColumnDropDefault(a)
            | Self::AlterTableAlterColumnSetNotnull(a)
            | Self::AlterTableAlterColumnDropNotnull(a)
            | Self::AlterTableAlterColumnSetPk(a)
            | Self::AlterTableAlterColumnDropPk(a)
            | Self::AlterTableAlterColumnSetAutoincrement(a)
            | Self::AlterTableAlterColumnDropAutoincrement(a)
            | Self::AlterTableAlterColumnSetOnUpdate(a)
            | Self::AlterTableAlterColumnDropOnUpdate(a)
            | Self::AlterTableAlterColumnSetGenerated(a)
            | Self::AlterTableAlterColumnDropGenerated(a)
            | Self::AlterTableAlterColumnAlterGenerated(a)
            | Self::AlterTableAlterColumnSetIdentity(a)
            | Self::AlterTableAlterColumnDropIdentity(a)
            | Self::AlterTableAlterColumnChangeIdentity(a) => Some(a),
            _ => None,
        }
    }
}

/// Drop repeated statements, keeping the first occurrence.
pub fn dedupe<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

/// `CREATE TABLE` for a new table. `inline_references` puts foreign keys in
/// the table body, for engines that cannot add them later.
pub fn prepare_create_table(table: &Table, inline_references: bool) -> JsonStatement {
    JsonStatement::CreateTable {
        table_name: table.name.clone(),
        schema: table.schema.clone(),
        columns: table.columns.values().cloned().collect(),
        composite_pks: table.composite_primary_keys.values().cloned().collect(),
        unique_constraints: table.unique_constraints.values().cloned().collect(),
        check_constraints: table.check_constraints.values().cloned().collect(),
        references: if inline_references {
            table.foreign_keys.values().cloned().collect()
        } else {
            Vec::new()
        },
        is_rls_enabled: table.is_rls_enabled,
    }
}

/// `DROP TABLE` for a removed table.
pub fn prepare_drop_table(table: &Table) -> JsonStatement {
    JsonStatement::DropTable {
        table_name: table.name.clone(),
        schema: table.schema.clone(),
        policies: table.policies.values().cloned().collect(),
    }
}

/// `RENAME TABLE` for a resolved rename.
pub fn prepare_rename_table(from: &Table, to: &Table) -> JsonStatement {
    JsonStatement::RenameTable {
        table_name_from: from.name.clone(),
        table_name_to: to.name.clone(),
        from_schema: from.schema.clone(),
        to_schema: to.schema.clone(),
    }
}

/// `RECREATE TABLE` from the new table definition.
pub fn prepare_recreate_table(old: Option<&Table>, new: &Table) -> JsonStatement {
    let copied_columns = new
        .columns
        .values()
        .filter(|c| c.generated.is_none())
        .filter(|c| old.is_none_or(|old| old.columns.contains_key(&c.name)))
        .map(|c| c.name.clone())
        .collect();

    JsonStatement::RecreateTable {
        table_name: new.name.clone(),
        columns: new.columns.values().cloned().collect(),
        composite_pks: new.composite_primary_keys.values().cloned().collect(),
        unique_constraints: new.unique_constraints.values().cloned().collect(),
        check_constraints: new.check_constraints.values().cloned().collect(),
        references: new.foreign_keys.values().cloned().collect(),
        copied_columns,
        data_loss: false,
    }
}

/// One `ADD COLUMN` per column.
pub fn prepare_add_columns(table: &Table, columns: &[Column]) -> Vec<JsonStatement> {
    columns
        .iter()
        .map(|column| JsonStatement::AlterTableAddColumn {
            table_name: table.name.clone(),
            schema: table.schema.clone(),
            column: column.clone(),
        })
        .collect()
}

/// SQLite `ADD COLUMN`, carrying a single-column foreign key on that column.
pub fn prepare_sqlite_add_columns(table: &Table, columns: &[Column]) -> Vec<JsonStatement> {
    columns
        .iter()
        .map(|column| {
            let reference = table
                .foreign_keys
                .values()
                .find(|fk| fk.columns_from.len() == 1 && fk.columns_from[0] == column.name)
                .cloned();
            JsonStatement::SqliteAlterTableAddColumn {
                table_name: table.name.clone(),
                column: column.clone(),
                reference,
            }
        })
        .collect()
}

/// One `DROP COLUMN` per column.
pub fn prepare_drop_columns(table_name: &str, schema: &str, columns: &[Column]) -> Vec<JsonStatement> {
    columns
        .iter()
        .map(|column| JsonStatement::AlterTableDropColumn {
            table_name: table_name.to_string(),
            schema: schema.to_string(),
            column_name: column.name.clone(),
        })
        .collect()
}

/// One `RENAME COLUMN` per resolved rename.
pub fn prepare_rename_columns(
    table_name: &str,
    schema: &str,
    renames: &[(String, String)],
) -> Vec<JsonStatement> {
    renames
        .iter()
        .map(|(from, to)| JsonStatement::AlterTableRenameColumn {
            table_name: table_name.to_string(),
            schema: schema.to_string(),
            old_column_name: from.clone(),
            new_column_name: to.clone(),
        })
        .collect()
}

/// Column alteration statements for every changed field, in a fixed order:
/// type, default, not null, primary key, auto increment, on update, generated,
/// identity.
pub fn prepare_alter_columns(
    old_table: &Table,
    new_table: &Table,
    altered: &[AlteredColumn],
) -> Vec<JsonStatement> {
    let mut statements = Vec::new();

    for change in altered {
        let (Some(previous), Some(column)) = (
            old_table.columns.get(&change.name),
            new_table.columns.get(&change.name),
        ) else {
            continue;
        };

        let alter = ColumnAlter {
            table_name: new_table.name.clone(),
            schema: new_table.schema.clone(),
            column: column.clone(),
            previous: previous.clone(),
            in_composite_pk: new_table
                .composite_primary_keys
                .values()
                .any(|pk| pk.columns.contains(&column.name)),
        };

        if change.sql_type.is_some() || change.type_schema.is_some() {
            statements.push(JsonStatement::AlterTableAlterColumnSetType(alter.clone()));
        }

        match &change.default {
            Some(FieldChange::Deleted { .. }) => {
                statements.push(JsonStatement::AlterTableAlterColumnDropDefault(alter.clone()))
            }
            Some(_) => statements.push(JsonStatement::AlterTableAlterColumnSetDefault(alter.clone())),
            None => {}
        }

        if let Some(change) = &change.not_null {
            statements.push(if change.new_value() == Some(&true) {
                JsonStatement::AlterTableAlterColumnSetNotnull(alter.clone())
            } else {
                JsonStatement::AlterTableAlterColumnDropNotnull(alter.clone())
            });
        }

        if let Some(change) = &change.primary_key {
            statements.push(if change.new_value() == Some(&true) {
                JsonStatement::AlterTableAlterColumnSetPk(alter.clone())
            } else {
                JsonStatement::AlterTableAlterColumnDropPk(alter.clone())
            });
        }

        if let Some(change) = &change.autoincrement {
            statements.push(if change.new_value() == Some(&true) {
                JsonStatement::AlterTableAlterColumnSetAutoincrement(alter.clone())
            } else {
                JsonStatement::AlterTableAlterColumnDropAutoincrement(alter.clone())
            });
        }

        if let Some(change) = &change.on_update {
            statements.push(if change.new_value() == Some(&true) {
                JsonStatement::AlterTableAlterColumnSetOnUpdate(alter.clone())
            } else {
                JsonStatement::AlterTableAlterColumnDropOnUpdate(alter.clone())
            });
        }

        match &change.generated {
            Some(FieldChange::Added { .. }) => {
                statements.push(JsonStatement::AlterTableAlterColumnSetGenerated(alter.clone()))
            }
            Some(FieldChange::Deleted { .. }) => {
                statements.push(JsonStatement::AlterTableAlterColumnDropGenerated(alter.clone()))
            }
            Some(FieldChange::Changed { .. }) => {
                statements.push(JsonStatement::AlterTableAlterColumnAlterGenerated(alter.clone()))
            }
            None => {}
        }

        match &change.identity {
            Some(FieldChange::Added { .. }) => {
                statements.push(JsonStatement::AlterTableAlterColumnSetIdentity(alter.clone()))
            }
            Some(FieldChange::Deleted { .. }) => {
                statements.push(JsonStatement::AlterTableAlterColumnDropIdentity(alter.clone()))
            }
            Some(FieldChange::Changed { .. }) => {
                statements.push(JsonStatement::AlterTableAlterColumnChangeIdentity(alter))
            }
            None => {}
        }
    }

    statements
}

/// Index creation statements.
pub fn prepare_create_indexes<'a>(
    table_name: &str,
    schema: &str,
    indexes: impl IntoIterator<Item = &'a Index>,
) -> Vec<JsonStatement> {
    indexes
        .into_iter()
        .map(|index| JsonStatement::CreateIndex {
            table_name: table_name.to_string(),
            schema: schema.to_string(),
            index: index.clone(),
        })
        .collect()
}

/// Index removal statements.
pub fn prepare_drop_indexes<'a>(
    table_name: &str,
    schema: &str,
    indexes: impl IntoIterator<Item = &'a Index>,
) -> Vec<JsonStatement> {
    indexes
        .into_iter()
        .map(|index| JsonStatement::DropIndex {
            table_name: table_name.to_string(),
            schema: schema.to_string(),
            index: index.clone(),
        })
        .collect()
}

/// Foreign key creation statements.
pub fn prepare_create_references<'a>(
    table_name: &str,
    schema: &str,
    fks: impl IntoIterator<Item = &'a ForeignKey>,
) -> Vec<JsonStatement> {
    fks.into_iter()
        .map(|fk| JsonStatement::CreateReference {
            table_name: table_name.to_string(),
            schema: schema.to_string(),
            fk: fk.clone(),
        })
        .collect()
}

/// Foreign key removal statements.
pub fn prepare_drop_references<'a>(
    table_name: &str,
    schema: &str,
    fks: impl IntoIterator<Item = &'a ForeignKey>,
) -> Vec<JsonStatement> {
    fks.into_iter()
        .map(|fk| JsonStatement::DeleteReference {
            table_name: table_name.to_string(),
            schema: schema.to_string(),
            fk: fk.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::alternations_in_column;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_type_tags() {
        let stmt = JsonStatement::CreateEnum {
            name: "mood".to_string(),
            schema: "public".to_string(),
            values: vec![],
        };
        assert_eq!(stmt.type_name(), "create_type_enum");

        let stmt = JsonStatement::MoveTable {
            table_name: "users".to_string(),
            schema_from: "".to_string(),
            schema_to: "archive".to_string(),
        };
        assert_eq!(stmt.type_name(), "alter_table_set_schema");
    }

    #[test]
    fn test_column_alter_serializes_flat() {
        let table = Table::new("users").column(Column::new("age", "integer"));
        let new_table = Table::new("users").column(Column::new("age", "integer").not_null());
        let altered = alternations_in_column(&table.columns["age"], &new_table.columns["age"])
            .into_iter()
            .collect::<Vec<_>>();
        let stmts = prepare_alter_columns(&table, &new_table, &altered);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].type_name(), "alter_table_alter_column_set_notnull");

        let json = serde_json::to_value(&stmts[0]).unwrap();
        assert_eq!(json["tableName"], "users");
        assert_eq!(json["column"]["name"], "age");
        assert_eq!(stmts[0].table_name(), Some("users"));
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let a = JsonStatement::DropRole {
            name: "a".to_string(),
        };
        let b = JsonStatement::DropRole {
            name: "b".to_string(),
        };
        let out = dedupe(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(out, vec![a, b]);
    }

    #[test]
    fn test_recreate_copies_surviving_columns() {
        let old = Table::new("t")
            .column(Column::new("id", "integer"))
            .column(Column::new("gone", "text"));
        let new = Table::new("t")
            .column(Column::new("id", "integer"))
            .column(Column::new("fresh", "text").not_null());
        match prepare_recreate_table(Some(&old), &new) {
            JsonStatement::RecreateTable { copied_columns, data_loss, .. } => {
                assert_eq!(copied_columns, vec!["id"]);
                assert!(!data_loss);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
