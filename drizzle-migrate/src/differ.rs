//! Structural diffing of snapshots.
//!
//! Entities are compared as typed values, field by field. Nothing here mutates
//! its inputs; every function returns owned results.
//!
//! The diff runs in two shapes:
//!
//! - [`diff_schemas_or_tables`] and [`diff_columns`] split one collection into
//!   added and deleted items. Their output feeds the rename resolvers.
//! - [`apply_json_diff`] runs after renames are patched into the old snapshot
//!   and reports what changed in entities present on both sides.

use indexmap::IndexMap;
use serde::Serialize;

use drizzle_schema::{
    CheckConstraint, Column, Enum, ForeignKey, Generated, Identity, Index, Policy, PrimaryKey,
    Role, Sequence, SequenceOptions, Snapshot, Table, UniqueConstraint, View,
};

/// Items present on only one side of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<T> {
    /// Keys only on the right.
    pub added: Vec<T>,
    /// Keys only on the left.
    pub deleted: Vec<T>,
}

impl<T> Partition<T> {
    /// Whether both sides are empty.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

/// Split a keyed collection into added and deleted values.
pub fn diff_schemas_or_tables<T: Clone>(
    left: &IndexMap<String, T>,
    right: &IndexMap<String, T>,
) -> Partition<T> {
    let added = right
        .iter()
        .filter(|(key, _)| !left.contains_key(*key))
        .map(|(_, value)| value.clone())
        .collect();
    let deleted = left
        .iter()
        .filter(|(key, _)| !right.contains_key(*key))
        .map(|(_, value)| value.clone())
        .collect();

    Partition { added, deleted }
}

/// Added and deleted columns of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumnsDiff {
    /// Table name.
    pub name: String,
    /// Table schema.
    pub schema: String,
    /// Columns only in the new table.
    pub added: Vec<Column>,
    /// Columns only in the old table.
    pub deleted: Vec<Column>,
}

/// Column partitions for every table present on both sides, keyed like the
/// snapshot. Tables without added or deleted columns are omitted.
pub fn diff_columns(
    left: &IndexMap<String, Table>,
    right: &IndexMap<String, Table>,
) -> IndexMap<String, TableColumnsDiff> {
    let mut result = IndexMap::new();

    for (key, new_table) in right {
        let Some(old_table) = left.get(key) else {
            continue;
        };
        let columns = diff_schemas_or_tables(&old_table.columns, &new_table.columns);
        if columns.is_empty() {
            continue;
        }
        result.insert(
            key.clone(),
            TableColumnsDiff {
                name: new_table.name.clone(),
                schema: new_table.schema.clone(),
                added: columns.added,
                deleted: columns.deleted,
            },
        );
    }

    result
}

/// Transition of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldChange<T> {
    /// Present on both sides with different values.
    Changed {
        /// Previous value.
        old: T,
        /// New value.
        new: T,
    },
    /// Only present on the new side.
    Added {
        /// New value.
        value: T,
    },
    /// Only present on the old side.
    Deleted {
        /// Previous value.
        value: T,
    },
}

impl<T> FieldChange<T> {
    /// Value after the change, if any.
    pub fn new_value(&self) -> Option<&T> {
        match self {
            Self::Changed { new, .. } => Some(new),
            Self::Added { value } => Some(value),
            Self::Deleted { .. } => None,
        }
    }

    /// Value before the change, if any.
    pub fn old_value(&self) -> Option<&T> {
        match self {
            Self::Changed { old, .. } => Some(old),
            Self::Deleted { value } => Some(value),
            Self::Added { .. } => None,
        }
    }
}

fn compare_optional<T: PartialEq + Clone>(old: &Option<T>, new: &Option<T>) -> Option<FieldChange<T>> {
    match (old, new) {
        (Some(old), Some(new)) if old != new => Some(FieldChange::Changed {
            old: old.clone(),
            new: new.clone(),
        }),
        (None, Some(value)) => Some(FieldChange::Added {
            value: value.clone(),
        }),
        (Some(value), None) => Some(FieldChange::Deleted {
            value: value.clone(),
        }),
        _ => None,
    }
}

fn compare<T: PartialEq + Clone>(old: &T, new: &T) -> Option<FieldChange<T>> {
    (old != new).then(|| FieldChange::Changed {
        old: old.clone(),
        new: new.clone(),
    })
}

/// Per-field changes of a column present on both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlteredColumn {
    /// Column name (after renames).
    pub name: String,
    /// SQL type.
    pub sql_type: Option<FieldChange<String>>,
    /// Default expression.
    pub default: Option<FieldChange<String>>,
    /// NOT NULL.
    pub not_null: Option<FieldChange<bool>>,
    /// Column-level primary key.
    pub primary_key: Option<FieldChange<bool>>,
    /// Schema of the column type.
    pub type_schema: Option<FieldChange<String>>,
    /// `ON UPDATE CURRENT_TIMESTAMP`.
    pub on_update: Option<FieldChange<bool>>,
    /// Auto increment.
    pub autoincrement: Option<FieldChange<bool>>,
    /// Generated expression.
    pub generated: Option<FieldChange<Generated>>,
    /// Identity definition.
    pub identity: Option<FieldChange<Identity>>,
}

impl AlteredColumn {
    /// Whether no field changed.
    pub fn is_empty(&self) -> bool {
        self.sql_type.is_none()
            && self.default.is_none()
            && self.not_null.is_none()
            && self.primary_key.is_none()
            && self.type_schema.is_none()
            && self.on_update.is_none()
            && self.autoincrement.is_none()
            && self.generated.is_none()
            && self.identity.is_none()
    }
}

/// `numeric (10,2)` and `numeric(10,2)` are the same type.
fn normalize_type(sql_type: &str) -> String {
    sql_type.replace(" (", "(")
}

/// Field transitions between two versions of a column, or `None` when nothing
/// meaningful changed.
pub fn alternations_in_column(old: &Column, new: &Column) -> Option<AlteredColumn> {
    let sql_type = if normalize_type(&old.sql_type) == normalize_type(&new.sql_type) {
        None
    } else {
        compare(&old.sql_type, &new.sql_type)
    };

    let altered = AlteredColumn {
        name: new.name.clone(),
        sql_type,
        default: compare_optional(&old.default, &new.default),
        not_null: compare(&old.not_null, &new.not_null),
        primary_key: compare(&old.primary_key, &new.primary_key),
        type_schema: compare_optional(&old.type_schema, &new.type_schema),
        on_update: compare(&old.on_update.unwrap_or(false), &new.on_update.unwrap_or(false)),
        autoincrement: compare(
            &old.autoincrement.unwrap_or(false),
            &new.autoincrement.unwrap_or(false),
        ),
        generated: compare_optional(&old.generated, &new.generated),
        identity: compare_optional(&old.identity, &new.identity),
    };

    (!altered.is_empty()).then_some(altered)
}

/// Old and new value of an entity whose key exists on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Altered<T> {
    /// Previous value.
    pub old: T,
    /// New value.
    pub new: T,
}

/// Added, deleted and altered entries of one keyed sub-collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDiff<T> {
    /// Only in the new table.
    pub added: IndexMap<String, T>,
    /// Only in the old table.
    pub deleted: IndexMap<String, T>,
    /// In both, with different values.
    pub altered: IndexMap<String, Altered<T>>,
}

impl<T> Default for CollectionDiff<T> {
    fn default() -> Self {
        Self {
            added: IndexMap::new(),
            deleted: IndexMap::new(),
            altered: IndexMap::new(),
        }
    }
}

impl<T: Clone + PartialEq> CollectionDiff<T> {
    /// Compare two keyed collections.
    pub fn between(old: &IndexMap<String, T>, new: &IndexMap<String, T>) -> Self {
        let mut diff = Self::default();
        for (key, value) in new {
            match old.get(key) {
                None => {
                    diff.added.insert(key.clone(), value.clone());
                }
                Some(previous) if previous != value => {
                    diff.altered.insert(
                        key.clone(),
                        Altered {
                            old: previous.clone(),
                            new: value.clone(),
                        },
                    );
                }
                Some(_) => {}
            }
        }
        for (key, value) in old {
            if !new.contains_key(key) {
                diff.deleted.insert(key.clone(), value.clone());
            }
        }
        diff
    }
}

impl<T> CollectionDiff<T> {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.altered.is_empty()
    }
}

/// Everything that changed inside a table present on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlteredTable {
    /// Table name.
    pub name: String,
    /// Table schema.
    pub schema: String,
    /// Columns with field-level changes.
    pub altered: Vec<AlteredColumn>,
    /// Indexes.
    pub indexes: CollectionDiff<Index>,
    /// Foreign keys.
    pub foreign_keys: CollectionDiff<ForeignKey>,
    /// Composite primary keys.
    pub composite_pks: CollectionDiff<PrimaryKey>,
    /// Unique constraints.
    pub unique_constraints: CollectionDiff<UniqueConstraint>,
    /// Check constraints.
    pub check_constraints: CollectionDiff<CheckConstraint>,
    /// Policies.
    pub policies: CollectionDiff<Policy>,
    /// Row level security toggle.
    pub rls: Option<FieldChange<bool>>,
}

impl AlteredTable {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.altered.is_empty()
            && self.indexes.is_empty()
            && self.foreign_keys.is_empty()
            && self.composite_pks.is_empty()
            && self.unique_constraints.is_empty()
            && self.check_constraints.is_empty()
            && self.policies.is_empty()
            && self.rls.is_none()
    }
}

/// Normalized changes of one table. Columns are matched by name, so renames
/// must already be applied to `old`.
pub fn find_alternations_in_table(old: &Table, new: &Table) -> AlteredTable {
    let altered = new
        .columns
        .iter()
        .filter_map(|(name, column)| {
            old.columns
                .get(name)
                .and_then(|previous| alternations_in_column(previous, column))
        })
        .collect();

    AlteredTable {
        name: new.name.clone(),
        schema: new.schema.clone(),
        altered,
        indexes: CollectionDiff::between(&old.indexes, &new.indexes),
        foreign_keys: CollectionDiff::between(&old.foreign_keys, &new.foreign_keys),
        composite_pks: CollectionDiff::between(
            &old.composite_primary_keys,
            &new.composite_primary_keys,
        ),
        unique_constraints: CollectionDiff::between(
            &old.unique_constraints,
            &new.unique_constraints,
        ),
        check_constraints: CollectionDiff::between(&old.check_constraints, &new.check_constraints),
        policies: CollectionDiff::between(&old.policies, &new.policies),
        rls: compare(&old.is_rls_enabled, &new.is_rls_enabled),
    }
}

/// A value appended to an enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedEnumValue {
    /// The new value.
    pub value: String,
    /// Existing value it must precede; empty when appended at the end.
    pub before: String,
}

/// Changes to an enum's value list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumValuesDiff {
    /// New values with their position.
    pub added: Vec<AddedEnumValue>,
    /// Removed values.
    pub deleted: Vec<String>,
}

impl EnumValuesDiff {
    /// Whether the value lists are the same set.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

/// Walk two value lists and position every added value before the next value
/// that already existed, so `ADD VALUE ... BEFORE` keeps the declared order.
pub fn map_arrays_diff(old: &[String], new: &[String]) -> EnumValuesDiff {
    let added = new
        .iter()
        .enumerate()
        .filter(|(_, value)| !old.contains(value))
        .map(|(idx, value)| AddedEnumValue {
            value: value.clone(),
            before: new[idx + 1..]
                .iter()
                .find(|next| old.contains(next))
                .cloned()
                .unwrap_or_default(),
        })
        .collect();
    let deleted = old
        .iter()
        .filter(|value| !new.contains(value))
        .cloned()
        .collect();

    EnumValuesDiff { added, deleted }
}

/// An enum present on both sides whose values changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlteredEnum {
    /// Enum name.
    pub name: String,
    /// Enum schema.
    pub schema: String,
    /// Full new value list.
    pub new_values: Vec<String>,
    /// Value changes.
    pub values: EnumValuesDiff,
}

/// A sequence present on both sides whose options changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlteredSequence {
    /// Sequence name.
    pub name: String,
    /// Sequence schema.
    pub schema: String,
    /// New options.
    pub options: SequenceOptions,
}

/// Everything that changed between two fully patched snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// Tables present on both sides with changes.
    pub altered_tables_with_columns: Vec<AlteredTable>,
    /// Enums with value changes.
    pub altered_enums: Vec<AlteredEnum>,
    /// Sequences with option changes.
    pub altered_sequences: Vec<AlteredSequence>,
    /// Roles with option changes.
    pub altered_roles: Vec<Altered<Role>>,
    /// Independent policies with changes.
    pub altered_policies: Vec<Altered<Policy>>,
    /// Views with changes.
    pub altered_views: Vec<Altered<View>>,
}

impl DiffResult {
    /// Whether the snapshots are structurally equal.
    pub fn is_empty(&self) -> bool {
        self.altered_tables_with_columns.is_empty()
            && self.altered_enums.is_empty()
            && self.altered_sequences.is_empty()
            && self.altered_roles.is_empty()
            && self.altered_policies.is_empty()
            && self.altered_views.is_empty()
    }
}

fn altered_pairs<T: Clone + PartialEq>(
    old: &IndexMap<String, T>,
    new: &IndexMap<String, T>,
) -> Vec<Altered<T>> {
    CollectionDiff::between(old, new)
        .altered
        .into_values()
        .collect()
}

/// Compare every entity present on both sides. Wholesale added or deleted
/// entities are left to the create/drop passes.
pub fn apply_json_diff(json1: &Snapshot, json2: &Snapshot) -> DiffResult {
    let altered_tables_with_columns = json2
        .tables
        .iter()
        .filter_map(|(key, new)| {
            let old = json1.tables.get(key)?;
            let altered = find_alternations_in_table(old, new);
            (!altered.is_empty()).then_some(altered)
        })
        .collect();

    let altered_enums = json2
        .enums
        .iter()
        .filter_map(|(key, new): (&String, &Enum)| {
            let old = json1.enums.get(key)?;
            let values = map_arrays_diff(&old.values, &new.values);
            (!values.is_empty()).then(|| AlteredEnum {
                name: new.name.clone(),
                schema: new.schema.clone(),
                new_values: new.values.clone(),
                values,
            })
        })
        .collect();

    let altered_sequences = json2
        .sequences
        .iter()
        .filter_map(|(key, new): (&String, &Sequence)| {
            let old = json1.sequences.get(key)?;
            (old.options != new.options).then(|| AlteredSequence {
                name: new.name.clone(),
                schema: new.schema.clone(),
                options: new.options.clone(),
            })
        })
        .collect();

    DiffResult {
        altered_tables_with_columns,
        altered_enums,
        altered_sequences,
        altered_roles: altered_pairs(&json1.roles, &json2.roles),
        altered_policies: altered_pairs(&json1.policies, &json2.policies),
        altered_views: altered_pairs(&json1.views, &json2.views),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drizzle_schema::{Dialect, GeneratedKind};
    use pretty_assertions::assert_eq;

    fn users() -> Table {
        Table::new("users")
            .column(Column::new("id", "serial").primary_key())
            .column(Column::new("name", "text"))
    }

    fn pg(tables: Vec<Table>) -> Snapshot {
        tables
            .into_iter()
            .fold(Snapshot::empty(Dialect::Postgresql), |s, t| s.with_table(t))
    }

    #[test]
    fn test_no_op_diff_is_empty() {
        let snapshot = pg(vec![users().index(Index::new("users_name_idx", ["name"]))])
            .with_enum(Enum {
                name: "mood".to_string(),
                schema: "public".to_string(),
                values: vec!["sad".to_string(), "happy".to_string()],
            })
            .with_view(View::new("active_users", "select * from users"));
        let result = apply_json_diff(&snapshot, &snapshot);
        assert!(result.is_empty());
        assert_eq!(result, DiffResult::default());
    }

    #[test]
    fn test_partition_completeness() {
        let left = pg(vec![users(), Table::new("orders")]);
        let right = pg(vec![users(), Table::new("invoices")]);

        let partition = diff_schemas_or_tables(&left.tables, &right.tables);
        let added: Vec<_> = partition.added.iter().map(|t| t.name.as_str()).collect();
        let deleted: Vec<_> = partition.deleted.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(added, vec!["invoices"]);
        assert_eq!(deleted, vec!["orders"]);
    }

    #[test]
    fn test_diff_columns_skips_unchanged_tables() {
        let left = pg(vec![users(), Table::new("orders")]);
        let right = pg(vec![
            users().column(Column::new("age", "integer")),
            Table::new("orders"),
        ]);

        let diff = diff_columns(&left.tables, &right.tables);
        assert_eq!(diff.len(), 1);
        let users = &diff["public.users"];
        assert_eq!(users.added.len(), 1);
        assert_eq!(users.added[0].name, "age");
        assert!(users.deleted.is_empty());
    }

    #[test]
    fn test_cosmetic_type_change_is_filtered() {
        let old = Column::new("price", "numeric (10,2)");
        let new = Column::new("price", "numeric(10,2)");
        assert_eq!(alternations_in_column(&old, &new), None);

        let table_old = Table::new("items").column(old);
        let table_new = Table::new("items").column(new);
        let altered = find_alternations_in_table(&table_old, &table_new);
        assert!(altered.altered.is_empty());
    }

    #[test]
    fn test_column_field_transitions() {
        let old = Column::new("age", "integer");
        let new = Column::new("age", "bigint").not_null().default_value("0");
        let altered = alternations_in_column(&old, &new).unwrap();

        assert_eq!(
            altered.sql_type,
            Some(FieldChange::Changed {
                old: "integer".to_string(),
                new: "bigint".to_string()
            })
        );
        assert_eq!(
            altered.default,
            Some(FieldChange::Added {
                value: "0".to_string()
            })
        );
        assert_eq!(
            altered.not_null,
            Some(FieldChange::Changed {
                old: false,
                new: true
            })
        );
        assert!(altered.generated.is_none());

        let generated = Column::new("age", "integer").generated("1 + 1", GeneratedKind::Stored);
        let altered = alternations_in_column(&generated, &Column::new("age", "integer")).unwrap();
        assert!(matches!(altered.generated, Some(FieldChange::Deleted { .. })));
    }

    #[test]
    fn test_sub_collections_are_partitioned() {
        let old = users()
            .index(Index::new("a_idx", ["name"]))
            .check(CheckConstraint {
                name: "c".to_string(),
                value: "id > 0".to_string(),
            });
        let new = users()
            .index(Index::new("b_idx", ["name"]))
            .check(CheckConstraint {
                name: "c".to_string(),
                value: "id > 1".to_string(),
            });

        let altered = find_alternations_in_table(&old, &new);
        assert_eq!(altered.indexes.added.keys().collect::<Vec<_>>(), vec!["b_idx"]);
        assert_eq!(altered.indexes.deleted.keys().collect::<Vec<_>>(), vec!["a_idx"]);
        assert_eq!(altered.check_constraints.altered["c"].new.value, "id > 1");
    }

    #[test]
    fn test_map_arrays_diff_positions_new_values() {
        let old = vec!["a".to_string(), "c".to_string()];
        let new = vec![
            "a".to_string(),
            "b1".to_string(),
            "b2".to_string(),
            "c".to_string(),
            "d".to_string(),
        ];
        let diff = map_arrays_diff(&old, &new);
        let positions: Vec<_> = diff
            .added
            .iter()
            .map(|a| (a.value.as_str(), a.before.as_str()))
            .collect();
        assert_eq!(positions, vec![("b1", "c"), ("b2", "c"), ("d", "")]);
        assert!(diff.deleted.is_empty());

        let diff = map_arrays_diff(&new, &old);
        assert_eq!(diff.deleted, vec!["b1", "b2", "d"]);
    }

    #[test]
    fn test_altered_enum_reported() {
        let mood = |values: &[&str]| Enum {
            name: "mood".to_string(),
            schema: "public".to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        };
        let left = pg(vec![]).with_enum(mood(&["sad"]));
        let right = pg(vec![]).with_enum(mood(&["sad", "happy"]));
        let result = apply_json_diff(&left, &right);
        assert_eq!(result.altered_enums.len(), 1);
        assert_eq!(result.altered_enums[0].values.added[0].value, "happy");
    }
}
