//! Typed schema entities stored inside a snapshot.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// A table and everything attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Owning schema; empty for the default schema.
    #[serde(default)]
    pub schema: String,
    /// Columns keyed by column name.
    #[serde(default)]
    pub columns: IndexMap<String, Column>,
    /// Indexes keyed by index name.
    #[serde(default)]
    pub indexes: IndexMap<String, Index>,
    /// Foreign keys keyed by constraint name.
    #[serde(default)]
    pub foreign_keys: IndexMap<String, ForeignKey>,
    /// Composite primary keys keyed by constraint name.
    #[serde(default)]
    pub composite_primary_keys: IndexMap<String, PrimaryKey>,
    /// Unique constraints keyed by constraint name.
    #[serde(default)]
    pub unique_constraints: IndexMap<String, UniqueConstraint>,
    /// Check constraints keyed by constraint name.
    #[serde(default)]
    pub check_constraints: IndexMap<String, CheckConstraint>,
    /// Row level security policies keyed by policy name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub policies: IndexMap<String, Policy>,
    /// Whether row level security is enabled.
    #[serde(default, rename = "isRLSEnabled", skip_serializing_if = "is_false")]
    pub is_rls_enabled: bool,
}

impl Table {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: String::new(),
            columns: IndexMap::new(),
            indexes: IndexMap::new(),
            foreign_keys: IndexMap::new(),
            composite_primary_keys: IndexMap::new(),
            unique_constraints: IndexMap::new(),
            check_constraints: IndexMap::new(),
            policies: IndexMap::new(),
            is_rls_enabled: false,
        }
    }

    /// Set the owning schema.
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Add a column, keyed by its name.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }

    /// Add an index, keyed by its name.
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.insert(index.name.clone(), index);
        self
    }

    /// Add a foreign key, keyed by its name.
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.insert(fk.name.clone(), fk);
        self
    }

    /// Add a composite primary key, keyed by its name.
    pub fn primary_key(mut self, pk: PrimaryKey) -> Self {
        self.composite_primary_keys.insert(pk.name.clone(), pk);
        self
    }

    /// Add a unique constraint, keyed by its name.
    pub fn unique(mut self, unique: UniqueConstraint) -> Self {
        self.unique_constraints.insert(unique.name.clone(), unique);
        self
    }

    /// Add a check constraint, keyed by its name.
    pub fn check(mut self, check: CheckConstraint) -> Self {
        self.check_constraints.insert(check.name.clone(), check);
        self
    }

    /// Add a policy, keyed by its name.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policies.insert(policy.name.clone(), policy);
        self
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column name.
    pub name: String,
    /// SQL type as written in DDL.
    #[serde(rename = "type")]
    pub sql_type: String,
    /// Schema of a user-defined type (Postgres enums).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_schema: Option<String>,
    /// Column-level primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// NOT NULL constraint.
    #[serde(default)]
    pub not_null: bool,
    /// Default expression, as SQL text.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "sql_text"
    )]
    pub default: Option<String>,
    /// Auto increment (MySQL, SQLite, SingleStore).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoincrement: Option<bool>,
    /// `ON UPDATE CURRENT_TIMESTAMP` (MySQL, SingleStore).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<bool>,
    /// Generated column expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<Generated>,
    /// Identity column (Postgres).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
}

impl Column {
    /// Create a nullable column.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            type_schema: None,
            primary_key: false,
            not_null: false,
            default: None,
            autoincrement: None,
            on_update: None,
            generated: None,
            identity: None,
        }
    }

    /// Mark as NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Mark as primary key (implies NOT NULL).
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    /// Set the default expression.
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Mark as auto increment.
    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = Some(true);
        self
    }

    /// Set the schema of the column's type.
    pub fn type_schema(mut self, schema: impl Into<String>) -> Self {
        self.type_schema = Some(schema.into());
        self
    }

    /// Set a generated expression.
    pub fn generated(mut self, expression: impl Into<String>, kind: GeneratedKind) -> Self {
        self.generated = Some(Generated {
            expression: expression.into(),
            kind,
        });
        self
    }

    /// Whether adding this column to a populated table needs a value that does not exist.
    pub fn needs_backfill(&self) -> bool {
        self.not_null && self.default.is_none() && self.generated.is_none() && self.identity.is_none()
    }
}

/// Generated column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generated {
    /// SQL expression.
    #[serde(rename = "as")]
    pub expression: String,
    /// Storage kind.
    #[serde(rename = "type")]
    pub kind: GeneratedKind,
}

/// Storage of a generated column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedKind {
    /// Computed on write.
    Stored,
    /// Computed on read.
    Virtual,
}

impl GeneratedKind {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Stored => "STORED",
            Self::Virtual => "VIRTUAL",
        }
    }
}

/// Postgres identity column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Backing sequence name.
    pub name: String,
    /// `always` or `byDefault`.
    #[serde(rename = "type")]
    pub kind: IdentityKind,
    /// Backing sequence schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Sequence options.
    #[serde(flatten)]
    pub options: SequenceOptions,
}

/// Identity generation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityKind {
    /// `GENERATED ALWAYS AS IDENTITY`.
    #[serde(rename = "always")]
    Always,
    /// `GENERATED BY DEFAULT AS IDENTITY`.
    #[serde(rename = "byDefault")]
    ByDefault,
}

impl IdentityKind {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Always => "ALWAYS",
            Self::ByDefault => "BY DEFAULT",
        }
    }
}

/// Numeric options shared by sequences and identity columns, kept as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceOptions {
    /// Step between values.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "sql_text")]
    pub increment: Option<String>,
    /// Lowest value.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "sql_text")]
    pub min_value: Option<String>,
    /// Highest value.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "sql_text")]
    pub max_value: Option<String>,
    /// First value handed out.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "sql_text")]
    pub start_with: Option<String>,
    /// Values preallocated per session.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "sql_text")]
    pub cache: Option<String>,
    /// Whether the sequence wraps around at its limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<bool>,
}

/// An index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Indexed columns or expressions.
    pub columns: Vec<IndexColumn>,
    /// Unique index.
    #[serde(default)]
    pub is_unique: bool,
    /// Partial index predicate.
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    /// `CREATE INDEX CONCURRENTLY` (Postgres).
    #[serde(default, skip_serializing_if = "is_false")]
    pub concurrently: bool,
    /// Access method (Postgres).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Storage parameters (Postgres).
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "sql_text_map"
    )]
    pub with: BTreeMap<String, String>,
    /// Index type (MySQL `USING`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub using: Option<String>,
    /// Algorithm option (MySQL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    /// Lock option (MySQL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<String>,
}

impl Index {
    /// Create an index over plain columns.
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns
                .into_iter()
                .map(|c| IndexColumn::Name(c.into()))
                .collect(),
            is_unique: false,
            predicate: None,
            concurrently: false,
            method: None,
            with: BTreeMap::new(),
            using: None,
            algorithm: None,
            lock: None,
        }
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Names of plain (non-expression) columns.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter_map(|c| match c {
                IndexColumn::Name(name) => Some(name.as_str()),
                IndexColumn::Expression(e) if !e.is_expression => Some(e.expression.as_str()),
                IndexColumn::Expression(_) => None,
            })
            .collect()
    }
}

/// One entry of an index column list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexColumn {
    /// Plain column name (MySQL, SQLite, SingleStore).
    Name(String),
    /// Postgres column or expression with ordering options.
    Expression(ExpressionColumn),
}

/// Postgres index element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionColumn {
    /// Column name or raw expression.
    pub expression: String,
    /// Whether `expression` is raw SQL rather than a column name.
    #[serde(default)]
    pub is_expression: bool,
    /// Ascending order.
    #[serde(default = "default_true")]
    pub asc: bool,
    /// `first` or `last`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nulls: Option<String>,
    /// Operator class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opclass: Option<String>,
}

impl ExpressionColumn {
    /// Ascending plain column with the engine's default null ordering.
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            expression: name.into(),
            is_expression: false,
            asc: true,
            nulls: Some("last".to_string()),
            opclass: None,
        }
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Referencing table.
    pub table_from: String,
    /// Referencing columns.
    pub columns_from: Vec<String>,
    /// Referenced table.
    pub table_to: String,
    /// Referenced columns.
    pub columns_to: Vec<String>,
    /// Schema of the referenced table (Postgres).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_to: Option<String>,
    /// `ON UPDATE` action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
    /// `ON DELETE` action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
}

/// A composite primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Constraint name.
    pub name: String,
    /// Key columns, in order.
    pub columns: Vec<String>,
}

/// A unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueConstraint {
    /// Constraint name.
    pub name: String,
    /// Constrained columns.
    pub columns: Vec<String>,
    /// `NULLS NOT DISTINCT` (Postgres 15+).
    #[serde(default, skip_serializing_if = "is_false")]
    pub nulls_not_distinct: bool,
}

/// A check constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    /// Constraint name.
    pub name: String,
    /// Boolean SQL expression.
    pub value: String,
}

/// A row level security policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Policy name.
    pub name: String,
    /// `PERMISSIVE` or `RESTRICTIVE`.
    #[serde(default, rename = "as", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Command the policy applies to (`ALL`, `SELECT`, ...).
    #[serde(default, rename = "for", skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Roles the policy applies to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    /// `USING` expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub using: Option<String>,
    /// `WITH CHECK` expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_check: Option<String>,
    /// Qualified table, for policies declared outside a table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<String>,
}

/// A Postgres enum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enum {
    /// Type name.
    pub name: String,
    /// Owning schema.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Values in declaration order.
    pub values: Vec<String>,
}

/// A Postgres sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    /// Sequence name.
    pub name: String,
    /// Owning schema.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Numeric options.
    #[serde(flatten)]
    pub options: SequenceOptions,
}

/// A Postgres role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Role name.
    pub name: String,
    /// `CREATEDB`.
    #[serde(default)]
    pub create_db: bool,
    /// `CREATEROLE`.
    #[serde(default)]
    pub create_role: bool,
    /// `INHERIT`; roles inherit unless told otherwise.
    #[serde(default = "default_true")]
    pub inherit: bool,
}

/// A view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    /// View name.
    pub name: String,
    /// Owning schema (Postgres).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,
    /// Defining query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    /// Managed outside of migrations; never created or dropped.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_existing: bool,
    /// Materialized view (Postgres).
    #[serde(default, skip_serializing_if = "is_false")]
    pub materialized: bool,
    /// `WITH (...)` options (Postgres).
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "sql_text_map"
    )]
    pub with: BTreeMap<String, String>,
    /// `WITH NO DATA` (Postgres materialized).
    #[serde(default, skip_serializing_if = "is_false")]
    pub with_no_data: bool,
    /// Table access method (Postgres materialized).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub using: Option<String>,
    /// Tablespace (Postgres materialized).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tablespace: Option<String>,
    /// `ALGORITHM` (MySQL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    /// `SQL SECURITY` (MySQL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_security: Option<String>,
    /// `WITH ... CHECK OPTION` (MySQL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_check_option: Option<String>,
}

impl View {
    /// Create a plain view.
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: String::new(),
            definition: Some(definition.into()),
            is_existing: false,
            materialized: false,
            with: BTreeMap::new(),
            with_no_data: false,
            using: None,
            tablespace: None,
            algorithm: None,
            sql_security: None,
            with_check_option: None,
        }
    }
}

/// Rename bookkeeping carried between migrations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Renamed schemas, old to new.
    #[serde(default)]
    pub schemas: IndexMap<String, String>,
    /// Renamed tables, old to new.
    #[serde(default)]
    pub tables: IndexMap<String, String>,
    /// Renamed columns, old to new.
    #[serde(default)]
    pub columns: IndexMap<String, String>,
}

impl SnapshotMeta {
    /// Whether no rename was recorded.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.tables.is_empty() && self.columns.is_empty()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_true() -> bool {
    true
}

fn default_schema() -> String {
    "public".to_string()
}

fn value_to_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Accept any JSON scalar and keep its SQL text.
fn sql_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_text))
}

fn sql_text_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(map
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| value_to_text(v).map(|v| (k, v)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_default_accepts_numbers_and_booleans() {
        let col: Column = serde_json::from_str(
            r#"{"name":"age","type":"integer","primaryKey":false,"notNull":true,"default":0}"#,
        )
        .unwrap();
        assert_eq!(col.default.as_deref(), Some("0"));

        let col: Column = serde_json::from_str(
            r#"{"name":"active","type":"boolean","notNull":false,"default":true}"#,
        )
        .unwrap();
        assert_eq!(col.default.as_deref(), Some("true"));
    }

    #[test]
    fn test_index_columns_accept_both_shapes() {
        let idx: Index = serde_json::from_str(
            r#"{"name":"i","columns":["a",{"expression":"lower(b)","isExpression":true,"asc":false,"nulls":"last"}],"isUnique":true}"#,
        )
        .unwrap();
        assert_eq!(idx.columns.len(), 2);
        assert!(matches!(idx.columns[0], IndexColumn::Name(ref n) if n == "a"));
        assert_eq!(idx.column_names(), vec!["a"]);
    }

    #[test]
    fn test_table_rls_flag_name() {
        let table = Table::new("users");
        let json = serde_json::to_value(&table).unwrap();
        assert!(json.get("isRLSEnabled").is_none());

        let mut table = table;
        table.is_rls_enabled = true;
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["isRLSEnabled"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_needs_backfill() {
        assert!(Column::new("a", "int").not_null().needs_backfill());
        assert!(!Column::new("a", "int").not_null().default_value("0").needs_backfill());
        assert!(!Column::new("a", "int").needs_backfill());
    }
}
