//! PostgreSQL convertor.

use std::collections::BTreeMap;

use drizzle_schema::{
    Column, Dialect, ForeignKey, Identity, Index, IndexColumn, Policy, Role, SequenceOptions,
    View,
};

use super::{ConvertContext, StatementConvertor, literal, to_snake_case};
use crate::statement::{ColumnAlter, EnumColumnRef, JsonStatement};

/// Built-in type names; anything else with a type schema is a user type.
const NATIVE_TYPES: &[&str] = &[
    "smallint",
    "integer",
    "int",
    "bigint",
    "boolean",
    "text",
    "varchar",
    "character",
    "char",
    "serial",
    "smallserial",
    "bigserial",
    "decimal",
    "numeric",
    "real",
    "double precision",
    "json",
    "jsonb",
    "time",
    "timestamp",
    "date",
    "interval",
    "uuid",
    "bytea",
    "inet",
    "cidr",
    "macaddr",
    "macaddr8",
    "point",
    "line",
    "geometry",
    "vector",
    "halfvec",
    "sparsevec",
    "bit",
];

/// Roles that are keywords rather than identifiers.
const ROLE_KEYWORDS: &[&str] = &["public", "current_role", "current_user", "session_user"];

/// PostgreSQL SQL generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConvertor;

impl StatementConvertor for PgConvertor {
    fn dialect(&self) -> Dialect {
        Dialect::Postgresql
    }

    fn convert(&self, statement: &JsonStatement, _ctx: &ConvertContext) -> Option<Vec<String>> {
        let sql = match statement {
            JsonStatement::CreateSchema { name } => vec![format!("CREATE SCHEMA \"{}\";", name)],
            JsonStatement::DropSchema { name } => vec![format!("DROP SCHEMA \"{}\";", name)],
            JsonStatement::RenameSchema { from, to } => {
                vec![format!("ALTER SCHEMA \"{}\" RENAME TO \"{}\";", from, to)]
            }

            JsonStatement::CreateEnum {
                name,
                schema,
                values,
            } => vec![self.create_enum(schema, name, values)],
            JsonStatement::DropEnum { name, schema } => {
                vec![format!("DROP TYPE {};", qualified(schema, name))]
            }
            JsonStatement::RenameEnum {
                name_from,
                name_to,
                schema,
            } => vec![format!(
                "ALTER TYPE {} RENAME TO \"{}\";",
                qualified(schema, name_from),
                name_to
            )],
            JsonStatement::MoveEnum {
                name,
                schema_from,
                schema_to,
            } => vec![format!(
                "ALTER TYPE {} SET SCHEMA \"{}\";",
                qualified(schema_from, name),
                schema_to
            )],
            JsonStatement::AlterEnumAddValue {
                name,
                schema,
                value,
                before,
            } => {
                let before = if before.is_empty() {
                    String::new()
                } else {
                    format!(" BEFORE {}", literal(before))
                };
                vec![format!(
                    "ALTER TYPE {} ADD VALUE {}{};",
                    qualified(schema, name),
                    literal(value),
                    before
                )]
            }
            JsonStatement::AlterEnumDropValue {
                name,
                schema,
                new_values,
                columns_with_enum,
                ..
            } => self.recreate_enum(schema, name, new_values, columns_with_enum),

            JsonStatement::CreateSequence {
                name,
                schema,
                values,
            } => vec![format!(
                "CREATE SEQUENCE {}{};",
                qualified(schema, name),
                sequence_options(values)
            )],
            JsonStatement::DropSequence { name, schema } => {
                vec![format!("DROP SEQUENCE {};", qualified(schema, name))]
            }
            JsonStatement::RenameSequence {
                name_from,
                name_to,
                schema,
            } => vec![format!(
                "ALTER SEQUENCE {} RENAME TO \"{}\";",
                qualified(schema, name_from),
                name_to
            )],
            JsonStatement::MoveSequence {
                name,
                schema_from,
                schema_to,
            } => vec![format!(
                "ALTER SEQUENCE {} SET SCHEMA \"{}\";",
                qualified(schema_from, name),
                schema_to
            )],
            JsonStatement::AlterSequence {
                name,
                schema,
                values,
            } => vec![format!(
                "ALTER SEQUENCE {}{};",
                qualified(schema, name),
                sequence_options(values)
            )],

            JsonStatement::CreateRole { role } => vec![self.create_role(role)],
            JsonStatement::DropRole { name } => vec![format!("DROP ROLE \"{}\";", name)],
            JsonStatement::RenameRole { name_from, name_to } => {
                vec![format!("ALTER ROLE \"{}\" RENAME TO \"{}\";", name_from, name_to)]
            }
            JsonStatement::AlterRole { role } => vec![self.alter_role(role)],

            JsonStatement::CreateTable {
                table_name,
                schema,
                columns,
                composite_pks,
                unique_constraints,
                check_constraints,
                is_rls_enabled,
                ..
            } => {
                let mut lines: Vec<String> = columns.iter().map(|c| format!("\t{}", self.column_def(c))).collect();
                for pk in composite_pks {
                    lines.push(format!(
                        "\tCONSTRAINT \"{}\" PRIMARY KEY({})",
                        pk.name,
                        quote_list(&pk.columns)
                    ));
                }
                for unique in unique_constraints {
                    lines.push(format!(
                        "\tCONSTRAINT \"{}\" UNIQUE{}({})",
                        unique.name,
                        nulls_not_distinct(unique.nulls_not_distinct),
                        quote_list(&unique.columns)
                    ));
                }
                for check in check_constraints {
                    lines.push(format!("\tCONSTRAINT \"{}\" CHECK ({})", check.name, check.value));
                }

                let mut sql = vec![format!(
                    "CREATE TABLE {} (\n{}\n);",
                    table(schema, table_name),
                    lines.join(",\n")
                )];
                if *is_rls_enabled {
                    sql.push(format!(
                        "ALTER TABLE {} ENABLE ROW LEVEL SECURITY;",
                        table(schema, table_name)
                    ));
                }
                sql
            }
            JsonStatement::DropTable {
                table_name, schema, ..
            } => vec![format!("DROP TABLE {} CASCADE;", table(schema, table_name))],
            JsonStatement::RenameTable {
                table_name_from,
                table_name_to,
                from_schema,
                ..
            } => vec![format!(
                "ALTER TABLE {} RENAME TO \"{}\";",
                table(from_schema, table_name_from),
                table_name_to
            )],
            JsonStatement::MoveTable {
                table_name,
                schema_from,
                schema_to,
            } => vec![format!(
                "ALTER TABLE {} SET SCHEMA \"{}\";",
                table(schema_from, table_name),
                schema_to
            )],

            JsonStatement::AlterTableAddColumn {
                table_name,
                schema,
                column,
            } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {};",
                table(schema, table_name),
                self.column_def(column)
            )],
            JsonStatement::AlterTableDropColumn {
                table_name,
                schema,
                column_name,
            } => vec![format!(
                "ALTER TABLE {} DROP COLUMN \"{}\";",
                table(schema, table_name),
                column_name
            )],
            JsonStatement::AlterTableRenameColumn {
                table_name,
                schema,
                old_column_name,
                new_column_name,
            } => vec![format!(
                "ALTER TABLE {} RENAME COLUMN \"{}\" TO \"{}\";",
                table(schema, table_name),
                old_column_name,
                new_column_name
            )],

            JsonStatement::AlterTableAlterColumnSetType(a) => {
                let sql_type = column_type(&a.column);
                let using = if a.column.type_schema.is_some() && !is_native(&a.column.sql_type) {
                    format!(" USING \"{}\"::{}", a.column.name, sql_type)
                } else {
                    String::new()
                };
                vec![format!(
                    "{} SET DATA TYPE {}{};",
                    alter_column(a),
                    sql_type,
                    using
                )]
            }
            JsonStatement::AlterTableAlterColumnSetDefault(a) => {
                let default = a.column.default.as_deref().unwrap_or("NULL");
                vec![format!("{} SET DEFAULT {};", alter_column(a), default)]
            }
            JsonStatement::AlterTableAlterColumnDropDefault(a) => {
                vec![format!("{} DROP DEFAULT;", alter_column(a))]
            }
            JsonStatement::AlterTableAlterColumnSetNotnull(a) => {
                vec![format!("{} SET NOT NULL;", alter_column(a))]
            }
            JsonStatement::AlterTableAlterColumnDropNotnull(a) => {
                vec![format!("{} DROP NOT NULL;", alter_column(a))]
            }
            JsonStatement::AlterTableAlterColumnSetPk(a) => vec![format!(
                "ALTER TABLE {} ADD PRIMARY KEY (\"{}\");",
                table(&a.schema, &a.table_name),
                a.column.name
            )],
            JsonStatement::AlterTableAlterColumnDropPk(a) => vec![format!(
                "ALTER TABLE {} DROP CONSTRAINT \"{}_pkey\";",
                table(&a.schema, &a.table_name),
                a.table_name
            )],
            JsonStatement::AlterTableAlterColumnSetGenerated(a)
            | JsonStatement::AlterTableAlterColumnAlterGenerated(a) => {
                // A generation expression cannot be changed in place.
                let target = table(&a.schema, &a.table_name);
                vec![
                    format!("ALTER TABLE {} DROP COLUMN \"{}\";", target, a.column.name),
                    format!("ALTER TABLE {} ADD COLUMN {};", target, self.column_def(&a.column)),
                ]
            }
            JsonStatement::AlterTableAlterColumnDropGenerated(a) => {
                vec![format!("{} DROP EXPRESSION;", alter_column(a))]
            }
            JsonStatement::AlterTableAlterColumnSetIdentity(a) => {
                let identity = a.column.identity.as_ref()?;
                vec![format!(
                    "{} ADD GENERATED {} AS IDENTITY ({});",
                    alter_column(a),
                    identity.kind.as_sql(),
                    self.identity_body(identity)
                )]
            }
            JsonStatement::AlterTableAlterColumnDropIdentity(a) => {
                vec![format!("{} DROP IDENTITY;", alter_column(a))]
            }
            JsonStatement::AlterTableAlterColumnChangeIdentity(a) => self.change_identity(a)?,

            JsonStatement::CreateIndex {
                table_name,
                schema,
                index,
            } => vec![self.create_index(schema, table_name, index)],
            JsonStatement::DropIndex { schema, index, .. } => {
                let name = if schema.is_empty() {
                    format!("\"{}\"", index.name)
                } else {
                    qualified(schema, &index.name)
                };
                vec![format!("DROP INDEX {};", name)]
            }

            JsonStatement::CreateReference {
                table_name,
                schema,
                fk,
            } => vec![self.create_reference(schema, table_name, fk)],
            JsonStatement::DeleteReference {
                table_name,
                schema,
                fk,
            } => vec![drop_constraint(schema, table_name, &fk.name)],

            JsonStatement::CreateCompositePk {
                table_name,
                schema,
                pk,
            } => vec![format!(
                "ALTER TABLE {} ADD CONSTRAINT \"{}\" PRIMARY KEY({});",
                table(schema, table_name),
                pk.name,
                quote_list(&pk.columns)
            )],
            JsonStatement::DeleteCompositePk {
                table_name,
                schema,
                pk,
            } => vec![drop_constraint(schema, table_name, &pk.name)],
            JsonStatement::AlterCompositePk {
                table_name,
                schema,
                old,
                new,
            } => vec![
                drop_constraint(schema, table_name, &old.name),
                format!(
                    "ALTER TABLE {} ADD CONSTRAINT \"{}\" PRIMARY KEY({});",
                    table(schema, table_name),
                    new.name,
                    quote_list(&new.columns)
                ),
            ],

            JsonStatement::CreateUniqueConstraint {
                table_name,
                schema,
                unique,
            } => vec![format!(
                "ALTER TABLE {} ADD CONSTRAINT \"{}\" UNIQUE{}({});",
                table(schema, table_name),
                unique.name,
                nulls_not_distinct(unique.nulls_not_distinct),
                quote_list(&unique.columns)
            )],
            JsonStatement::DeleteUniqueConstraint {
                table_name,
                schema,
                unique,
            } => vec![drop_constraint(schema, table_name, &unique.name)],
            JsonStatement::AlterUniqueConstraint {
                table_name,
                schema,
                old,
                new,
            } => vec![
                drop_constraint(schema, table_name, &old.name),
                format!(
                    "ALTER TABLE {} ADD CONSTRAINT \"{}\" UNIQUE{}({});",
                    table(schema, table_name),
                    new.name,
                    nulls_not_distinct(new.nulls_not_distinct),
                    quote_list(&new.columns)
                ),
            ],

            JsonStatement::CreateCheckConstraint {
                table_name,
                schema,
                check,
            } => vec![format!(
                "ALTER TABLE {} ADD CONSTRAINT \"{}\" CHECK ({});",
                table(schema, table_name),
                check.name,
                check.value
            )],
            JsonStatement::DeleteCheckConstraint {
                table_name,
                schema,
                check,
            } => vec![drop_constraint(schema, table_name, &check.name)],

            JsonStatement::CreatePolicy {
                table_name,
                schema,
                policy,
            } => vec![self.create_policy(&table(schema, table_name), policy)],
            JsonStatement::DropPolicy {
                table_name,
                schema,
                policy,
            } => vec![format!(
                "DROP POLICY \"{}\" ON {} CASCADE;",
                policy.name,
                table(schema, table_name)
            )],
            JsonStatement::RenamePolicy {
                table_name,
                schema,
                old_name,
                new_name,
            } => vec![format!(
                "ALTER POLICY \"{}\" ON {} RENAME TO \"{}\";",
                old_name,
                table(schema, table_name),
                new_name
            )],
            JsonStatement::AlterPolicy {
                table_name,
                schema,
                old,
                new,
            } => self.alter_policy(&table(schema, table_name), old, new),
            JsonStatement::CreateIndPolicy { policy } => {
                vec![self.create_policy(policy.on.as_deref()?, policy)]
            }
            JsonStatement::DropIndPolicy { policy } => vec![format!(
                "DROP POLICY \"{}\" ON {} CASCADE;",
                policy.name,
                policy.on.as_deref()?
            )],
            JsonStatement::RenameIndPolicy {
                table_key,
                old_name,
                new_name,
            } => vec![format!(
                "ALTER POLICY \"{}\" ON {} RENAME TO \"{}\";",
                old_name, table_key, new_name
            )],
            JsonStatement::AlterIndPolicy { old, new } => {
                self.alter_policy(new.on.as_deref()?, old, new)
            }
            JsonStatement::EnableRls { table_name, schema } => vec![format!(
                "ALTER TABLE {} ENABLE ROW LEVEL SECURITY;",
                table(schema, table_name)
            )],
            JsonStatement::DisableRls { table_name, schema } => vec![format!(
                "ALTER TABLE {} DISABLE ROW LEVEL SECURITY;",
                table(schema, table_name)
            )],

            JsonStatement::CreateView { view } => vec![self.create_view(view)],
            JsonStatement::DropView {
                name,
                schema,
                materialized,
            } => vec![format!(
                "DROP {}VIEW {};",
                materialized_keyword(*materialized),
                qualified(schema, name)
            )],
            JsonStatement::RenameView {
                name_from,
                name_to,
                schema,
                materialized,
            } => vec![format!(
                "ALTER {}VIEW {} RENAME TO \"{}\";",
                materialized_keyword(*materialized),
                qualified(schema, name_from),
                name_to
            )],
            JsonStatement::AlterViewAlterSchema {
                name,
                from_schema,
                to_schema,
                materialized,
            } => vec![format!(
                "ALTER {}VIEW {} SET SCHEMA \"{}\";",
                materialized_keyword(*materialized),
                qualified(from_schema, name),
                to_schema
            )],
            JsonStatement::AlterViewAddWithOption {
                name,
                schema,
                materialized,
                with,
            } => vec![format!(
                "ALTER {}VIEW {} SET ({});",
                materialized_keyword(*materialized),
                qualified(schema, name),
                with_options(with)
            )],
            JsonStatement::AlterViewDropWithOption {
                name,
                schema,
                materialized,
                with,
            } => {
                let keys: Vec<String> = with.keys().map(|k| to_snake_case(k)).collect();
                vec![format!(
                    "ALTER {}VIEW {} RESET ({});",
                    materialized_keyword(*materialized),
                    qualified(schema, name),
                    keys.join(", ")
                )]
            }
            JsonStatement::AlterViewAlterTablespace {
                name,
                schema,
                to_tablespace,
            } => vec![format!(
                "ALTER MATERIALIZED VIEW {} SET TABLESPACE {};",
                qualified(schema, name),
                to_tablespace
            )],
            JsonStatement::AlterViewAlterUsing {
                name,
                schema,
                to_using,
            } => vec![format!(
                "ALTER MATERIALIZED VIEW {} SET ACCESS METHOD \"{}\";",
                qualified(schema, name),
                to_using
            )],

            JsonStatement::RecreateTable { .. }
            | JsonStatement::SqliteAlterTableAddColumn { .. }
            | JsonStatement::AlterTableAlterColumnSetAutoincrement(_)
            | JsonStatement::AlterTableAlterColumnDropAutoincrement(_)
            | JsonStatement::AlterTableAlterColumnSetOnUpdate(_)
            | JsonStatement::AlterTableAlterColumnDropOnUpdate(_)
            | JsonStatement::AlterMysqlView { .. } => return None,
        };
        Some(sql)
    }
}

impl PgConvertor {
    fn column_def(&self, column: &Column) -> String {
        let mut sql = format!("\"{}\" {}", column.name, column_type(column));

        if column.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if let Some(default) = &column.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(generated) = &column.generated {
            sql.push_str(&format!(" GENERATED ALWAYS AS ({}) STORED", generated.expression));
        }
        // Identity columns are implicitly NOT NULL.
        if column.not_null && column.identity.is_none() {
            sql.push_str(" NOT NULL");
        }
        if let Some(identity) = &column.identity {
            sql.push_str(&format!(
                " GENERATED {} AS IDENTITY ({})",
                identity.kind.as_sql(),
                self.identity_body(identity)
            ));
        }

        sql
    }

    fn identity_body(&self, identity: &Identity) -> String {
        let name = match &identity.schema {
            Some(schema) if !schema.is_empty() => qualified(schema, &identity.name),
            _ => format!("\"{}\"", identity.name),
        };
        format!("sequence name {}{}", name, sequence_options(&identity.options))
    }

    fn change_identity(&self, alter: &ColumnAlter) -> Option<Vec<String>> {
        let new = alter.column.identity.as_ref()?;
        let old = alter.previous.identity.as_ref()?;
        let prefix = alter_column(alter);
        let mut sql = Vec::new();

        if old.kind != new.kind {
            sql.push(format!("{} SET GENERATED {};", prefix, new.kind.as_sql()));
        }
        let (o, n) = (&old.options, &new.options);
        let settings = [
            (&o.increment, &n.increment, "INCREMENT BY"),
            (&o.min_value, &n.min_value, "MINVALUE"),
            (&o.max_value, &n.max_value, "MAXVALUE"),
            (&o.start_with, &n.start_with, "START WITH"),
            (&o.cache, &n.cache, "CACHE"),
        ];
        for (before, after, keyword) in settings {
            if before != after {
                if let Some(value) = after {
                    sql.push(format!("{} SET {} {};", prefix, keyword, value));
                }
            }
        }
        if o.cycle != n.cycle {
            let cycle = if n.cycle == Some(true) { "CYCLE" } else { "NO CYCLE" };
            sql.push(format!("{} SET {};", prefix, cycle));
        }
        Some(sql)
    }

    fn create_enum(&self, schema: &str, name: &str, values: &[String]) -> String {
        let values: Vec<String> = values.iter().map(|v| literal(v)).collect();
        format!(
            "CREATE TYPE {} AS ENUM({});",
            qualified(schema, name),
            values.join(", ")
        )
    }

    /// Enum values cannot be removed; columns are moved to text while the
    /// type is recreated.
    fn recreate_enum(
        &self,
        schema: &str,
        name: &str,
        values: &[String],
        columns: &[EnumColumnRef],
    ) -> Vec<String> {
        let enum_type = qualified(schema, name);
        let mut sql = Vec::new();

        for column in columns {
            let target = table(&column.schema, &column.table_name);
            if column.default.is_some() {
                sql.push(format!(
                    "ALTER TABLE {} ALTER COLUMN \"{}\" DROP DEFAULT;",
                    target, column.column
                ));
            }
            let text = if column.is_array { "text[]" } else { "text" };
            sql.push(format!(
                "ALTER TABLE {} ALTER COLUMN \"{}\" SET DATA TYPE {};",
                target, column.column, text
            ));
        }

        sql.push(format!("DROP TYPE {};", enum_type));
        sql.push(self.create_enum(schema, name, values));

        for column in columns {
            let target = table(&column.schema, &column.table_name);
            let sql_type = if column.is_array {
                format!("{}[]", enum_type)
            } else {
                enum_type.clone()
            };
            sql.push(format!(
                "ALTER TABLE {} ALTER COLUMN \"{}\" SET DATA TYPE {} USING \"{}\"::{};",
                target, column.column, sql_type, column.column, sql_type
            ));
            if let Some(default) = &column.default {
                sql.push(format!(
                    "ALTER TABLE {} ALTER COLUMN \"{}\" SET DEFAULT {};",
                    target, column.column, default
                ));
            }
        }

        sql
    }

    fn create_role(&self, role: &Role) -> String {
        let mut options = String::new();
        if role.create_db {
            options.push_str(" CREATEDB");
        }
        if role.create_role {
            options.push_str(" CREATEROLE");
        }
        if !role.inherit {
            options.push_str(" NOINHERIT");
        }
        if options.is_empty() {
            format!("CREATE ROLE \"{}\";", role.name)
        } else {
            format!("CREATE ROLE \"{}\" WITH{};", role.name, options)
        }
    }

    fn alter_role(&self, role: &Role) -> String {
        format!(
            "ALTER ROLE \"{}\" WITH {} {} {};",
            role.name,
            if role.create_db { "CREATEDB" } else { "NOCREATEDB" },
            if role.create_role { "CREATEROLE" } else { "NOCREATEROLE" },
            if role.inherit { "INHERIT" } else { "NOINHERIT" }
        )
    }

    fn create_index(&self, schema: &str, table_name: &str, index: &Index) -> String {
        let columns: Vec<String> = index.columns.iter().map(index_column).collect();
        let mut sql = format!(
            "CREATE {}INDEX {}IF NOT EXISTS \"{}\" ON {} USING {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            if index.concurrently { "CONCURRENTLY " } else { "" },
            index.name,
            table(schema, table_name),
            index.method.as_deref().unwrap_or("btree"),
            columns.join(",")
        );
        if !index.with.is_empty() {
            sql.push_str(&format!(" WITH ({})", with_options(&index.with)));
        }
        if let Some(predicate) = &index.predicate {
            sql.push_str(&format!(" WHERE {}", predicate));
        }
        sql.push(';');
        sql
    }

    fn create_reference(&self, schema: &str, table_name: &str, fk: &ForeignKey) -> String {
        let schema_to = fk.schema_to.as_deref().filter(|s| !s.is_empty()).unwrap_or("public");
        let mut constraint = format!(
            "ALTER TABLE {} ADD CONSTRAINT \"{}\" FOREIGN KEY ({}) REFERENCES \"{}\".\"{}\"({})",
            table(schema, table_name),
            fk.name,
            quote_list(&fk.columns_from),
            schema_to,
            fk.table_to,
            quote_list(&fk.columns_to)
        );
        if let Some(on_delete) = &fk.on_delete {
            constraint.push_str(&format!(" ON DELETE {}", on_delete));
        }
        if let Some(on_update) = &fk.on_update {
            constraint.push_str(&format!(" ON UPDATE {}", on_update));
        }
        // Re-running a migration must not fail on an existing constraint.
        format!(
            "DO $$ BEGIN\n {};\nEXCEPTION\n WHEN duplicate_object THEN null;\nEND $$;",
            constraint
        )
    }

    fn create_policy(&self, target: &str, policy: &Policy) -> String {
        let mut sql = format!(
            "CREATE POLICY \"{}\" ON {} AS {} FOR {} TO {}",
            policy.name,
            target,
            policy.kind.as_deref().unwrap_or("PERMISSIVE"),
            policy.command.as_deref().unwrap_or("ALL"),
            policy_roles(&policy.to)
        );
        if let Some(using) = &policy.using {
            sql.push_str(&format!(" USING ({})", using));
        }
        if let Some(with_check) = &policy.with_check {
            sql.push_str(&format!(" WITH CHECK ({})", with_check));
        }
        sql.push(';');
        sql
    }

    fn alter_policy(&self, target: &str, old: &Policy, new: &Policy) -> Vec<String> {
        // AS and FOR are fixed at creation.
        if old.kind != new.kind || old.command != new.command {
            return vec![
                format!("DROP POLICY \"{}\" ON {} CASCADE;", old.name, target),
                self.create_policy(target, new),
            ];
        }

        let mut sql = format!(
            "ALTER POLICY \"{}\" ON {} TO {}",
            new.name,
            target,
            policy_roles(&new.to)
        );
        if let Some(using) = &new.using {
            sql.push_str(&format!(" USING ({})", using));
        }
        if let Some(with_check) = &new.with_check {
            sql.push_str(&format!(" WITH CHECK ({})", with_check));
        }
        sql.push(';');
        vec![sql]
    }

    fn create_view(&self, view: &View) -> String {
        let mut sql = format!(
            "CREATE {}VIEW {}",
            materialized_keyword(view.materialized),
            qualified(&view.schema, &view.name)
        );
        if view.materialized {
            if let Some(using) = &view.using {
                sql.push_str(&format!(" USING \"{}\"", using));
            }
        }
        if !view.with.is_empty() {
            sql.push_str(&format!(" WITH ({})", with_options(&view.with)));
        }
        if view.materialized {
            if let Some(tablespace) = &view.tablespace {
                sql.push_str(&format!(" TABLESPACE {}", tablespace));
            }
        }
        sql.push_str(&format!(" AS ({})", view.definition.as_deref().unwrap_or_default()));
        if view.materialized && view.with_no_data {
            sql.push_str(" WITH NO DATA");
        }
        sql.push(';');
        sql
    }
}

/// `"schema"."name"`, defaulting to `public`.
fn qualified(schema: &str, name: &str) -> String {
    let schema = if schema.is_empty() { "public" } else { schema };
    format!("\"{}\".\"{}\"", schema, name)
}

/// Table reference; tables in the default schema are left unqualified.
fn table(schema: &str, name: &str) -> String {
    if schema.is_empty() {
        format!("\"{}\"", name)
    } else {
        format!("\"{}\".\"{}\"", schema, name)
    }
}

fn alter_column(alter: &ColumnAlter) -> String {
    format!(
        "ALTER TABLE {} ALTER COLUMN \"{}\"",
        table(&alter.schema, &alter.table_name),
        alter.column.name
    )
}

fn drop_constraint(schema: &str, table_name: &str, name: &str) -> String {
    format!(
        "ALTER TABLE {} DROP CONSTRAINT \"{}\";",
        table(schema, table_name),
        name
    )
}

fn is_native(sql_type: &str) -> bool {
    let base = sql_type
        .trim_end_matches("[]")
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    NATIVE_TYPES
        .iter()
        .any(|native| base == *native || base.starts_with(&format!("{} ", native)))
}

/// Column type, quoting user types and qualifying those outside `public`.
fn column_type(column: &Column) -> String {
    match &column.type_schema {
        Some(schema) if !is_native(&column.sql_type) => {
            let (base, array) = match column.sql_type.find('[') {
                Some(at) => column.sql_type.split_at(at),
                None => (column.sql_type.as_str(), ""),
            };
            if schema.is_empty() || schema == "public" {
                format!("\"{}\"{}", base, array)
            } else {
                format!("\"{}\".\"{}\"{}", schema, base, array)
            }
        }
        _ => column.sql_type.clone(),
    }
}

fn index_column(column: &IndexColumn) -> String {
    match column {
        IndexColumn::Name(name) => format!("\"{}\"", name),
        IndexColumn::Expression(e) => {
            let mut sql = if e.is_expression {
                e.expression.clone()
            } else {
                format!("\"{}\"", e.expression)
            };
            if let Some(opclass) = &e.opclass {
                sql.push_str(&format!(" {}", opclass));
            }
            if !e.asc {
                sql.push_str(" DESC");
            }
            // Ascending defaults to NULLS LAST, descending to NULLS FIRST.
            let default_nulls = if e.asc { "last" } else { "first" };
            if let Some(nulls) = &e.nulls {
                if nulls != default_nulls {
                    sql.push_str(&format!(" NULLS {}", nulls.to_uppercase()));
                }
            }
            sql
        }
    }
}

fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("\"{}\"", n))
        .collect::<Vec<_>>()
        .join(",")
}

fn nulls_not_distinct(enabled: bool) -> &'static str {
    if enabled { " NULLS NOT DISTINCT" } else { "" }
}

fn materialized_keyword(materialized: bool) -> &'static str {
    if materialized { "MATERIALIZED " } else { "" }
}

fn with_options(options: &BTreeMap<String, String>) -> String {
    options
        .iter()
        .map(|(k, v)| format!("{} = {}", to_snake_case(k), v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn sequence_options(options: &SequenceOptions) -> String {
    let mut sql = String::new();
    if let Some(v) = &options.increment {
        sql.push_str(&format!(" INCREMENT BY {}", v));
    }
    if let Some(v) = &options.min_value {
        sql.push_str(&format!(" MINVALUE {}", v));
    }
    if let Some(v) = &options.max_value {
        sql.push_str(&format!(" MAXVALUE {}", v));
    }
    if let Some(v) = &options.start_with {
        sql.push_str(&format!(" START WITH {}", v));
    }
    if let Some(v) = &options.cache {
        sql.push_str(&format!(" CACHE {}", v));
    }
    if options.cycle == Some(true) {
        sql.push_str(" CYCLE");
    }
    sql
}

fn policy_roles(roles: &[String]) -> String {
    if roles.is_empty() {
        return "public".to_string();
    }
    roles
        .iter()
        .map(|role| {
            if ROLE_KEYWORDS.contains(&role.as_str()) {
                role.clone()
            } else {
                format!("\"{}\"", role)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use drizzle_schema::{ExpressionColumn, IdentityKind, UniqueConstraint};
    use pretty_assertions::assert_eq;

    fn render(statement: JsonStatement) -> Vec<String> {
        PgConvertor
            .convert(&statement, &ConvertContext::default())
            .unwrap()
    }

    fn alter(column: Column, previous: Column) -> ColumnAlter {
        ColumnAlter {
            table_name: "users".to_string(),
            schema: String::new(),
            column,
            previous,
            in_composite_pk: false,
        }
    }

    #[test]
    fn test_add_column() {
        let sql = render(JsonStatement::AlterTableAddColumn {
            table_name: "users".to_string(),
            schema: String::new(),
            column: Column::new("age", "integer").not_null().default_value("0"),
        });
        assert_eq!(sql, vec!["ALTER TABLE \"users\" ADD COLUMN \"age\" integer DEFAULT 0 NOT NULL;"]);
    }

    #[test]
    fn test_create_table_with_constraints() {
        let sql = render(JsonStatement::CreateTable {
            table_name: "users".to_string(),
            schema: "auth".to_string(),
            columns: vec![
                Column::new("id", "serial").primary_key(),
                Column::new("email", "text").not_null(),
            ],
            composite_pks: vec![],
            unique_constraints: vec![UniqueConstraint {
                name: "users_email_unique".to_string(),
                columns: vec!["email".to_string()],
                nulls_not_distinct: true,
            }],
            check_constraints: vec![],
            references: vec![],
            is_rls_enabled: true,
        });
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE \"auth\".\"users\" (\n\t\"id\" serial PRIMARY KEY NOT NULL,\n\t\"email\" text NOT NULL,\n\tCONSTRAINT \"users_email_unique\" UNIQUE NULLS NOT DISTINCT(\"email\")\n);",
                "ALTER TABLE \"auth\".\"users\" ENABLE ROW LEVEL SECURITY;",
            ]
        );
    }

    #[test]
    fn test_foreign_key_is_idempotent() {
        let sql = render(JsonStatement::CreateReference {
            table_name: "posts".to_string(),
            schema: String::new(),
            fk: ForeignKey {
                name: "posts_author_fk".to_string(),
                table_from: "posts".to_string(),
                columns_from: vec!["author_id".to_string()],
                table_to: "users".to_string(),
                columns_to: vec!["id".to_string()],
                schema_to: None,
                on_update: Some("no action".to_string()),
                on_delete: Some("cascade".to_string()),
            },
        });
        assert_eq!(
            sql[0],
            "DO $$ BEGIN\n ALTER TABLE \"posts\" ADD CONSTRAINT \"posts_author_fk\" FOREIGN KEY (\"author_id\") REFERENCES \"public\".\"users\"(\"id\") ON DELETE cascade ON UPDATE no action;\nEXCEPTION\n WHEN duplicate_object THEN null;\nEND $$;"
        );
    }

    #[test]
    fn test_enum_value_removal_recreates_type() {
        let sql = render(JsonStatement::AlterEnumDropValue {
            name: "mood".to_string(),
            schema: "public".to_string(),
            deleted_values: vec!["meh".to_string()],
            new_values: vec!["sad".to_string(), "happy".to_string()],
            columns_with_enum: vec![EnumColumnRef {
                table_name: "users".to_string(),
                schema: String::new(),
                column: "mood".to_string(),
                default: Some("'sad'".to_string()),
                is_array: false,
            }],
        });
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"users\" ALTER COLUMN \"mood\" DROP DEFAULT;",
                "ALTER TABLE \"users\" ALTER COLUMN \"mood\" SET DATA TYPE text;",
                "DROP TYPE \"public\".\"mood\";",
                "CREATE TYPE \"public\".\"mood\" AS ENUM('sad', 'happy');",
                "ALTER TABLE \"users\" ALTER COLUMN \"mood\" SET DATA TYPE \"public\".\"mood\" USING \"mood\"::\"public\".\"mood\";",
                "ALTER TABLE \"users\" ALTER COLUMN \"mood\" SET DEFAULT 'sad';",
            ]
        );
    }

    #[test]
    fn test_identity_changes() {
        let identity = |kind, increment: &str| Identity {
            name: "users_id_seq".to_string(),
            kind,
            schema: Some("public".to_string()),
            options: SequenceOptions {
                increment: Some(increment.to_string()),
                ..Default::default()
            },
        };
        let mut old = Column::new("id", "integer").not_null();
        old.identity = Some(identity(IdentityKind::ByDefault, "1"));
        let mut new = old.clone();
        new.identity = Some(identity(IdentityKind::Always, "2"));

        let sql = render(JsonStatement::AlterTableAlterColumnChangeIdentity(alter(new.clone(), old)));
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"users\" ALTER COLUMN \"id\" SET GENERATED ALWAYS;",
                "ALTER TABLE \"users\" ALTER COLUMN \"id\" SET INCREMENT BY 2;",
            ]
        );

        let created = render(JsonStatement::AlterTableAddColumn {
            table_name: "users".to_string(),
            schema: String::new(),
            column: new,
        });
        assert_eq!(
            created[0],
            "ALTER TABLE \"users\" ADD COLUMN \"id\" integer GENERATED ALWAYS AS IDENTITY (sequence name \"public\".\"users_id_seq\" INCREMENT BY 2);"
        );
    }

    #[test]
    fn test_index_rendering() {
        let mut index = Index::new("users_name_idx", Vec::<String>::new()).unique();
        index.columns = vec![
            IndexColumn::Expression(ExpressionColumn::column("name")),
            IndexColumn::Expression(ExpressionColumn {
                expression: "lower(email)".to_string(),
                is_expression: true,
                asc: false,
                nulls: Some("last".to_string()),
                opclass: None,
            }),
        ];
        index.predicate = Some("\"deleted\" = false".to_string());
        let sql = render(JsonStatement::CreateIndex {
            table_name: "users".to_string(),
            schema: String::new(),
            index,
        });
        assert_eq!(
            sql,
            vec!["CREATE UNIQUE INDEX IF NOT EXISTS \"users_name_idx\" ON \"users\" USING btree (\"name\",lower(email) DESC NULLS LAST) WHERE \"deleted\" = false;"]
        );
    }

    #[test]
    fn test_policy_and_roles() {
        let policy = Policy {
            name: "own_rows".to_string(),
            kind: None,
            command: Some("SELECT".to_string()),
            to: vec!["authenticated".to_string(), "current_user".to_string()],
            using: Some("user_id = auth.uid()".to_string()),
            with_check: None,
            on: None,
        };
        let sql = render(JsonStatement::CreatePolicy {
            table_name: "posts".to_string(),
            schema: String::new(),
            policy,
        });
        assert_eq!(
            sql,
            vec!["CREATE POLICY \"own_rows\" ON \"posts\" AS PERMISSIVE FOR SELECT TO \"authenticated\", current_user USING (user_id = auth.uid());"]
        );

        let role = Role {
            name: "admin".to_string(),
            create_db: true,
            create_role: false,
            inherit: false,
        };
        assert_eq!(
            render(JsonStatement::CreateRole { role }),
            vec!["CREATE ROLE \"admin\" WITH CREATEDB NOINHERIT;"]
        );
    }

    #[test]
    fn test_materialized_view() {
        let mut view = View::new("top_users", "select * from users");
        view.materialized = true;
        view.with.insert("fillfactor".to_string(), "70".to_string());
        view.using = Some("heap".to_string());
        view.with_no_data = true;
        assert_eq!(
            render(JsonStatement::CreateView { view }),
            vec!["CREATE MATERIALIZED VIEW \"public\".\"top_users\" USING \"heap\" WITH (fillfactor = 70) AS (select * from users) WITH NO DATA;"]
        );
    }

    #[test]
    fn test_mysql_only_statements_have_no_convertor() {
        let view = View::new("v", "select 1");
        assert!(
            PgConvertor
                .convert(&JsonStatement::AlterMysqlView { view }, &ConvertContext::default())
                .is_none()
        );
    }
}
