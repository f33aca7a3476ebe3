//! SQLite and LibSQL convertors.
//!
//! SQLite alters little in place. Changes the combiner could not fold into a
//! table rebuild render as a comment telling the user to migrate by hand.

use drizzle_schema::{CheckConstraint, Column, Dialect, ForeignKey, Index, IndexColumn, PrimaryKey, UniqueConstraint};

use super::{ConvertContext, StatementConvertor};
use crate::orchestrator::Action;
use crate::statement::{ColumnAlter, JsonStatement};

/// SQLite SQL generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteConvertor;

impl StatementConvertor for SqliteConvertor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn convert(&self, statement: &JsonStatement, ctx: &ConvertContext) -> Option<Vec<String>> {
        let sql = match statement {
            JsonStatement::CreateTable {
                table_name,
                columns,
                composite_pks,
                unique_constraints,
                check_constraints,
                references,
                ..
            } => vec![create_table(
                table_name,
                columns,
                composite_pks,
                unique_constraints,
                check_constraints,
                references,
            )],
            JsonStatement::DropTable { table_name, .. } => {
                vec![format!("DROP TABLE `{}`;", table_name)]
            }
            JsonStatement::RenameTable {
                table_name_from,
                table_name_to,
                ..
            } => vec![format!(
                "ALTER TABLE `{}` RENAME TO `{}`;",
                table_name_from, table_name_to
            )],
            JsonStatement::RecreateTable {
                table_name,
                columns,
                composite_pks,
                unique_constraints,
                check_constraints,
                references,
                copied_columns,
                data_loss,
            } => {
                let new_table = format!("__new_{}", table_name);
                let mut sql = Vec::new();
                // Push toggles foreign keys once around the whole batch.
                if ctx.action == Action::Generate {
                    sql.push("PRAGMA foreign_keys=OFF;".to_string());
                }
                sql.push(create_table(
                    &new_table,
                    columns,
                    composite_pks,
                    unique_constraints,
                    check_constraints,
                    references,
                ));
                if *data_loss {
                    sql.push(format!("DELETE FROM `{}`;", table_name));
                } else {
                    let copied = copied_columns
                        .iter()
                        .map(|c| format!("\"{}\"", c))
                        .collect::<Vec<_>>()
                        .join(", ");
                    sql.push(format!(
                        "INSERT INTO `{}`({}) SELECT {} FROM `{}`;",
                        new_table, copied, copied, table_name
                    ));
                }
                sql.push(format!("DROP TABLE `{}`;", table_name));
                sql.push(format!("ALTER TABLE `{}` RENAME TO `{}`;", new_table, table_name));
                if ctx.action == Action::Generate {
                    sql.push("PRAGMA foreign_keys=ON;".to_string());
                }
                sql
            }

            JsonStatement::AlterTableAddColumn {
                table_name, column, ..
            } => vec![add_column(table_name, column, None)],
            JsonStatement::SqliteAlterTableAddColumn {
                table_name,
                column,
                reference,
            } => vec![add_column(table_name, column, reference.as_ref())],
            JsonStatement::AlterTableDropColumn {
                table_name,
                column_name,
                ..
            } => vec![format!(
                "ALTER TABLE `{}` DROP COLUMN `{}`;",
                table_name, column_name
            )],
            JsonStatement::AlterTableRenameColumn {
                table_name,
                old_column_name,
                new_column_name,
                ..
            } => vec![format!(
                "ALTER TABLE `{}` RENAME COLUMN \"{}\" TO \"{}\";",
                table_name, old_column_name, new_column_name
            )],

            JsonStatement::AlterTableAlterColumnDropDefault(_) => {
                vec![manual_step("Drop default from column")]
            }
            JsonStatement::AlterTableAlterColumnSetType(_)
            | JsonStatement::AlterTableAlterColumnSetDefault(_)
            | JsonStatement::AlterTableAlterColumnSetNotnull(_)
            | JsonStatement::AlterTableAlterColumnDropNotnull(_)
            | JsonStatement::AlterTableAlterColumnSetPk(_)
            | JsonStatement::AlterTableAlterColumnDropPk(_)
            | JsonStatement::AlterTableAlterColumnSetAutoincrement(_)
            | JsonStatement::AlterTableAlterColumnDropAutoincrement(_)
            | JsonStatement::AlterTableAlterColumnSetGenerated(_)
            | JsonStatement::AlterTableAlterColumnDropGenerated(_)
            | JsonStatement::AlterTableAlterColumnAlterGenerated(_) => {
                vec![manual_step("Alter column")]
            }
            JsonStatement::CreateCompositePk { .. } => {
                vec![manual_step("Create composite primary key")]
            }
            JsonStatement::DeleteCompositePk { .. } => {
                vec![manual_step("Drop composite primary key")]
            }
            JsonStatement::AlterCompositePk { .. } => {
                vec![manual_step("Alter composite primary key")]
            }
            JsonStatement::CreateReference { .. }
            | JsonStatement::DeleteReference { .. } => vec![manual_step("Alter foreign key")],
            JsonStatement::CreateUniqueConstraint { .. }
            | JsonStatement::DeleteUniqueConstraint { .. }
            | JsonStatement::AlterUniqueConstraint { .. } => {
                vec![manual_step("Alter unique constraint")]
            }
            JsonStatement::CreateCheckConstraint { .. }
            | JsonStatement::DeleteCheckConstraint { .. } => {
                vec![manual_step("Alter check constraint")]
            }

            JsonStatement::CreateIndex {
                table_name, index, ..
            } => vec![create_index(table_name, index)],
            JsonStatement::DropIndex { index, .. } => {
                vec![format!("DROP INDEX `{}`;", index.name)]
            }

            JsonStatement::CreateView { view } => vec![format!(
                "CREATE VIEW `{}` AS {};",
                view.name,
                view.definition.as_deref().unwrap_or_default()
            )],
            JsonStatement::DropView { name, .. } => vec![format!("DROP VIEW `{}`;", name)],

            JsonStatement::CreateSchema { .. }
            | JsonStatement::DropSchema { .. }
            | JsonStatement::RenameSchema { .. }
            | JsonStatement::CreateEnum { .. }
            | JsonStatement::DropEnum { .. }
            | JsonStatement::RenameEnum { .. }
            | JsonStatement::MoveEnum { .. }
            | JsonStatement::AlterEnumAddValue { .. }
            | JsonStatement::AlterEnumDropValue { .. }
            | JsonStatement::CreateSequence { .. }
            | JsonStatement::DropSequence { .. }
            | JsonStatement::RenameSequence { .. }
            | JsonStatement::MoveSequence { .. }
            | JsonStatement::AlterSequence { .. }
            | JsonStatement::CreateRole { .. }
            | JsonStatement::DropRole { .. }
            | JsonStatement::RenameRole { .. }
            | JsonStatement::AlterRole { .. }
            | JsonStatement::MoveTable { .. }
            | JsonStatement::AlterTableAlterColumnSetOnUpdate(_)
            | JsonStatement::AlterTableAlterColumnDropOnUpdate(_)
            | JsonStatement::AlterTableAlterColumnSetIdentity(_)
            | JsonStatement::AlterTableAlterColumnDropIdentity(_)
            | JsonStatement::AlterTableAlterColumnChangeIdentity(_)
            | JsonStatement::CreatePolicy { .. }
            | JsonStatement::DropPolicy { .. }
            | JsonStatement::RenamePolicy { .. }
            | JsonStatement::AlterPolicy { .. }
            | JsonStatement::CreateIndPolicy { .. }
            | JsonStatement::DropIndPolicy { .. }
            | JsonStatement::RenameIndPolicy { .. }
            | JsonStatement::AlterIndPolicy { .. }
            | JsonStatement::EnableRls { .. }
            | JsonStatement::DisableRls { .. }
            | JsonStatement::RenameView { .. }
            | JsonStatement::AlterViewAlterSchema { .. }
            | JsonStatement::AlterViewAddWithOption { .. }
            | JsonStatement::AlterViewDropWithOption { .. }
            | JsonStatement::AlterViewAlterTablespace { .. }
            | JsonStatement::AlterViewAlterUsing { .. }
            | JsonStatement::AlterMysqlView { .. } => return None,
        };
        Some(sql)
    }
}

/// LibSQL SQL generator. Same as SQLite, plus in-place column changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibSqlConvertor;

impl StatementConvertor for LibSqlConvertor {
    fn dialect(&self) -> Dialect {
        Dialect::Turso
    }

    fn convert(&self, statement: &JsonStatement, ctx: &ConvertContext) -> Option<Vec<String>> {
        match statement {
            JsonStatement::AlterTableAlterColumnSetType(a)
            | JsonStatement::AlterTableAlterColumnSetDefault(a)
            | JsonStatement::AlterTableAlterColumnDropDefault(a)
            | JsonStatement::AlterTableAlterColumnSetNotnull(a)
            | JsonStatement::AlterTableAlterColumnDropNotnull(a) => Some(vec![alter_column_to(a)]),
            other => SqliteConvertor.convert(other, ctx),
        }
    }
}

fn alter_column_to(alter: &ColumnAlter) -> String {
    let column = &alter.column;
    let mut definition = column.sql_type.clone();
    if let Some(default) = &column.default {
        definition.push_str(&format!(" DEFAULT {}", default));
    }
    if column.not_null {
        definition.push_str(" NOT NULL");
    }
    format!(
        "ALTER TABLE `{}` ALTER COLUMN \"{}\" TO \"{}\" {};",
        alter.table_name, column.name, column.name, definition
    )
}

fn column_def(column: &Column) -> String {
    let mut sql = format!("`{}` {}", column.name, column.sql_type);
    if column.primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    if column.autoincrement == Some(true) {
        sql.push_str(" AUTOINCREMENT");
    }
    if let Some(default) = &column.default {
        sql.push_str(&format!(" DEFAULT {}", default));
    }
    if let Some(generated) = &column.generated {
        sql.push_str(&format!(
            " GENERATED ALWAYS AS ({}) {}",
            generated.expression,
            generated.kind.as_sql()
        ));
    }
    if column.not_null {
        sql.push_str(" NOT NULL");
    }
    sql
}

fn reference_actions(fk: &ForeignKey) -> String {
    let mut sql = String::new();
    if let Some(on_update) = &fk.on_update {
        sql.push_str(&format!(" ON UPDATE {}", on_update));
    }
    if let Some(on_delete) = &fk.on_delete {
        sql.push_str(&format!(" ON DELETE {}", on_delete));
    }
    sql
}

fn create_table(
    name: &str,
    columns: &[Column],
    composite_pks: &[PrimaryKey],
    uniques: &[UniqueConstraint],
    checks: &[CheckConstraint],
    references: &[ForeignKey],
) -> String {
    let mut lines: Vec<String> = columns.iter().map(|c| format!("\t{}", column_def(c))).collect();
    for pk in composite_pks {
        lines.push(format!("\tPRIMARY KEY({})", quote_list(&pk.columns, ", ")));
    }
    for fk in references {
        lines.push(format!(
            "\tFOREIGN KEY ({}) REFERENCES `{}`({}){}",
            quote_list(&fk.columns_from, ", "),
            fk.table_to,
            quote_list(&fk.columns_to, ", "),
            reference_actions(fk)
        ));
    }
    for unique in uniques {
        lines.push(format!(
            "\tCONSTRAINT `{}` UNIQUE({})",
            unique.name,
            quote_list(&unique.columns, ", ")
        ));
    }
    for check in checks {
        lines.push(format!("\tCONSTRAINT \"{}\" CHECK({})", check.name, check.value));
    }
    format!("CREATE TABLE `{}` (\n{}\n);", name, lines.join(",\n"))
}

fn add_column(table_name: &str, column: &Column, reference: Option<&ForeignKey>) -> String {
    let mut sql = format!("ALTER TABLE `{}` ADD {}", table_name, column_def(column));
    if let Some(fk) = reference {
        sql.push_str(&format!(
            " REFERENCES `{}`({}){}",
            fk.table_to,
            quote_list(&fk.columns_to, ", "),
            reference_actions(fk)
        ));
    }
    sql.push(';');
    sql
}

fn create_index(table_name: &str, index: &Index) -> String {
    let columns: Vec<String> = index
        .columns
        .iter()
        .map(|c| match c {
            IndexColumn::Name(name) => format!("`{}`", name),
            IndexColumn::Expression(e) if e.is_expression => e.expression.clone(),
            IndexColumn::Expression(e) => format!("`{}`", e.expression),
        })
        .collect();
    let predicate = index
        .predicate
        .as_ref()
        .map(|p| format!(" WHERE {}", p))
        .unwrap_or_default();
    format!(
        "CREATE {}INDEX `{}` ON `{}` ({}){};",
        if index.is_unique { "UNIQUE " } else { "" },
        index.name,
        table_name,
        columns.join(","),
        predicate
    )
}

fn quote_list(names: &[String], separator: &str) -> String {
    names
        .iter()
        .map(|n| format!("`{}`", n))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Comment left in place of a change SQLite cannot make.
fn manual_step(operation: &str) -> String {
    format!(
        "/*\n SQLite does not support \"{}\" out of the box, so no SQL was generated for it.\n See https://www.sqlite.org/lang_altertable.html for how to rebuild the table by hand.\n*/",
        operation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recreate(data_loss: bool) -> JsonStatement {
        JsonStatement::RecreateTable {
            table_name: "posts".to_string(),
            columns: vec![
                Column::new("id", "integer").primary_key().autoincrement(),
                Column::new("author_id", "integer").not_null(),
            ],
            composite_pks: vec![],
            unique_constraints: vec![],
            check_constraints: vec![],
            references: vec![ForeignKey {
                name: "posts_author_fk".to_string(),
                table_from: "posts".to_string(),
                columns_from: vec!["author_id".to_string()],
                table_to: "users".to_string(),
                columns_to: vec!["id".to_string()],
                schema_to: None,
                on_update: Some("no action".to_string()),
                on_delete: Some("cascade".to_string()),
            }],
            copied_columns: vec!["id".to_string(), "author_id".to_string()],
            data_loss,
        }
    }

    #[test]
    fn test_recreate_table_copies_rows() {
        let sql = SqliteConvertor
            .convert(&recreate(false), &ConvertContext::default())
            .unwrap();
        assert_eq!(
            sql,
            vec![
                "PRAGMA foreign_keys=OFF;",
                "CREATE TABLE `__new_posts` (\n\t`id` integer PRIMARY KEY AUTOINCREMENT NOT NULL,\n\t`author_id` integer NOT NULL,\n\tFOREIGN KEY (`author_id`) REFERENCES `users`(`id`) ON UPDATE no action ON DELETE cascade\n);",
                "INSERT INTO `__new_posts`(\"id\", \"author_id\") SELECT \"id\", \"author_id\" FROM `posts`;",
                "DROP TABLE `posts`;",
                "ALTER TABLE `__new_posts` RENAME TO `posts`;",
                "PRAGMA foreign_keys=ON;",
            ]
        );
    }

    #[test]
    fn test_recreate_for_push_with_data_loss() {
        let ctx = ConvertContext {
            action: Action::Push,
        };
        let sql = SqliteConvertor.convert(&recreate(true), &ctx).unwrap();
        assert!(!sql.iter().any(|s| s.starts_with("PRAGMA")));
        assert!(!sql.iter().any(|s| s.starts_with("INSERT INTO")));
        assert_eq!(sql[1], "DELETE FROM `posts`;");
    }

    #[test]
    fn test_unsupported_changes_become_comments() {
        let statement = JsonStatement::DeleteCompositePk {
            table_name: "t".to_string(),
            schema: String::new(),
            pk: PrimaryKey {
                name: "t_pk".to_string(),
                columns: vec!["a".to_string(), "b".to_string()],
            },
        };
        let sql = SqliteConvertor
            .convert(&statement, &ConvertContext::default())
            .unwrap();
        assert!(sql[0].starts_with("/*"));
        assert!(sql[0].contains("Drop composite primary key"));
    }

    #[test]
    fn test_add_column_with_reference() {
        let statement = JsonStatement::SqliteAlterTableAddColumn {
            table_name: "posts".to_string(),
            column: Column::new("editor_id", "integer"),
            reference: Some(ForeignKey {
                name: "posts_editor_fk".to_string(),
                table_from: "posts".to_string(),
                columns_from: vec!["editor_id".to_string()],
                table_to: "users".to_string(),
                columns_to: vec!["id".to_string()],
                schema_to: None,
                on_update: None,
                on_delete: Some("set null".to_string()),
            }),
        };
        assert_eq!(
            SqliteConvertor
                .convert(&statement, &ConvertContext::default())
                .unwrap(),
            vec!["ALTER TABLE `posts` ADD `editor_id` integer REFERENCES `users`(`id`) ON DELETE set null;"]
        );
    }

    #[test]
    fn test_libsql_alters_in_place() {
        let alter = ColumnAlter {
            table_name: "users".to_string(),
            schema: String::new(),
            column: Column::new("name", "text").default_value("'anon'"),
            previous: Column::new("name", "text"),
            in_composite_pk: false,
        };
        let statement = JsonStatement::AlterTableAlterColumnSetDefault(alter);
        assert_eq!(
            LibSqlConvertor
                .convert(&statement, &ConvertContext::default())
                .unwrap(),
            vec!["ALTER TABLE `users` ALTER COLUMN \"name\" TO \"name\" text DEFAULT 'anon';"]
        );
        assert!(
            SqliteConvertor
                .convert(&statement, &ConvertContext::default())
                .unwrap()[0]
                .starts_with("/*")
        );
    }
}
