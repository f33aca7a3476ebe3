//! SingleStore convertor.
//!
//! SingleStore speaks the MySQL dialect for most DDL but has no foreign keys
//! or check constraints, and rebuilds tables for key and column changes.

use drizzle_schema::Dialect;

use super::mysql::{self, MySqlConvertor};
use super::{ConvertContext, StatementConvertor};
use crate::statement::JsonStatement;

/// SingleStore SQL generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleStoreConvertor;

impl StatementConvertor for SingleStoreConvertor {
    fn dialect(&self) -> Dialect {
        Dialect::Singlestore
    }

    fn convert(&self, statement: &JsonStatement, ctx: &ConvertContext) -> Option<Vec<String>> {
        match statement {
            JsonStatement::RenameTable {
                table_name_from,
                table_name_to,
                ..
            } => Some(vec![format!(
                "ALTER TABLE `{}` RENAME TO `{}`;",
                table_name_from, table_name_to
            )]),
            JsonStatement::RecreateTable {
                table_name,
                columns,
                composite_pks,
                unique_constraints,
                copied_columns,
                data_loss,
                ..
            } => {
                let new_table = format!("__new_{}", table_name);
                let mut sql = vec![mysql::create_table(
                    &new_table,
                    columns,
                    composite_pks,
                    unique_constraints,
                    &[],
                )];
                if !data_loss {
                    let copied = mysql::quote_list(copied_columns);
                    sql.push(format!(
                        "INSERT INTO `{}`({}) SELECT {} FROM `{}`;",
                        new_table, copied, copied, table_name
                    ));
                }
                sql.push(format!("DROP TABLE `{}`;", table_name));
                sql.push(format!("ALTER TABLE `{}` RENAME TO `{}`;", new_table, table_name));
                Some(sql)
            }
            JsonStatement::CreateTable {
                table_name,
                columns,
                composite_pks,
                unique_constraints,
                ..
            } => Some(vec![mysql::create_table(
                table_name,
                columns,
                composite_pks,
                unique_constraints,
                &[],
            )]),
            JsonStatement::CreateReference { .. }
            | JsonStatement::DeleteReference { .. }
            | JsonStatement::CreateCheckConstraint { .. }
            | JsonStatement::DeleteCheckConstraint { .. } => None,
            other => MySqlConvertor.convert(other, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drizzle_schema::{Column, ForeignKey};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_recreate_table() {
        let statement = JsonStatement::RecreateTable {
            table_name: "users".to_string(),
            columns: vec![
                Column::new("id", "int").primary_key(),
                Column::new("email", "varchar(64)"),
            ],
            composite_pks: vec![],
            unique_constraints: vec![],
            check_constraints: vec![],
            references: vec![],
            copied_columns: vec!["id".to_string(), "email".to_string()],
            data_loss: false,
        };
        let sql = SingleStoreConvertor
            .convert(&statement, &ConvertContext::default())
            .unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE `__new_users` (\n\t`id` int PRIMARY KEY NOT NULL,\n\t`email` varchar(64)\n);",
                "INSERT INTO `__new_users`(`id`,`email`) SELECT `id`,`email` FROM `users`;",
                "DROP TABLE `users`;",
                "ALTER TABLE `__new_users` RENAME TO `users`;",
            ]
        );
    }

    #[test]
    fn test_no_foreign_keys() {
        let statement = JsonStatement::CreateReference {
            table_name: "posts".to_string(),
            schema: String::new(),
            fk: ForeignKey {
                name: "fk".to_string(),
                table_from: "posts".to_string(),
                columns_from: vec!["a".to_string()],
                table_to: "users".to_string(),
                columns_to: vec!["id".to_string()],
                schema_to: None,
                on_update: None,
                on_delete: None,
            },
        };
        assert!(
            SingleStoreConvertor
                .convert(&statement, &ConvertContext::default())
                .is_none()
        );
    }
}
