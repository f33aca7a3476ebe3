//! MySQL convertor.

use drizzle_schema::{CheckConstraint, Column, Dialect, ForeignKey, Index, PrimaryKey, UniqueConstraint, View};

use super::{ConvertContext, StatementConvertor};
use crate::statement::{ColumnAlter, JsonStatement};

/// MySQL SQL generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlConvertor;

impl StatementConvertor for MySqlConvertor {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn convert(&self, statement: &JsonStatement, _ctx: &ConvertContext) -> Option<Vec<String>> {
        let sql = match statement {
            JsonStatement::CreateTable {
                table_name,
                columns,
                composite_pks,
                unique_constraints,
                check_constraints,
                ..
            } => vec![create_table(
                table_name,
                columns,
                composite_pks,
                unique_constraints,
                check_constraints,
            )],
            JsonStatement::DropTable { table_name, .. } => {
                vec![format!("DROP TABLE `{}`;", table_name)]
            }
            JsonStatement::RenameTable {
                table_name_from,
                table_name_to,
                ..
            } => vec![format!("RENAME TABLE `{}` TO `{}`;", table_name_from, table_name_to)],

            JsonStatement::AlterTableAddColumn {
                table_name, column, ..
            } => vec![format!(
                "ALTER TABLE `{}` ADD {};",
                table_name,
                column_def(column, true)
            )],
            JsonStatement::AlterTableDropColumn {
                table_name,
                column_name,
                ..
            } => vec![drop_column(table_name, column_name)],
            JsonStatement::AlterTableRenameColumn {
                table_name,
                old_column_name,
                new_column_name,
                ..
            } => vec![format!(
                "ALTER TABLE `{}` RENAME COLUMN `{}` TO `{}`;",
                table_name, old_column_name, new_column_name
            )],

            JsonStatement::AlterTableAlterColumnSetType(a)
            | JsonStatement::AlterTableAlterColumnSetDefault(a)
            | JsonStatement::AlterTableAlterColumnDropDefault(a)
            | JsonStatement::AlterTableAlterColumnSetNotnull(a)
            | JsonStatement::AlterTableAlterColumnDropNotnull(a)
            | JsonStatement::AlterTableAlterColumnSetAutoincrement(a)
            | JsonStatement::AlterTableAlterColumnDropAutoincrement(a)
            | JsonStatement::AlterTableAlterColumnSetOnUpdate(a)
            | JsonStatement::AlterTableAlterColumnDropOnUpdate(a)
            | JsonStatement::AlterTableAlterColumnDropGenerated(a) => vec![modify_column(a)],
            JsonStatement::AlterTableAlterColumnSetGenerated(a)
            | JsonStatement::AlterTableAlterColumnAlterGenerated(a) => regenerate_column(a),
            JsonStatement::AlterTableAlterColumnSetPk(a) => vec![format!(
                "ALTER TABLE `{}` ADD PRIMARY KEY (`{}`);",
                a.table_name, a.column.name
            )],
            JsonStatement::AlterTableAlterColumnDropPk(a) => {
                vec![format!("ALTER TABLE `{}` DROP PRIMARY KEY;", a.table_name)]
            }

            JsonStatement::CreateIndex {
                table_name, index, ..
            } => vec![create_index(table_name, index)],
            JsonStatement::DropIndex {
                table_name, index, ..
            } => vec![format!("DROP INDEX `{}` ON `{}`;", index.name, table_name)],

            JsonStatement::CreateReference { table_name, fk, .. } => {
                vec![create_reference(table_name, fk)]
            }
            JsonStatement::DeleteReference { table_name, fk, .. } => vec![format!(
                "ALTER TABLE `{}` DROP FOREIGN KEY `{}`;",
                table_name, fk.name
            )],

            JsonStatement::CreateCompositePk { table_name, pk, .. } => {
                vec![add_primary_key(table_name, pk)]
            }
            JsonStatement::DeleteCompositePk { table_name, .. } => {
                vec![format!("ALTER TABLE `{}` DROP PRIMARY KEY;", table_name)]
            }
            JsonStatement::AlterCompositePk {
                table_name, new, ..
            } => vec![
                format!("ALTER TABLE `{}` DROP PRIMARY KEY;", table_name),
                add_primary_key(table_name, new),
            ],

            JsonStatement::CreateUniqueConstraint {
                table_name, unique, ..
            } => vec![add_unique(table_name, unique)],
            JsonStatement::DeleteUniqueConstraint {
                table_name, unique, ..
            } => vec![format!("DROP INDEX `{}` ON `{}`;", unique.name, table_name)],
            JsonStatement::AlterUniqueConstraint {
                table_name,
                old,
                new,
                ..
            } => vec![
                format!("DROP INDEX `{}` ON `{}`;", old.name, table_name),
                add_unique(table_name, new),
            ],

            JsonStatement::CreateCheckConstraint {
                table_name, check, ..
            } => vec![format!(
                "ALTER TABLE `{}` ADD CONSTRAINT `{}` CHECK ({});",
                table_name, check.name, check.value
            )],
            JsonStatement::DeleteCheckConstraint {
                table_name, check, ..
            } => vec![format!(
                "ALTER TABLE `{}` DROP CONSTRAINT `{}`;",
                table_name, check.name
            )],

            JsonStatement::CreateView { view } => vec![view_sql("CREATE", view)],
            JsonStatement::AlterMysqlView { view } => vec![view_sql("ALTER", view)],
            JsonStatement::DropView { name, .. } => vec![format!("DROP VIEW `{}`;", name)],
            JsonStatement::RenameView {
                name_from, name_to, ..
            } => vec![format!("RENAME TABLE `{}` TO `{}`;", name_from, name_to)],

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
            | JsonStatement::RecreateTable { .. }
            | JsonStatement::SqliteAlterTableAddColumn { .. }
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
            | JsonStatement::AlterViewAlterSchema { .. }
            | JsonStatement::AlterViewAddWithOption { .. }
            | JsonStatement::AlterViewDropWithOption { .. }
            | JsonStatement::AlterViewAlterTablespace { .. }
            | JsonStatement::AlterViewAlterUsing { .. } => return None,
        };
        Some(sql)
    }
}

/// Column definition. `with_pk` is false for `MODIFY COLUMN`, which must not
/// restate the key.
pub(super) fn column_def(column: &Column, with_pk: bool) -> String {
    let mut sql = format!("`{}` {}", column.name, column.sql_type);

    if let Some(generated) = &column.generated {
        sql.push_str(&format!(
            " GENERATED ALWAYS AS ({}) {}",
            generated.expression,
            generated.kind.as_sql()
        ));
    }
    if column.autoincrement == Some(true) {
        sql.push_str(" AUTO_INCREMENT");
    }
    if with_pk && column.primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    if column.not_null {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(&format!(" DEFAULT {}", default));
    }
    if column.on_update == Some(true) {
        sql.push_str(" ON UPDATE CURRENT_TIMESTAMP");
    }

    sql
}

pub(super) fn create_table(
    name: &str,
    columns: &[Column],
    composite_pks: &[PrimaryKey],
    uniques: &[UniqueConstraint],
    checks: &[CheckConstraint],
) -> String {
    let mut lines: Vec<String> = columns
        .iter()
        .map(|c| format!("\t{}", column_def(c, true)))
        .collect();
    for pk in composite_pks {
        lines.push(format!(
            "\tCONSTRAINT `{}` PRIMARY KEY({})",
            pk.name,
            quote_list(&pk.columns)
        ));
    }
    for unique in uniques {
        lines.push(format!(
            "\tCONSTRAINT `{}` UNIQUE({})",
            unique.name,
            quote_list(&unique.columns)
        ));
    }
    for check in checks {
        lines.push(format!("\tCONSTRAINT `{}` CHECK({})", check.name, check.value));
    }
    format!("CREATE TABLE `{}` (\n{}\n);", name, lines.join(",\n"))
}

pub(super) fn modify_column(alter: &ColumnAlter) -> String {
    format!(
        "ALTER TABLE `{}` MODIFY COLUMN {};",
        alter.table_name,
        column_def(&alter.column, false)
    )
}

/// A stored expression cannot be attached to an existing column in place.
pub(super) fn regenerate_column(alter: &ColumnAlter) -> Vec<String> {
    vec![
        drop_column(&alter.table_name, &alter.column.name),
        format!(
            "ALTER TABLE `{}` ADD {};",
            alter.table_name,
            column_def(&alter.column, true)
        ),
    ]
}

pub(super) fn drop_column(table_name: &str, column_name: &str) -> String {
    format!("ALTER TABLE `{}` DROP COLUMN `{}`;", table_name, column_name)
}

pub(super) fn create_index(table_name: &str, index: &Index) -> String {
    let columns: Vec<String> = index
        .column_names()
        .into_iter()
        .map(|c| format!("`{}`", c))
        .collect();
    let mut sql = format!(
        "CREATE {}INDEX `{}` ON `{}` ({})",
        if index.is_unique { "UNIQUE " } else { "" },
        index.name,
        table_name,
        columns.join(",")
    );
    if let Some(using) = &index.using {
        sql.push_str(&format!(" USING {}", using));
    }
    if let Some(algorithm) = &index.algorithm {
        sql.push_str(&format!(" ALGORITHM={}", algorithm));
    }
    if let Some(lock) = &index.lock {
        sql.push_str(&format!(" LOCK={}", lock));
    }
    sql.push(';');
    sql
}

pub(super) fn add_primary_key(table_name: &str, pk: &PrimaryKey) -> String {
    format!(
        "ALTER TABLE `{}` ADD PRIMARY KEY({});",
        table_name,
        quote_list(&pk.columns)
    )
}

pub(super) fn add_unique(table_name: &str, unique: &UniqueConstraint) -> String {
    format!(
        "ALTER TABLE `{}` ADD CONSTRAINT `{}` UNIQUE({});",
        table_name,
        unique.name,
        quote_list(&unique.columns)
    )
}

fn create_reference(table_name: &str, fk: &ForeignKey) -> String {
    let mut sql = format!(
        "ALTER TABLE `{}` ADD CONSTRAINT `{}` FOREIGN KEY ({}) REFERENCES `{}`({})",
        table_name,
        fk.name,
        quote_list(&fk.columns_from),
        fk.table_to,
        quote_list(&fk.columns_to)
    );
    if let Some(on_delete) = &fk.on_delete {
        sql.push_str(&format!(" ON DELETE {}", on_delete));
    }
    if let Some(on_update) = &fk.on_update {
        sql.push_str(&format!(" ON UPDATE {}", on_update));
    }
    sql.push(';');
    sql
}

pub(super) fn view_sql(verb: &str, view: &View) -> String {
    let mut sql = verb.to_string();
    if let Some(algorithm) = &view.algorithm {
        sql.push_str(&format!(" ALGORITHM = {}", algorithm));
    }
    if let Some(security) = &view.sql_security {
        sql.push_str(&format!(" SQL SECURITY {}", security));
    }
    sql.push_str(&format!(
        " VIEW `{}` AS ({})",
        view.name,
        view.definition.as_deref().unwrap_or_default()
    ));
    if let Some(check) = &view.with_check_option {
        sql.push_str(&format!(" WITH {} CHECK OPTION", check));
    }
    sql.push(';');
    sql
}

pub(super) fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("`{}`", n))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use drizzle_schema::GeneratedKind;
    use pretty_assertions::assert_eq;

    fn render(statement: JsonStatement) -> Vec<String> {
        MySqlConvertor
            .convert(&statement, &ConvertContext::default())
            .unwrap()
    }

    #[test]
    fn test_create_table_with_keys() {
        let sql = render(JsonStatement::CreateTable {
            table_name: "memberships".to_string(),
            schema: String::new(),
            columns: vec![
                Column::new("user_id", "int").not_null(),
                Column::new("joined_at", "timestamp")
                    .not_null()
                    .default_value("(now())"),
            ],
            composite_pks: vec![PrimaryKey {
                name: "memberships_pk".to_string(),
                columns: vec!["user_id".to_string(), "joined_at".to_string()],
            }],
            unique_constraints: vec![],
            check_constraints: vec![CheckConstraint {
                name: "positive".to_string(),
                value: "`user_id` > 0".to_string(),
            }],
            references: vec![],
            is_rls_enabled: false,
        });
        assert_eq!(
            sql,
            vec!["CREATE TABLE `memberships` (\n\t`user_id` int NOT NULL,\n\t`joined_at` timestamp NOT NULL DEFAULT (now()),\n\tCONSTRAINT `memberships_pk` PRIMARY KEY(`user_id`,`joined_at`),\n\tCONSTRAINT `positive` CHECK(`user_id` > 0)\n);"]
        );
    }

    #[test]
    fn test_generated_column_is_recreated() {
        let column = Column::new("full_name", "text").generated("concat(`first`, `last`)", GeneratedKind::Stored);
        let sql = render(JsonStatement::AlterTableAlterColumnSetGenerated(ColumnAlter {
            table_name: "users".to_string(),
            schema: String::new(),
            previous: Column::new("full_name", "text"),
            column,
            in_composite_pk: false,
        }));
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE `users` DROP COLUMN `full_name`;",
                "ALTER TABLE `users` ADD `full_name` text GENERATED ALWAYS AS (concat(`first`, `last`)) STORED;",
            ]
        );
    }

    #[test]
    fn test_foreign_key_and_index() {
        let fk = ForeignKey {
            name: "posts_author_fk".to_string(),
            table_from: "posts".to_string(),
            columns_from: vec!["author_id".to_string()],
            table_to: "users".to_string(),
            columns_to: vec!["id".to_string()],
            schema_to: None,
            on_update: None,
            on_delete: Some("cascade".to_string()),
        };
        assert_eq!(
            render(JsonStatement::CreateReference {
                table_name: "posts".to_string(),
                schema: String::new(),
                fk,
            }),
            vec!["ALTER TABLE `posts` ADD CONSTRAINT `posts_author_fk` FOREIGN KEY (`author_id`) REFERENCES `users`(`id`) ON DELETE cascade;"]
        );

        let mut index = Index::new("posts_title_idx", ["title"]);
        index.using = Some("btree".to_string());
        assert_eq!(
            render(JsonStatement::CreateIndex {
                table_name: "posts".to_string(),
                schema: String::new(),
                index,
            }),
            vec!["CREATE INDEX `posts_title_idx` ON `posts` (`title`) USING btree;"]
        );
    }

    #[test]
    fn test_view_options() {
        let mut view = View::new("active_users", "select * from `users`");
        view.algorithm = Some("merge".to_string());
        view.sql_security = Some("invoker".to_string());
        view.with_check_option = Some("cascaded".to_string());
        assert_eq!(
            render(JsonStatement::AlterMysqlView { view }),
            vec!["ALTER ALGORITHM = merge SQL SECURITY invoker VIEW `active_users` AS (select * from `users`) WITH cascaded CHECK OPTION;"]
        );
    }
}
