//! End-to-end migration generation through the facade.

use drizzle_kit::prelude::*;
use drizzle_kit::schema::{Enum, Index, Role};
use pretty_assertions::assert_eq;

fn users() -> Table {
    Table::new("users")
        .column(Column::new("id", "serial").primary_key())
        .column(Column::new("name", "text"))
}

fn types(output: &DiffOutput) -> Vec<String> {
    output.statements.iter().map(|s| s.type_name()).collect()
}

#[tokio::test]
async fn test_add_column_with_default() {
    let config = KitConfig::new(Dialect::Postgresql);
    let prev = Snapshot::empty(Dialect::Postgresql).with_table(users());
    let cur = Snapshot::empty(Dialect::Postgresql).with_table(
        users().column(Column::new("age", "integer").not_null().default_value("0")),
    );

    let output = generate_migration(&config, &prev, &cur, &Resolvers::uniform(&NoRenames))
        .await
        .unwrap();
    assert_eq!(
        output.sql_statements,
        vec!["ALTER TABLE \"users\" ADD COLUMN \"age\" integer DEFAULT 0 NOT NULL;"]
    );
}

#[tokio::test]
async fn test_rename_is_recorded_in_meta() {
    let config = KitConfig::new(Dialect::Postgresql);
    let prev = Snapshot::empty(Dialect::Postgresql).with_table(users());
    let mut people = users();
    people.name = "people".to_string();
    let cur = Snapshot::empty(Dialect::Postgresql).with_table(people);

    let resolver = StaticResolver::new(["users->people"]);
    let output = generate_migration(&config, &prev, &cur, &Resolvers::uniform(&resolver))
        .await
        .unwrap();
    assert_eq!(types(&output), vec!["rename_table"]);
    assert_eq!(output.meta.tables.len(), 1);

    // Without the resolver the same change is a drop and a create.
    let output = generate_migration(&config, &prev, &cur, &Resolvers::uniform(&NoRenames))
        .await
        .unwrap();
    assert_eq!(types(&output), vec!["create_table", "drop_table"]);
    assert!(output.meta.is_empty());
}

#[tokio::test]
async fn test_index_dropped_before_column_alter() {
    let config = KitConfig::new(Dialect::Postgresql);
    let prev = Snapshot::empty(Dialect::Postgresql)
        .with_table(users().index(Index::new("users_name_idx", ["name"])));
    let mut changed = users();
    changed
        .columns
        .insert("name".to_string(), Column::new("name", "varchar(64)"));
    let cur = Snapshot::empty(Dialect::Postgresql).with_table(changed);

    let output = generate_migration(&config, &prev, &cur, &Resolvers::uniform(&NoRenames))
        .await
        .unwrap();
    assert_eq!(output.statements.len(), output.sql_statements.len());
    assert_eq!(output.sql_statements[0], "DROP INDEX \"users_name_idx\";");
}

#[tokio::test]
async fn test_enum_created_before_table() {
    let config = KitConfig::new(Dialect::Postgresql);
    let mood = Enum {
        name: "mood".to_string(),
        schema: "public".to_string(),
        values: vec!["sad".to_string(), "ok".to_string()],
    };
    let cur = Snapshot::empty(Dialect::Postgresql)
        .with_enum(mood)
        .with_table(users().column(Column::new("mood", "mood").type_schema("public")));

    let output = generate_migration(
        &config,
        &Snapshot::empty(Dialect::Postgresql),
        &cur,
        &Resolvers::uniform(&NoRenames),
    )
    .await
    .unwrap();
    assert_eq!(types(&output), vec!["create_type_enum", "create_table"]);
}

#[tokio::test]
async fn test_roles_ignored_unless_managed() {
    let mut cur = Snapshot::empty(Dialect::Postgresql);
    cur.roles.insert(
        "admin".to_string(),
        Role {
            name: "admin".to_string(),
            create_db: true,
            create_role: false,
            inherit: true,
        },
    );
    let prev = Snapshot::empty(Dialect::Postgresql);
    let resolvers = Resolvers::uniform(&NoRenames);

    let config = KitConfig::new(Dialect::Postgresql);
    let output = generate_migration(&config, &prev, &cur, &resolvers).await.unwrap();
    assert!(output.is_empty());

    let mut config = KitConfig::new(Dialect::Postgresql);
    config.entities.roles = true;
    let output = generate_migration(&config, &prev, &cur, &resolvers).await.unwrap();
    assert_eq!(types(&output), vec!["create_role"]);
}

#[tokio::test]
async fn test_sqlite_migration_file() {
    let config = KitConfig::new(Dialect::Sqlite);
    let base = || {
        Table::new("users")
            .column(Column::new("id", "integer").primary_key())
            .column(Column::new("name", "text"))
    };
    let prev = Snapshot::empty(Dialect::Sqlite).with_table(base());
    let mut changed = base();
    changed
        .columns
        .insert("name".to_string(), Column::new("name", "text").not_null());
    let cur = Snapshot::empty(Dialect::Sqlite).with_table(changed);

    let output = generate_migration(&config, &prev, &cur, &Resolvers::uniform(&NoRenames))
        .await
        .unwrap();
    let file = config.join_statements(&output.sql_statements);
    assert!(file.starts_with("PRAGMA foreign_keys=OFF;\n--> statement-breakpoint\n"));
    assert!(file.contains("INSERT INTO `__new_users`"));
    assert!(file.ends_with("PRAGMA foreign_keys=ON;"));
}

#[tokio::test]
async fn test_snapshots_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = KitConfig::new(Dialect::Mysql);
    config.out = dir.path().display().to_string();
    std::fs::create_dir_all(dir.path().join("meta")).unwrap();

    Snapshot::empty(Dialect::Mysql)
        .with_table(users())
        .save(config.snapshot_path(0))
        .unwrap();
    Snapshot::empty(Dialect::Mysql)
        .with_table(users().column(Column::new("email", "varchar(255)")))
        .save(config.snapshot_path(1))
        .unwrap();

    let prev = Snapshot::from_file(config.snapshot_path(0)).unwrap();
    let cur = Snapshot::from_file(config.snapshot_path(1)).unwrap();
    let output = generate_migration(&config, &prev, &cur, &Resolvers::uniform(&NoRenames))
        .await
        .unwrap();
    assert_eq!(
        output.sql_statements,
        vec!["ALTER TABLE `users` ADD `email` varchar(255);"]
    );

    let path = config.migration_path(1, "add_email", chrono::Utc::now());
    std::fs::write(&path, config.join_statements(&output.sql_statements)).unwrap();
    assert!(dir.path().join("0001_add_email.sql").exists());
}

#[tokio::test]
async fn test_dialect_mismatch_is_an_error() {
    let config = KitConfig::new(Dialect::Postgresql);
    let err = generate_migration(
        &config,
        &Snapshot::empty(Dialect::Mysql),
        &Snapshot::empty(Dialect::Postgresql),
        &Resolvers::uniform(&NoRenames),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MigrationError::DialectMismatch { .. }));
}
