//! Integration tests for `drizzle.toml` loading.

use std::io::Write;

use drizzle_kit::schema::config::MigrationPrefix;
use drizzle_kit::{Dialect, KitConfig};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Test minimal configuration
#[test]
fn test_config_minimal_from_file() {
    let file = write_config(r#"dialect = "postgresql""#);
    let config = KitConfig::from_file(file.path()).expect("Failed to load config");

    assert_eq!(config.dialect, Dialect::Postgresql);
    assert_eq!(config.out, "drizzle");
    assert!(config.breakpoints);
    assert!(!config.strict);
    assert_eq!(config.migrations.table, "__drizzle_migrations");
    assert!(!config.entities.roles);
}

/// Test full configuration with all options
#[test]
fn test_config_full_from_file() {
    let file = write_config(
        r#"
        dialect = "postgresql"
        out = "./db/migrations"
        breakpoints = false
        strict = true
        verbose = true

        [migrations]
        table = "schema_history"
        schema = "ops"
        prefix = "timestamp"

        [entities]
        roles = true
    "#,
    );
    let config = KitConfig::from_file(file.path()).expect("Failed to load config");

    assert_eq!(config.out, "./db/migrations");
    assert!(!config.breakpoints);
    assert!(config.strict);
    assert_eq!(config.migrations.schema.as_deref(), Some("ops"));
    assert_eq!(config.migrations.prefix, MigrationPrefix::Timestamp);
    assert!(config.entities.roles);
}

#[test]
fn test_config_dialect_aliases() {
    let config = KitConfig::from_str(r#"dialect = "libsql""#).unwrap();
    assert_eq!(config.dialect, Dialect::Turso);
}

#[test]
fn test_config_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = KitConfig::from_file(dir.path().join("drizzle.toml"));
    assert!(result.is_err());
}

#[test]
fn test_config_roles_require_postgres() {
    let file = write_config(
        r#"
        dialect = "mysql"

        [entities]
        roles = true
    "#,
    );
    assert!(KitConfig::from_file(file.path()).is_err());
}

#[test]
fn test_config_env_expansion() {
    // SAFETY: Test runs in isolation
    unsafe {
        std::env::set_var("DRIZZLE_KIT_TEST_OUT", "generated");
    }
    let file = write_config(
        r#"
        dialect = "sqlite"
        out = "${DRIZZLE_KIT_TEST_OUT}/migrations"
    "#,
    );
    let config = KitConfig::from_file(file.path()).unwrap();
    assert_eq!(config.out, "generated/migrations");
}

#[test]
fn test_breakpoints_join() {
    let statements = vec!["CREATE TABLE a;".to_string(), "CREATE TABLE b;".to_string()];

    let config = KitConfig::new(Dialect::Sqlite);
    assert_eq!(
        config.join_statements(&statements),
        "CREATE TABLE a;\n--> statement-breakpoint\nCREATE TABLE b;"
    );

    let config = KitConfig {
        breakpoints: false,
        ..KitConfig::new(Dialect::Sqlite)
    };
    assert_eq!(config.join_statements(&statements), "CREATE TABLE a;\nCREATE TABLE b;");
}
