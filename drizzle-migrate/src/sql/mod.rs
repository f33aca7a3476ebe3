//! Rendering of JSON statements to SQL.
//!
//! Each dialect has one convertor that matches on [`JsonStatement`]. A
//! convertor returns `None` for statements its engine has no syntax for; the
//! registry turns that into [`MigrationError::MissingConvertor`] instead of
//! dropping the statement.

mod mysql;
mod postgres;
mod singlestore;
mod sqlite;

pub use mysql::MySqlConvertor;
pub use postgres::PgConvertor;
pub use singlestore::SingleStoreConvertor;
pub use sqlite::{LibSqlConvertor, SqliteConvertor};

use drizzle_schema::Dialect;

use crate::error::{MigrateResult, MigrationError};
use crate::orchestrator::Action;
use crate::statement::JsonStatement;

/// Options that influence rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertContext {
    /// Whether the SQL is written to a file or executed right away.
    pub action: Action,
}

/// Renders statements for one dialect.
pub trait StatementConvertor: Send + Sync {
    /// Dialect this convertor targets.
    fn dialect(&self) -> Dialect;

    /// SQL for one statement, or `None` when the dialect cannot express it.
    fn convert(&self, statement: &JsonStatement, ctx: &ConvertContext) -> Option<Vec<String>>;
}

/// Convertor lookup, built once per run.
pub struct ConvertorRegistry {
    convertor: Box<dyn StatementConvertor>,
}

impl ConvertorRegistry {
    /// Registry for a dialect.
    pub fn for_dialect(dialect: Dialect) -> Self {
        let convertor: Box<dyn StatementConvertor> = match dialect {
            Dialect::Postgresql => Box::new(PgConvertor),
            Dialect::Mysql => Box::new(MySqlConvertor),
            Dialect::Sqlite => Box::new(SqliteConvertor),
            Dialect::Turso => Box::new(LibSqlConvertor),
            Dialect::Singlestore => Box::new(SingleStoreConvertor),
        };
        Self { convertor }
    }

    /// Render every statement, in order.
    pub fn convert_all(&self, statements: &[JsonStatement], action: Action) -> MigrateResult<Vec<String>> {
        let ctx = ConvertContext { action };
        let mut sql = Vec::new();
        for statement in statements {
            match self.convertor.convert(statement, &ctx) {
                Some(lines) => sql.extend(lines),
                None => {
                    let dialect = self.convertor.dialect();
                    tracing::error!(
                        statement = %statement.type_name(),
                        dialect = %dialect,
                        "No convertor for statement"
                    );
                    return Err(MigrationError::MissingConvertor {
                        statement: statement.type_name(),
                        dialect,
                    });
                }
            }
        }
        Ok(sql)
    }
}

impl std::fmt::Debug for ConvertorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvertorRegistry")
            .field("dialect", &self.convertor.dialect())
            .finish()
    }
}

/// Render statements for a dialect.
pub fn from_json(statements: &[JsonStatement], dialect: Dialect, action: Action) -> MigrateResult<Vec<String>> {
    ConvertorRegistry::for_dialect(dialect).convert_all(statements, action)
}

/// Quote a string literal.
pub(crate) fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `checkOption` -> `check_option`.
pub(crate) fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use drizzle_schema::SequenceOptions;

    #[test]
    fn test_missing_convertor_is_an_error() {
        let statements = vec![JsonStatement::CreateSequence {
            name: "ids".to_string(),
            schema: "public".to_string(),
            values: SequenceOptions::default(),
        }];
        let err = from_json(&statements, Dialect::Mysql, Action::Generate).unwrap_err();
        assert!(matches!(
            err,
            MigrationError::MissingConvertor {
                dialect: Dialect::Mysql,
                ..
            }
        ));
        assert!(err.to_string().contains("create_sequence"));
    }

    #[test]
    fn test_helpers() {
        assert_eq!(literal("it's"), "'it''s'");
        assert_eq!(to_snake_case("checkOption"), "check_option");
        assert_eq!(to_snake_case("fillfactor"), "fillfactor");
    }

    #[test]
    fn test_registry_debug() {
        let registry = ConvertorRegistry::for_dialect(Dialect::Turso);
        assert!(format!("{:?}", registry).contains("turso"));
    }
}
