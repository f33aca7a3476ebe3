//! Delimited-string codec for schema entities.
//!
//! Older snapshot files stored indexes, keys and constraints as single
//! `;`-separated strings. The differ works on typed entities, so this codec only
//! exists to read (and, for tooling, write) that legacy encoding.
//!
//! Each dialect family has its own layout:
//!
//! | entity      | postgres                                                  | mysql / singlestore           | sqlite                   |
//! |-------------|-----------------------------------------------------------|-------------------------------|--------------------------|
//! | index       | `name;col--expr--asc--nulls--opclass,,...;unique;conc;method;where;with` | `name;cols;unique;using;algorithm;lock` | `name;cols;unique;where` |
//! | foreign key | `name;from;cols;to;cols;onUpdate;onDelete;schemaTo`       | `name;from;cols;to;cols;onUpdate;onDelete` | same as mysql |
//! | primary key | `cols;name`                                               | `name;cols`                   | `cols`                   |
//! | unique      | `name;cols;nullsNotDistinct`                              | `name;cols`                   | `name;cols`              |
//! | check       | `name;value`                                              | `name;value`                  | `name;value`             |

use std::collections::BTreeMap;

use super::entity::{
    CheckConstraint, ExpressionColumn, ForeignKey, Identity, IdentityKind, Index, IndexColumn,
    Policy, PrimaryKey, SequenceOptions, UniqueConstraint,
};
use super::Dialect;
use crate::error::{SchemaError, SchemaResult};

/// Squash an index.
pub fn squash_index(index: &Index, dialect: Dialect) -> String {
    match dialect.snapshot_family() {
        Dialect::Postgresql => {
            let columns: Vec<String> = index
                .columns
                .iter()
                .map(|c| match c {
                    IndexColumn::Name(name) => format!("{}--false--true--last--undefined", name),
                    IndexColumn::Expression(e) => format!(
                        "{}--{}--{}--{}--{}",
                        e.expression,
                        e.is_expression,
                        e.asc,
                        e.nulls.as_deref().unwrap_or("undefined"),
                        e.opclass.as_deref().unwrap_or("undefined"),
                    ),
                })
                .collect();
            let with = serde_json::to_string(&index.with).unwrap_or_else(|_| "{}".to_string());
            format!(
                "{};{};{};{};{};{};{}",
                index.name,
                columns.join(",,"),
                index.is_unique,
                index.concurrently,
                index.method.as_deref().unwrap_or("btree"),
                index.predicate.as_deref().unwrap_or(""),
                with
            )
        }
        Dialect::Sqlite => format!(
            "{};{};{};{}",
            index.name,
            plain_columns(index).join(","),
            index.is_unique,
            index.predicate.as_deref().unwrap_or("")
        ),
        _ => format!(
            "{};{};{};{};{};{}",
            index.name,
            plain_columns(index).join(","),
            index.is_unique,
            index.using.as_deref().unwrap_or(""),
            index.algorithm.as_deref().unwrap_or(""),
            index.lock.as_deref().unwrap_or("")
        ),
    }
}

/// Decode a squashed index.
pub fn unsquash_index(value: &str, dialect: Dialect) -> SchemaResult<Index> {
    let parts: Vec<&str> = value.split(';').collect();
    if parts.len() < 3 {
        return Err(SchemaError::malformed_squash("index", value));
    }

    let mut index = Index::new(parts[0], Vec::<String>::new());
    index.is_unique = parts[2] == "true";

    match dialect.snapshot_family() {
        Dialect::Postgresql => {
            index.columns = parts[1]
                .split(",,")
                .filter(|c| !c.is_empty())
                .map(|c| {
                    if !c.contains("--") {
                        return IndexColumn::Expression(ExpressionColumn::column(c));
                    }
                    let fields: Vec<&str> = c.split("--").collect();
                    IndexColumn::Expression(ExpressionColumn {
                        expression: fields[0].to_string(),
                        is_expression: fields.get(1) == Some(&"true"),
                        asc: fields.get(2) != Some(&"false"),
                        nulls: fields.get(3).and_then(|s| defined(s)),
                        opclass: fields.get(4).and_then(|s| defined(s)),
                    })
                })
                .collect();
            index.concurrently = parts.get(3) == Some(&"true");
            index.method = parts.get(4).and_then(|s| defined(s));
            if parts.len() >= 7 {
                let predicate = parts[5..parts.len() - 1].join(";");
                index.predicate = defined(&predicate);
                let with: BTreeMap<String, serde_json::Value> =
                    serde_json::from_str(parts[parts.len() - 1]).unwrap_or_default();
                index.with = with
                    .into_iter()
                    .map(|(k, v)| match v {
                        serde_json::Value::String(s) => (k, s),
                        other => (k, other.to_string()),
                    })
                    .collect();
            } else {
                index.predicate = parts.get(5).and_then(|s| defined(s));
            }
        }
        Dialect::Sqlite => {
            index.columns = split_list(parts[1]).into_iter().map(IndexColumn::Name).collect();
            if parts.len() > 3 {
                index.predicate = defined(&parts[3..].join(";"));
            }
        }
        _ => {
            index.columns = split_list(parts[1]).into_iter().map(IndexColumn::Name).collect();
            index.using = parts.get(3).and_then(|s| defined(s));
            index.algorithm = parts.get(4).and_then(|s| defined(s));
            index.lock = parts.get(5).and_then(|s| defined(s));
        }
    }

    Ok(index)
}

/// Squash a foreign key.
pub fn squash_fk(fk: &ForeignKey, dialect: Dialect) -> String {
    let base = format!(
        "{};{};{};{};{};{};{}",
        fk.name,
        fk.table_from,
        fk.columns_from.join(","),
        fk.table_to,
        fk.columns_to.join(","),
        fk.on_update.as_deref().unwrap_or(""),
        fk.on_delete.as_deref().unwrap_or("")
    );
    if dialect.snapshot_family() == Dialect::Postgresql {
        format!("{};{}", base, fk.schema_to.as_deref().unwrap_or("public"))
    } else {
        base
    }
}

/// Decode a squashed foreign key.
pub fn unsquash_fk(value: &str, dialect: Dialect) -> SchemaResult<ForeignKey> {
    let parts: Vec<&str> = value.split(';').collect();
    if parts.len() < 5 {
        return Err(SchemaError::malformed_squash("foreign key", value));
    }
    let schema_to = if dialect.snapshot_family() == Dialect::Postgresql {
        parts.get(7).and_then(|s| defined(s))
    } else {
        None
    };
    Ok(ForeignKey {
        name: parts[0].to_string(),
        table_from: parts[1].to_string(),
        columns_from: split_list(parts[2]),
        table_to: parts[3].to_string(),
        columns_to: split_list(parts[4]),
        schema_to,
        on_update: parts.get(5).and_then(|s| defined(s)),
        on_delete: parts.get(6).and_then(|s| defined(s)),
    })
}

/// Squash a composite primary key.
pub fn squash_pk(pk: &PrimaryKey, dialect: Dialect) -> String {
    match dialect.snapshot_family() {
        Dialect::Postgresql => format!("{};{}", pk.columns.join(","), pk.name),
        Dialect::Sqlite => pk.columns.join(","),
        _ => format!("{};{}", pk.name, pk.columns.join(",")),
    }
}

/// Decode a squashed composite primary key. `key` names the constraint when
/// the encoding does not carry it.
pub fn unsquash_pk(value: &str, key: &str, dialect: Dialect) -> SchemaResult<PrimaryKey> {
    let (name, columns) = match dialect.snapshot_family() {
        Dialect::Postgresql => match value.split_once(';') {
            Some((cols, name)) => (name, cols),
            None => (key, value),
        },
        Dialect::Sqlite => (key, value),
        _ => value
            .split_once(';')
            .ok_or_else(|| SchemaError::malformed_squash("primary key", value))?,
    };
    Ok(PrimaryKey {
        name: name.to_string(),
        columns: split_list(columns),
    })
}

/// Squash a unique constraint.
pub fn squash_unique(unique: &UniqueConstraint, dialect: Dialect) -> String {
    if dialect.snapshot_family() == Dialect::Postgresql {
        format!(
            "{};{};{}",
            unique.name,
            unique.columns.join(","),
            unique.nulls_not_distinct
        )
    } else {
        format!("{};{}", unique.name, unique.columns.join(","))
    }
}

/// Decode a squashed unique constraint.
pub fn unsquash_unique(value: &str) -> SchemaResult<UniqueConstraint> {
    let parts: Vec<&str> = value.split(';').collect();
    if parts.len() < 2 {
        return Err(SchemaError::malformed_squash("unique constraint", value));
    }
    Ok(UniqueConstraint {
        name: parts[0].to_string(),
        columns: split_list(parts[1]),
        nulls_not_distinct: parts.get(2) == Some(&"true"),
    })
}

/// Squash a check constraint.
pub fn squash_check(check: &CheckConstraint) -> String {
    format!("{};{}", check.name, check.value)
}

/// Decode a squashed check constraint.
pub fn unsquash_check(value: &str) -> SchemaResult<CheckConstraint> {
    let (name, expr) = value
        .split_once(';')
        .ok_or_else(|| SchemaError::malformed_squash("check constraint", value))?;
    Ok(CheckConstraint {
        name: name.to_string(),
        value: expr.to_string(),
    })
}

/// Squash a policy.
pub fn squash_policy(policy: &Policy) -> String {
    format!(
        "{}--{}--{}--{}--{}--{}--{}",
        policy.name,
        policy.kind.as_deref().unwrap_or("undefined"),
        policy.command.as_deref().unwrap_or("undefined"),
        policy.to.join(","),
        policy.using.as_deref().unwrap_or("undefined"),
        policy.with_check.as_deref().unwrap_or("undefined"),
        policy.on.as_deref().unwrap_or("undefined")
    )
}

/// Decode a squashed policy.
pub fn unsquash_policy(value: &str) -> SchemaResult<Policy> {
    let parts: Vec<&str> = value.split("--").collect();
    if parts.len() < 6 {
        return Err(SchemaError::malformed_squash("policy", value));
    }
    Ok(Policy {
        name: parts[0].to_string(),
        kind: defined(parts[1]),
        command: defined(parts[2]),
        to: split_list(parts[3]),
        using: defined(parts[4]),
        with_check: defined(parts[5]),
        on: parts.get(6).and_then(|s| defined(s)),
    })
}

/// Squash sequence options.
pub fn squash_sequence(options: &SequenceOptions) -> String {
    format!(
        "{};{};{};{};{};{}",
        options.min_value.as_deref().unwrap_or(""),
        options.max_value.as_deref().unwrap_or(""),
        options.increment.as_deref().unwrap_or(""),
        options.start_with.as_deref().unwrap_or(""),
        options.cache.as_deref().unwrap_or(""),
        options.cycle.map(|c| c.to_string()).unwrap_or_default()
    )
}

/// Decode squashed sequence options.
pub fn unsquash_sequence(value: &str) -> SchemaResult<SequenceOptions> {
    let parts: Vec<&str> = value.split(';').collect();
    if parts.len() < 5 {
        return Err(SchemaError::malformed_squash("sequence", value));
    }
    Ok(sequence_options(&parts))
}

/// Squash an identity column definition.
pub fn squash_identity(identity: &Identity) -> String {
    let kind = match identity.kind {
        IdentityKind::Always => "always",
        IdentityKind::ByDefault => "byDefault",
    };
    format!(
        "{};{};{}",
        identity.name,
        kind,
        squash_sequence(&identity.options)
    )
}

/// Decode a squashed identity column definition.
pub fn unsquash_identity(value: &str) -> SchemaResult<Identity> {
    let parts: Vec<&str> = value.split(';').collect();
    if parts.len() < 7 {
        return Err(SchemaError::malformed_squash("identity", value));
    }
    let kind = match parts[1] {
        "always" => IdentityKind::Always,
        "byDefault" => IdentityKind::ByDefault,
        _ => return Err(SchemaError::malformed_squash("identity", value)),
    };
    Ok(Identity {
        name: parts[0].to_string(),
        kind,
        schema: None,
        options: sequence_options(&parts[2..]),
    })
}

fn sequence_options(parts: &[&str]) -> SequenceOptions {
    SequenceOptions {
        min_value: parts.first().and_then(|s| defined(s)),
        max_value: parts.get(1).and_then(|s| defined(s)),
        increment: parts.get(2).and_then(|s| defined(s)),
        start_with: parts.get(3).and_then(|s| defined(s)),
        cache: parts.get(4).and_then(|s| defined(s)),
        cycle: parts.get(5).and_then(|s| defined(s)).map(|s| s == "true"),
    }
}

fn plain_columns(index: &Index) -> Vec<&str> {
    index
        .columns
        .iter()
        .map(|c| match c {
            IndexColumn::Name(name) => name.as_str(),
            IndexColumn::Expression(e) => e.expression.as_str(),
        })
        .collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn defined(value: &str) -> Option<String> {
    match value {
        "" | "undefined" | "null" => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unsquash_pg_index() {
        let idx = unsquash_index(
            "users_email_idx;email--false--true--last--undefined,,lower(name)--true--false--first--text_ops;true;false;btree;;{\"fillfactor\":70}",
            Dialect::Postgresql,
        )
        .unwrap();
        assert_eq!(idx.name, "users_email_idx");
        assert!(idx.is_unique);
        assert_eq!(idx.method.as_deref(), Some("btree"));
        assert_eq!(idx.predicate, None);
        assert_eq!(idx.with.get("fillfactor").map(String::as_str), Some("70"));
        match &idx.columns[1] {
            IndexColumn::Expression(e) => {
                assert!(e.is_expression);
                assert!(!e.asc);
                assert_eq!(e.opclass.as_deref(), Some("text_ops"));
            }
            other => panic!("unexpected column {:?}", other),
        }
    }

    #[test]
    fn test_pg_index_squash_is_stable() {
        let idx = unsquash_index(
            "i;a--false--true--last--undefined;false;false;btree;a > 1;{}",
            Dialect::Postgresql,
        )
        .unwrap();
        assert_eq!(idx.predicate.as_deref(), Some("a > 1"));
        assert_eq!(
            squash_index(&idx, Dialect::Postgresql),
            "i;a--false--true--last--undefined;false;false;btree;a > 1;{}"
        );
    }

    #[test]
    fn test_sqlite_index_with_where() {
        let idx = unsquash_index("i;a,b;true;deleted_at is null", Dialect::Sqlite).unwrap();
        assert_eq!(idx.column_names(), vec!["a", "b"]);
        assert_eq!(idx.predicate.as_deref(), Some("deleted_at is null"));
    }

    #[test]
    fn test_fk_codec_per_family() {
        let fk = unsquash_fk(
            "posts_user_fk;posts;user_id;users;id;no action;cascade;auth",
            Dialect::Postgresql,
        )
        .unwrap();
        assert_eq!(fk.schema_to.as_deref(), Some("auth"));
        assert_eq!(fk.on_delete.as_deref(), Some("cascade"));

        let fk = unsquash_fk("fk;posts;a,b;users;x,y;;", Dialect::Mysql).unwrap();
        assert_eq!(fk.columns_from, vec!["a", "b"]);
        assert_eq!(fk.on_update, None);
        assert_eq!(squash_fk(&fk, Dialect::Mysql), "fk;posts;a,b;users;x,y;;");
    }

    #[test]
    fn test_pk_layouts() {
        let pk = unsquash_pk("a,b;t_pk", "ignored", Dialect::Postgresql).unwrap();
        assert_eq!(pk.name, "t_pk");
        let pk = unsquash_pk("t_pk;a,b", "ignored", Dialect::Mysql).unwrap();
        assert_eq!(pk.columns, vec!["a", "b"]);
        let pk = unsquash_pk("a,b", "t_a_b_pk", Dialect::Sqlite).unwrap();
        assert_eq!(pk.name, "t_a_b_pk");
    }

    #[test]
    fn test_check_keeps_semicolons_in_expression() {
        let check = unsquash_check("c;price > 0; -- odd").unwrap();
        assert_eq!(check.value, "price > 0; -- odd");
    }

    #[test]
    fn test_policy_and_identity() {
        let policy = unsquash_policy("p--PERMISSIVE--ALL--public--true--undefined").unwrap();
        assert_eq!(policy.to, vec!["public"]);
        assert_eq!(policy.with_check, None);

        let identity = unsquash_identity("users_id_seq;always;1;2147483647;1;1;1;false").unwrap();
        assert_eq!(identity.kind, IdentityKind::Always);
        assert_eq!(identity.options.max_value.as_deref(), Some("2147483647"));
        assert_eq!(identity.options.cycle, Some(false));
        assert_eq!(
            squash_identity(&identity),
            "users_id_seq;always;1;2147483647;1;1;1;false"
        );
    }

    #[test]
    fn test_malformed_values() {
        assert!(unsquash_index("only_name", Dialect::Mysql).is_err());
        assert!(unsquash_check("no-separator").is_err());
        assert!(unsquash_identity("x;sometimes;1;1;1;1;1").is_err());
    }
}
