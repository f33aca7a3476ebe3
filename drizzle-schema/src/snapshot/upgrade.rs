//! Upgrades for snapshot files written by older releases.
//!
//! Snapshots on disk are never rewritten in place; every load runs the raw JSON
//! through [`upgrade`] before it is deserialized into [`Snapshot`](super::Snapshot).

use serde_json::{Map, Value, json};

use super::Dialect;
use super::squash;
use crate::error::{SchemaError, SchemaResult};

/// Bring a raw snapshot up to the latest version of its dialect.
pub fn upgrade(mut value: Value) -> SchemaResult<Value> {
    let dialect = read_dialect(&value)?;
    let version = read_version(&value)?;
    let latest: u32 = dialect.latest_version().parse().unwrap_or(1);

    if version > latest {
        return Err(SchemaError::UnsupportedVersion {
            dialect: dialect.to_string(),
            found: version.to_string(),
            latest: latest.to_string(),
        });
    }

    if version < latest {
        tracing::debug!(
            dialect = %dialect,
            from = version,
            to = latest,
            "Upgrading snapshot"
        );
    }

    if version < 2 {
        collapse_column_references(&mut value);
    }

    decode_squashed_entities(&mut value, dialect)?;

    if dialect == Dialect::Postgresql {
        if version < 6 {
            pg_qualify_keys(&mut value);
        }
        if version < 7 {
            pg_expand_index_columns(&mut value);
        }
    }

    if let Some(obj) = value.as_object_mut() {
        obj.insert("version".to_string(), Value::String(latest.to_string()));
    }
    Ok(value)
}

fn read_dialect(value: &Value) -> SchemaResult<Dialect> {
    let raw = value
        .get("dialect")
        .cloned()
        .ok_or_else(|| SchemaError::invalid_snapshot("missing `dialect`"))?;
    let dialect: Dialect = serde_json::from_value(raw)?;
    Ok(dialect.snapshot_family())
}

fn read_version(value: &Value) -> SchemaResult<u32> {
    match value.get("version") {
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| SchemaError::invalid_snapshot(format!("bad version `{}`", s))),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| n as u32)
            .ok_or_else(|| SchemaError::invalid_snapshot(format!("bad version `{}`", n))),
        _ => Err(SchemaError::invalid_snapshot("missing `version`")),
    }
}

fn tables_mut(value: &mut Value) -> impl Iterator<Item = &mut Map<String, Value>> {
    value
        .get_mut("tables")
        .and_then(Value::as_object_mut)
        .into_iter()
        .flat_map(|tables| tables.values_mut())
        .filter_map(Value::as_object_mut)
}

/// v1 kept foreign keys as a structured `references` object on the column.
fn collapse_column_references(value: &mut Value) {
    for table in tables_mut(value) {
        let table_name = table
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut moved = Vec::new();
        if let Some(columns) = table.get_mut("columns").and_then(Value::as_object_mut) {
            for (column_name, column) in columns.iter_mut() {
                let Some(column) = column.as_object_mut() else {
                    continue;
                };
                let Some(Value::Object(reference)) = column.remove("references") else {
                    continue;
                };
                let text = |key: &str| reference.get(key).and_then(Value::as_str).map(str::to_string);
                let table_to = text("table").unwrap_or_default();
                let name = text("foreignKeyName")
                    .unwrap_or_else(|| format!("{}_{}_{}_fk", table_name, column_name, table_to));
                moved.push((
                    name.clone(),
                    json!({
                        "name": name,
                        "tableFrom": table_name,
                        "columnsFrom": [column_name],
                        "tableTo": table_to,
                        "columnsTo": [text("column").unwrap_or_default()],
                        "onDelete": text("onDelete"),
                        "onUpdate": text("onUpdate"),
                    }),
                ));
            }
        }

        if moved.is_empty() {
            continue;
        }
        let fks = table
            .entry("foreignKeys")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(fks) = fks.as_object_mut() {
            for (name, fk) in moved {
                fks.insert(name, fk);
            }
        }
    }
}

/// Replace any squashed string values with the typed object.
fn decode_squashed_entities(value: &mut Value, dialect: Dialect) -> SchemaResult<()> {
    for table in tables_mut(value) {
        decode_collection(table, "indexes", |_, s| {
            Ok(serde_json::to_value(squash::unsquash_index(s, dialect)?)?)
        })?;
        decode_collection(table, "foreignKeys", |_, s| {
            Ok(serde_json::to_value(squash::unsquash_fk(s, dialect)?)?)
        })?;
        decode_collection(table, "compositePrimaryKeys", |key, s| {
            Ok(serde_json::to_value(squash::unsquash_pk(s, key, dialect)?)?)
        })?;
        decode_collection(table, "uniqueConstraints", |_, s| {
            Ok(serde_json::to_value(squash::unsquash_unique(s)?)?)
        })?;
        decode_collection(table, "checkConstraints", |_, s| {
            Ok(serde_json::to_value(squash::unsquash_check(s)?)?)
        })?;
        decode_collection(table, "policies", |_, s| {
            Ok(serde_json::to_value(squash::unsquash_policy(s)?)?)
        })?;
    }
    if let Some(root) = value.as_object_mut() {
        decode_collection(root, "policies", |_, s| {
            Ok(serde_json::to_value(squash::unsquash_policy(s)?)?)
        })?;
    }
    Ok(())
}

fn decode_collection<F>(owner: &mut Map<String, Value>, key: &str, decode: F) -> SchemaResult<()>
where
    F: Fn(&str, &str) -> SchemaResult<Value>,
{
    let Some(collection) = owner.get_mut(key).and_then(Value::as_object_mut) else {
        return Ok(());
    };
    for (name, entry) in collection.iter_mut() {
        if let Value::String(squashed) = entry {
            *entry = decode(name, squashed)?;
        }
    }
    Ok(())
}

/// v6 keyed tables and enums by `schema.name`; enum values became a list.
fn pg_qualify_keys(value: &mut Value) {
    let Some(root) = value.as_object_mut() else {
        return;
    };

    if let Some(Value::Object(tables)) = root.remove("tables") {
        let rekeyed: Map<String, Value> = tables
            .into_iter()
            .map(|(key, table)| {
                let schema = table
                    .get("schema")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .unwrap_or("public");
                let name = table.get("name").and_then(Value::as_str).unwrap_or(&key);
                (format!("{}.{}", schema, name), table)
            })
            .collect();
        root.insert("tables".to_string(), Value::Object(rekeyed));
    }

    if let Some(Value::Object(enums)) = root.remove("enums") {
        let rekeyed: Map<String, Value> = enums
            .into_iter()
            .map(|(key, mut e)| {
                let name = e
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(&key)
                    .to_string();
                let schema = e
                    .get("schema")
                    .and_then(Value::as_str)
                    .unwrap_or("public")
                    .to_string();
                if let Some(obj) = e.as_object_mut() {
                    obj.insert("schema".to_string(), Value::String(schema.clone()));
                    if let Some(Value::Object(values)) = obj.remove("values") {
                        let list: Vec<Value> = values.into_iter().map(|(_, v)| v).collect();
                        obj.insert("values".to_string(), Value::Array(list));
                    }
                }
                let qualified = if key.contains('.') {
                    key
                } else {
                    format!("{}.{}", schema, name)
                };
                (qualified, e)
            })
            .collect();
        root.insert("enums".to_string(), Value::Object(rekeyed));
    }

    root.entry("sequences")
        .or_insert_with(|| Value::Object(Map::new()));
}

/// v7 index columns are objects with ordering options.
fn pg_expand_index_columns(value: &mut Value) {
    for table in tables_mut(value) {
        let Some(indexes) = table.get_mut("indexes").and_then(Value::as_object_mut) else {
            continue;
        };
        for index in indexes.values_mut().filter_map(Value::as_object_mut) {
            if let Some(Value::Array(columns)) = index.get_mut("columns") {
                for column in columns.iter_mut() {
                    if let Value::String(name) = column {
                        *column = json!({
                            "expression": name,
                            "isExpression": false,
                            "asc": true,
                            "nulls": "last",
                        });
                    }
                }
            }
            index
                .entry("method")
                .or_insert_with(|| Value::String("btree".to_string()));
            index
                .entry("with")
                .or_insert_with(|| Value::Object(Map::new()));
            index.entry("concurrently").or_insert(Value::Bool(false));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{IndexColumn, Snapshot};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rejects_future_version() {
        let raw = json!({"version": "99", "dialect": "mysql", "tables": {}});
        assert!(matches!(
            upgrade(raw),
            Err(SchemaError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_v1_references_become_foreign_keys() {
        let raw = json!({
            "version": "1",
            "dialect": "sqlite",
            "tables": {
                "posts": {
                    "name": "posts",
                    "columns": {
                        "author_id": {
                            "name": "author_id",
                            "type": "integer",
                            "primaryKey": false,
                            "notNull": true,
                            "references": {
                                "foreignKeyName": "posts_author_fk",
                                "table": "users",
                                "column": "id",
                                "onDelete": "cascade"
                            }
                        }
                    },
                    "indexes": {}
                }
            }
        });

        let snapshot = Snapshot::from_value(raw).unwrap();
        assert_eq!(snapshot.version, "6");
        let fk = &snapshot.tables["posts"].foreign_keys["posts_author_fk"];
        assert_eq!(fk.table_to, "users");
        assert_eq!(fk.columns_from, vec!["author_id"]);
        assert_eq!(fk.on_delete.as_deref(), Some("cascade"));
        assert_eq!(fk.on_update, None);
    }

    #[test]
    fn test_squashed_values_are_decoded() {
        let raw = json!({
            "version": "5",
            "dialect": "mysql",
            "tables": {
                "users": {
                    "name": "users",
                    "columns": {},
                    "indexes": {"email_idx": "email_idx;email;true;;;"},
                    "compositePrimaryKeys": {"users_pk": "users_pk;a,b"},
                    "uniqueConstraints": {"u": "u;email"}
                }
            }
        });

        let snapshot = Snapshot::from_value(raw).unwrap();
        let table = &snapshot.tables["users"];
        assert!(table.indexes["email_idx"].is_unique);
        assert_eq!(table.composite_primary_keys["users_pk"].columns, vec!["a", "b"]);
        assert_eq!(table.unique_constraints["u"].columns, vec!["email"]);
    }

    #[test]
    fn test_pg_v5_is_requalified_and_expanded() {
        let raw = json!({
            "version": "5",
            "dialect": "pg",
            "tables": {
                "users": {
                    "name": "users",
                    "schema": "",
                    "columns": {
                        "mood": {"name": "mood", "type": "mood", "primaryKey": false, "notNull": false}
                    },
                    "indexes": {
                        "users_mood_idx": {"name": "users_mood_idx", "columns": ["mood"], "isUnique": false}
                    }
                }
            },
            "enums": {
                "mood": {"name": "mood", "values": {"sad": "sad", "happy": "happy"}}
            }
        });

        let snapshot = Snapshot::from_value(raw).unwrap();
        assert_eq!(snapshot.version, "7");
        let table = &snapshot.tables["public.users"];
        let index = &table.indexes["users_mood_idx"];
        assert_eq!(index.method.as_deref(), Some("btree"));
        assert!(matches!(&index.columns[0], IndexColumn::Expression(e) if e.expression == "mood"));
        assert_eq!(snapshot.enums["public.mood"].values, vec!["sad", "happy"]);
    }
}
