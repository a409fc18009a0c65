//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a resolved entity.

use crate::config::ResolvedEntity;
use serde_json::{Map, Value};

/// Hard cap on rows returned by a list query.
pub const LIST_LIMIT: u32 = 1000;

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(entity: &ResolvedEntity) -> String {
    format!("{}.{}", quoted(&entity.schema_name), quoted(&entity.table_name))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a parameter and return its placeholder, cast to the column type.
    fn push_param(&mut self, v: Value, pg_type: &str) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), pg_type)
    }
}

/// SELECT list: numeric and custom (schema.typename) columns as col::text so rows decode as strings.
fn select_column_list(entity: &ResolvedEntity) -> String {
    entity
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            let pg_type = c.pg_type.to_lowercase();
            if pg_type.contains('.') || pg_type.starts_with("numeric") || pg_type.starts_with("decimal") {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn pk_pg_type(entity: &ResolvedEntity) -> &str {
    entity
        .column(&entity.pk_column)
        .map(|c| c.pg_type.as_str())
        .unwrap_or("text")
}

/// SELECT every row ordered by primary key, capped at LIST_LIMIT.
pub fn select_all(entity: &ResolvedEntity) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} ORDER BY {} LIMIT {}",
        select_column_list(entity),
        qualified_table(entity),
        quoted(&entity.pk_column),
        LIST_LIMIT
    );
    q
}

/// SELECT by primary key.
pub fn select_by_id(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(id.clone(), pk_pg_type(entity));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(entity),
        qualified_table(entity),
        quoted(&entity.pk_column),
        ph
    );
    q
}

/// SELECT rows where one column equals a value, ordered by primary key.
/// Returns None when the column is not part of the entity.
pub fn select_by_column(entity: &ResolvedEntity, column: &str, value: &Value) -> Option<QueryBuf> {
    let col = entity.column(column)?;
    let mut q = QueryBuf::new();
    let ph = q.push_param(value.clone(), &col.pg_type);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {} ORDER BY {} LIMIT {}",
        select_column_list(entity),
        qualified_table(entity),
        quoted(column),
        ph,
        quoted(&entity.pk_column),
        LIST_LIMIT
    );
    Some(q)
}

/// INSERT the entity columns present in the row. A null primary key is left to the DB default.
pub fn insert(entity: &ResolvedEntity, row: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        let Some(val) = row.get(&c.name) else { continue };
        if val.is_null() && (c.is_pk || c.has_default) {
            continue;
        }
        placeholders.push(q.push_param(val.clone(), &c.pg_type));
        cols.push(quoted(&c.name));
    }
    let returning = select_column_list(entity);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", qualified_table(entity), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(entity),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET every non-pk entity column present in the row.
/// With nothing to set, degrades to a SELECT by id.
pub fn update(entity: &ResolvedEntity, id: &Value, row: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &entity.columns {
        if c.is_pk {
            continue;
        }
        let Some(val) = row.get(&c.name) else { continue };
        let ph = q.push_param(val.clone(), &c.pg_type);
        sets.push(format!("{} = {}", quoted(&c.name), ph));
    }
    if sets.is_empty() {
        return select_by_id(entity, id);
    }
    let id_ph = q.push_param(id.clone(), pk_pg_type(entity));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(entity),
        sets.join(", "),
        quoted(&entity.pk_column),
        id_ph,
        select_column_list(entity)
    );
    q
}

/// DELETE by id.
pub fn delete(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(id.clone(), pk_pg_type(entity));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        qualified_table(entity),
        quoted(&entity.pk_column),
        ph,
        select_column_list(entity)
    );
    q
}
