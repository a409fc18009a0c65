//! In-process repository. Backs the test-suite and the server when no database is configured.

use crate::config::{PkType, ResolvedEntity};
use crate::error::AppError;
use crate::repository::{loose_eq, ApiRepository, Row};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemTable {
    rows: Vec<Row>,
    last_id: i64,
}

#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<HashMap<String, MemTable>>,
}

fn table_key(entity: &ResolvedEntity) -> String {
    format!("{}.{}", entity.schema_name, entity.table_name)
}

fn pk_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Keep only entity columns, filling the missing ones with null.
fn normalize(entity: &ResolvedEntity, row: &Row) -> Row {
    entity
        .columns
        .iter()
        .map(|c| (c.name.clone(), row.get(&c.name).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// Primary key in the stored representation of its type: integers as numbers, uuids lowercased.
fn normalize_pk(entity: &ResolvedEntity, raw: &Value) -> Result<Value, AppError> {
    let invalid = || {
        AppError::BadRequest(format!(
            "invalid value {} for primary key \"{}\"",
            raw, entity.pk_column
        ))
    };
    match entity.pk_type {
        PkType::Int | PkType::BigInt => match raw {
            Value::Number(n) => n.as_i64().map(Value::from).ok_or_else(invalid),
            Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        PkType::Uuid => raw
            .as_str()
            .and_then(|s| uuid::Uuid::parse_str(s).ok())
            .map(|u| Value::String(u.to_string()))
            .ok_or_else(invalid),
        PkType::Text => match raw {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            _ => Err(invalid()),
        },
    }
}

fn sorted_and_capped(entity: &ResolvedEntity, mut rows: Vec<Row>) -> Vec<Row> {
    rows.sort_by(|a, b| pk_cmp(entity.pk_value(a), entity.pk_value(b)));
    rows.truncate(crate::sql::LIST_LIMIT as usize);
    rows
}

impl MemTable {
    fn contains(&self, entity: &ResolvedEntity, id: &Value) -> bool {
        self.rows
            .iter()
            .any(|r| entity.pk_value(r).map(|v| loose_eq(v, id)).unwrap_or(false))
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiRepository for MemoryRepository {
    async fn find_all_for_api(&self, entity: &ResolvedEntity) -> Result<Vec<Row>, AppError> {
        let tables = self.tables.read().await;
        let rows = tables
            .get(&table_key(entity))
            .map(|t| t.rows.clone())
            .unwrap_or_default();
        Ok(sorted_and_capped(entity, rows))
    }

    async fn find_one_for_api(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Row>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.get(&table_key(entity)).and_then(|t| {
            t.rows
                .iter()
                .find(|r| entity.pk_value(r).map(|v| loose_eq(v, id)).unwrap_or(false))
                .cloned()
        }))
    }

    async fn find_by(&self, entity: &ResolvedEntity, column: &str, value: &Value) -> Result<Vec<Row>, AppError> {
        let tables = self.tables.read().await;
        let rows = tables
            .get(&table_key(entity))
            .map(|t| {
                t.rows
                    .iter()
                    .filter(|r| r.get(column).map(|v| loose_eq(v, value)).unwrap_or(false))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(sorted_and_capped(entity, rows))
    }

    async fn insert(&self, entity: &ResolvedEntity, row: &Row) -> Result<Row, AppError> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(table_key(entity)).or_default();
        let mut row = normalize(entity, row);

        let id = match row.get(&entity.pk_column).filter(|v| !v.is_null()) {
            Some(raw) => {
                let id = normalize_pk(entity, raw)?;
                if table.contains(entity, &id) {
                    return Err(AppError::Conflict(format!(
                        "duplicate primary key {} for \"{}\"",
                        id, entity.service
                    )));
                }
                if let Some(n) = id.as_i64() {
                    table.last_id = table.last_id.max(n);
                }
                id
            }
            None => match entity.pk_type {
                PkType::Int | PkType::BigInt => loop {
                    table.last_id += 1;
                    let candidate = Value::from(table.last_id);
                    if !table.contains(entity, &candidate) {
                        break candidate;
                    }
                },
                PkType::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
                PkType::Text => {
                    return Err(AppError::BadRequest(format!(
                        "\"{}\" must be provided",
                        entity.pk_column
                    )))
                }
            },
        };
        row.insert(entity.pk_column.clone(), id);
        table.rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, entity: &ResolvedEntity, id: &Value, row: &Row) -> Result<Option<Row>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&table_key(entity)) else {
            return Ok(None);
        };
        let Some(stored) = table
            .rows
            .iter_mut()
            .find(|r| entity.pk_value(r).map(|v| loose_eq(v, id)).unwrap_or(false))
        else {
            return Ok(None);
        };
        for c in entity.columns.iter().filter(|c| !c.is_pk) {
            if let Some(v) = row.get(&c.name) {
                stored.insert(c.name.clone(), v.clone());
            }
        }
        Ok(Some(stored.clone()))
    }

    async fn delete(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Row>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&table_key(entity)) else {
            return Ok(None);
        };
        let pos = table
            .rows
            .iter()
            .position(|r| entity.pk_value(r).map(|v| loose_eq(v, id)).unwrap_or(false));
        Ok(pos.map(|i| table.rows.remove(i)))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse, resolve, Environment};
    use serde_json::json;

    fn entity() -> ResolvedEntity {
        let config = parse(
            r#"{ "services": { "data": { "entity": { "table": "api_data", "columns": [
                { "name": "id", "type": "serial" },
                { "name": "name", "type": "text" }
            ] } } } }"#,
        )
        .unwrap();
        resolve(&config, Environment::Test).unwrap().services["data"].clone()
    }

    fn row(v: Value) -> Row {
        v.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn generates_sequential_ids() {
        let repo = MemoryRepository::new();
        let e = entity();
        let a = repo.insert(&e, &row(json!({ "name": "a" }))).await.unwrap();
        let b = repo.insert(&e, &row(json!({ "id": null, "name": "b" }))).await.unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));
        assert_eq!(repo.find_all_for_api(&e).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_id_conflicts() {
        let repo = MemoryRepository::new();
        let e = entity();
        repo.insert(&e, &row(json!({ "id": 5, "name": "a" }))).await.unwrap();
        let err = repo.insert(&e, &row(json!({ "id": 5, "name": "b" }))).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let next = repo.insert(&e, &row(json!({ "name": "c" }))).await.unwrap();
        assert_eq!(next["id"], json!(6));
    }

    #[tokio::test]
    async fn string_id_is_stored_as_integer_and_never_reused() {
        let repo = MemoryRepository::new();
        let e = entity();
        let a = repo.insert(&e, &row(json!({ "id": "2", "name": "a" }))).await.unwrap();
        assert_eq!(a["id"], json!(2));

        let err = repo.insert(&e, &row(json!({ "id": 2, "name": "b" }))).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let next = repo.insert(&e, &row(json!({ "name": "c" }))).await.unwrap();
        assert_eq!(next["id"], json!(3));

        let ids: Vec<Value> = repo
            .find_all_for_api(&e)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!(2), json!(3)]);

        let err = repo.insert(&e, &row(json!({ "id": "abc", "name": "d" }))).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn fractional_id_is_rejected() {
        let repo = MemoryRepository::new();
        let e = entity();
        let err = repo
            .insert(&e, &row(json!({ "id": 1.5, "name": "float" })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let a = repo.insert(&e, &row(json!({ "name": "a" }))).await.unwrap();
        assert_eq!(a["id"], json!(1));
    }

    #[tokio::test]
    async fn find_by_filters_before_the_list_cap() {
        let repo = MemoryRepository::new();
        let e = entity();
        for _ in 0..crate::sql::LIST_LIMIT {
            repo.insert(&e, &row(json!({ "name": "filler" }))).await.unwrap();
        }
        repo.insert(&e, &row(json!({ "name": "late" }))).await.unwrap();

        let found = repo.find_by(&e, "name", &json!("late")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["id"], json!(crate::sql::LIST_LIMIT + 1));
        assert_eq!(repo.find_all_for_api(&e).await.unwrap().len(), crate::sql::LIST_LIMIT as usize);
    }

    #[tokio::test]
    async fn update_and_delete_by_string_id() {
        let repo = MemoryRepository::new();
        let e = entity();
        repo.insert(&e, &row(json!({ "name": "a" }))).await.unwrap();
        let updated = repo
            .update(&e, &json!("1"), &row(json!({ "id": 99, "name": "z" })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated, row(json!({ "id": 1, "name": "z" })));
        assert!(repo.delete(&e, &json!(1)).await.unwrap().is_some());
        assert!(repo.find_one_for_api(&e, &json!(1)).await.unwrap().is_none());
        assert!(repo.delete(&e, &json!(1)).await.unwrap().is_none());
    }
}
