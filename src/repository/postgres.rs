//! Generic CRUD execution against PostgreSQL.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::repository::{ApiRepository, Row};
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        PgRepository { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn query_optional(&self, q: &QueryBuf) -> Result<Option<Row>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }
}

#[async_trait]
impl ApiRepository for PgRepository {
    async fn find_all_for_api(&self, entity: &ResolvedEntity) -> Result<Vec<Row>, AppError> {
        self.query_many(&sql::select_all(entity)).await
    }

    async fn find_one_for_api(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Row>, AppError> {
        self.query_optional(&sql::select_by_id(entity, id)).await
    }

    async fn find_by(&self, entity: &ResolvedEntity, column: &str, value: &Value) -> Result<Vec<Row>, AppError> {
        let q = sql::select_by_column(entity, column, value).ok_or_else(|| {
            AppError::Internal(format!("unknown column '{}' on \"{}\"", column, entity.service))
        })?;
        self.query_many(&q).await
    }

    async fn insert(&self, entity: &ResolvedEntity, row: &Row) -> Result<Row, AppError> {
        let q = sql::insert(entity, row);
        match self.query_optional(&q).await {
            Ok(Some(row)) => Ok(row),
            Ok(None) => Err(AppError::Db(sqlx::Error::RowNotFound)),
            Err(e) => Err(rejected_write(entity, e)),
        }
    }

    async fn update(&self, entity: &ResolvedEntity, id: &Value, row: &Row) -> Result<Option<Row>, AppError> {
        self.query_optional(&sql::update(entity, id, row))
            .await
            .map_err(|e| rejected_write(entity, e))
    }

    async fn delete(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Row>, AppError> {
        self.query_optional(&sql::delete(entity, id)).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

/// Constraint and data errors on writes are the client's: unique violations become 409,
/// data exceptions (class 22), not-null, foreign key and check violations become 400.
fn rejected_write(entity: &ResolvedEntity, err: AppError) -> AppError {
    let AppError::Db(sqlx::Error::Database(e)) = err else {
        return err;
    };
    if e.is_unique_violation() {
        return AppError::Conflict(format!("duplicate key for \"{}\": {}", entity.service, e.message()));
    }
    let data_error = e
        .code()
        .map(|c| c.starts_with("22") || c == "23502")
        .unwrap_or(false);
    if data_error || e.is_foreign_key_violation() || e.is_check_violation() {
        tracing::debug!(service = %entity.service, error = %e.message(), "write rejected by storage");
        return AppError::BadRequest(e.message().to_string());
    }
    AppError::Db(sqlx::Error::Database(e))
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Row {
    use sqlx::Column;
    use sqlx::Row as _;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}
