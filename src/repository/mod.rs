//! Repository seam between handlers and storage.
//!
//! Rows travel as JSON objects keyed by column name. Implementations return
//! full rows (hidden columns included); stripping happens at the API edge.

mod memory;
mod postgres;
pub mod walker;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

use crate::config::{ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

#[async_trait]
pub trait ApiRepository: Send + Sync {
    /// Every row of the entity ordered by primary key (capped by the implementation).
    async fn find_all_for_api(&self, entity: &ResolvedEntity) -> Result<Vec<Row>, AppError>;

    async fn find_one_for_api(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Row>, AppError>;

    /// Rows where `column` equals `value`, ordered by primary key.
    async fn find_by(&self, entity: &ResolvedEntity, column: &str, value: &Value) -> Result<Vec<Row>, AppError>;

    /// Insert a row; a null primary key is generated. Returns the stored row.
    async fn insert(&self, entity: &ResolvedEntity, row: &Row) -> Result<Row, AppError>;

    /// Overwrite the non-pk columns present in `row`. None when the id does not exist.
    async fn update(&self, entity: &ResolvedEntity, id: &Value, row: &Row) -> Result<Option<Row>, AppError>;

    /// Remove a row. Returns the removed row, None when the id does not exist.
    async fn delete(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Row>, AppError>;

    /// Storage liveness, used by readiness checks.
    async fn ping(&self) -> Result<(), AppError>;

    /// Load one row then walk `elements` from it. None when the row does not exist.
    async fn find_sub_element(
        &self,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: &Value,
        elements: &[String],
    ) -> Result<Option<Value>, AppError> {
        let Some(row) = self.find_one_for_api(entity, id).await? else {
            return Ok(None);
        };
        walker::walk(self, model, entity, row, elements).await.map(Some)
    }
}

/// JSON equality that tolerates ids arriving as strings ("4" == 4).
pub(crate) fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => n.to_string() == *s,
        (Value::String(s), Value::String(t)) => s == t,
        _ => a == b,
    }
}
