//! Sub-element path walker: follows `/field`, `/relation` and `/{id}` segments
//! from a row through the entity graph described by the resolved model.

use crate::config::{RelationKind, ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use crate::repository::{loose_eq, ApiRepository, Row};
use serde_json::Value;

enum Node<'m> {
    Row(&'m ResolvedEntity, Row),
    Rows(&'m ResolvedEntity, Vec<Row>),
    Value(Value),
}

/// Split a raw sub path on '/', dropping empty segments.
pub fn split_path(raw: &str) -> Vec<String> {
    raw.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_identifier(segment: &str) -> bool {
    segment.chars().all(|c| c.is_ascii_digit()) || uuid::Uuid::parse_str(segment).is_ok()
}

fn id_matches(value: Option<&Value>, segment: &str) -> bool {
    match value {
        Some(Value::String(s)) => s.eq_ignore_ascii_case(segment),
        Some(v) => loose_eq(v, &Value::String(segment.to_string())),
        None => false,
    }
}

fn no_element(segment: &str) -> AppError {
    AppError::NotFound(format!(
        "Found no element with identifier \"{}\" in requested object.",
        segment
    ))
}

fn not_an_object(segment: &str) -> AppError {
    AppError::BadRequest(format!(
        "Field \"{}\" cannot be retrieved as analyzed element is not an object.",
        segment
    ))
}

/// Walk `elements` starting at `row` of `entity`. Hidden columns are neither reachable nor returned.
pub async fn walk<R: ApiRepository + ?Sized>(
    repo: &R,
    model: &ResolvedModel,
    entity: &ResolvedEntity,
    row: Row,
    elements: &[String],
) -> Result<Value, AppError> {
    let mut node = Node::Row(entity, row);

    for segment in elements {
        tracing::trace!(segment = %segment, "walking sub element");
        node = if is_identifier(segment) {
            match node {
                Node::Rows(e, rows) => {
                    let row = rows
                        .into_iter()
                        .find(|r| id_matches(e.pk_value(r), segment))
                        .ok_or_else(|| no_element(segment))?;
                    Node::Row(e, row)
                }
                Node::Value(Value::Array(items)) => items
                    .into_iter()
                    .find(|item| id_matches(item.get("id"), segment))
                    .map(Node::Value)
                    .ok_or_else(|| no_element(segment))?,
                _ => {
                    return Err(AppError::BadRequest(
                        "Identifier cannot be requested on a non-collection element.".into(),
                    ))
                }
            }
        } else {
            match node {
                Node::Row(e, row) => property_value(repo, model, e, row, segment).await?,
                Node::Value(Value::Object(mut map)) => match map.remove(segment.as_str()) {
                    Some(v) => Node::Value(v),
                    None => {
                        return Err(AppError::NotFound(format!(
                            "Field \"{}\" does not exist in requested object",
                            segment
                        )))
                    }
                },
                _ => return Err(not_an_object(segment)),
            }
        };
    }

    Ok(match node {
        Node::Row(e, row) => Value::Object(e.expose(row)),
        Node::Rows(e, rows) => Value::Array(rows.into_iter().map(|r| Value::Object(e.expose(r))).collect()),
        Node::Value(v) => v,
    })
}

/// Resolve one named field of a row: a relation (loaded through the repository) or a visible column.
async fn property_value<'m, R: ApiRepository + ?Sized>(
    repo: &R,
    model: &'m ResolvedModel,
    entity: &'m ResolvedEntity,
    mut row: Row,
    field: &str,
) -> Result<Node<'m>, AppError> {
    if let Some(rel) = entity.relation(field) {
        let related = model.service(&rel.related_service).ok_or_else(|| {
            AppError::Internal(format!("relation '{}' targets unknown service '{}'", rel.name, rel.related_service))
        })?;
        let key = row.get(&rel.local_column).cloned().unwrap_or(Value::Null);
        if key.is_null() {
            return Ok(match rel.kind {
                RelationKind::ToMany => Node::Rows(related, Vec::new()),
                RelationKind::ToOne => Node::Value(Value::Null),
            });
        }
        let rows = repo.find_by(related, &rel.foreign_column, &key).await?;
        return Ok(match rel.kind {
            RelationKind::ToMany => Node::Rows(related, rows),
            RelationKind::ToOne => match rows.into_iter().next() {
                Some(r) => Node::Row(related, r),
                None => Node::Value(Value::Null),
            },
        });
    }
    if entity.is_visible(field) {
        return Ok(Node::Value(row.remove(field).unwrap_or(Value::Null)));
    }
    Err(AppError::NotFound(format!(
        "Field \"{}\" does not exist in \"{}\" object",
        field, entity.table_name
    )))
}
