//! Entity handlers: list, read (with sub-element walk), create, update, delete.

use crate::config::{PkType, ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use crate::extractors::ApiPath;
use crate::repository::walker::split_path;
use crate::response::{item_link, item_path, success_created, success_many, success_one, success_updated};
use crate::service::{blank_row, merge, RowValidator, Submission};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde_json::Value;

fn lookup<'m>(model: &'m ResolvedModel, name: &str) -> Result<&'m ResolvedEntity, AppError> {
    model.service(name).ok_or_else(|| {
        if model.environment.is_prod() {
            AppError::UnknownService(format!("Unrecognized service {}", name))
        } else {
            AppError::UnknownService(format!(
                "Service \"{}\" not found in the API.\nDid you forget to specify it in your configuration ?\nAvailable services : {}",
                name,
                model.service_names().join(", ")
            ))
        }
    })
}

fn parse_id(id_str: &str, pk_type: &PkType) -> Option<Value> {
    match pk_type {
        PkType::Uuid => uuid::Uuid::parse_str(id_str).ok().map(|u| Value::String(u.to_string())),
        PkType::BigInt | PkType::Int => id_str.parse::<i64>().ok().map(Value::from),
        PkType::Text => Some(Value::String(id_str.to_string())),
    }
}

fn no_item(id_str: &str) -> AppError {
    AppError::NotFound(format!("No item found with identifier \"{}\".", id_str))
}

fn no_object(service: &str) -> AppError {
    AppError::NotFound(format!("Object of type \"{}\" not found.", service))
}

pub async fn cget(
    State(state): State<AppState>,
    ApiPath(service): ApiPath<String>,
) -> Result<impl IntoResponse, AppError> {
    let entity = lookup(&state.model, &service)?;
    let rows = state.repo.find_all_for_api(entity).await?;
    let data: Vec<Value> = rows.into_iter().map(|r| Value::Object(entity.expose(r))).collect();
    Ok(success_many(data, service))
}

pub async fn get_one(
    State(state): State<AppState>,
    ApiPath((service, id_str)): ApiPath<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = lookup(&state.model, &service)?;
    let id = parse_id(&id_str, &entity.pk_type).ok_or_else(|| no_item(&id_str))?;
    let row = state
        .repo
        .find_one_for_api(entity, &id)
        .await?
        .ok_or_else(|| no_item(&id_str))?;
    Ok(success_one(Value::Object(entity.expose(row)), item_path(&service, &id)))
}

pub async fn get_sub_element(
    State(state): State<AppState>,
    ApiPath((service, id_str, sub)): ApiPath<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = lookup(&state.model, &service)?;
    let id = parse_id(&id_str, &entity.pk_type).ok_or_else(|| no_item(&id_str))?;
    let elements = split_path(&sub);
    let data = state
        .repo
        .find_sub_element(&state.model, entity, &id, &elements)
        .await?
        .ok_or_else(|| no_item(&id_str))?;
    let mut path = item_path(&service, &id);
    for element in &elements {
        path.push('.');
        path.push_str(element);
    }
    Ok(success_one(data, path))
}

pub async fn post(
    State(state): State<AppState>,
    ApiPath(service): ApiPath<String>,
    submission: Submission,
) -> Result<impl IntoResponse, AppError> {
    let entity = lookup(&state.model, &service)?;
    let row = merge(entity, blank_row(entity), &submission.json, submission.mapping.as_deref());
    RowValidator::validate(entity, &row)?;

    if let Some(id) = entity.pk_value(&row) {
        if state.repo.find_one_for_api(entity, id).await?.is_some() {
            return Err(AppError::Conflict(
                "\"POST\" method is used to insert new datas. If you want to edit an object, use the \"PUT\" method instead."
                    .into(),
            ));
        }
    }

    let stored = state.repo.insert(entity, &row).await?;
    let id = entity.pk_value(&stored).cloned().unwrap_or(Value::Null);
    tracing::info!(service = %service, id = %id, "object created");
    Ok(success_created(
        Value::Object(entity.expose(stored)),
        item_path(&service, &id),
        item_link(&service, &id),
    ))
}

pub async fn put(
    State(state): State<AppState>,
    ApiPath((service, id_str)): ApiPath<(String, String)>,
    mut submission: Submission,
) -> Result<impl IntoResponse, AppError> {
    let entity = lookup(&state.model, &service)?;
    let id = parse_id(&id_str, &entity.pk_type).ok_or_else(|| no_object(&service))?;
    let existing = state
        .repo
        .find_one_for_api(entity, &id)
        .await?
        .ok_or_else(|| no_object(&service))?;

    submission.json.remove(&entity.pk_column);
    let row = merge(entity, existing, &submission.json, submission.mapping.as_deref());
    RowValidator::validate(entity, &row)?;

    let updated = state
        .repo
        .update(entity, &id, &row)
        .await?
        .ok_or_else(|| no_object(&service))?;
    tracing::info!(service = %service, id = %id, "object updated");
    Ok(success_updated(
        Value::Object(entity.expose(updated)),
        item_path(&service, &id),
        item_link(&service, &id),
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    ApiPath((service, id_str)): ApiPath<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = lookup(&state.model, &service)?;
    let id = parse_id(&id_str, &entity.pk_type).ok_or_else(|| no_object(&service))?;
    state
        .repo
        .delete(entity, &id)
        .await?
        .ok_or_else(|| no_object(&service))?;
    tracing::info!(service = %service, id = %id, "object deleted");
    Ok(StatusCode::NO_CONTENT)
}
