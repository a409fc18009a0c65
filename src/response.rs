//! Standard response envelope helpers.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub path: String,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

/// Link to the canonical item route, relative to where the API is mounted.
pub fn item_link(service: &str, id: &serde_json::Value) -> String {
    format!("/{}/{}", service, id_segment(id))
}

/// Path of an item inside the API, e.g. `data.4`.
pub fn item_path(service: &str, id: &serde_json::Value) -> String {
    format!("{}.{}", service, id_segment(id))
}

fn id_segment(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn success_one<T: Serialize>(data: T, path: String) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { data, path, link: None }))
}

pub fn success_created<T: Serialize>(
    data: T,
    path: String,
    link: String,
) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::CREATED,
        Json(SuccessOne {
            data,
            path,
            link: Some(link),
        }),
    )
}

pub fn success_updated<T: Serialize>(
    data: T,
    path: String,
    link: String,
) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::OK,
        Json(SuccessOne {
            data,
            path,
            link: Some(link),
        }),
    )
}

pub fn success_many<T: Serialize>(data: Vec<T>, path: String) -> (StatusCode, Json<SuccessMany<T>>) {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            data,
            path,
            meta: MetaCount { count },
        }),
    )
}
