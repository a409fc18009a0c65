//! Write payloads, sent either as a JSON document or as form parameters.
//!
//! Form bodies carry `json` as an encoded string and `mapping` as either a JSON
//! value, a comma separated field list, or `mapping[field]=1` / `mapping[]=field` pairs.

use crate::error::AppError;
use crate::service::Submission;
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request},
    http::{header, StatusCode},
    Form, Json,
};
use serde_json::{Map, Value};

#[async_trait]
impl<S> FromRequest<S> for Submission
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        let body = if is_form {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| unreadable(e.status(), &e.body_text()))?;
            form_body(pairs)
        } else {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| unreadable(e.status(), &e.body_text()))?;
            value
        };
        Submission::from_body(body)
    }
}

fn unreadable(status: StatusCode, detail: &str) -> AppError {
    tracing::debug!(status = %status, error = %detail, "unreadable body");
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::BadRequest("Error while parsing json.".into())
    }
}

/// Turn form pairs into the `{"json": ..., "mapping": ...}` shape of a JSON body.
fn form_body(pairs: Vec<(String, String)>) -> Value {
    let mut body = Map::new();
    let mut mapping_fields = Map::new();
    let mut mapping_list = Vec::new();

    for (key, value) in pairs {
        match key.as_str() {
            "json" => {
                body.insert(key, Value::String(value));
            }
            "mapping" => {
                let parsed = serde_json::from_str::<Value>(&value).unwrap_or_else(|_| {
                    Value::Array(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|f| !f.is_empty())
                            .map(|f| Value::String(f.to_string()))
                            .collect(),
                    )
                });
                body.insert(key, parsed);
            }
            "mapping[]" => mapping_list.push(Value::String(value)),
            _ => {
                if let Some(field) = key.strip_prefix("mapping[").and_then(|k| k.strip_suffix(']')) {
                    mapping_fields.insert(field.to_string(), Value::String(value));
                }
            }
        }
    }

    if !body.contains_key("mapping") {
        if !mapping_fields.is_empty() {
            body.insert("mapping".into(), Value::Object(mapping_fields));
        } else if !mapping_list.is_empty() {
            body.insert("mapping".into(), Value::Array(mapping_list));
        }
    }
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn json_parameter_is_kept_as_string() {
        let body = form_body(pairs(&[("json", "{\"name\":\"x\"}")]));
        assert_eq!(body, json!({ "json": "{\"name\":\"x\"}" }));
        let s = Submission::from_body(body).unwrap();
        assert_eq!(s.json["name"], "x");
        assert!(s.mapping.is_none());
    }

    #[test]
    fn bracketed_mapping_becomes_object() {
        let body = form_body(pairs(&[
            ("json", "{\"name\":\"x\",\"hidden\":\"h\"}"),
            ("mapping[name]", "1"),
            ("mapping[hidden]", "0"),
        ]));
        let mut mapping = Submission::from_body(body).unwrap().mapping.unwrap();
        mapping.sort();
        assert_eq!(mapping, vec!["name"]);
    }

    #[test]
    fn plain_mapping_accepts_json_or_field_list() {
        let body = form_body(pairs(&[("json", "{}"), ("mapping", "name, value")]));
        assert_eq!(body["mapping"], json!(["name", "value"]));
        let body = form_body(pairs(&[("json", "{}"), ("mapping", "[\"name\"]")]));
        assert_eq!(body["mapping"], json!(["name"]));
        let body = form_body(pairs(&[("mapping[]", "a"), ("mapping[]", "b")]));
        assert_eq!(body["mapping"], json!(["a", "b"]));
    }
}
