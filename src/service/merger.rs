//! Request payload parsing and field-level merging of client input into rows.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A create/update body: `{"json": <object or JSON string>, "mapping": <object|array|null>}`.
#[derive(Debug)]
pub struct Submission {
    pub json: Map<String, Value>,
    /// Explicit list of fields to copy. Overrides the form and may target hidden columns.
    pub mapping: Option<Vec<String>>,
}

impl Submission {
    pub fn from_body(body: Value) -> Result<Self, AppError> {
        let Value::Object(mut body) = body else {
            return Err(AppError::BadRequest("body must be a JSON object".into()));
        };
        let json = match body.remove("json") {
            None | Some(Value::Null) => return Err(missing_json()),
            Some(Value::Object(m)) if m.is_empty() => return Err(missing_json()),
            Some(Value::Object(m)) => m,
            Some(Value::String(s)) if s.trim().is_empty() => return Err(missing_json()),
            Some(Value::String(s)) => match serde_json::from_str::<Value>(&s) {
                Ok(Value::Object(m)) if !m.is_empty() => m,
                _ => return Err(AppError::BadRequest("Error while parsing json.".into())),
            },
            Some(_) => return Err(AppError::BadRequest("Error while parsing json.".into())),
        };
        let mapping = parse_mapping(body.remove("mapping").unwrap_or(Value::Null))?;
        Ok(Submission { json, mapping })
    }
}

fn missing_json() -> AppError {
    AppError::BadRequest("You must specify the \"json\" parameter.".into())
}

fn parse_mapping(v: Value) -> Result<Option<Vec<String>>, AppError> {
    match v {
        Value::Null => Ok(None),
        Value::Bool(false) => Ok(None),
        Value::Object(m) => Ok(Some(
            m.into_iter()
                .filter(|(_, enabled)| truthy(enabled))
                .map(|(k, _)| k)
                .collect(),
        )),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(AppError::BadRequest("mapping entries must be field names".into())),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        _ => Err(AppError::BadRequest("mapping must be an object, an array or null".into())),
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Empty row for a create: every column present, set to null.
pub fn blank_row(entity: &ResolvedEntity) -> Map<String, Value> {
    entity
        .columns
        .iter()
        .map(|c| (c.name.clone(), Value::Null))
        .collect()
}

/// Copy input fields onto `base`. With a mapping only mapped fields are taken,
/// otherwise the form fields (or every visible column when no form is configured).
/// Keys that are not entity columns are ignored.
pub fn merge(
    entity: &ResolvedEntity,
    mut base: Map<String, Value>,
    input: &Map<String, Value>,
    mapping: Option<&[String]>,
) -> Map<String, Value> {
    let allowed: HashSet<&str> = match mapping {
        Some(fields) => fields.iter().map(String::as_str).collect(),
        None => entity.writable_fields().into_iter().collect(),
    };
    for (k, v) in input {
        if allowed.contains(k.as_str()) && entity.has_column(k) {
            base.insert(k.clone(), v.clone());
        }
    }
    base
}
