//! Row validation from config rules. Collects every violation instead of stopping at the first.

use crate::config::{ColumnInfo, ResolvedEntity, ValidationRule};
use crate::error::AppError;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Violation {
    pub property_path: String,
    pub message: String,
}

impl Violation {
    fn new(property_path: &str, message: impl Into<String>) -> Self {
        Violation {
            property_path: property_path.to_string(),
            message: message.into(),
        }
    }
}

pub struct RowValidator;

impl RowValidator {
    /// Validate a complete (merged) row. Columns are checked in declaration order.
    pub fn validate(entity: &ResolvedEntity, row: &Map<String, Value>) -> Result<(), AppError> {
        let violations = Self::violations(entity, row);
        if violations.is_empty() {
            Ok(())
        } else {
            tracing::debug!(service = %entity.service, count = violations.len(), "row rejected");
            Err(AppError::Invalid(violations))
        }
    }

    pub fn violations(entity: &ResolvedEntity, row: &Map<String, Value>) -> Vec<Violation> {
        let mut out = Vec::new();
        for col in &entity.columns {
            let val = row.get(&col.name).unwrap_or(&Value::Null);
            let rule = entity.validation.get(&col.name);

            if let Some(rule) = rule {
                if rule.not_blank == Some(true) && is_blank(val) {
                    out.push(Violation::new(&col.name, "This value should not be blank."));
                    continue;
                }
            }
            if val.is_null() {
                let required = rule.and_then(|r| r.required) == Some(true);
                if required || (!col.nullable && !col.has_default && !col.is_pk) {
                    out.push(Violation::new(&col.name, "This value should not be null."));
                }
                continue;
            }
            if let Some(message) = type_mismatch(col, val) {
                out.push(Violation::new(&col.name, message));
                continue;
            }
            if let Some(rule) = rule {
                validate_field(&col.name, val, rule, entity.patterns.get(&col.name), &mut out);
            }
        }
        out
    }
}

/// Checks a non-null value against the column's SQL type, so a bad value is a violation
/// rather than a failed cast in storage. Types without a check accept anything.
fn type_mismatch(col: &ColumnInfo, v: &Value) -> Option<String> {
    let pg_type = col.pg_type.to_lowercase();
    let base = pg_type.split('(').next().unwrap_or("").trim();
    let ok = match base {
        "smallint" | "integer" | "int" | "int2" | "int4" | "int8" | "bigint" => match v {
            Value::Number(n) => n.as_i64().is_some(),
            Value::String(s) => s.trim().parse::<i64>().is_ok(),
            _ => false,
        },
        "numeric" | "decimal" | "real" | "float4" | "float8" | "double precision" => match v {
            Value::Number(_) => true,
            Value::String(s) => s.trim().parse::<f64>().map(f64::is_finite).unwrap_or(false),
            _ => false,
        },
        "boolean" | "bool" => match v {
            Value::Bool(_) => true,
            Value::String(s) => matches!(
                s.trim().to_lowercase().as_str(),
                "true" | "false" | "t" | "f" | "1" | "0" | "yes" | "no" | "on" | "off"
            ),
            Value::Number(n) => matches!(n.as_i64(), Some(0) | Some(1)),
            _ => false,
        },
        "uuid" => {
            return v
                .as_str()
                .and_then(|s| uuid::Uuid::parse_str(s).ok())
                .is_none()
                .then(|| "This is not a valid UUID.".to_string());
        }
        "date" => v
            .as_str()
            .map(|s| chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").is_ok())
            .unwrap_or(false),
        "timestamptz" | "timestamp" | "timestamp without time zone" => v
            .as_str()
            .map(|s| is_timestamp(s.trim()))
            .unwrap_or(false),
        "json" | "jsonb" => true,
        _ => !matches!(v, Value::Array(_) | Value::Object(_)),
    };
    (!ok).then(|| format!("This value should be of type {}.", base))
}

fn is_timestamp(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d"]
            .iter()
            .any(|f| {
                chrono::NaiveDateTime::parse_from_str(s, f).is_ok()
                    || (*f == "%Y-%m-%d" && chrono::NaiveDate::parse_from_str(s, f).is_ok())
            })
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Bool(b) => !b,
        _ => false,
    }
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule, pattern: Option<&Regex>, out: &mut Vec<Violation>) {
    if let Some(format) = &rule.format {
        if let Some(message) = validate_format(v, format) {
            out.push(Violation::new(col, message));
        }
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                out.push(Violation::new(
                    col,
                    format!("This value is too long. It should have {} characters or less.", max),
                ));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                out.push(Violation::new(
                    col,
                    format!("This value is too short. It should have {} characters or more.", min),
                ));
            }
        }
        if let Some(re) = pattern {
            if !re.is_match(s) {
                out.push(Violation::new(col, "This value is not valid."));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            out.push(Violation::new(col, "The value you selected is not a valid choice."));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                out.push(Violation::new(col, format!("This value should be {} or more.", min)));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                out.push(Violation::new(col, format!("This value should be {} or less.", max)));
            }
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(v: &Value, format: &str) -> Option<&'static str> {
    let s = v.as_str()?;
    match format.to_lowercase().as_str() {
        "email" => {
            let valid = s
                .split_once('@')
                .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'))
                .unwrap_or(false);
            (!valid).then_some("This value is not a valid email address.")
        }
        "uuid" => uuid::Uuid::parse_str(s)
            .is_err()
            .then_some("This is not a valid UUID."),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse, resolve, Environment};
    use serde_json::json;

    fn entity() -> ResolvedEntity {
        let config = parse(
            r#"{ "services": { "users": {
                "entity": {
                    "table": "users",
                    "columns": [
                        { "name": "id", "type": "serial" },
                        { "name": "name", "type": "text", "nullable": false },
                        { "name": "email", "type": "text" },
                        { "name": "age", "type": "integer" },
                        { "name": "role", "type": "text" }
                    ]
                },
                "validation": {
                    "name": { "not_blank": true, "max_length": 5 },
                    "email": { "format": "email" },
                    "age": { "minimum": 0, "maximum": 150 },
                    "role": { "allowed": ["admin", "user"] }
                }
            } } }"#,
        )
        .unwrap();
        resolve(&config, Environment::Test).unwrap().services["users"].clone()
    }

    fn row(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn valid_row_passes() {
        let r = row(json!({ "name": "ann", "email": "a@b.io", "age": 30, "role": "user" }));
        assert!(RowValidator::validate(&entity(), &r).is_ok());
    }

    #[test]
    fn blank_name_reports_single_violation() {
        let r = row(json!({ "name": "", "age": 0 }));
        let v = RowValidator::violations(&entity(), &r);
        assert_eq!(v, vec![Violation::new("name", "This value should not be blank.")]);
    }

    #[test]
    fn collects_all_violations_in_column_order() {
        let r = row(json!({ "name": "toolong", "email": "nope", "age": 200, "role": "root" }));
        let paths: Vec<_> = RowValidator::violations(&entity(), &r)
            .into_iter()
            .map(|v| v.property_path)
            .collect();
        assert_eq!(paths, vec!["name", "email", "age", "role"]);
    }

    #[test]
    fn values_must_match_column_type() {
        let r = row(json!({ "name": "ann", "age": "abc" }));
        assert_eq!(
            RowValidator::violations(&entity(), &r),
            vec![Violation::new("age", "This value should be of type integer.")]
        );

        let r = row(json!({ "name": "ann", "age": "42", "role": "user" }));
        assert!(RowValidator::violations(&entity(), &r).is_empty());

        let r = row(json!({ "name": "ann", "email": { "nested": true } }));
        assert_eq!(
            RowValidator::violations(&entity(), &r),
            vec![Violation::new("email", "This value should be of type text.")]
        );
    }

    #[test]
    fn pattern_rule_uses_compiled_regex() {
        let mut e = entity();
        e.patterns
            .insert("role".into(), Regex::new("^[a-z]+$").unwrap());
        e.validation.get_mut("role").unwrap().allowed = None;
        let v = RowValidator::violations(&e, &row(json!({ "name": "ann", "role": "Root1" })));
        assert_eq!(v, vec![Violation::new("role", "This value is not valid.")]);
        assert!(RowValidator::violations(&e, &row(json!({ "name": "ann", "role": "root" }))).is_empty());
    }

    #[test]
    fn non_nullable_column_must_be_set() {
        let entity = {
            let mut e = entity();
            e.validation.clear();
            e
        };
        let v = RowValidator::violations(&entity, &row(json!({})));
        assert_eq!(v, vec![Violation::new("name", "This value should not be null.")]);
    }
}
