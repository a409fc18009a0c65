//! Config validation: referential integrity between services, columns and relations.

use crate::config::ApiConfig;
use crate::error::ConfigError;
use std::collections::HashSet;

/// Names taken by the common routes.
const RESERVED_NAMES: [&str; 3] = ["health", "ready", "version"];

pub fn validate(config: &ApiConfig) -> Result<(), ConfigError> {
    if !config.format.eq_ignore_ascii_case("json") {
        return Err(ConfigError::UnsupportedFormat(config.format.clone()));
    }

    for origin in &config.allowed_origins {
        if origin.trim().is_empty() {
            return Err(ConfigError::Validation("allowed_origins entries cannot be empty".into()));
        }
    }

    for (name, service) in &config.services {
        if is_numeric(name) {
            return Err(ConfigError::NumericServiceName(name.clone()));
        }
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(ConfigError::Validation(format!("service name '{}' is reserved", name)));
        }
        if name.is_empty() || name.contains('/') {
            return Err(ConfigError::Validation(format!("invalid service name '{}'", name)));
        }

        let entity = &service.entity;
        if entity.table.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Key \"table\" must be set in service \"{}\"",
                name
            )));
        }

        let mut columns = HashSet::new();
        for c in &entity.columns {
            if !columns.insert(c.name.as_str()) {
                return Err(ConfigError::DuplicateColumn {
                    service: name.clone(),
                    column: c.name.clone(),
                });
            }
        }

        if !columns.contains(entity.primary_key.as_str()) {
            return Err(ConfigError::InvalidPrimaryKey {
                service: name.clone(),
                column: entity.primary_key.clone(),
            });
        }

        let field_refs = service
            .hidden
            .iter()
            .map(|h| ("hidden column", h))
            .chain(service.validation.keys().map(|v| ("validated column", v)))
            .chain(
                service
                    .form
                    .iter()
                    .flat_map(|f| f.fields.iter())
                    .map(|f| ("form field", f)),
            );
        for (kind, field) in field_refs {
            if !columns.contains(field.as_str()) {
                return Err(ConfigError::MissingReference {
                    service: name.clone(),
                    kind,
                    id: field.clone(),
                });
            }
        }

        let mut relation_names = HashSet::new();
        for rel in &entity.relations {
            if !relation_names.insert(rel.name.as_str()) || columns.contains(rel.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "relation '{}' in service '{}' clashes with another field",
                    rel.name, name
                )));
            }
            let related = config.services.get(&rel.service).ok_or_else(|| ConfigError::MissingReference {
                service: name.clone(),
                kind: "service",
                id: rel.service.clone(),
            })?;
            if !columns.contains(rel.local_column.as_str()) {
                return Err(ConfigError::MissingReference {
                    service: name.clone(),
                    kind: "relation column",
                    id: rel.local_column.clone(),
                });
            }
            if !related.entity.columns.iter().any(|c| c.name == rel.foreign_column) {
                return Err(ConfigError::MissingReference {
                    service: rel.service.clone(),
                    kind: "relation column",
                    id: rel.foreign_column.clone(),
                });
            }
        }

        for (col, rule) in &service.validation {
            if let Some(pattern) = &rule.pattern {
                regex::Regex::new(pattern).map_err(|e| {
                    ConfigError::Validation(format!("invalid pattern for {}.{}: {}", name, col, e))
                })?;
            }
        }
    }

    Ok(())
}

/// "inf" and "nan" parse as f64 but are valid names.
fn is_numeric(s: &str) -> bool {
    s.parse::<f64>().is_ok() && s.chars().any(|c| c.is_ascii_digit())
}
