//! Load config from a JSON document and resolve it into the runtime model.

use crate::config::resolved::{ColumnInfo, PkType, RelationSpec, ResolvedEntity, ResolvedModel};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Origins always allowed in development environments.
const DEV_ORIGINS: [&str; 3] = ["127.0.0.1", "localhost", "::1"];

/// Read and parse the JSON config document. Does not validate.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<ApiConfig, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading api config");
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse(&raw)
}

pub fn parse(raw: &str) -> Result<ApiConfig, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Build resolved model from config (validates first).
pub fn resolve(config: &ApiConfig, environment: Environment) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let mut services = BTreeMap::new();
    for (name, service) in &config.services {
        let entity = &service.entity;
        let pk_col = entity
            .columns
            .iter()
            .find(|c| c.name == entity.primary_key)
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                service: name.clone(),
                column: entity.primary_key.clone(),
            })?;
        let pk_type = infer_pk_type(&pk_col.type_);

        let columns: Vec<ColumnInfo> = entity
            .columns
            .iter()
            .map(|c| {
                let lower = c.type_.to_lowercase();
                ColumnInfo {
                    name: c.name.clone(),
                    is_pk: c.name == entity.primary_key,
                    nullable: c.nullable && c.name != entity.primary_key,
                    has_default: c.default.is_some() || lower.contains("serial"),
                    default: c.default.clone(),
                    sql_type: c.type_.clone(),
                    pg_type: column_pg_type_name(&c.type_),
                }
            })
            .collect();

        let relations = entity
            .relations
            .iter()
            .map(|r| RelationSpec {
                name: r.name.clone(),
                kind: r.kind,
                related_service: r.service.clone(),
                local_column: r.local_column.clone(),
                foreign_column: r.foreign_column.clone(),
            })
            .collect();

        let mut patterns = HashMap::new();
        for (col, rule) in &service.validation {
            if let Some(pattern) = &rule.pattern {
                let re = regex::Regex::new(pattern).map_err(|e| {
                    ConfigError::Validation(format!("invalid pattern for {}.{}: {}", name, col, e))
                })?;
                patterns.insert(col.clone(), re);
            }
        }

        let resolved = ResolvedEntity {
            service: name.clone(),
            schema_name: entity.schema.clone(),
            table_name: entity.table.clone(),
            pk_column: entity.primary_key.clone(),
            pk_type,
            columns,
            relations,
            form_fields: service.form.as_ref().map(|f| f.fields.clone()),
            hidden: service.hidden.iter().cloned().collect(),
            validation: service.validation.clone().into_iter().collect(),
            patterns,
        };
        tracing::debug!(service = %name, table = %entity.table, "resolved service");
        services.insert(name.clone(), resolved);
    }

    Ok(ResolvedModel {
        environment,
        format: config.format.to_lowercase(),
        allowed_origins: normalize_origins(&config.allowed_origins, environment),
        services,
    })
}

fn normalize_origins(configured: &[String], environment: Environment) -> Vec<String> {
    let mut seen = HashSet::new();
    let extra: &[&str] = match environment {
        Environment::Dev => DEV_ORIGINS.as_slice(),
        _ => &[],
    };
    configured
        .iter()
        .map(|s| s.trim().to_string())
        .chain(extra.iter().map(|s| s.to_string()))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

fn column_pg_type_name(ty: &str) -> String {
    let lower = ty.trim().to_lowercase();
    match lower.as_str() {
        "serial" | "serial4" => "integer".into(),
        "bigserial" | "serial8" => "bigint".into(),
        "smallserial" | "serial2" => "smallint".into(),
        "timestamp with time zone" => "timestamptz".into(),
        _ => ty.trim().to_string(),
    }
}

fn infer_pk_type(type_str: &str) -> PkType {
    let type_lower = type_str.to_lowercase();
    if type_lower.contains("uuid") {
        PkType::Uuid
    } else if type_lower.contains("bigserial") || type_lower.contains("bigint") {
        PkType::BigInt
    } else if type_lower.contains("serial") || type_lower.contains("int") {
        PkType::Int
    } else {
        PkType::Text
    }
}
