//! Raw config types matching the JSON configuration document.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

fn default_format() -> String {
    "json".into()
}

fn default_schema() -> String {
    "public".into()
}

fn default_primary_key() -> String {
    "id".into()
}

fn default_true() -> bool {
    true
}

/// Top-level document: output format, origin allow-list and the service map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            format: default_format(),
            allowed_origins: Vec::new(),
            services: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub entity: EntityConfig,
    #[serde(default)]
    pub form: Option<FormConfig>,
    /// Columns that are stored but never exposed in responses.
    #[serde(default)]
    pub hidden: Vec<String>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// SQL default expression, used when bootstrapping tables.
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    ToOne,
    ToMany,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationConfig {
    pub name: String,
    /// Service holding the related entity.
    pub service: String,
    pub kind: RelationKind,
    pub local_column: String,
    pub foreign_column: String,
}

/// Fields a client may write when no explicit mapping is sent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FormConfig {
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub not_blank: Option<bool>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Test,
    Prod,
}

impl Environment {
    /// Anything starting with "dev" is a development environment, unknown values are treated as prod.
    pub fn parse(s: &str) -> Self {
        let lower = s.trim().to_lowercase();
        if lower.starts_with("dev") {
            Environment::Dev
        } else if lower == "test" {
            Environment::Test
        } else {
            Environment::Prod
        }
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Environment::Prod)
    }
}
