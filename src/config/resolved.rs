//! Resolved model: config validated and flattened for runtime use.

use crate::config::{Environment, RelationKind, ValidationRule};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A relation walkable from an entity, e.g. `/posts/1/comments`.
#[derive(Clone, Debug)]
pub struct RelationSpec {
    pub name: String,
    pub kind: RelationKind,
    /// Service name of the related entity (for lookup in model).
    pub related_service: String,
    /// Our column used in the join (our FK for to_one; usually our PK for to_many).
    pub local_column: String,
    /// Their column used in the join (their PK for to_one; their FK for to_many).
    pub foreign_column: String,
}

/// Primary key type for parsing path/body ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub is_pk: bool,
    pub nullable: bool,
    /// Whether the column has a DB default (serial, gen_random_uuid(), NOW()).
    pub has_default: bool,
    /// SQL default expression from config, used when bootstrapping tables.
    pub default: Option<String>,
    /// Declared SQL type, as written in config.
    pub sql_type: String,
    /// PostgreSQL type used to cast bound parameters (`$1::timestamptz`). Serial types map to their integer type.
    pub pg_type: String,
}

impl ColumnInfo {
    pub fn is_integer(&self) -> bool {
        let l = self.sql_type.to_lowercase();
        l.contains("int") || l.contains("serial")
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub service: String,
    pub schema_name: String,
    pub table_name: String,
    pub pk_column: String,
    pub pk_type: PkType,
    pub columns: Vec<ColumnInfo>,
    pub relations: Vec<RelationSpec>,
    /// Writable fields when the client sends no mapping. None means every visible column.
    pub form_fields: Option<Vec<String>>,
    /// Column names stripped from all API responses.
    pub hidden: HashSet<String>,
    pub validation: BTreeMap<String, ValidationRule>,
    /// `pattern` rules compiled once, keyed by column.
    pub patterns: HashMap<String, Regex>,
}

impl ResolvedEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn is_visible(&self, column: &str) -> bool {
        self.has_column(column) && !self.hidden.contains(column)
    }

    /// Primary key value of a row, if set.
    pub fn pk_value<'a>(&self, row: &'a Map<String, Value>) -> Option<&'a Value> {
        row.get(&self.pk_column).filter(|v| !v.is_null())
    }

    /// Strip hidden columns from a row before it leaves the API.
    pub fn expose(&self, mut row: Map<String, Value>) -> Map<String, Value> {
        row.retain(|k, _| !self.hidden.contains(k));
        row
    }

    /// Fields writable without an explicit mapping.
    pub fn writable_fields(&self) -> Vec<&str> {
        match &self.form_fields {
            Some(fields) => fields.iter().map(String::as_str).collect(),
            None => self
                .columns
                .iter()
                .filter(|c| !self.hidden.contains(&c.name))
                .map(|c| c.name.as_str())
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub environment: Environment,
    pub format: String,
    pub allowed_origins: Vec<String>,
    pub services: BTreeMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn service(&self, name: &str) -> Option<&ResolvedEntity> {
        self.services.get(name)
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.services.keys().map(String::as_str).collect()
    }
}
