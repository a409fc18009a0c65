//! Bootstrap DDL: create configured schemas and tables when they do not exist yet.
//! Existing tables are left untouched.

use crate::config::{RelationKind, ResolvedModel};
use crate::error::AppError;
use crate::sql::{qualified_table, quoted};
use sqlx::PgPool;
use std::collections::BTreeSet;

/// CREATE TABLE IF NOT EXISTS for one service's entity.
pub fn table_ddl(entity: &crate::config::ResolvedEntity) -> String {
    let mut col_defs: Vec<String> = entity
        .columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quoted(&c.name), c.sql_type);
            if !c.nullable {
                def.push_str(" NOT NULL");
            }
            if let Some(ref d) = c.default {
                def.push_str(" DEFAULT ");
                def.push_str(d);
            }
            def
        })
        .collect();
    col_defs.push(format!("PRIMARY KEY ({})", quoted(&entity.pk_column)));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(entity),
        col_defs.join(",\n  ")
    )
}

/// Create every schema and table of the model. Foreign keys for to_one relations are
/// added best-effort (they fail harmlessly when already present).
pub async fn ensure_tables(pool: &PgPool, model: &ResolvedModel) -> Result<(), AppError> {
    let schemas: BTreeSet<&str> = model.services.values().map(|e| e.schema_name.as_str()).collect();
    for schema in schemas {
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema));
        tracing::debug!(sql = %sql, "ddl");
        sqlx::query(&sql).execute(pool).await?;
    }

    for entity in model.services.values() {
        let sql = table_ddl(entity);
        tracing::debug!(sql = %sql, "ddl");
        sqlx::query(&sql).execute(pool).await?;
    }

    for entity in model.services.values() {
        for rel in entity.relations.iter().filter(|r| r.kind == RelationKind::ToOne) {
            let Some(related) = model.service(&rel.related_service) else { continue };
            let sql = format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                qualified_table(entity),
                quoted(&format!("fk_{}_{}", entity.table_name, rel.name)),
                quoted(&rel.local_column),
                qualified_table(related),
                quoted(&rel.foreign_column)
            );
            tracing::debug!(sql = %sql, "ddl");
            if let Err(e) = sqlx::query(&sql).execute(pool).await {
                tracing::debug!(error = %e, relation = %rel.name, "foreign key not added");
            }
        }
    }

    tracing::info!(services = model.services.len(), "schema ensured");
    Ok(())
}
