//! entity-api: configuration-driven JSON REST API over relational entities.
//!
//! A JSON document maps service names to tables. For each service the router
//! exposes list, read (including nested sub-element paths), create, update and
//! delete, guarded by an origin allow-list.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod listener;
pub mod origin;
pub mod repository;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;

pub use config::{load_from_path, resolve, ApiConfig, Environment, ResolvedEntity, ResolvedModel, Settings};
pub use error::{AppError, ConfigError};
pub use origin::OriginChecker;
pub use repository::{ApiRepository, MemoryRepository, PgRepository};
pub use routes::{api_router, common_routes, entity_routes, with_panic_capture};
pub use schema::ensure_tables;
pub use state::AppState;
