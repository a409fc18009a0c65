//! Process settings from environment variables (`.env` is honoured).

use crate::config::Environment;
use crate::error::ConfigError;
use std::path::PathBuf;

const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    pub environment: Environment,
    pub config_path: PathBuf,
    /// When unset the server keeps entities in memory.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub body_limit: usize,
    pub create_schema: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let body_limit = match get("API_BODY_LIMIT") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Validation(format!("API_BODY_LIMIT must be a byte count, got '{}'", v)))?,
            None => DEFAULT_BODY_LIMIT,
        };
        let create_schema = get("API_CREATE_SCHEMA")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Ok(Settings {
            environment: Environment::parse(&get("API_ENV").unwrap_or_else(|| "prod".into())),
            config_path: get("API_CONFIG_PATH").unwrap_or_else(|| "api.json".into()).into(),
            database_url: get("DATABASE_URL").filter(|s| !s.is_empty()),
            bind_addr: get("API_BIND").unwrap_or_else(|| "0.0.0.0:3000".into()),
            body_limit,
            create_schema,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_unset() {
        let s = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(s.environment, Environment::Prod);
        assert_eq!(s.config_path, PathBuf::from("api.json"));
        assert!(s.database_url.is_none());
        assert_eq!(s.body_limit, DEFAULT_BODY_LIMIT);
        assert!(!s.create_schema);
    }

    #[test]
    fn reads_overrides() {
        let vars: HashMap<&str, &str> = [
            ("API_ENV", "dev"),
            ("DATABASE_URL", "postgres://localhost/api"),
            ("API_BODY_LIMIT", "2048"),
            ("API_CREATE_SCHEMA", "true"),
        ]
        .into_iter()
        .collect();
        let s = Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(s.environment, Environment::Dev);
        assert_eq!(s.database_url.as_deref(), Some("postgres://localhost/api"));
        assert_eq!(s.body_limit, 2048);
        assert!(s.create_schema);
    }

    #[test]
    fn bad_body_limit_is_rejected() {
        let r = Settings::from_lookup(|k| (k == "API_BODY_LIMIT").then(|| "lots".to_string()));
        assert!(r.is_err());
    }
}
