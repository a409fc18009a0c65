//! Typed errors and HTTP mapping.

use crate::service::Violation;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Service names for the API cannot be numeric.")]
    NumericServiceName(String),
    #[error("missing reference: {kind} '{id}' in service '{service}'")]
    MissingReference {
        service: String,
        kind: &'static str,
        id: String,
    },
    #[error("invalid primary key: service {service} column {column}")]
    InvalidPrimaryKey { service: String, column: String },
    #[error("duplicate column '{column}' in service '{service}'")]
    DuplicateColumn { service: String, column: String },
    #[error("unsupported output format '{0}', only \"json\" is available")]
    UnsupportedFormat(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    UnknownService(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid form, please re-check.")]
    Invalid(Vec<Violation>),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Request body is too large.")]
    PayloadTooLarge,
    /// A framework response (rejection, method not allowed) carried over as an API error.
    #[error("{1}")]
    Status(StatusCode, String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::UnknownService(_) => (StatusCode::NOT_FOUND, "unknown_service"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Invalid(_) => (StatusCode::BAD_REQUEST, "invalid_form"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            AppError::Status(status, _) => (*status, "http_error"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "Config",
            AppError::UnknownService(_) => "UnknownService",
            AppError::NotFound(_) => "NotFound",
            AppError::BadRequest(_) => "BadRequest",
            AppError::Invalid(_) => "Invalid",
            AppError::Conflict(_) => "Conflict",
            AppError::Forbidden(_) => "Forbidden",
            AppError::PayloadTooLarge => "PayloadTooLarge",
            AppError::Status(..) => "Status",
            AppError::Db(_) => "Db",
            AppError::Internal(_) => "Internal",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: bool,
    pub message: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<Violation>>,
}

/// Attached to every error response so the JSON listener can expand it in dev.
#[derive(Clone, Debug)]
pub struct ErrorReport {
    pub body: serde_json::Value,
    pub code: &'static str,
    pub kind: &'static str,
    pub chain: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        } else {
            tracing::debug!(error = %self, code, "request rejected");
        }

        let mut chain = Vec::new();
        let mut source = std::error::Error::source(&self);
        while let Some(e) = source {
            chain.push(e.to_string());
            source = e.source();
        }
        let kind = self.kind();
        let message = self.to_string();
        let errors = match self {
            AppError::Invalid(violations) => Some(violations),
            _ => None,
        };
        let body = ErrorBody {
            error: true,
            message,
            code,
            errors,
        };
        let body = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);

        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(ErrorReport {
            body,
            code,
            kind,
            chain,
        });
        response
    }
}
