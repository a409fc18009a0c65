//! JSON response listener: every API response is served as JSON, errors are
//! expanded with diagnostics in dev, and handler panics become JSON 500s.

use crate::config::Environment;
use crate::error::{AppError, ErrorReport};
use crate::state::AppState;
use axum::{
    body::HttpBody,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::any::Any;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Upper bound when reading a framework error body to carry it over as a message.
const MAX_ERROR_BODY: usize = 16 * 1024;

pub async fn json_response(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;

    let status = response.status();
    if (status.is_client_error() || status.is_server_error())
        && response.extensions().get::<ErrorReport>().is_none()
        && !has_empty_body(&response)
    {
        response = as_api_error(response).await;
    }

    if state.model.environment == Environment::Dev {
        if let Some(report) = response.extensions().get::<ErrorReport>().cloned() {
            response = expand_error(response.status(), report);
        }
    }

    if !has_empty_body(&response) {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    }
    response
}

fn has_empty_body(response: &Response) -> bool {
    response.body().size_hint().exact() == Some(0)
}

/// Re-render an error produced outside the handlers (rejections, body limit) as an API error.
async fn as_api_error(response: Response) -> Response {
    let status = response.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge.into_response();
    }
    let message = match axum::body::to_bytes(response.into_body(), MAX_ERROR_BODY).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(_) => String::new(),
    };
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or("Request failed.").to_string()
    } else {
        message
    };
    AppError::Status(status, message).into_response()
}

fn expand_error(status: StatusCode, report: ErrorReport) -> Response {
    let mut body = report.body.clone();
    if let Some(obj) = body.as_object_mut() {
        obj.insert(
            "exception".into(),
            serde_json::json!({
                "code": report.code,
                "kind": report.kind,
                "chain": report.chain,
            }),
        );
    }
    let mut response = (status, Json(body)).into_response();
    response.extensions_mut().insert(report);
    response
}

/// Builds the panic handler for `CatchPanicLayer::custom`. The panic message is only exposed in dev.
pub fn panic_handler(environment: Environment) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response + Clone {
    move |err: Box<dyn Any + Send + 'static>| {
        let detail = if let Some(s) = err.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = err.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "unknown panic".to_string()
        };
        tracing::error!(panic = %detail, "handler panicked");
        let mut body = serde_json::json!({
            "error": true,
            "message": "Internal server error.",
            "code": "panic",
        });
        if environment == Environment::Dev {
            body["exception"] = serde_json::json!({ "code": "panic", "kind": "Panic", "chain": [detail] });
        }
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
