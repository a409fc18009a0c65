//! Origin guard, JSON listener and common routes.

mod support;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::{routing::get, Router};
use entity_api::{with_panic_capture, Environment};
use serde_json::{json, Value};
use support::{assert_json_content_type, test_app};
use tower::ServiceExt;

#[tokio::test]
async fn foreign_origin_is_forbidden() {
    let app = test_app(Environment::Test).await;
    let (status, headers, body) = app
        .request_with_headers(Method::GET, "/data", None, &[("origin", "https://evil.example.com")])
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_json_content_type(&headers);
    assert_eq!(body["message"], "Origin not allowed.");
}

#[tokio::test]
async fn missing_origin_is_forbidden() {
    let app = test_app(Environment::Test).await;
    let (status, _, _) = app.request_with_headers(Method::GET, "/data/1", None, &[]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn origin_with_port_is_allowed() {
    let app = test_app(Environment::Test).await;
    let (status, _, _) = app
        .request_with_headers(Method::GET, "/data", None, &[("origin", "http://localhost:8080")])
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn same_origin_request_is_allowed() {
    let app = test_app(Environment::Prod).await;
    let (status, _, _) = app
        .request_with_headers(
            Method::GET,
            "/data",
            None,
            &[("origin", "https://internal.host"), ("host", "internal.host")],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn dev_errors_carry_exception_details() {
    let app = test_app(Environment::Dev).await;
    let (status, _, body) = app.request(Method::GET, "/data/1000", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["exception"]["code"], "not_found");
    assert_eq!(body["exception"]["kind"], "NotFound");
    assert_eq!(body["message"], "No item found with identifier \"1000\".");
}

#[tokio::test]
async fn non_dev_errors_have_no_exception_details() {
    let app = test_app(Environment::Test).await;
    let (_, _, body) = app.request(Method::GET, "/data/1000", None).await;
    assert_eq!(body["code"], "not_found");
    assert!(body.get("exception").is_none());
}

#[tokio::test]
async fn health_and_readiness() {
    let app = test_app(Environment::Test).await;
    let (status, _, body) = app.request_with_headers(Method::GET, "/health", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _, body) = app.request_with_headers(Method::GET, "/ready", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage"], "ok");

    let (status, _, body) = app.request_with_headers(Method::GET, "/version", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "entity-api");
}

#[tokio::test]
async fn undecodable_path_is_a_json_error() {
    let app = test_app(Environment::Test).await;
    let (status, headers, body) = app.request(Method::GET, "/%FF/1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_content_type(&headers);
    assert_eq!(body["error"], true);
    assert!(body["message"].as_str().expect("message").contains("UTF-8"));
}

#[tokio::test]
async fn oversized_body_is_a_json_error() {
    let app = test_app(Environment::Test).await;
    let big = "x".repeat(100 * 1024);

    let (status, headers, body) = app
        .request(Method::POST, "/data", Some(json!({ "json": { "name": big } })))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_json_content_type(&headers);
    assert_eq!(body["message"], "Request body is too large.");

    let raw = json!({ "json": { "name": big } }).to_string();
    let length = raw.len().to_string();
    let (status, headers, body) = app
        .request_raw(
            Method::POST,
            "/data",
            raw,
            &[
                ("origin", "http://localhost/"),
                ("content-type", "application/json"),
                ("content-length", length.as_str()),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_json_content_type(&headers);
    assert_eq!(body["code"], "payload_too_large");
}

#[tokio::test]
async fn empty_responses_carry_no_json_content_type() {
    let app = test_app(Environment::Test).await;
    let (status, headers, body) = app.request(Method::PATCH, "/data/1", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(headers.get("content-type").is_none());
    assert_eq!(body, Value::Null);
}

async fn explode() -> &'static str {
    panic!("boom")
}

async fn panic_response(environment: Environment) -> (StatusCode, Value) {
    let router = with_panic_capture(Router::new().route("/explode", get(explode)), environment);
    let response = router
        .oneshot(Request::builder().uri("/explode").body(Body::empty()).expect("request"))
        .await
        .expect("router is infallible");
    let status = response.status();
    assert_json_content_type(response.headers());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).expect("JSON body"))
}

#[tokio::test]
async fn handler_panic_is_a_json_500() {
    let (status, body) = panic_response(Environment::Prod).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error.");
    assert_eq!(body["code"], "panic");
    assert!(body.get("exception").is_none());

    let (status, body) = panic_response(Environment::Dev).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["exception"]["chain"], json!(["boom"]));
}
