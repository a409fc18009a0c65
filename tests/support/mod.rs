//! Test harness: the full router over an in-memory repository seeded with fixtures.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use entity_api::config::parse;
use entity_api::{api_router, resolve, ApiRepository, AppState, Environment, MemoryRepository, ResolvedModel};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const CONFIG: &str = r#"{
    "allowed_origins": ["localhost", "api.example.org"],
    "services": {
        "data": {
            "entity": {
                "table": "api_data",
                "columns": [
                    { "name": "id", "type": "serial" },
                    { "name": "name", "type": "varchar(255)" },
                    { "name": "slug", "type": "varchar(255)" },
                    { "name": "value", "type": "varchar(255)" },
                    { "name": "hidden", "type": "varchar(255)" }
                ]
            },
            "hidden": ["hidden"],
            "validation": { "name": { "not_blank": true } }
        },
        "users": {
            "entity": {
                "table": "users",
                "columns": [
                    { "name": "id", "type": "serial" },
                    { "name": "name", "type": "text" },
                    { "name": "password", "type": "text" }
                ]
            },
            "hidden": ["password"]
        },
        "posts": {
            "entity": {
                "table": "posts",
                "columns": [
                    { "name": "id", "type": "serial" },
                    { "name": "title", "type": "text" },
                    { "name": "author_id", "type": "integer" }
                ],
                "relations": [
                    { "name": "comments", "service": "comments", "kind": "to_many", "local_column": "id", "foreign_column": "post_id" },
                    { "name": "author", "service": "users", "kind": "to_one", "local_column": "author_id", "foreign_column": "id" }
                ]
            },
            "form": { "fields": ["title"] }
        },
        "comments": {
            "entity": {
                "table": "comments",
                "columns": [
                    { "name": "id", "type": "serial" },
                    { "name": "post_id", "type": "integer" },
                    { "name": "body", "type": "text" }
                ]
            }
        }
    }
}"#;

pub fn data_fixtures() -> Vec<Value> {
    vec![
        json!({ "name": "First one", "slug": "first-one", "value": "1", "hidden": "h1" }),
        json!({ "name": "Second one", "slug": "second-one", "value": "2", "hidden": "h2" }),
        json!({ "name": "Third one", "slug": "third-one", "value": "3", "hidden": "h3" }),
    ]
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryRepository>,
    pub model: ResolvedModel,
}

async fn seed(repo: &MemoryRepository, model: &ResolvedModel, service: &str, rows: Vec<Value>) {
    let entity = model.service(service).expect("fixture service");
    for row in rows {
        repo.insert(entity, row.as_object().expect("fixture object"))
            .await
            .expect("seed row");
    }
}

pub async fn test_app(environment: Environment) -> TestApp {
    let config = parse(CONFIG).expect("fixture config parses");
    let model = resolve(&config, environment).expect("fixture config resolves");
    let repo = Arc::new(MemoryRepository::new());

    seed(&repo, &model, "data", data_fixtures()).await;
    seed(&repo, &model, "users", vec![json!({ "name": "ann", "password": "secret" })]).await;
    seed(
        &repo,
        &model,
        "posts",
        vec![
            json!({ "title": "Hello", "author_id": 1 }),
            json!({ "title": "Orphan", "author_id": null }),
        ],
    )
    .await;
    seed(
        &repo,
        &model,
        "comments",
        vec![
            json!({ "post_id": 1, "body": "first" }),
            json!({ "post_id": 1, "body": "second" }),
            json!({ "post_id": 2, "body": "elsewhere" }),
        ],
    )
    .await;

    let state = AppState::new(repo.clone(), model.clone());
    TestApp {
        router: api_router(state, 64 * 1024),
        repo,
        model,
    }
}

impl TestApp {
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, HeaderMap, Value) {
        self.request_with_headers(method, uri, body, &[("origin", "http://localhost/")])
            .await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builds");

        self.send(req).await
    }

    /// Send a body as-is; the caller picks every header, content type included.
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        body: impl Into<String>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let req = builder.body(Body::from(body.into())).expect("request builds");
        self.send(req).await
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.router.clone().oneshot(req).await.expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response is JSON")
        };
        (status, headers, json)
    }

    /// Stored row, hidden columns included.
    pub async fn stored(&self, service: &str, id: i64) -> Option<serde_json::Map<String, Value>> {
        let entity = self.model.service(service).expect("service");
        self.repo
            .find_one_for_api(entity, &json!(id))
            .await
            .expect("repository read")
    }
}

pub fn assert_json_content_type(headers: &HeaderMap) {
    let ct = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(ct.contains("application/json"), "unexpected content-type '{}'", ct);
}
