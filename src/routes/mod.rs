//! Router assembly.

mod common;
mod entity;

pub use common::common_routes;
pub use entity::entity_routes;

use crate::config::Environment;
use crate::listener::panic_handler;
use crate::state::AppState;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;

/// Health routes plus every configured service, with panic capture.
/// Static routes win over `/:service`, so services cannot be named `health`, `ready` or `version`.
pub fn api_router(state: AppState, body_limit: usize) -> Router {
    let environment = state.model.environment;
    let router = Router::new()
        .merge(common_routes(state.clone()))
        .merge(entity_routes(state, body_limit));
    with_panic_capture(router, environment)
}

/// Turn handler panics into JSON 500 responses.
pub fn with_panic_capture(router: Router, environment: Environment) -> Router {
    router.layer(CatchPanicLayer::custom(panic_handler(environment)))
}
