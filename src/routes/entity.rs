//! Entity routes. Paths are parameterized; handlers resolve the service by name.
//! Every route sits behind the origin check, the body limit and the JSON response listener.

use crate::handlers::entity::{cget, delete as delete_handler, get_one, get_sub_element, post, put};
use crate::listener::json_response;
use crate::origin::check_origin;
use crate::state::AppState;
use axum::{middleware, routing::get, Router};
use tower_http::limit::RequestBodyLimitLayer;

pub fn entity_routes(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/:service", get(cget).post(post))
        .route("/:service/:id", get(get_one).put(put).delete(delete_handler))
        .route("/:service/:id/*sub", get(get_sub_element))
        .layer(middleware::from_fn_with_state(state.clone(), check_origin))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(middleware::from_fn_with_state(state.clone(), json_response))
        .with_state(state)
}
