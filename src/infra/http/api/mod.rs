pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

/// Reads are public. Writes and the health probe require basic auth.
pub fn build_router(state: ApiState) -> Router {
    let public = Router::new()
        .route("/v1/products", get(handlers::list_products))
        .route("/v1/products/{id}", get(handlers::get_product))
        .route("/v1/categories", get(handlers::list_categories))
        .route("/v1/categories/{id}", get(handlers::get_category));

    let protected = Router::new()
        .route("/", get(handlers::health))
        .route("/v1/products", post(handlers::create_product))
        .route(
            "/v1/products/{id}",
            patch(handlers::update_product).delete(handlers::delete_product),
        )
        .route("/v1/categories", post(handlers::create_category))
        .route(
            "/v1/categories/{id}",
            patch(handlers::update_category).delete(handlers::delete_category),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::basic_auth,
        ));

    public
        .merge(protected)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
