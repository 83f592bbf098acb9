//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let service_routes = Router::new()
        .route(
            "/:id",
            get(handlers::get_service_status)
                .post(handlers::allocate_service)
                .put(handlers::reallocate_service)
                .patch(handlers::update_service)
                .delete(handlers::deallocate_service),
        )
        .route("/:id/purge", delete(handlers::purge_service));

    let router = Router::new()
        .route("/health", get(handlers::health_check))
        .nest(handlers::SERVICES_PATH, service_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
