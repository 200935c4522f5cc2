//! HTTP API server

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod handlers;
pub mod state;

pub use state::AppState;

/// Build the API router using the provided application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest(
            "/v1",
            Router::new()
                .route("/places/search", get(handlers::search_places))
                .route("/places/nearby", get(handlers::search_nearby))
                .route("/places/markers", get(handlers::markers))
                .route("/collections/search", get(handlers::search_collections))
                .route("/popular/:catalog", get(handlers::popular))
                .route("/items/:catalog", put(handlers::upsert))
                .route("/items/:catalog/:id", delete(handlers::remove))
                .route(
                    "/items/:catalog/:id/marks",
                    post(handlers::mark).delete(handlers::unmark),
                ),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
