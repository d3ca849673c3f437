use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::adapter::SearchAdapter;

pub mod handlers;
pub mod models;

pub fn create_router(adapter: Arc<SearchAdapter>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/search", post(handlers::search_handler))
        .route("/api/crawl", post(handlers::crawl_handler))
        .route("/api/profiles", get(handlers::profiles_handler))
        .route("/api/cache/:cache_id", get(handlers::cache_range_handler))
        .route("/api/cache/:cache_id/:index", get(handlers::cache_item_handler))
        .with_state(adapter)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
