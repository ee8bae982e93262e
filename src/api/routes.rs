use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::storage::Storage;

use super::handlers::{
    create_link, create_rule, create_variant, deactivate_link, delete_rule, delete_variant,
    get_link, health_check, list_links, list_rules, list_variants, reactivate_link, update_link,
    update_rule, update_variant, AppState,
};

pub fn create_api_router(storage: Arc<dyn Storage>) -> Router {
    let state = Arc::new(AppState { storage });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/links", post(create_link))
        .route("/links", get(list_links))
        .route("/links/{code}", get(get_link))
        .route("/links/{code}", put(update_link))
        .route("/links/{code}", delete(deactivate_link))
        .route("/links/{code}/activate", post(reactivate_link))
        .route("/links/{code}/rules", get(list_rules))
        .route("/links/{code}/rules", post(create_rule))
        .route("/rules/{id}", put(update_rule))
        .route("/rules/{id}", delete(delete_rule))
        .route("/links/{code}/variants", get(list_variants))
        .route("/links/{code}/variants", post(create_variant))
        .route("/variants/{id}", put(update_variant))
        .route("/variants/{id}", delete(delete_variant))
        .layer(cors)
        .with_state(state)
}
