use axum::{
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::repositories::DBPool;
use crate::handlers::categories::{create_category, delete_category, get_category, list_categories};
use crate::handlers::health::health;
use crate::handlers::products::{
    create_product, delete_product, get_product, get_product_detail, patch_product,
    replace_product, search_products,
};

// Define the application state struct
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<DBPool>,
    pub config: Arc<Config>,
}

// Function to create the Axum router
pub fn create_router(pool: Arc<DBPool>, config: Arc<Config>) -> Router {
    let app_state = AppState { pool, config };

    Router::new()
        .route("/health", get(health))
        // Public catalogue
        .route("/v0/products/search", get(search_products))
        .route("/v0/products/search/:product_id", get(get_product_detail))
        .route("/v0/categories", get(list_categories).post(create_category))
        // Admin management
        .route("/v0/products", axum::routing::post(create_product))
        .route(
            "/v0/products/:product_id",
            get(get_product)
                .put(replace_product)
                .patch(patch_product)
                .delete(delete_product),
        )
        .route(
            "/v0/categories/:category_id",
            get(get_category).delete(delete_category),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
