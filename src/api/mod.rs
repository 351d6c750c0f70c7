//! HTTP surface: router, shared state and per-resource handlers.

use axum::{
    routing::{delete, get, patch, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::Services;

pub mod carts;
pub mod currencies;
pub mod envelope;
pub mod identity;
pub mod orders;
pub mod payments;
pub mod wishlists;

pub use envelope::{ApiResponse, ApiResult};
pub use identity::ValidJson;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
}

impl AppState {
    #[must_use]
    pub fn new(services: Services) -> Self { Self { services } }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "shopfront"}))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/cart", get(carts::show))
        .route("/api/v1/cart/items", post(carts::add_item).patch(carts::update_item))
        .route("/api/v1/cart/items/:id", patch(carts::update_item_by_id).delete(carts::remove_item))
        .route("/api/v1/cart/clear", post(carts::clear))
        .route("/api/v1/cart/merge", post(carts::merge))
        .route("/api/v1/wishlist", get(wishlists::list).post(wishlists::add))
        .route("/api/v1/wishlist/count", get(wishlists::count))
        .route("/api/v1/wishlist/exists", get(wishlists::exists))
        .route("/api/v1/wishlist/check", post(wishlists::check))
        .route("/api/v1/wishlist/merge", post(wishlists::merge))
        .route("/api/v1/wishlist/by-variant/:variant_id", delete(wishlists::remove_variant))
        .route("/api/v1/wishlist/:id", delete(wishlists::remove))
        .route("/api/v1/orders", get(orders::list).post(orders::create))
        .route("/api/v1/orders/:id", get(orders::show))
        .route("/api/v1/orders/:id/confirm-payment", post(orders::confirm_payment))
        .route("/api/v1/orders/:id/status", patch(orders::update_status))
        .route("/api/v1/payments", get(payments::list))
        .route("/api/v1/payments/initiate", post(payments::initiate))
        .route("/api/v1/payments/confirm", post(payments::confirm))
        .route("/api/v1/payments/:id", get(payments::show))
        .route("/api/v1/currencies", get(currencies::list).post(currencies::create))
        .route("/api/v1/currencies/:id", get(currencies::show).patch(currencies::update))
        .route("/api/v1/currencies/:id/base", post(currencies::set_base))
        .route("/api/v1/fx-rates", get(currencies::rates).post(currencies::record_rate))
        .route("/api/v1/fx-rates/latest", get(currencies::latest_rate))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}
