//! HTTP surface.
//!
//! JSON request/response bodies in the `{status: "success", data: {...}}`
//! envelope, versioned under `/api/v1`. Every mutating endpoint either fully
//! succeeds or fully fails; errors carry `{status, code, message}`.

mod admin;
mod cart;
mod health;
mod orders;
mod payments;

use crate::state::AppState;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// Always `"success"`.
    pub status: &'static str,
    /// Payload.
    pub data: T,
}

/// Wraps a payload in the success envelope.
pub fn success<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: "success",
        data,
    })
}

/// Builds the complete router.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Cart
        .route("/cart", post(cart::add_item))
        .route("/cart", get(cart::get_cart))
        .route("/cart", delete(cart::clear_cart))
        .route("/cart/:productId", patch(cart::update_item_quantity))
        .route("/cart/:productId", delete(cart::remove_item))
        // Orders
        .route("/order/checkout", post(orders::checkout))
        .route("/order/:id/cancel", patch(orders::cancel_order))
        .route("/order/:id", get(orders::get_order))
        // Payments
        .route("/payment/create-intent/:orderId", post(payments::create_payment))
        .route("/payment/confirm/:paymentId", post(payments::confirm_payment))
        .route("/payment/:paymentId", get(payments::get_payment))
        // Catalog/inventory management and audit
        .route("/products", post(admin::create_product))
        .route("/inventory", post(admin::upsert_inventory))
        .route("/inventory/:productId", get(admin::get_inventory))
        .route("/transactions", get(admin::list_transactions));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
