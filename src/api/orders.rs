//! Order endpoints.
//!
//! - `POST /api/v1/order/checkout` - snapshot the cart into a pending order
//! - `PATCH /api/v1/order/:id/cancel` - cancel a pending order
//! - `GET /api/v1/order/:id` - fetch an order (owner only)

use super::{success, Envelope};
use crate::domain::{checkout, order};
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::types::{Address, OrderId, PaymentMethod, Requester};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to create an order from the cart.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Payment method; defaults to the hosted gateway.
    pub payment_method: Option<PaymentMethod>,
    /// Delivery address; required.
    pub address: Option<Address>,
}

/// Order payload.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    /// The order.
    pub order: order::Order,
}

/// `POST /api/v1/order/checkout`
pub async fn checkout(
    requester: Requester,
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Envelope<OrderResponse>>)> {
    let address = request
        .address
        .ok_or_else(|| Error::validation("please provide a delivery address"))?;
    let payment_method = request.payment_method.unwrap_or(PaymentMethod::Stripe);

    let order =
        checkout::initiate_checkout(&state.pool, requester.user_id, payment_method, address)
            .await?;

    Ok((StatusCode::CREATED, success(OrderResponse { order })))
}

/// `PATCH /api/v1/order/:id/cancel`
pub async fn cancel_order(
    requester: Requester,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Envelope<OrderResponse>>> {
    let order = order::cancel(&state.pool, OrderId::from_uuid(order_id), &requester).await?;
    Ok(success(OrderResponse { order }))
}

/// `GET /api/v1/order/:id`
pub async fn get_order(
    requester: Requester,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Envelope<OrderResponse>>> {
    let order = order::get(&state.pool, OrderId::from_uuid(order_id), &requester).await?;
    Ok(success(OrderResponse { order }))
}
