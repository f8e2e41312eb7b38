//! Cart endpoints.
//!
//! - `POST /api/v1/cart` - add a product to the cart
//! - `GET /api/v1/cart` - fetch the cart
//! - `PATCH /api/v1/cart/:productId` - set a line's quantity
//! - `DELETE /api/v1/cart/:productId` - remove a line
//! - `DELETE /api/v1/cart` - clear the cart, releasing reservations

use super::{success, Envelope};
use crate::domain::cart::{self, Cart};
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::types::{ProductId, Requester};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to add a product to the cart.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    /// Product to add.
    pub product: Uuid,
    /// Units to add; must be positive.
    pub quantity: i64,
}

/// Response after adding a product.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemResponse {
    /// Number of distinct lines.
    pub cart_item_count: usize,
    /// Sum of line quantities.
    pub total_quantity: u64,
    /// The updated cart.
    pub cart: Cart,
}

/// Cart view with a line count, for update/remove responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartMutationResponse {
    /// Number of distinct lines.
    pub item_count: usize,
    /// Total at current product prices.
    pub total_price: crate::types::Money,
    /// The updated cart.
    pub cart: Cart,
}

/// `POST /api/v1/cart`
pub async fn add_item(
    requester: Requester,
    State(state): State<AppState>,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<Envelope<AddItemResponse>>> {
    if request.quantity <= 0 {
        return Err(Error::validation("invalid product or quantity"));
    }
    let quantity = u32::try_from(request.quantity)
        .map_err(|_| Error::validation("invalid product or quantity"))?;

    let cart = cart::add_item(
        &state.pool,
        requester.user_id,
        ProductId::from_uuid(request.product),
        quantity,
    )
    .await?;

    Ok(success(AddItemResponse {
        cart_item_count: cart.item_count(),
        total_quantity: cart.total_quantity(),
        cart,
    }))
}

/// Response for `GET /api/v1/cart`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCartResponse {
    /// Number of distinct lines.
    pub number_of_items: usize,
    /// The cart.
    pub cart: Cart,
}

/// `GET /api/v1/cart`
pub async fn get_cart(
    requester: Requester,
    State(state): State<AppState>,
) -> Result<Json<Envelope<GetCartResponse>>> {
    let cart = cart::get(&state.pool, requester.user_id).await?;
    Ok(success(GetCartResponse {
        number_of_items: cart.item_count(),
        cart,
    }))
}

/// Request to set a line's quantity.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    /// New quantity; zero or negative removes the line.
    pub quantity: i64,
}

/// `PATCH /api/v1/cart/:productId`
pub async fn update_item_quantity(
    requester: Requester,
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<Envelope<CartMutationResponse>>> {
    let cart = cart::update_item_quantity(
        &state.pool,
        requester.user_id,
        ProductId::from_uuid(product_id),
        request.quantity,
    )
    .await?;

    Ok(success(CartMutationResponse {
        item_count: cart.item_count(),
        total_price: cart.total_price,
        cart,
    }))
}

/// `DELETE /api/v1/cart/:productId`
pub async fn remove_item(
    requester: Requester,
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Envelope<CartMutationResponse>>> {
    let cart = cart::remove_item(
        &state.pool,
        requester.user_id,
        ProductId::from_uuid(product_id),
    )
    .await?;

    Ok(success(CartMutationResponse {
        item_count: cart.item_count(),
        total_price: cart.total_price,
        cart,
    }))
}

/// `DELETE /api/v1/cart`
pub async fn clear_cart(
    requester: Requester,
    State(state): State<AppState>,
) -> Result<StatusCode> {
    cart::clear(&state.pool, requester.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
