//! Catalog, inventory and audit endpoints (role-gated).
//!
//! - `POST /api/v1/products` - create a product (manager/admin)
//! - `POST /api/v1/inventory` - create or restock a ledger record
//! - `GET /api/v1/inventory/:productId` - read counters + restock history
//! - `GET /api/v1/transactions` - audit trail listing (admin)

use super::{success, Envelope};
use crate::auth::{require_auditor, require_inventory_manager};
use crate::domain::{inventory, product, transaction_log};
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::types::{Money, ProductId, Requester};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to create a product.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    /// Display name.
    pub name: String,
    /// Current price in cents.
    pub price_cents: u64,
    /// ISO currency code; defaults to usd.
    pub currency: Option<String>,
}

/// Product payload.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    /// The created product.
    pub product: product::Product,
}

/// `POST /api/v1/products`
pub async fn create_product(
    requester: Requester,
    State(state): State<AppState>,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Envelope<ProductResponse>>)> {
    require_inventory_manager(&requester)?;
    if request.name.trim().is_empty() {
        return Err(Error::validation("product name is required"));
    }

    let currency = request.currency.unwrap_or_else(|| "usd".to_string());
    let product = product::insert(
        &state.pool,
        request.name.trim(),
        Money::from_cents(request.price_cents),
        &currency,
    )
    .await?;

    Ok((StatusCode::CREATED, success(ProductResponse { product })))
}

/// Request to create or restock a ledger record.
#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    /// Product to restock.
    pub product: Uuid,
    /// Units to add; must be positive.
    pub stock: i64,
}

/// Inventory payload.
#[derive(Debug, Serialize)]
pub struct InventoryResponse {
    /// The ledger record after the mutation.
    pub inventory: inventory::InventoryRecord,
}

/// `POST /api/v1/inventory`
pub async fn upsert_inventory(
    requester: Requester,
    State(state): State<AppState>,
    Json(request): Json<RestockRequest>,
) -> Result<Json<Envelope<InventoryResponse>>> {
    require_inventory_manager(&requester)?;
    let quantity = u32::try_from(request.stock)
        .ok()
        .filter(|&q| q > 0)
        .ok_or_else(|| Error::validation("stock must be a positive integer"))?;

    let product_id = ProductId::from_uuid(request.product);

    let mut tx = state.pool.begin().await?;
    inventory::create_or_restock(&mut tx, product_id, quantity).await?;
    tx.commit().await?;

    let record = inventory::get_record(&state.pool, product_id)
        .await?
        .ok_or_else(|| Error::not_found("Inventory"))?;

    Ok(success(InventoryResponse { inventory: record }))
}

/// `GET /api/v1/inventory/:productId`
pub async fn get_inventory(
    requester: Requester,
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Envelope<InventoryResponse>>> {
    require_inventory_manager(&requester)?;
    let record = inventory::get_record(&state.pool, ProductId::from_uuid(product_id))
        .await?
        .ok_or_else(|| Error::not_found("Inventory"))?;
    Ok(success(InventoryResponse { inventory: record }))
}

/// Audit trail payload.
#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    /// Newest entries first.
    pub transactions: Vec<transaction_log::LogEntry>,
}

/// `GET /api/v1/transactions`
pub async fn list_transactions(
    requester: Requester,
    State(state): State<AppState>,
) -> Result<Json<Envelope<TransactionsResponse>>> {
    require_auditor(&requester)?;
    let transactions = transaction_log::list(&state.pool, 100).await?;
    Ok(success(TransactionsResponse { transactions }))
}
