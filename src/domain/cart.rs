//! Cart aggregate.
//!
//! One cart per user, upserted on first add. Every mutation runs in a single
//! transaction together with its matching inventory call, so a cart line's
//! quantity always corresponds 1:1 with that product's reserved-stock
//! contribution from this cart.
//!
//! `total_price` is recomputed on every write by joining *current* product
//! prices: the cart shows live pricing, unlike the order's frozen
//! `price_at_purchase`.

use crate::domain::inventory;
use crate::error::{Error, Result};
use crate::types::{Money, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

/// One cart line.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Product in the line.
    pub product_id: ProductId,
    /// Units held.
    pub quantity: u32,
    /// When the line was first added.
    pub added_at: DateTime<Utc>,
}

/// A user's cart with derived totals.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// Owning user.
    pub user_id: UserId,
    /// Lines, oldest first.
    pub items: Vec<CartItem>,
    /// Total at current product prices, recomputed on every write.
    pub total_price: Money,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Number of distinct lines.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of line quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}

/// Loads a user's cart, if one exists.
pub async fn load(pool: &PgPool, user_id: UserId) -> Result<Option<Cart>> {
    let header: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
        "SELECT total_price_cents, updated_at FROM carts WHERE user_id = $1",
    )
    .bind(user_id.as_uuid())
    .fetch_optional(pool)
    .await?;

    let Some((total_cents, updated_at)) = header else {
        return Ok(None);
    };

    let rows: Vec<(uuid::Uuid, i64, DateTime<Utc>)> = sqlx::query_as(
        "SELECT product_id, quantity, added_at
         FROM cart_items
         WHERE user_id = $1
         ORDER BY added_at, product_id",
    )
    .bind(user_id.as_uuid())
    .fetch_all(pool)
    .await?;

    Ok(Some(Cart {
        user_id,
        items: rows
            .into_iter()
            .map(|(product_id, quantity, added_at)| CartItem {
                product_id: ProductId::from_uuid(product_id),
                quantity: u32::try_from(quantity).unwrap_or(0),
                added_at,
            })
            .collect(),
        total_price: Money::from_cents(u64::try_from(total_cents).unwrap_or(0)),
        updated_at,
    }))
}

/// Loads a user's cart or fails with `NotFound`.
pub async fn get(pool: &PgPool, user_id: UserId) -> Result<Cart> {
    load(pool, user_id)
        .await?
        .ok_or_else(|| Error::not_found("Cart"))
}

/// Adds `quantity` units of a product to the user's cart, reserving the
/// same amount in the inventory ledger within one transaction.
///
/// # Errors
///
/// `Validation` for a non-positive quantity, `NotFound` when the product has
/// no ledger record, `InsufficientStock` when availability does not cover
/// the request. On any error both the cart and the ledger are untouched.
pub async fn add_item(
    pool: &PgPool,
    user_id: UserId,
    product_id: ProductId,
    quantity: u32,
) -> Result<Cart> {
    if quantity == 0 {
        return Err(Error::validation("invalid product or quantity"));
    }

    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id.as_uuid())
        .execute(&mut *tx)
        .await?;

    // Reserve first: the guarded update also covers the product-exists check
    // before any line is written.
    inventory::reserve(&mut tx, product_id, quantity).await?;

    sqlx::query(
        "INSERT INTO cart_items (user_id, product_id, quantity)
         VALUES ($1, $2, $3)
         ON CONFLICT (user_id, product_id)
         DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity",
    )
    .bind(user_id.as_uuid())
    .bind(product_id.as_uuid())
    .bind(i64::from(quantity))
    .execute(&mut *tx)
    .await?;

    recompute_total(&mut tx, user_id).await?;
    tx.commit().await?;

    tracing::debug!(user_id = %user_id, product_id = %product_id, quantity, "cart item added");

    get(pool, user_id).await
}

/// Sets a cart line to `new_quantity`, adjusting the reservation by the
/// delta. A non-positive quantity removes the line and releases its full
/// held amount.
pub async fn update_item_quantity(
    pool: &PgPool,
    user_id: UserId,
    product_id: ProductId,
    new_quantity: i64,
) -> Result<Cart> {
    let mut tx = pool.begin().await?;

    let old_quantity: Option<i64> = sqlx::query_scalar(
        "SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2 FOR UPDATE",
    )
    .bind(user_id.as_uuid())
    .bind(product_id.as_uuid())
    .fetch_optional(&mut *tx)
    .await?;

    let Some(old_quantity) = old_quantity else {
        // Distinguish "no cart" from "product not in cart" for the caller.
        let cart_exists: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM carts WHERE user_id = $1")
                .bind(user_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        return Err(if cart_exists.is_some() {
            Error::not_found("Product")
        } else {
            Error::not_found("Cart")
        });
    };

    if new_quantity <= 0 {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        inventory::release(&mut tx, product_id, u32::try_from(old_quantity).unwrap_or(0))
            .await?;
    } else {
        sqlx::query(
            "UPDATE cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id.as_uuid())
        .bind(product_id.as_uuid())
        .bind(new_quantity)
        .execute(&mut *tx)
        .await?;
        inventory::adjust_reservation(&mut tx, product_id, new_quantity - old_quantity).await?;
    }

    recompute_total(&mut tx, user_id).await?;
    tx.commit().await?;

    get(pool, user_id).await
}

/// Removes a line entirely, releasing its held quantity.
pub async fn remove_item(pool: &PgPool, user_id: UserId, product_id: ProductId) -> Result<Cart> {
    let mut tx = pool.begin().await?;

    let cart_exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM carts WHERE user_id = $1")
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
    if cart_exists.is_none() {
        return Err(Error::not_found("Cart"));
    }

    let removed: Option<i64> = sqlx::query_scalar(
        "DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2 RETURNING quantity",
    )
    .bind(user_id.as_uuid())
    .bind(product_id.as_uuid())
    .fetch_optional(&mut *tx)
    .await?;

    let Some(quantity) = removed else {
        return Err(Error::not_found("Product"));
    };

    inventory::release(&mut tx, product_id, u32::try_from(quantity).unwrap_or(0)).await?;
    recompute_total(&mut tx, user_id).await?;
    tx.commit().await?;

    get(pool, user_id).await
}

/// Clears the user's cart, releasing every line's reservation.
///
/// This is the user-facing clear; the checkout orchestrator deletes the cart
/// through [`delete_for_checkout`] instead, because at that point the
/// reservations have already been settled into sales.
pub async fn clear(pool: &PgPool, user_id: UserId) -> Result<()> {
    let mut tx = pool.begin().await?;

    let lines: Vec<(uuid::Uuid, i64)> = sqlx::query_as(
        "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id.as_uuid())
    .fetch_all(&mut *tx)
    .await?;

    for (product_id, quantity) in lines {
        inventory::release(
            &mut tx,
            ProductId::from_uuid(product_id),
            u32::try_from(quantity).unwrap_or(0),
        )
        .await?;
    }

    sqlx::query("DELETE FROM carts WHERE user_id = $1")
        .bind(user_id.as_uuid())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Deletes the cart wholesale without touching reservations.
///
/// Only valid inside the payment-confirmation transaction, after every line
/// has been settled.
pub(crate) async fn delete_for_checkout(conn: &mut PgConnection, user_id: UserId) -> Result<()> {
    sqlx::query("DELETE FROM carts WHERE user_id = $1")
        .bind(user_id.as_uuid())
        .execute(conn)
        .await?;
    Ok(())
}

/// Recomputes the stored total from current product prices.
async fn recompute_total(conn: &mut PgConnection, user_id: UserId) -> Result<()> {
    sqlx::query(
        "UPDATE carts
         SET total_price_cents = COALESCE((
                 SELECT SUM(ci.quantity * p.price_cents)
                 FROM cart_items ci
                 JOIN products p ON p.id = ci.product_id
                 WHERE ci.user_id = $1
             ), 0),
             updated_at = now()
         WHERE user_id = $1",
    )
    .bind(user_id.as_uuid())
    .execute(conn)
    .await?;
    Ok(())
}
