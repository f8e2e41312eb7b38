//! Minimal product catalog.
//!
//! The full catalog (categories, brands, reviews) lives outside this core;
//! the workflow only needs a product's current price for the cart total
//! recompute and for freezing `price_at_purchase` on order lines.

use crate::error::Result;
use crate::types::{Money, ProductId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;

/// A catalog product.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Current price.
    pub price: Money,
    /// ISO currency code.
    pub currency: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Inserts a new product.
pub async fn insert<'e, E>(
    executor: E,
    name: &str,
    price: Money,
    currency: &str,
) -> Result<Product>
where
    E: PgExecutor<'e>,
{
    let id = ProductId::new();
    let created_at: DateTime<Utc> = sqlx::query_scalar(
        "INSERT INTO products (id, name, price_cents, currency)
         VALUES ($1, $2, $3, $4)
         RETURNING created_at",
    )
    .bind(id.as_uuid())
    .bind(name)
    .bind(i64::try_from(price.cents()).unwrap_or(i64::MAX))
    .bind(currency)
    .fetch_one(executor)
    .await?;

    Ok(Product {
        id,
        name: name.to_string(),
        price,
        currency: currency.to_string(),
        created_at,
    })
}
