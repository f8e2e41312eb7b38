//! Inventory ledger.
//!
//! Owns the per-product counters: `stock` (available), `reserved_stock`
//! (held by open carts and orders) and `sold` (settled), plus the
//! append-only restock history.
//!
//! Every mutation is a single guarded `UPDATE` executed inside the caller's
//! transaction, never a read-then-write, so two concurrent reservations for
//! the same product cannot both pass the stock check. The guards mirror the
//! pure [`StockLevels`] arithmetic, which the property tests exercise.

use crate::error::{Error, Result};
use crate::types::{ProductId, Restock};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgExecutor};

/// Snapshot of a product's ledger counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLevels {
    /// Units available for reservation.
    pub stock: u32,
    /// Units held by open carts and pending orders.
    pub reserved_stock: u32,
    /// Cumulative units settled into sales.
    pub sold: u64,
}

impl StockLevels {
    /// Moves `qty` units from available to reserved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientStock`] when fewer than `qty` units are
    /// available. Levels are unchanged on error.
    pub fn reserve(self, qty: u32) -> Result<Self> {
        if self.stock < qty {
            return Err(Error::InsufficientStock {
                available: self.stock,
            });
        }
        Ok(Self {
            stock: self.stock - qty,
            reserved_stock: self.reserved_stock + qty,
            sold: self.sold,
        })
    }

    /// Returns `qty` reserved units to available stock.
    ///
    /// Clamped at zero to tolerate a double release; never fails.
    #[must_use]
    pub fn release(self, qty: u32) -> Self {
        Self {
            stock: self.stock + qty,
            reserved_stock: self.reserved_stock.saturating_sub(qty),
            sold: self.sold,
        }
    }

    /// Converts `qty` reserved units into a permanent sale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InventoryInconsistency`] when reserved stock does not
    /// cover `qty`. This is never clamped: it signals a bookkeeping bug
    /// upstream and must abort the enclosing transaction.
    pub fn settle(self, qty: u32, product_id: ProductId) -> Result<Self> {
        if self.reserved_stock < qty {
            return Err(Error::InventoryInconsistency {
                product_id: *product_id.as_uuid(),
            });
        }
        Ok(Self {
            stock: self.stock,
            reserved_stock: self.reserved_stock - qty,
            sold: self.sold + u64::from(qty),
        })
    }
}

/// Full ledger record for a product, as returned to admin queries.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    /// Product this record tracks.
    pub product_id: ProductId,
    /// Current counters.
    #[serde(flatten)]
    pub levels: StockLevels,
    /// Append-only restock history, oldest first.
    pub restocks: Vec<Restock>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Reserves `qty` units: `stock -= qty; reserved_stock += qty`.
///
/// Runs as one guarded `UPDATE` inside the caller's transaction.
///
/// # Errors
///
/// [`Error::NotFound`] when no ledger record exists for the product,
/// [`Error::InsufficientStock`] when availability does not cover `qty`.
pub async fn reserve(conn: &mut PgConnection, product_id: ProductId, qty: u32) -> Result<()> {
    let result = sqlx::query(
        "UPDATE inventory
         SET stock = stock - $2, reserved_stock = reserved_stock + $2, updated_at = now()
         WHERE product_id = $1 AND stock >= $2",
    )
    .bind(product_id.as_uuid())
    .bind(i64::from(qty))
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    // Guard failed: distinguish a missing record from insufficient stock.
    let available: Option<i64> =
        sqlx::query_scalar("SELECT stock FROM inventory WHERE product_id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;

    match available {
        None => Err(Error::not_found("Inventory")),
        Some(stock) => Err(Error::InsufficientStock {
            available: to_u32(stock),
        }),
    }
}

/// Releases `qty` reserved units back to available stock.
///
/// Clamped at zero on the reserved side; a missing ledger record is
/// tolerated (nothing to release).
pub async fn release(conn: &mut PgConnection, product_id: ProductId, qty: u32) -> Result<()> {
    sqlx::query(
        "UPDATE inventory
         SET reserved_stock = GREATEST(reserved_stock - $2, 0),
             stock = stock + $2,
             updated_at = now()
         WHERE product_id = $1",
    )
    .bind(product_id.as_uuid())
    .bind(i64::from(qty))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Settles `qty` reserved units into sales: `reserved_stock -= qty; sold += qty`.
///
/// # Errors
///
/// [`Error::InventoryInconsistency`] when reserved stock does not cover
/// `qty`; the caller must abort its transaction.
pub async fn settle(conn: &mut PgConnection, product_id: ProductId, qty: u32) -> Result<()> {
    let result = sqlx::query(
        "UPDATE inventory
         SET reserved_stock = reserved_stock - $2, sold = sold + $2, updated_at = now()
         WHERE product_id = $1 AND reserved_stock >= $2",
    )
    .bind(product_id.as_uuid())
    .bind(i64::from(qty))
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        Ok(())
    } else {
        Err(Error::InventoryInconsistency {
            product_id: *product_id.as_uuid(),
        })
    }
}

/// Signed reservation adjustment for an existing cart line.
///
/// A positive delta re-runs the reserve stock check; a negative delta is a
/// partial release.
pub async fn adjust_reservation(
    conn: &mut PgConnection,
    product_id: ProductId,
    delta: i64,
) -> Result<()> {
    if delta > 0 {
        reserve(conn, product_id, to_u32(delta)).await
    } else if delta < 0 {
        release(conn, product_id, to_u32(-delta)).await
    } else {
        Ok(())
    }
}

/// Creates the ledger record for a product, or restocks an existing one.
///
/// Adds `qty` to available stock and appends to the restock history.
///
/// # Errors
///
/// [`Error::NotFound`] when no such product exists in the catalog.
pub async fn create_or_restock(
    conn: &mut PgConnection,
    product_id: ProductId,
    qty: u32,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO inventory (product_id, stock)
         VALUES ($1, $2)
         ON CONFLICT (product_id)
         DO UPDATE SET stock = inventory.stock + EXCLUDED.stock, updated_at = now()",
    )
    .bind(product_id.as_uuid())
    .bind(i64::from(qty))
    .execute(&mut *conn)
    .await
    .map_err(|err| {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.constraint() == Some("inventory_product_id_fkey") {
                return Error::not_found("Product");
            }
        }
        Error::Database(err)
    })?;

    sqlx::query("INSERT INTO restocks (product_id, quantity) VALUES ($1, $2)")
        .bind(product_id.as_uuid())
        .bind(i64::from(qty))
        .execute(&mut *conn)
        .await?;

    tracing::info!(product_id = %product_id, quantity = qty, "inventory restocked");

    Ok(())
}

/// Reads a product's current counters.
pub async fn get_levels<'e, E>(executor: E, product_id: ProductId) -> Result<Option<StockLevels>>
where
    E: PgExecutor<'e>,
{
    let row: Option<(i64, i64, i64)> = sqlx::query_as(
        "SELECT stock, reserved_stock, sold FROM inventory WHERE product_id = $1",
    )
    .bind(product_id.as_uuid())
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|(stock, reserved, sold)| StockLevels {
        stock: to_u32(stock),
        reserved_stock: to_u32(reserved),
        sold: to_u64(sold),
    }))
}

/// Reads the full ledger record including restock history.
pub async fn get_record(
    pool: &sqlx::PgPool,
    product_id: ProductId,
) -> Result<Option<InventoryRecord>> {
    let row: Option<(i64, i64, i64, DateTime<Utc>)> = sqlx::query_as(
        "SELECT stock, reserved_stock, sold, updated_at FROM inventory WHERE product_id = $1",
    )
    .bind(product_id.as_uuid())
    .fetch_optional(pool)
    .await?;

    let Some((stock, reserved, sold, updated_at)) = row else {
        return Ok(None);
    };

    let restock_rows: Vec<(i64, DateTime<Utc>)> = sqlx::query_as(
        "SELECT quantity, created_at FROM restocks WHERE product_id = $1 ORDER BY created_at",
    )
    .bind(product_id.as_uuid())
    .fetch_all(pool)
    .await?;

    Ok(Some(InventoryRecord {
        product_id,
        levels: StockLevels {
            stock: to_u32(stock),
            reserved_stock: to_u32(reserved),
            sold: to_u64(sold),
        },
        restocks: restock_rows
            .into_iter()
            .map(|(quantity, date)| Restock {
                quantity: to_u32(quantity),
                date,
            })
            .collect(),
        updated_at,
    }))
}
