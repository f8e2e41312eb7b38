//! Order aggregate.
//!
//! An order is an immutable snapshot of cart contents taken at checkout,
//! with `price_at_purchase` frozen per line, plus a status state machine:
//! `pending → processing → shipped → delivered`, exiting to `cancelled` or
//! `failed`. At most one non-terminal order exists per user, enforced by a
//! partial unique index rather than a check-then-insert query.

use crate::error::{Error, Result};
use crate::types::{Address, Money, OrderId, OrderStatus, PaymentMethod, Requester, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

/// One frozen order line.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Product ordered.
    pub product_id: crate::types::ProductId,
    /// Units ordered.
    pub quantity: u32,
    /// Unit price frozen at checkout, immune to later price changes.
    pub price_at_purchase: Money,
}

/// An order.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order identifier.
    pub id: OrderId,
    /// Owning user.
    pub user_id: UserId,
    /// Frozen lines.
    pub items: Vec<OrderItem>,
    /// Total at the frozen prices.
    pub total_price: Money,
    /// ISO currency code.
    pub currency: String,
    /// Chosen payment method.
    pub payment_method: PaymentMethod,
    /// Delivery address.
    pub address: Address,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Verifies the requester owns this order.
    pub fn authorize(&self, requester: &Requester) -> Result<()> {
        if self.user_id == requester.user_id {
            Ok(())
        } else {
            Err(Error::forbidden("not authorized to access this order"))
        }
    }
}

fn duplicate_order_error(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some("orders_one_open_per_user") {
            return Error::conflict("an open order already exists for this user");
        }
    }
    Error::Database(err)
}

/// Inserts a new `pending` order with its frozen lines.
///
/// # Errors
///
/// `Conflict` when the user already has a non-terminal order (partial unique
/// index violation).
pub async fn insert(conn: &mut PgConnection, order: &Order) -> Result<()> {
    sqlx::query(
        "INSERT INTO orders (id, user_id, status, total_price_cents, currency, payment_method, address)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(order.id.as_uuid())
    .bind(order.user_id.as_uuid())
    .bind(order.status.as_str())
    .bind(i64::try_from(order.total_price.cents()).unwrap_or(i64::MAX))
    .bind(&order.currency)
    .bind(order.payment_method.as_str())
    .bind(serde_json::to_value(&order.address).unwrap_or(serde_json::Value::Null))
    .execute(&mut *conn)
    .await
    .map_err(duplicate_order_error)?;

    for item in &order.items {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, price_at_purchase_cents)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(order.id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(i64::from(item.quantity))
        .bind(i64::try_from(item.price_at_purchase.cents()).unwrap_or(i64::MAX))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Whether the user currently has an open (non-terminal) order.
pub async fn has_open_order(conn: &mut PgConnection, user_id: UserId) -> Result<bool> {
    let row: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM orders
         WHERE user_id = $1 AND status NOT IN ('cancelled', 'delivered', 'failed')
         LIMIT 1",
    )
    .bind(user_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.is_some())
}

async fn load_items(conn: &mut PgConnection, order_id: OrderId) -> Result<Vec<OrderItem>> {
    let rows: Vec<(uuid::Uuid, i64, i64)> = sqlx::query_as(
        "SELECT product_id, quantity, price_at_purchase_cents
         FROM order_items
         WHERE order_id = $1
         ORDER BY product_id",
    )
    .bind(order_id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(product_id, quantity, cents)| OrderItem {
            product_id: crate::types::ProductId::from_uuid(product_id),
            quantity: u32::try_from(quantity).unwrap_or(0),
            price_at_purchase: Money::from_cents(u64::try_from(cents).unwrap_or(0)),
        })
        .collect())
}

#[allow(clippy::type_complexity)]
fn parse_order_row(
    id: OrderId,
    row: (
        uuid::Uuid,
        String,
        i64,
        String,
        String,
        serde_json::Value,
        DateTime<Utc>,
    ),
    items: Vec<OrderItem>,
) -> Result<Order> {
    let (user_id, status, total_cents, currency, payment_method, address, created_at) = row;

    let status = OrderStatus::parse(&status)
        .ok_or_else(|| Error::validation(format!("unknown order status: {status}")))?;
    let payment_method = PaymentMethod::parse(&payment_method)
        .ok_or_else(|| Error::validation(format!("unknown payment method: {payment_method}")))?;
    let address: Address = serde_json::from_value(address)
        .map_err(|e| Error::validation(format!("malformed stored address: {e}")))?;

    Ok(Order {
        id,
        user_id: UserId::from_uuid(user_id),
        items,
        total_price: Money::from_cents(u64::try_from(total_cents).unwrap_or(0)),
        currency,
        payment_method,
        address,
        status,
        created_at,
    })
}

/// Loads an order with its lines.
pub async fn load(conn: &mut PgConnection, order_id: OrderId) -> Result<Option<Order>> {
    #[allow(clippy::type_complexity)]
    let row: Option<(
        uuid::Uuid,
        String,
        i64,
        String,
        String,
        serde_json::Value,
        DateTime<Utc>,
    )> = sqlx::query_as(
        "SELECT user_id, status, total_price_cents, currency, payment_method, address, created_at
         FROM orders
         WHERE id = $1",
    )
    .bind(order_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let items = load_items(conn, order_id).await?;
    parse_order_row(order_id, row, items).map(Some)
}

/// Loads an order and locks its row for the rest of the transaction.
pub async fn load_for_update(conn: &mut PgConnection, order_id: OrderId) -> Result<Option<Order>> {
    #[allow(clippy::type_complexity)]
    let row: Option<(
        uuid::Uuid,
        String,
        i64,
        String,
        String,
        serde_json::Value,
        DateTime<Utc>,
    )> = sqlx::query_as(
        "SELECT user_id, status, total_price_cents, currency, payment_method, address, created_at
         FROM orders
         WHERE id = $1
         FOR UPDATE",
    )
    .bind(order_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let items = load_items(conn, order_id).await?;
    parse_order_row(order_id, row, items).map(Some)
}

/// Applies a status transition, enforcing the state machine.
///
/// # Errors
///
/// `Conflict` when the machine forbids `current → next` or when a concurrent
/// writer moved the order away from `current` first.
pub async fn transition(
    conn: &mut PgConnection,
    order_id: OrderId,
    current: OrderStatus,
    next: OrderStatus,
) -> Result<()> {
    if !current.can_transition_to(next) {
        return Err(Error::conflict(format!(
            "order cannot move from {current} to {next}"
        )));
    }

    let result = sqlx::query(
        "UPDATE orders SET status = $3, updated_at = now() WHERE id = $1 AND status = $2",
    )
    .bind(order_id.as_uuid())
    .bind(current.as_str())
    .bind(next.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        Ok(())
    } else {
        Err(Error::conflict(format!(
            "order is no longer {current}"
        )))
    }
}

/// User-initiated cancellation; only legal from `pending`.
pub async fn cancel(pool: &PgPool, order_id: OrderId, requester: &Requester) -> Result<Order> {
    let mut tx = pool.begin().await?;

    let order = load_for_update(&mut tx, order_id)
        .await?
        .ok_or_else(|| Error::not_found("Order"))?;
    order.authorize(requester)?;

    if order.status != OrderStatus::Pending {
        return Err(Error::conflict(
            "order can no longer be cancelled, it is already being processed",
        ));
    }

    transition(&mut tx, order_id, OrderStatus::Pending, OrderStatus::Cancelled).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order_id, "order cancelled");

    Ok(Order {
        status: OrderStatus::Cancelled,
        ..order
    })
}

/// Owner-scoped order lookup.
pub async fn get(pool: &PgPool, order_id: OrderId, requester: &Requester) -> Result<Order> {
    let mut conn = pool.acquire().await?;
    let order = load(&mut conn, order_id)
        .await?
        .ok_or_else(|| Error::not_found("Order"))?;
    order.authorize(requester)?;
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_owned_by(user_id: UserId) -> Order {
        Order {
            id: OrderId::new(),
            user_id,
            items: vec![],
            total_price: Money::from_dollars(20),
            currency: "usd".to_string(),
            payment_method: PaymentMethod::Stripe,
            address: Address {
                country: "EG".to_string(),
                state: "Cairo".to_string(),
                street: "Tahrir".to_string(),
                building: 12,
                flat_number: 3,
            },
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn owner_is_authorized() {
        let user_id = UserId::new();
        let order = order_owned_by(user_id);
        let requester = Requester {
            user_id,
            role: crate::types::Role::Customer,
        };
        assert!(order.authorize(&requester).is_ok());
    }

    #[test]
    fn other_users_are_forbidden() {
        let order = order_owned_by(UserId::new());
        let requester = Requester {
            user_id: UserId::new(),
            role: crate::types::Role::Customer,
        };
        assert!(matches!(
            order.authorize(&requester),
            Err(Error::Forbidden(_))
        ));
    }
}
