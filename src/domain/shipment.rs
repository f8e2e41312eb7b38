//! Shipments.
//!
//! A shipment row is created only inside the success branch of payment
//! confirmation, starting `pending` with the order's (or an overridden)
//! delivery address.

use crate::error::Result;
use crate::types::{Address, OrderId, ShipmentId, ShipmentStatus, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgExecutor};

/// A shipment.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    /// Shipment identifier.
    pub id: ShipmentId,
    /// Receiving user.
    pub user_id: UserId,
    /// Order being fulfilled.
    pub order_id: OrderId,
    /// Fulfillment status.
    pub status: ShipmentStatus,
    /// Delivery address.
    pub address: Address,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Inserts a new `pending` shipment inside the caller's transaction.
pub async fn insert(
    conn: &mut PgConnection,
    user_id: UserId,
    order_id: OrderId,
    address: Address,
) -> Result<Shipment> {
    let id = ShipmentId::new();
    let created_at: DateTime<Utc> = sqlx::query_scalar(
        "INSERT INTO shipments (id, user_id, order_id, status, address)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING created_at",
    )
    .bind(id.as_uuid())
    .bind(user_id.as_uuid())
    .bind(order_id.as_uuid())
    .bind(ShipmentStatus::Pending.as_str())
    .bind(serde_json::to_value(&address).unwrap_or(serde_json::Value::Null))
    .fetch_one(conn)
    .await?;

    Ok(Shipment {
        id,
        user_id,
        order_id,
        status: ShipmentStatus::Pending,
        address,
        created_at,
    })
}

/// Looks up the shipment created for an order, if any.
pub async fn find_by_order<'e, E>(executor: E, order_id: OrderId) -> Result<Option<Shipment>>
where
    E: PgExecutor<'e>,
{
    let row: Option<(uuid::Uuid, uuid::Uuid, String, serde_json::Value, DateTime<Utc>)> =
        sqlx::query_as(
            "SELECT id, user_id, status, address, created_at
             FROM shipments
             WHERE order_id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(executor)
        .await?;

    Ok(row.and_then(|(id, user_id, status, address, created_at)| {
        let status = ShipmentStatus::parse(&status)?;
        let address: Address = serde_json::from_value(address).ok()?;
        Some(Shipment {
            id: ShipmentId::from_uuid(id),
            user_id: UserId::from_uuid(user_id),
            order_id,
            status,
            address,
            created_at,
        })
    }))
}
