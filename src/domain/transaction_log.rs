//! Transaction log.
//!
//! Append-only audit trail of payment-gateway responses, one entry per
//! confirmation attempt (success or failure). No update or delete path
//! exists; entries are written inside the confirmation transaction so the
//! trail commits or rolls back with the workflow it records.

use crate::error::Result;
use crate::types::{LogEntryId, LogStatus, OrderId, PaymentId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

/// One audit entry.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Entry identifier.
    pub id: LogEntryId,
    /// User whose payment was confirmed.
    pub user_id: UserId,
    /// Order involved.
    pub order_id: OrderId,
    /// Payment involved.
    pub payment_id: PaymentId,
    /// Outcome of the attempt.
    pub status: LogStatus,
    /// Raw gateway response, preserved for forensic replay.
    pub gateway_response: serde_json::Value,
    /// When the attempt was recorded.
    pub created_at: DateTime<Utc>,
}

/// Appends an entry inside the caller's transaction.
pub async fn append(
    conn: &mut PgConnection,
    user_id: UserId,
    order_id: OrderId,
    payment_id: PaymentId,
    status: LogStatus,
    gateway_response: serde_json::Value,
) -> Result<LogEntry> {
    let id = LogEntryId::new();
    let created_at: DateTime<Utc> = sqlx::query_scalar(
        "INSERT INTO transaction_log (id, user_id, order_id, payment_id, status, gateway_response)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING created_at",
    )
    .bind(id.as_uuid())
    .bind(user_id.as_uuid())
    .bind(order_id.as_uuid())
    .bind(payment_id.as_uuid())
    .bind(status.as_str())
    .bind(&gateway_response)
    .fetch_one(conn)
    .await?;

    Ok(LogEntry {
        id,
        user_id,
        order_id,
        payment_id,
        status,
        gateway_response,
        created_at,
    })
}

/// Lists the newest entries for the admin audit view.
pub async fn list(pool: &PgPool, limit: i64) -> Result<Vec<LogEntry>> {
    #[allow(clippy::type_complexity)]
    let rows: Vec<(
        uuid::Uuid,
        uuid::Uuid,
        uuid::Uuid,
        uuid::Uuid,
        String,
        serde_json::Value,
        DateTime<Utc>,
    )> = sqlx::query_as(
        "SELECT id, user_id, order_id, payment_id, status, gateway_response, created_at
         FROM transaction_log
         ORDER BY created_at DESC
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(
            |(id, user_id, order_id, payment_id, status, gateway_response, created_at)| {
                Some(LogEntry {
                    id: LogEntryId::from_uuid(id),
                    user_id: UserId::from_uuid(user_id),
                    order_id: OrderId::from_uuid(order_id),
                    payment_id: PaymentId::from_uuid(payment_id),
                    status: LogStatus::parse(&status)?,
                    gateway_response,
                    created_at,
                })
            },
        )
        .collect())
}

/// Counts entries for an order, by outcome. Used by tests and audits to
/// assert exactly-once recording.
pub async fn count_for_order(pool: &PgPool, order_id: OrderId, status: LogStatus) -> Result<u64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM transaction_log WHERE order_id = $1 AND status = $2",
    )
    .bind(order_id.as_uuid())
    .bind(status.as_str())
    .fetch_one(pool)
    .await?;
    Ok(u64::try_from(count).unwrap_or(0))
}
