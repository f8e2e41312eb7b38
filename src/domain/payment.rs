//! Payment records.
//!
//! One row per opened checkout session, keyed by the gateway session id.
//! A partial unique index keeps at most one non-failed payment per order, so
//! a retried create-intent call cannot attach two live payments to one
//! order.

use crate::error::{Error, Result};
use crate::types::{OrderId, PaymentId, PaymentMethod, PaymentStatus, Requester, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};

/// A payment record.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Payment identifier.
    pub id: PaymentId,
    /// Paying user.
    pub user_id: UserId,
    /// Order this payment targets.
    pub order_id: OrderId,
    /// ISO currency code.
    pub currency: String,
    /// Payment method.
    pub payment_method: PaymentMethod,
    /// Settlement status.
    pub status: PaymentStatus,
    /// Gateway checkout-session id (unique).
    pub session_id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Verifies the requester owns this payment.
    pub fn authorize(&self, requester: &Requester) -> Result<()> {
        if self.user_id == requester.user_id {
            Ok(())
        } else {
            Err(Error::forbidden("not authorized to access this payment"))
        }
    }
}

type PaymentRow = (
    uuid::Uuid,
    uuid::Uuid,
    String,
    String,
    String,
    String,
    DateTime<Utc>,
);

fn parse_row(id: PaymentId, row: PaymentRow) -> Result<Payment> {
    let (user_id, order_id, currency, payment_method, status, session_id, created_at) = row;

    let payment_method = PaymentMethod::parse(&payment_method)
        .ok_or_else(|| Error::validation(format!("unknown payment method: {payment_method}")))?;
    let status = PaymentStatus::parse(&status)
        .ok_or_else(|| Error::validation(format!("unknown payment status: {status}")))?;

    Ok(Payment {
        id,
        user_id: UserId::from_uuid(user_id),
        order_id: OrderId::from_uuid(order_id),
        currency,
        payment_method,
        status,
        session_id,
        created_at,
    })
}

const COLUMNS: &str =
    "user_id, order_id, currency, payment_method, status, session_id, created_at";

/// Inserts a new `pending` payment.
///
/// # Errors
///
/// `Conflict` when the order already carries a non-failed payment.
pub async fn insert(conn: &mut PgConnection, payment: &Payment) -> Result<()> {
    sqlx::query(
        "INSERT INTO payments (id, user_id, order_id, currency, payment_method, status, session_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(payment.id.as_uuid())
    .bind(payment.user_id.as_uuid())
    .bind(payment.order_id.as_uuid())
    .bind(&payment.currency)
    .bind(payment.payment_method.as_str())
    .bind(payment.status.as_str())
    .bind(&payment.session_id)
    .execute(&mut *conn)
    .await
    .map_err(|err| {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.constraint() == Some("payments_one_live_per_order") {
                return Error::conflict("a payment is already open for this order");
            }
        }
        Error::Database(err)
    })?;

    Ok(())
}

/// Loads a payment.
pub async fn load(conn: &mut PgConnection, payment_id: PaymentId) -> Result<Option<Payment>> {
    let row: Option<PaymentRow> =
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM payments WHERE id = $1"))
            .bind(payment_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;

    row.map(|row| parse_row(payment_id, row)).transpose()
}

/// Loads a payment and locks its row for the rest of the transaction.
///
/// Concurrent confirmation attempts for the same payment serialize on this
/// lock, which is what makes the at-most-one-settlement guarantee hold.
pub async fn load_for_update(
    conn: &mut PgConnection,
    payment_id: PaymentId,
) -> Result<Option<Payment>> {
    let row: Option<PaymentRow> = sqlx::query_as(&format!(
        "SELECT {COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
    ))
    .bind(payment_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| parse_row(payment_id, row)).transpose()
}

/// Updates a payment's settlement status.
pub async fn set_status(
    conn: &mut PgConnection,
    payment_id: PaymentId,
    status: PaymentStatus,
) -> Result<()> {
    sqlx::query("UPDATE payments SET status = $2, updated_at = now() WHERE id = $1")
        .bind(payment_id.as_uuid())
        .bind(status.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

/// Owner-scoped payment lookup.
pub async fn get(pool: &PgPool, payment_id: PaymentId, requester: &Requester) -> Result<Payment> {
    let mut conn = pool.acquire().await?;
    let payment = load(&mut conn, payment_id)
        .await?
        .ok_or_else(|| Error::not_found("Payment"))?;
    payment.authorize(requester)?;
    Ok(payment)
}
