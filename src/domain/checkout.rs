//! Checkout orchestrator.
//!
//! Ties cart, inventory, order, payment, shipment and transaction log into
//! the order-fulfillment workflow:
//!
//! 1. `initiate_checkout` snapshots the cart into a `pending` order (the
//!    cart's reservations already hold the stock; inventory is not touched).
//! 2. `create_payment` opens a hosted gateway session and records a
//!    `pending` payment keyed by the session id.
//! 3. `confirm_payment` queries the gateway, then applies the outcome in a
//!    single database transaction: on success the reservations settle into
//!    sales, a shipment is created, the cart is deleted and a success entry
//!    is logged; on failure the payment and order are marked failed and a
//!    failure entry is logged. Any error inside the transaction rolls the
//!    whole step back, which is what makes settlement at-most-once.
//!
//! Gateway I/O always happens outside an open transaction, so no row locks
//! are held across a network call.

use crate::domain::{cart, inventory, order, payment, shipment, transaction_log};
use crate::error::{Error, Result};
use crate::gateway::{PaymentGateway, SessionRequest};
use crate::types::{
    Address, LogStatus, Money, OrderId, OrderStatus, PaymentId, PaymentMethod, PaymentStatus,
    Requester, UserId,
};
use sqlx::PgPool;

/// Result of opening a payment session for an order.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    /// The persisted `pending` payment.
    pub payment: payment::Payment,
    /// Hosted payment page for the client to complete out-of-band.
    pub checkout_url: String,
}

/// Everything written by a successful confirmation.
#[derive(Debug, Clone)]
pub struct ConfirmedCheckout {
    /// Audit entry for this attempt.
    pub transaction: transaction_log::LogEntry,
    /// The order, now `processing`.
    pub order: order::Order,
    /// The payment, now `completed`.
    pub payment: payment::Payment,
    /// The freshly created `pending` shipment.
    pub shipment: shipment::Shipment,
}

/// Creates a `pending` order from the user's cart.
///
/// Cart lines are snapshotted with `price_at_purchase` frozen at the
/// product's current price; the order total is the sum over the frozen
/// lines. Inventory is not touched here: the reservations made by cart
/// mutations already hold the stock.
///
/// # Errors
///
/// `Validation` when the address is missing content, `Conflict` when the
/// user already has a non-terminal order, `Validation`(empty cart) when the
/// cart is missing or empty.
pub async fn initiate_checkout(
    pool: &PgPool,
    user_id: UserId,
    payment_method: PaymentMethod,
    address: Address,
) -> Result<order::Order> {
    let mut tx = pool.begin().await?;

    // Early duplicate check for a friendly error; the partial unique index
    // closes the race between two concurrent checkouts.
    if order::has_open_order(&mut tx, user_id).await? {
        return Err(Error::conflict("an open order already exists for this user"));
    }

    let lines: Vec<(uuid::Uuid, i64, i64)> = sqlx::query_as(
        "SELECT ci.product_id, ci.quantity, p.price_cents
         FROM cart_items ci
         JOIN products p ON p.id = ci.product_id
         WHERE ci.user_id = $1
         ORDER BY ci.added_at, ci.product_id",
    )
    .bind(user_id.as_uuid())
    .fetch_all(&mut *tx)
    .await?;

    if lines.is_empty() {
        return Err(Error::validation("cart is empty"));
    }

    let items: Vec<order::OrderItem> = lines
        .into_iter()
        .map(|(product_id, quantity, price_cents)| order::OrderItem {
            product_id: crate::types::ProductId::from_uuid(product_id),
            quantity: u32::try_from(quantity).unwrap_or(0),
            price_at_purchase: Money::from_cents(u64::try_from(price_cents).unwrap_or(0)),
        })
        .collect();

    let total_price = items.iter().fold(Money::ZERO, |acc, item| {
        acc.saturating_add(item.price_at_purchase.saturating_mul(item.quantity))
    });

    let new_order = order::Order {
        id: OrderId::new(),
        user_id,
        items,
        total_price,
        currency: "usd".to_string(),
        payment_method,
        address,
        status: OrderStatus::Pending,
        created_at: chrono::Utc::now(),
    };

    order::insert(&mut tx, &new_order).await?;
    tx.commit().await?;

    metrics::counter!("commerce_checkouts_initiated_total").increment(1);
    tracing::info!(
        order_id = %new_order.id,
        user_id = %user_id,
        total_cents = new_order.total_price.cents(),
        "checkout initiated"
    );

    Ok(new_order)
}

/// Opens a gateway checkout session for a `pending` order and records the
/// payment.
///
/// # Errors
///
/// `NotFound`/`Forbidden` on the usual checks, `Conflict` when the order is
/// no longer `pending` or already carries a live payment, `Gateway` when the
/// provider call fails (nothing is persisted in that case).
pub async fn create_payment(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    order_id: OrderId,
    requester: &Requester,
) -> Result<PaymentIntent> {
    let target = {
        let mut conn = pool.acquire().await?;
        order::load(&mut conn, order_id)
            .await?
            .ok_or_else(|| Error::not_found("Order"))?
    };
    target.authorize(requester)?;

    if target.status != OrderStatus::Pending {
        return Err(Error::conflict("payment already processed for this order"));
    }

    // Gateway call happens before any write; a failure here leaves nothing
    // to roll back.
    let session = gateway
        .create_checkout_session(SessionRequest {
            amount: target.total_price,
            currency: target.currency.clone(),
            order_id,
            user_id: target.user_id,
        })
        .await?;

    let record = payment::Payment {
        id: PaymentId::new(),
        user_id: target.user_id,
        order_id,
        currency: target.currency.clone(),
        payment_method: target.payment_method,
        status: PaymentStatus::Pending,
        session_id: session.session_id,
        created_at: chrono::Utc::now(),
    };

    let mut tx = pool.begin().await?;
    payment::insert(&mut tx, &record).await?;
    tx.commit().await?;

    tracing::info!(
        payment_id = %record.id,
        order_id = %order_id,
        session_id = %record.session_id,
        "payment session recorded"
    );

    Ok(PaymentIntent {
        payment: record,
        checkout_url: session.checkout_url,
    })
}

/// Confirms a payment after the client completed (or abandoned) the hosted
/// checkout page.
///
/// The gateway is queried first, outside any transaction; the outcome is
/// then applied atomically with the payment row locked, so two concurrent
/// confirmations serialize and the loser sees `Conflict`.
///
/// # Errors
///
/// `PaymentFailed` when the gateway reports an unsettled session (the
/// failure is still committed: payment and order move to `failed` and a
/// failure entry lands in the transaction log). `InventoryInconsistency`
/// aborts everything. `Conflict` for an already-completed or
/// already-failed payment.
pub async fn confirm_payment(
    pool: &PgPool,
    gateway: &dyn PaymentGateway,
    payment_id: PaymentId,
    session_id: &str,
    requester: &Requester,
    address_override: Option<Address>,
) -> Result<ConfirmedCheckout> {
    // Cheap pre-checks before the gateway round-trip.
    let candidate = {
        let mut conn = pool.acquire().await?;
        payment::load(&mut conn, payment_id)
            .await?
            .ok_or_else(|| Error::not_found("Payment"))?
    };
    candidate.authorize(requester)?;
    check_confirmable(&candidate, session_id)?;

    let status = gateway.get_session_status(session_id).await?;

    let mut tx = pool.begin().await?;

    // Re-load under lock: the pre-check may have raced another confirm.
    let locked = payment::load_for_update(&mut tx, payment_id)
        .await?
        .ok_or_else(|| Error::not_found("Payment"))?;
    check_confirmable(&locked, session_id)?;

    let target = order::load_for_update(&mut tx, locked.order_id)
        .await?
        .ok_or_else(|| Error::not_found("Order"))?;

    if !status.success {
        let reason = status
            .failure_reason
            .clone()
            .unwrap_or_else(|| format!("session status is {}", status.status));

        payment::set_status(&mut tx, payment_id, PaymentStatus::Failed).await?;
        order::transition(&mut tx, target.id, target.status, OrderStatus::Failed).await?;
        transaction_log::append(
            &mut tx,
            locked.user_id,
            target.id,
            payment_id,
            LogStatus::Failed,
            status.raw,
        )
        .await?;
        tx.commit().await?;

        // The cart (and its reservations) deliberately stays alive: the
        // user keeps the held stock and can retry with a fresh order.
        metrics::counter!("commerce_payments_failed_total").increment(1);
        tracing::warn!(payment_id = %payment_id, order_id = %target.id, %reason, "payment confirmation failed");

        return Err(Error::PaymentFailed { reason });
    }

    payment::set_status(&mut tx, payment_id, PaymentStatus::Completed).await?;
    order::transition(&mut tx, target.id, target.status, OrderStatus::Processing).await?;

    // Settlement: reserved -> sold, per line. Any shortfall means the
    // bookkeeping upstream is broken; the error aborts the transaction and
    // every write above rolls back.
    for item in &target.items {
        inventory::settle(&mut tx, item.product_id, item.quantity).await?;
    }

    let delivery_address = address_override.unwrap_or_else(|| target.address.clone());
    let new_shipment =
        shipment::insert(&mut tx, locked.user_id, target.id, delivery_address).await?;

    cart::delete_for_checkout(&mut tx, locked.user_id).await?;

    let entry = transaction_log::append(
        &mut tx,
        locked.user_id,
        target.id,
        payment_id,
        LogStatus::Success,
        status.raw,
    )
    .await?;

    tx.commit().await?;

    metrics::counter!("commerce_payments_completed_total").increment(1);
    metrics::counter!("commerce_revenue_cents_total").increment(target.total_price.cents());
    tracing::info!(
        payment_id = %payment_id,
        order_id = %target.id,
        shipment_id = %new_shipment.id,
        amount_cents = target.total_price.cents(),
        "payment confirmed, order processing"
    );

    Ok(ConfirmedCheckout {
        transaction: entry,
        order: order::Order {
            status: OrderStatus::Processing,
            ..target
        },
        payment: payment::Payment {
            status: PaymentStatus::Completed,
            ..locked
        },
        shipment: new_shipment,
    })
}

fn check_confirmable(record: &payment::Payment, session_id: &str) -> Result<()> {
    if record.session_id != session_id {
        return Err(Error::validation("payment session id mismatch"));
    }
    match record.status {
        PaymentStatus::Pending => Ok(()),
        PaymentStatus::Completed => Err(Error::conflict("payment already processed")),
        PaymentStatus::Failed => Err(Error::conflict(
            "payment already failed; open a new payment for a new order",
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(status: PaymentStatus) -> payment::Payment {
        payment::Payment {
            id: PaymentId::new(),
            user_id: UserId::new(),
            order_id: OrderId::new(),
            currency: "usd".to_string(),
            payment_method: PaymentMethod::Stripe,
            status,
            session_id: "cs_123".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pending_payment_with_matching_session_is_confirmable() {
        assert!(check_confirmable(&record(PaymentStatus::Pending), "cs_123").is_ok());
    }

    #[test]
    fn session_mismatch_is_a_validation_error() {
        let err = check_confirmable(&record(PaymentStatus::Pending), "cs_999").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn completed_payment_conflicts() {
        let err = check_confirmable(&record(PaymentStatus::Completed), "cs_123").unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn failed_payment_conflicts() {
        let err = check_confirmable(&record(PaymentStatus::Failed), "cs_123").unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
