//! End-to-end checkout and payment confirmation tests.
//!
//! Requires Docker. Run with: `cargo test --test checkout_flow_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

mod common;

use commerce_api::domain::{cart, checkout, order, payment, shipment, transaction_log};
use commerce_api::error::Error;
use commerce_api::gateway::MockOutcome;
use commerce_api::types::{
    LogStatus, Money, OrderStatus, PaymentMethod, PaymentStatus, ProductId, Requester,
    ShipmentStatus,
};

async fn cart_with(app: &common::TestApp, user: &Requester, product: ProductId, quantity: u32) {
    cart::add_item(&app.pool, user.user_id, product, quantity)
        .await
        .unwrap();
}

/// Seeds a product, fills the cart and opens a payment session, returning
/// the order and the pending payment intent.
async fn order_with_payment(
    app: &common::TestApp,
    user: &Requester,
    product: ProductId,
    quantity: u32,
) -> (order::Order, checkout::PaymentIntent) {
    cart_with(app, user, product, quantity).await;

    let order = checkout::initiate_checkout(
        &app.pool,
        user.user_id,
        PaymentMethod::Stripe,
        common::address(),
    )
    .await
    .unwrap();

    let intent = checkout::create_payment(&app.pool, app.gateway.as_ref(), order.id, user)
        .await
        .unwrap();

    (order, intent)
}

#[tokio::test]
async fn checkout_snapshots_cart_with_frozen_prices() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    cart_with(&app, &user, product, 2).await;

    let created = checkout::initiate_checkout(
        &app.pool,
        user.user_id,
        PaymentMethod::Stripe,
        common::address(),
    )
    .await
    .unwrap();

    assert_eq!(created.status, OrderStatus::Pending);
    assert_eq!(created.total_price, Money::from_dollars(20));
    assert_eq!(created.items.len(), 1);
    assert_eq!(created.items[0].quantity, 2);
    assert_eq!(created.items[0].price_at_purchase, Money::from_dollars(10));

    // A later price change must not leak into the frozen snapshot.
    sqlx::query("UPDATE products SET price_cents = 9999 WHERE id = $1")
        .bind(product.as_uuid())
        .execute(&app.pool)
        .await
        .unwrap();

    let reloaded = order::get(&app.pool, created.id, &user).await.unwrap();
    assert_eq!(reloaded.total_price, Money::from_dollars(20));
    assert_eq!(reloaded.items[0].price_at_purchase, Money::from_dollars(10));

    // Checkout itself does not touch the ledger; the cart's reservation
    // still holds the stock.
    assert_eq!(common::levels(&app.pool, product).await, (3, 2, 0));
    assert!(common::cart_exists(&app.pool, user.user_id).await);
}

#[tokio::test]
async fn checkout_requires_a_nonempty_cart() {
    let app = common::spawn().await;
    let user = common::customer();

    let err = checkout::initiate_checkout(
        &app.pool,
        user.user_id,
        PaymentMethod::Stripe,
        common::address(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn second_open_order_conflicts() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    cart_with(&app, &user, product, 2).await;

    checkout::initiate_checkout(
        &app.pool,
        user.user_id,
        PaymentMethod::Stripe,
        common::address(),
    )
    .await
    .unwrap();

    let err = checkout::initiate_checkout(
        &app.pool,
        user.user_id,
        PaymentMethod::Stripe,
        common::address(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn cancelling_a_pending_order_frees_the_open_order_slot() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    cart_with(&app, &user, product, 2).await;

    let first = checkout::initiate_checkout(
        &app.pool,
        user.user_id,
        PaymentMethod::Stripe,
        common::address(),
    )
    .await
    .unwrap();

    let cancelled = order::cancel(&app.pool, first.id, &user).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    // The cart survived the cancelled order, so checkout works again.
    let second = checkout::initiate_checkout(
        &app.pool,
        user.user_id,
        PaymentMethod::Stripe,
        common::address(),
    )
    .await
    .unwrap();
    assert_eq!(second.status, OrderStatus::Pending);
}

#[tokio::test]
async fn create_payment_records_a_pending_session() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    let (created, intent) = order_with_payment(&app, &user, product, 2).await;

    assert_eq!(intent.payment.status, PaymentStatus::Pending);
    assert_eq!(intent.payment.order_id, created.id);
    assert!(intent.payment.session_id.starts_with("mock_cs_"));
    assert!(!intent.checkout_url.is_empty());

    let stored = payment::get(&app.pool, intent.payment.id, &user)
        .await
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert_eq!(stored.session_id, intent.payment.session_id);
}

#[tokio::test]
async fn duplicate_live_payment_conflicts() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    let (created, _) = order_with_payment(&app, &user, product, 2).await;

    let err = checkout::create_payment(&app.pool, app.gateway.as_ref(), created.id, &user)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // The session opens before the insert that loses to the index, so the
    // gateway saw both attempts; only the first became a payment row.
    assert_eq!(app.gateway.session_count(), 2);
}

#[tokio::test]
async fn foreign_user_cannot_open_a_payment() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    cart_with(&app, &user, product, 2).await;

    let created = checkout::initiate_checkout(
        &app.pool,
        user.user_id,
        PaymentMethod::Stripe,
        common::address(),
    )
    .await
    .unwrap();

    let stranger = common::customer();
    let err = checkout::create_payment(&app.pool, app.gateway.as_ref(), created.id, &stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
}

#[tokio::test]
async fn successful_confirmation_settles_the_whole_workflow() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    let (created, intent) = order_with_payment(&app, &user, product, 2).await;

    let confirmed = checkout::confirm_payment(
        &app.pool,
        app.gateway.as_ref(),
        intent.payment.id,
        &intent.payment.session_id,
        &user,
        None,
    )
    .await
    .unwrap();

    assert_eq!(confirmed.order.status, OrderStatus::Processing);
    assert_eq!(confirmed.payment.status, PaymentStatus::Completed);
    assert_eq!(confirmed.shipment.status, ShipmentStatus::Pending);
    assert_eq!(confirmed.shipment.order_id, created.id);
    assert_eq!(confirmed.transaction.status, LogStatus::Success);

    // Reserved units moved to sold; nothing returned to available stock.
    assert_eq!(common::levels(&app.pool, product).await, (3, 0, 2));

    // The fulfilled cart is gone without releasing anything.
    assert!(!common::cart_exists(&app.pool, user.user_id).await);

    let stored_order = order::get(&app.pool, created.id, &user).await.unwrap();
    assert_eq!(stored_order.status, OrderStatus::Processing);

    let stored_payment = payment::get(&app.pool, intent.payment.id, &user)
        .await
        .unwrap();
    assert_eq!(stored_payment.status, PaymentStatus::Completed);

    let stored_shipment = shipment::find_by_order(&app.pool, created.id)
        .await
        .unwrap()
        .expect("shipment missing");
    assert_eq!(stored_shipment.status, ShipmentStatus::Pending);
    assert_eq!(stored_shipment.address, common::address());

    let successes = transaction_log::count_for_order(&app.pool, created.id, LogStatus::Success)
        .await
        .unwrap();
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn confirmation_honors_an_address_override() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    let (created, intent) = order_with_payment(&app, &user, product, 1).await;

    let mut override_address = common::address();
    override_address.street = "Ramses".to_string();
    override_address.building = 99;

    let confirmed = checkout::confirm_payment(
        &app.pool,
        app.gateway.as_ref(),
        intent.payment.id,
        &intent.payment.session_id,
        &user,
        Some(override_address.clone()),
    )
    .await
    .unwrap();

    assert_eq!(confirmed.shipment.address, override_address);

    let stored = shipment::find_by_order(&app.pool, created.id)
        .await
        .unwrap()
        .expect("shipment missing");
    assert_eq!(stored.address, override_address);
}

#[tokio::test]
async fn failed_confirmation_marks_payment_and_order_failed() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    let (created, intent) = order_with_payment(&app, &user, product, 2).await;

    app.gateway
        .set_outcome(MockOutcome::Declined("card declined".to_string()));

    let err = checkout::confirm_payment(
        &app.pool,
        app.gateway.as_ref(),
        intent.payment.id,
        &intent.payment.session_id,
        &user,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::PaymentFailed { .. }));

    let stored_payment = payment::get(&app.pool, intent.payment.id, &user)
        .await
        .unwrap();
    assert_eq!(stored_payment.status, PaymentStatus::Failed);

    let stored_order = order::get(&app.pool, created.id, &user).await.unwrap();
    assert_eq!(stored_order.status, OrderStatus::Failed);

    let failures = transaction_log::count_for_order(&app.pool, created.id, LogStatus::Failed)
        .await
        .unwrap();
    assert_eq!(failures, 1);

    // No shipment, no settlement: the cart keeps its reservation so the
    // user can retry with a fresh order.
    assert!(shipment::find_by_order(&app.pool, created.id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(common::levels(&app.pool, product).await, (3, 2, 0));
    assert!(common::cart_exists(&app.pool, user.user_id).await);
}

#[tokio::test]
async fn failed_order_allows_a_retry_checkout() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    let (_, intent) = order_with_payment(&app, &user, product, 2).await;

    app.gateway
        .set_outcome(MockOutcome::Declined("card declined".to_string()));
    let _ = checkout::confirm_payment(
        &app.pool,
        app.gateway.as_ref(),
        intent.payment.id,
        &intent.payment.session_id,
        &user,
        None,
    )
    .await;

    // The failed order is terminal, so the open-order slot is free and the
    // surviving cart checks out again at full strength.
    app.gateway.set_outcome(MockOutcome::Paid);
    let retry = checkout::initiate_checkout(
        &app.pool,
        user.user_id,
        PaymentMethod::Stripe,
        common::address(),
    )
    .await
    .unwrap();
    assert_eq!(retry.total_price, Money::from_dollars(20));

    let retry_intent = checkout::create_payment(&app.pool, app.gateway.as_ref(), retry.id, &user)
        .await
        .unwrap();
    checkout::confirm_payment(
        &app.pool,
        app.gateway.as_ref(),
        retry_intent.payment.id,
        &retry_intent.payment.session_id,
        &user,
        None,
    )
    .await
    .unwrap();

    assert_eq!(common::levels(&app.pool, product).await, (3, 0, 2));
}

#[tokio::test]
async fn repeated_confirmation_conflicts_and_settles_once() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    let (created, intent) = order_with_payment(&app, &user, product, 2).await;

    checkout::confirm_payment(
        &app.pool,
        app.gateway.as_ref(),
        intent.payment.id,
        &intent.payment.session_id,
        &user,
        None,
    )
    .await
    .unwrap();

    let err = checkout::confirm_payment(
        &app.pool,
        app.gateway.as_ref(),
        intent.payment.id,
        &intent.payment.session_id,
        &user,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // No double settlement, no duplicate audit entry.
    assert_eq!(common::levels(&app.pool, product).await, (3, 0, 2));
    let successes = transaction_log::count_for_order(&app.pool, created.id, LogStatus::Success)
        .await
        .unwrap();
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn session_mismatch_is_rejected() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    let (_, intent) = order_with_payment(&app, &user, product, 2).await;

    let err = checkout::confirm_payment(
        &app.pool,
        app.gateway.as_ref(),
        intent.payment.id,
        "mock_cs_99999999",
        &user,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let stored = payment::get(&app.pool, intent.payment.id, &user)
        .await
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn foreign_user_cannot_confirm() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    let (_, intent) = order_with_payment(&app, &user, product, 2).await;

    let stranger = common::customer();
    let err = checkout::confirm_payment(
        &app.pool,
        app.gateway.as_ref(),
        intent.payment.id,
        &intent.payment.session_id,
        &stranger,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
}

#[tokio::test]
async fn gateway_outage_leaves_the_payment_confirmable() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    let (created, intent) = order_with_payment(&app, &user, product, 2).await;

    app.gateway.set_outcome(MockOutcome::Unreachable);
    let err = checkout::confirm_payment(
        &app.pool,
        app.gateway.as_ref(),
        intent.payment.id,
        &intent.payment.session_id,
        &user,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Gateway(_)));

    // Nothing was written: the same payment confirms once the gateway is
    // reachable again.
    let stored = payment::get(&app.pool, intent.payment.id, &user)
        .await
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert_eq!(common::levels(&app.pool, product).await, (3, 2, 0));

    app.gateway.set_outcome(MockOutcome::Paid);
    let confirmed = checkout::confirm_payment(
        &app.pool,
        app.gateway.as_ref(),
        intent.payment.id,
        &intent.payment.session_id,
        &user,
        None,
    )
    .await
    .unwrap();
    assert_eq!(confirmed.order.id, created.id);
    assert_eq!(common::levels(&app.pool, product).await, (3, 0, 2));
}

#[tokio::test]
async fn inconsistent_ledger_aborts_confirmation_atomically() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    let (created, intent) = order_with_payment(&app, &user, product, 2).await;

    // Corrupt the ledger so settlement cannot cover the order line.
    sqlx::query("UPDATE inventory SET reserved_stock = 0 WHERE product_id = $1")
        .bind(product.as_uuid())
        .execute(&app.pool)
        .await
        .unwrap();

    let err = checkout::confirm_payment(
        &app.pool,
        app.gateway.as_ref(),
        intent.payment.id,
        &intent.payment.session_id,
        &user,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::InventoryInconsistency { .. }));

    // The whole transaction rolled back: payment and order untouched, no
    // shipment, no audit entry, cart intact.
    let stored_payment = payment::get(&app.pool, intent.payment.id, &user)
        .await
        .unwrap();
    assert_eq!(stored_payment.status, PaymentStatus::Pending);

    let stored_order = order::get(&app.pool, created.id, &user).await.unwrap();
    assert_eq!(stored_order.status, OrderStatus::Pending);

    assert!(shipment::find_by_order(&app.pool, created.id)
        .await
        .unwrap()
        .is_none());
    let entries = transaction_log::count_for_order(&app.pool, created.id, LogStatus::Success)
        .await
        .unwrap();
    assert_eq!(entries, 0);
    assert!(common::cart_exists(&app.pool, user.user_id).await);
}

#[tokio::test]
async fn processing_orders_cannot_be_cancelled() {
    let app = common::spawn().await;
    let product = common::seed_product(&app.pool, Money::from_dollars(10), 5).await;
    let user = common::customer();
    let (created, intent) = order_with_payment(&app, &user, product, 2).await;

    checkout::confirm_payment(
        &app.pool,
        app.gateway.as_ref(),
        intent.payment.id,
        &intent.payment.session_id,
        &user,
        None,
    )
    .await
    .unwrap();

    let err = order::cancel(&app.pool, created.id, &user).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}
