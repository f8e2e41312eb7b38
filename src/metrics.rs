//! Business metrics for the fulfillment workflow.
//!
//! # Exported metrics
//!
//! - `commerce_checkouts_initiated_total` - Orders created at checkout
//! - `commerce_payments_completed_total` - Payments confirmed as settled
//! - `commerce_payments_failed_total` - Gateway-reported payment failures
//! - `commerce_revenue_cents_total` - Revenue from settled payments, cents

use metrics::describe_counter;

/// Registers metric descriptions. Call once at startup, before any metric
/// is recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "commerce_checkouts_initiated_total",
        "Total number of orders created at checkout"
    );
    describe_counter!(
        "commerce_payments_completed_total",
        "Total number of payments confirmed as settled"
    );
    describe_counter!(
        "commerce_payments_failed_total",
        "Total number of gateway-reported payment failures"
    );
    describe_counter!(
        "commerce_revenue_cents_total",
        "Total revenue from settled payments in cents"
    );

    tracing::info!("business metrics registered");
}
