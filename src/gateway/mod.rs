//! Payment session broker.
//!
//! Wraps the external payment gateway behind a trait: one call opens a
//! hosted checkout session for an order, a second queries the session's
//! settlement status. The raw gateway response is preserved verbatim so the
//! transaction log can keep it for forensic replay.

mod mock;
mod stripe;

pub use mock::{MockOutcome, MockPaymentGateway};
pub use stripe::StripeGateway;

use crate::types::{Money, OrderId, UserId};
use async_trait::async_trait;

/// Gateway-level failure: the provider could not be reached or rejected the
/// request itself. A *declined payment* is not a `GatewayError`; it comes
/// back as an unsuccessful [`SessionStatus`].
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Network-level failure or timeout.
    #[error("gateway unreachable: {0}")]
    Transport(String),
    /// The provider returned an error response.
    #[error("gateway rejected request: {0}")]
    Provider(String),
}

impl From<GatewayError> for crate::error::Error {
    fn from(err: GatewayError) -> Self {
        Self::Gateway(err.to_string())
    }
}

/// Parameters for opening a hosted checkout session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Amount to collect.
    pub amount: Money,
    /// ISO currency code, lowercase ("usd").
    pub currency: String,
    /// Order the session pays for (carried as gateway metadata).
    pub order_id: OrderId,
    /// Paying user (carried as gateway metadata).
    pub user_id: UserId,
}

/// A freshly opened checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    /// Gateway session identifier; becomes the payment's transaction id.
    pub session_id: String,
    /// Hosted payment page the client is redirected to.
    pub checkout_url: String,
}

/// Normalized settlement status of a checkout session.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    /// Whether the gateway reports the session as paid.
    pub success: bool,
    /// Gateway payment status string ("paid", "unpaid", ...).
    pub status: String,
    /// Amount the gateway settled, if reported.
    pub amount: Option<Money>,
    /// Failure reason when `success` is false.
    pub failure_reason: Option<String>,
    /// Raw gateway response, preserved for the transaction log.
    pub raw: serde_json::Value,
}

/// Abstraction over the external payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a hosted checkout session for the given amount.
    async fn create_checkout_session(
        &self,
        request: SessionRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Queries the settlement status of an existing session.
    async fn get_session_status(&self, session_id: &str) -> Result<SessionStatus, GatewayError>;
}
