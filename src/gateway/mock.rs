//! Mock payment gateway for development and testing.
//!
//! Every session it opens resolves according to a scripted outcome, so
//! confirmation flows can be exercised deterministically without network
//! access.

use super::{CheckoutSession, GatewayError, PaymentGateway, SessionRequest, SessionStatus};
use crate::types::Money;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Scripted settlement outcome for mock sessions.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// The session reports `paid`.
    Paid,
    /// The session reports `unpaid` with the given reason.
    Declined(String),
    /// Status queries fail at the transport level.
    Unreachable,
}

struct MockSession {
    amount: Money,
}

/// In-memory payment gateway (defaults to successful settlement).
pub struct MockPaymentGateway {
    outcome: Mutex<MockOutcome>,
    sessions: Mutex<HashMap<String, MockSession>>,
    counter: Mutex<u64>,
}

impl MockPaymentGateway {
    /// Creates a gateway whose sessions all settle successfully.
    #[must_use]
    pub fn new() -> Self {
        Self {
            outcome: Mutex::new(MockOutcome::Paid),
            sessions: Mutex::new(HashMap::new()),
            counter: Mutex::new(0),
        }
    }

    /// Creates an Arc-wrapped instance for sharing.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Scripts the outcome reported for subsequent status queries.
    pub fn set_outcome(&self, outcome: MockOutcome) {
        if let Ok(mut guard) = self.outcome.lock() {
            *guard = outcome;
        }
    }

    /// Number of sessions opened so far.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: SessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let session_id = {
            let mut counter = self
                .counter
                .lock()
                .map_err(|_| GatewayError::Provider("mock gateway poisoned".to_string()))?;
            *counter += 1;
            format!("mock_cs_{counter:08}")
        };

        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(
                session_id.clone(),
                MockSession {
                    amount: request.amount,
                },
            );
        }

        tracing::info!(
            %session_id,
            order_id = %request.order_id,
            amount = request.amount.cents(),
            "mock checkout session opened"
        );

        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.mock.local/pay/{session_id}"),
            session_id,
        })
    }

    async fn get_session_status(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        let amount = self
            .sessions
            .lock()
            .ok()
            .and_then(|sessions| sessions.get(session_id).map(|s| s.amount));

        if amount.is_none() {
            return Err(GatewayError::Provider(format!(
                "no such session: {session_id}"
            )));
        }

        let outcome = self
            .outcome
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or(MockOutcome::Paid);

        match outcome {
            MockOutcome::Paid => Ok(SessionStatus {
                success: true,
                status: "paid".to_string(),
                amount,
                failure_reason: None,
                raw: serde_json::json!({
                    "id": session_id,
                    "payment_status": "paid",
                    "amount_total": amount.map(|a| a.cents()),
                }),
            }),
            MockOutcome::Declined(reason) => Ok(SessionStatus {
                success: false,
                status: "unpaid".to_string(),
                amount,
                failure_reason: Some(reason.clone()),
                raw: serde_json::json!({
                    "id": session_id,
                    "payment_status": "unpaid",
                    "failure_reason": reason,
                }),
            }),
            MockOutcome::Unreachable => {
                Err(GatewayError::Transport("mock gateway unreachable".to_string()))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{OrderId, UserId};

    fn request() -> SessionRequest {
        SessionRequest {
            amount: Money::from_dollars(20),
            currency: "usd".to_string(),
            order_id: OrderId::new(),
            user_id: UserId::new(),
        }
    }

    #[tokio::test]
    async fn sessions_settle_successfully_by_default() {
        let gateway = MockPaymentGateway::new();
        assert_eq!(gateway.session_count(), 0);

        let session = gateway.create_checkout_session(request()).await.unwrap();
        assert!(session.session_id.starts_with("mock_cs_"));
        assert_eq!(gateway.session_count(), 1);

        let status = gateway.get_session_status(&session.session_id).await.unwrap();
        assert!(status.success);
        assert_eq!(status.status, "paid");
        assert_eq!(status.amount, Some(Money::from_dollars(20)));
    }

    #[tokio::test]
    async fn declined_outcome_reports_unpaid_with_reason() {
        let gateway = MockPaymentGateway::new();
        gateway.set_outcome(MockOutcome::Declined("card declined".to_string()));

        let session = gateway.create_checkout_session(request()).await.unwrap();
        let status = gateway.get_session_status(&session.session_id).await.unwrap();

        assert!(!status.success);
        assert_eq!(status.failure_reason.as_deref(), Some("card declined"));
    }

    #[tokio::test]
    async fn unknown_session_is_a_provider_error() {
        let gateway = MockPaymentGateway::new();
        let err = gateway.get_session_status("cs_missing").await.unwrap_err();
        assert!(matches!(err, GatewayError::Provider(_)));
    }

    #[tokio::test]
    async fn unreachable_outcome_is_a_transport_error() {
        let gateway = MockPaymentGateway::new();
        let session = gateway.create_checkout_session(request()).await.unwrap();
        gateway.set_outcome(MockOutcome::Unreachable);

        let err = gateway
            .get_session_status(&session.session_id)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }
}
