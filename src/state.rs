//! Application state shared across HTTP handlers.

use crate::gateway::PaymentGateway;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared resources for the HTTP layer: the connection pool and the payment
/// gateway. Cloned cheaply per request.
#[derive(Clone)]
pub struct AppState {
    /// `PostgreSQL` connection pool.
    pub pool: PgPool,
    /// Payment session broker.
    pub gateway: Arc<dyn PaymentGateway>,
}

impl AppState {
    /// Creates a new application state.
    #[must_use]
    pub fn new(pool: PgPool, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { pool, gateway }
    }
}
