//! Error taxonomy for the order-fulfillment workflow.
//!
//! A single domain error enum crosses every layer; the `IntoResponse` impl
//! maps it to a structured JSON error body `{code, message}` with the
//! appropriate status code. Recoverable business rejections map to 4xx,
//! internal invariant violations to 5xx.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Convenience result alias for fallible domain operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or semantically invalid input; no state change occurred.
    #[error("{0}")]
    Validation(String),

    /// A referenced resource does not exist.
    #[error("{resource} not found")]
    NotFound {
        /// Human-readable resource name ("Cart", "Order", ...).
        resource: &'static str,
    },

    /// Missing or malformed identity claims.
    #[error("{0}")]
    Unauthorized(String),

    /// The requester does not own the resource or lacks the required role.
    #[error("{0}")]
    Forbidden(String),

    /// Duplicate order, already-processed payment or illegal status
    /// transition.
    #[error("{0}")]
    Conflict(String),

    /// Business-rule rejection: not enough available stock to reserve.
    #[error("only {available} items available")]
    InsufficientStock {
        /// Units currently available for reservation.
        available: u32,
    },

    /// The gateway confirmed that the payment did not settle.
    #[error("payment verification failed: {reason}")]
    PaymentFailed {
        /// Gateway-provided failure reason.
        reason: String,
    },

    /// The payment provider could not be reached or returned a provider
    /// error. Surfaced synchronously; no retry is built in.
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// Internal ledger invariant violation: settlement would drive reserved
    /// stock negative. Fatal to the enclosing transaction, never clamped.
    #[error("inventory inconsistency for product {product_id}")]
    InventoryInconsistency {
        /// Product whose reserved stock did not cover the settlement.
        product_id: uuid::Uuid,
    },

    /// Storage failure.
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl Error {
    /// Shorthand for `NotFound`.
    #[must_use]
    pub const fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    /// Shorthand for `Validation`.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for `Conflict`.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Shorthand for `Forbidden`.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// HTTP status this error maps to.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InsufficientStock { .. } | Self::PaymentFailed { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::InventoryInconsistency { .. } | Self::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code for client error handling.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::PaymentFailed { .. } => "PAYMENT_FAILED",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::InventoryInconsistency { .. } => "INVENTORY_INCONSISTENCY",
            Self::Database(_) => "INTERNAL_ERROR",
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    code: &'static str,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }

        // Internal detail is logged, not leaked.
        let message = if matches!(self, Self::Database(_)) {
            "an internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            status: "error",
            code: self.code(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
