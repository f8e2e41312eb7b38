//! Payment endpoints.
//!
//! - `POST /api/v1/payment/create-intent/:orderId` - open a checkout session
//! - `POST /api/v1/payment/confirm/:paymentId` - confirm settlement
//! - `GET /api/v1/payment/:paymentId` - fetch a payment (owner only)
//!
//! The client completes the hosted checkout page out-of-band, then calls
//! confirm with the session id it was handed at create-intent time.

use super::{success, Envelope};
use crate::domain::{checkout, order, payment, shipment, transaction_log};
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::types::{Address, OrderId, PaymentId, PaymentStatus, Requester};
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response after opening a checkout session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    /// Hosted payment page to redirect the client to.
    pub checkout_url: String,
    /// Persisted payment id.
    pub payment_id: PaymentId,
    /// Gateway session id.
    pub session_id: String,
    /// Order being paid.
    pub order_id: OrderId,
    /// Always `pending` at this point.
    pub payment_status: PaymentStatus,
}

/// `POST /api/v1/payment/create-intent/:orderId`
pub async fn create_payment(
    requester: Requester,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Envelope<CreatePaymentResponse>>> {
    let intent = checkout::create_payment(
        &state.pool,
        state.gateway.as_ref(),
        OrderId::from_uuid(order_id),
        &requester,
    )
    .await?;

    Ok(success(CreatePaymentResponse {
        checkout_url: intent.checkout_url,
        payment_id: intent.payment.id,
        session_id: intent.payment.session_id.clone(),
        order_id: intent.payment.order_id,
        payment_status: intent.payment.status,
    }))
}

/// Request to confirm a payment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    /// Session id returned by create-intent.
    pub payment_session_id: Option<String>,
    /// Optional shipping address override.
    pub address: Option<Address>,
}

/// Response after a successful confirmation.
#[derive(Debug, Serialize)]
pub struct ConfirmPaymentResponse {
    /// Audit entry for this attempt.
    pub transaction: transaction_log::LogEntry,
    /// The order, now `processing`.
    pub order: order::Order,
    /// The payment, now `completed`.
    pub payment: payment::Payment,
    /// The freshly created shipment.
    pub shipment: shipment::Shipment,
}

/// `POST /api/v1/payment/confirm/:paymentId`
pub async fn confirm_payment(
    requester: Requester,
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Json<Envelope<ConfirmPaymentResponse>>> {
    let session_id = request
        .payment_session_id
        .ok_or_else(|| Error::validation("payment session id is required"))?;

    let confirmed = checkout::confirm_payment(
        &state.pool,
        state.gateway.as_ref(),
        PaymentId::from_uuid(payment_id),
        &session_id,
        &requester,
        request.address,
    )
    .await?;

    Ok(success(ConfirmPaymentResponse {
        transaction: confirmed.transaction,
        order: confirmed.order,
        payment: confirmed.payment,
        shipment: confirmed.shipment,
    }))
}

/// Payment payload.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    /// The payment.
    pub payment: payment::Payment,
}

/// `GET /api/v1/payment/:paymentId`
pub async fn get_payment(
    requester: Requester,
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Envelope<PaymentResponse>>> {
    let payment =
        payment::get(&state.pool, PaymentId::from_uuid(payment_id), &requester).await?;
    Ok(success(PaymentResponse { payment }))
}
