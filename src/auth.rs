//! Requester identity extraction.
//!
//! Session issuance and validation live upstream; by the time a request
//! reaches this service, a trusted auth middleware has attached the
//! authenticated identity as `x-user-id` and `x-user-role` headers. The
//! extractor turns those claims into a [`Requester`] with a closed [`Role`]
//! enumeration; the workflow core itself never inspects roles.

use crate::error::Error;
use crate::types::{Requester, Role, UserId};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the role claim.
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[async_trait]
impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::Unauthorized("missing identity header".to_string()))?;
        let user_id = user_id
            .parse::<uuid::Uuid>()
            .map_err(|_| Error::Unauthorized("malformed user id claim".to_string()))?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("customer");
        let role = Role::parse(role)
            .ok_or_else(|| Error::Unauthorized(format!("unknown role claim: {role}")))?;

        Ok(Self {
            user_id: UserId::from_uuid(user_id),
            role,
        })
    }
}

/// Boundary check for inventory/catalog management endpoints.
pub fn require_inventory_manager(requester: &Requester) -> Result<(), Error> {
    if requester.role.can_manage_inventory() {
        Ok(())
    } else {
        Err(Error::forbidden("requires manager or admin role"))
    }
}

/// Boundary check for audit endpoints.
pub fn require_auditor(requester: &Requester) -> Result<(), Error> {
    if requester.role.can_audit() {
        Ok(())
    } else {
        Err(Error::forbidden("requires admin role"))
    }
}
