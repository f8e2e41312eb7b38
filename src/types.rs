//! Domain types for the commerce backend.
//!
//! Value objects shared across the inventory ledger, cart aggregate, order
//! aggregate, payment broker and checkout orchestrator: typed identifiers,
//! money, statuses and the shipping address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing `Uuid`.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner `Uuid`.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a user (issued by the upstream auth layer).
    UserId
);
define_id!(
    /// Unique identifier for a product.
    ProductId
);
define_id!(
    /// Unique identifier for an order.
    OrderId
);
define_id!(
    /// Unique identifier for a payment record.
    PaymentId
);
define_id!(
    /// Unique identifier for a shipment.
    ShipmentId
);
define_id!(
    /// Unique identifier for a transaction-log entry.
    LogEntryId
);

// ============================================================================
// Money
// ============================================================================

/// Monetary amount in cents.
///
/// Stored and transmitted as an integer number of cents to avoid floating
/// point rounding in totals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents.
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole dollars.
    #[must_use]
    pub const fn from_dollars(dollars: u64) -> Self {
        Self(dollars * 100)
    }

    /// Returns the amount in cents.
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks whether the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts, saturating at `u64::MAX`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Multiplies the amount by a quantity, saturating at `u64::MAX`.
    #[must_use]
    pub const fn saturating_mul(self, qty: u32) -> Self {
        Self(self.0.saturating_mul(qty as u64))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Roles and requester identity
// ============================================================================

/// Closed set of roles a requester may carry.
///
/// The workflow core is role-agnostic; role checks happen at the API
/// boundary against this enumeration, never against free-form strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular shopper.
    Customer,
    /// Catalog/inventory manager.
    Manager,
    /// Full administrative access.
    Admin,
}

impl Role {
    /// Parses a role claim.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "customer" | "user" => Some(Self::Customer),
            "manager" => Some(Self::Manager),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Whether this role may manage catalog and inventory records.
    #[must_use]
    pub const fn can_manage_inventory(&self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }

    /// Whether this role may read the audit trail.
    #[must_use]
    pub const fn can_audit(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Pre-validated identity attached to every request by the auth middleware.
#[derive(Clone, Copy, Debug)]
pub struct Requester {
    /// Authenticated user id.
    pub user_id: UserId,
    /// Role claim.
    pub role: Role,
}

// ============================================================================
// Statuses
// ============================================================================

/// Order lifecycle status.
///
/// `pending → processing → shipped → delivered`, with `cancelled` and
/// `failed` as the other terminal exits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout, awaiting payment.
    Pending,
    /// Payment confirmed, being fulfilled.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Delivered to the customer.
    Delivered,
    /// Cancelled by the user before payment.
    Cancelled,
    /// Payment was declined by the gateway.
    Failed,
}

impl OrderStatus {
    /// Returns the database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Parses a stored status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether the order has reached a terminal state.
    ///
    /// Non-terminal orders block new checkouts for the same user.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Delivered | Self::Failed)
    }

    /// Whether the state machine permits moving to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Cancelled | Self::Failed)
                | (Self::Processing, Self::Shipped)
                | (Self::Shipped, Self::Delivered)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment record status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Checkout session opened, settlement not yet confirmed.
    Pending,
    /// Gateway confirmed settlement; inventory has been settled.
    Completed,
    /// Gateway reported failure.
    Failed,
}

impl PaymentStatus {
    /// Returns the database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a stored status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shipment status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    /// Created after payment confirmation, not yet dispatched.
    Pending,
    /// With the carrier.
    OutForDelivery,
    /// Delivered.
    Delivered,
}

impl ShipmentStatus {
    /// Returns the database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
        }
    }

    /// Parses a stored status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "out_for_delivery" => Some(Self::OutForDelivery),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }
}

/// Outcome recorded in a transaction-log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    /// Gateway confirmed settlement.
    Success,
    /// Gateway reported failure.
    Failed,
}

impl LogStatus {
    /// Returns the database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parses a stored status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

// ============================================================================
// Payment method and address
// ============================================================================

/// Accepted payment methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Hosted Stripe checkout session.
    Stripe,
    /// Tokenized card payment.
    CreditCard,
    /// `PayPal` payment.
    Paypal,
    /// Cash on delivery.
    Cod,
}

impl PaymentMethod {
    /// Returns the database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::CreditCard => "credit_card",
            Self::Paypal => "paypal",
            Self::Cod => "cod",
        }
    }

    /// Parses a stored payment method.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "stripe" => Some(Self::Stripe),
            "credit_card" => Some(Self::CreditCard),
            "paypal" => Some(Self::Paypal),
            "cod" => Some(Self::Cod),
            _ => None,
        }
    }
}

/// Delivery address captured at checkout and copied to the shipment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Country name or code.
    pub country: String,
    /// State or province.
    pub state: String,
    /// Street name.
    pub street: String,
    /// Building number.
    pub building: i32,
    /// Flat number within the building.
    pub flat_number: i32,
}

/// A restock event in the inventory ledger's append-only history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restock {
    /// Units added.
    pub quantity: u32,
    /// When the restock happened.
    pub date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_display_renders_cents() {
        assert_eq!(Money::from_cents(1000).to_string(), "10.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_dollars(20).to_string(), "20.00");
    }

    #[test]
    fn money_line_total() {
        let unit = Money::from_dollars(10);
        assert_eq!(unit.saturating_mul(2), Money::from_dollars(20));
        assert_eq!(
            Money::ZERO.saturating_add(unit.saturating_mul(3)),
            Money::from_cents(3000)
        );
    }

    #[test]
    fn order_status_round_trips() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Failed,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("bogus"), None);
    }

    #[test]
    fn terminal_statuses_match_glossary() {
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
    }

    #[test]
    fn order_transitions_follow_state_machine() {
        use OrderStatus::{Cancelled, Delivered, Failed, Pending, Processing, Shipped};

        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));

        assert!(!Processing.can_transition_to(Cancelled));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Cancelled.can_transition_to(Processing));
    }

    #[test]
    fn role_parse_accepts_known_claims_only() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("manager"), Some(Role::Manager));
        assert_eq!(Role::parse("customer"), Some(Role::Customer));
        assert_eq!(Role::parse("user"), Some(Role::Customer));
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn manager_and_admin_manage_inventory() {
        assert!(Role::Admin.can_manage_inventory());
        assert!(Role::Manager.can_manage_inventory());
        assert!(!Role::Customer.can_manage_inventory());
        assert!(Role::Admin.can_audit());
        assert!(!Role::Manager.can_audit());
    }

    #[test]
    fn payment_method_round_trips() {
        for method in [
            PaymentMethod::Stripe,
            PaymentMethod::CreditCard,
            PaymentMethod::Paypal,
            PaymentMethod::Cod,
        ] {
            assert_eq!(PaymentMethod::parse(method.as_str()), Some(method));
        }
    }
}
