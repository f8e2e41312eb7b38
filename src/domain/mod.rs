//! Domain core: the order-fulfillment consistency workflow.
//!
//! Leaf-first: the inventory ledger owns the stock counters, the cart
//! aggregate coordinates reservations with every mutation, the order
//! aggregate snapshots carts behind a status state machine, and the
//! checkout orchestrator ties them to the payment broker, shipments and the
//! transaction log.

pub mod cart;
pub mod checkout;
pub mod inventory;
pub mod order;
pub mod payment;
pub mod product;
pub mod shipment;
pub mod transaction_log;
