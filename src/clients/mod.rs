//! Contracts for the external collaborators this crate consumes, plus
//! their HTTP implementations. The server is the authority for every
//! resource reached through these traits; this crate never re-implements
//! their mutation atomicity client-side.

pub mod cart_api;
pub mod order_api;

pub use cart_api::{CartApi, HttpCartApi};
pub use order_api::{CreateOrderRequest, HttpOrderApi, OrderApi, RepayOutcome};
