//! Market data and order event types
//!
//! These are the payloads the host runtime pushes into a strategy
//! ([`Bbo`], [`OrderUpdate`], [`Position`]) and the requests a strategy
//! hands to a [`Trader`](crate::trader::Trader) ([`OrderRequest`]).
//!
//! Connectivity (websocket feeds, REST gateways) is owned by the host; this
//! module only fixes the shape of what crosses that boundary.

pub mod types;

pub use types::{
    AccountId, Bbo, Channel, OrderId, OrderRequest, OrderStatus, OrderType, OrderUpdate,
    Position, PositionSide, Side, Subscription, TimeInForce,
};
