//! Signaling relay: the transport that carries [`SignalMessage`]s between
//! participants of the same room.
//!
//! The mesh only needs [`SignalingRelay::send`] for outbound traffic and a
//! stream of [`RelayEvent`]s for inbound traffic. [`WsRelay`] implements both
//! over a WebSocket connection to `huddle-relay`.
//!
//! [`SignalMessage`]: crate::protocol::SignalMessage

mod client;
mod types;

pub use client::{RelayClientConfig, WsRelay};
pub use types::{RelayControl, RelayEvent, RelayHello, SignalingRelay};
