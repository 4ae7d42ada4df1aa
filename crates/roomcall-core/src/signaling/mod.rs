//! WebSocket signaling client for room membership and broadcast events.
//!
//! Connects to the signaling server, announces the local peer id on every
//! (re)connect, and reconnects with capped exponential backoff.

mod client;
mod connection;
mod protocol;
mod types;

pub use client::{SignalingClient, WsConnector};
pub use protocol::{decode_inbound, encode_outbound, InboundSignal, OutboundSignal, RosterEntry, Theme};
pub use types::{SignalEvent, SignalingChannel, SignalingConfig, SignalingConnector};
