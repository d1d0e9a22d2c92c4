#![deny(unused)]
//! Client bridge for VibeCraft.
//!
//! Talks to the in-game client mod over a single WebSocket: every request
//! carries a fresh correlation id, a background reader routes responses back
//! to the waiting caller, and anything unsolicited lands in a bounded inbox.
//! Failed connects open an exponential backoff window.

pub mod backoff;
pub mod client;
pub mod messages;
pub mod mock;
pub mod policy;
mod router;
pub mod transport;

pub use backoff::{BackoffPolicy, BackoffState, BackoffStatus};
pub use client::{ClientBridge, Handshake, Region};
pub use messages::{RequestEnvelope, ResponseEnvelope};
pub use mock::{MockConnector, MockEvent, MockReply};
pub use router::Inbox;
pub use transport::{Connector, Duplex, FrameSink, FrameStream, WebSocketConnector};
