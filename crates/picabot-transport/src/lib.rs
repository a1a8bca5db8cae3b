//! # picabot transport
//!
//! Concrete [`Connector`](picabot_core::Connector) implementations.
//!
//! ## Features
//!
//! - `ws-client`: WebSocket client connector ([`WsConnector`])
//!
//! The in-memory loopback transport in [`memory`] is always available. It
//! backs the test suites and lets a bot run without a network.
//!
//! ```text
//! ┌─────────────────────┐
//! │  picabot-runtime    │  (state machine, uses a Connector)
//! ├─────────────────────┤
//! │  picabot-core       │  (Connector / FrameSink / FrameStream)
//! ├─────────────────────┤
//! │  picabot-transport  │  <- This crate
//! ├─────────────────────┤
//! │  Network / memory   │
//! └─────────────────────┘
//! ```

pub mod memory;

#[cfg(feature = "ws-client")]
pub mod websocket;

pub use memory::{MemoryConnector, MemoryPeer, MemoryServer};

#[cfg(feature = "ws-client")]
pub use websocket::WsConnector;
