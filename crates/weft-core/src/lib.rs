//! Weft multiplexer core logic
//!
//! This crate contains the channel multiplexer: the connection-scoped
//! coordinator that layers many independent bidirectional byte-frame
//! channels over one reliable, message-oriented transport.
//!
//! # Architecture: "The Hollow Shell"
//!
//! Multiplexer logic is strictly separated from transport concerns:
//!
//! ```text
//!      ┌────────────────────────────┐
//!      │ weft-core                  │
//!      │ - Channel lifecycle        │
//!      │ - Id allocation            │
//!      │ - Inbound dispatch         │
//!      └────────────────────────────┘
//!         ↓                      ↓
//! ┌────────────────┐  ┌────────────────┐
//! │ weft-harness   │  │ production     │
//! │ (in-memory,    │  │ (a WebSocket   │
//! │  turmoil)      │  │  client/server)│
//! └────────────────┘  └────────────────┘
//! ```
//!
//! # Key Principles
//!
//! - No I/O in Core: the multiplexer never spawns tasks, never reads
//!   clocks, and never performs network reads. The embedder pumps inbound
//!   messages into [`Multiplexer::handle_message`].
//! - Single Dispatch Context: all state is touched from the dispatch
//!   context and from direct application calls on that same context; the
//!   internal locks exist to satisfy the borrow checker, not to arbitrate
//!   parallel writers.
//! - Outbound Through a Capability: the only side effects are calls on the
//!   [`transport::MessageTransport`] handle the multiplexer owns.
//!
//! # Modules
//!
//! - [`mux`]: the multiplexer (id allocation, dispatch, close handshake,
//!   keep-alive gating)
//! - [`channel`]: the per-channel handle (send, lazy inbound sequence,
//!   local close)
//! - [`transport`]: transport abstraction the multiplexer drives
//! - [`error`]: multiplexer error types

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod channel;
pub mod error;
pub mod mux;
pub mod transport;

pub use channel::{Channel, ChannelState};
pub use error::MuxError;
pub use mux::{Multiplexer, MuxConfig, KEEP_ALIVE_INTERVAL};
pub use transport::MessageTransport;
