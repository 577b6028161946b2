//! Transport abstraction for the multiplexer's outbound side.
//!
//! The `MessageTransport` trait abstracts over reliable, ordered,
//! message-oriented connections that preserve message boundaries. In the
//! canonical deployment this is a WebSocket carrying binary messages; the
//! harness provides an in-memory pair and a simulated socket with length
//! prefix framing.
//!
//! # Why Only the Outbound Side?
//!
//! The multiplexer consumes inbound messages through
//! [`Multiplexer::handle_message`](crate::Multiplexer::handle_message),
//! pushed by whichever loop reads the underlying connection. Keeping the
//! read loop outside the trait keeps the core free of task spawning and
//! lets the same multiplexer run under tokio, turmoil, or a hand-rolled
//! pump in tests.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

/// Reliable, ordered, message-oriented transport consumed by the
/// multiplexer.
///
/// # Contract
///
/// - Messages are delivered whole and in order; one `send` is one message
///   on the peer side. The multiplexer relies on this for per-channel FIFO
///   ordering.
/// - The transport is assumed reliable. Send failures surface as the
///   connection ending, which the embedder reports via
///   [`Multiplexer::handle_disconnect`](crate::Multiplexer::handle_disconnect);
///   they are never reported through `send`.
#[async_trait]
pub trait MessageTransport: Send + Sync + 'static {
    /// Enqueue one outbound binary message.
    ///
    /// # Behavior
    ///
    /// - **Non-blocking**: implementations enqueue and return; delivery
    ///   completion is not awaited by the multiplexer.
    /// - **After close**: a send after [`MessageTransport::close`] is a
    ///   silent no-op.
    fn send(&self, message: Bytes);

    /// Close the connection.
    ///
    /// # Behavior
    ///
    /// - **Idempotent**: closing twice is a no-op.
    /// - **Errors swallowed**: implementations log and discard close
    ///   failures; the returned future resolves once the close has settled
    ///   either way.
    async fn close(&self);

    /// Program or clear the transport-level keep-alive.
    ///
    /// `Some(interval)` asks the transport to emit periodic heartbeats (a
    /// WebSocket would send pings); `None` stops them. The multiplexer
    /// programs this only while channels exist.
    fn set_heartbeat(&self, interval: Option<Duration>);
}
