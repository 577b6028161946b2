//! Channel handle: one logical bidirectional byte-frame stream.
//!
//! A `Channel` is handed to the application either by
//! [`Multiplexer::open_channel`](crate::Multiplexer::open_channel) or
//! through the inbound-channel callback when the peer opens one. The handle
//! owns the receive side of the channel's inbound queue; the send side
//! lives in the multiplexer's maps and is dropped when the channel closes,
//! which is what terminates [`Channel::recv`].

use std::sync::{
    Arc, Weak,
    atomic::{AtomicU8, Ordering},
};

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{error::MuxError, mux::MuxShared};

/// Channel lifecycle state
///
/// ```text
///          local close()             peer CLOSE
///   Open ───────────────► LocalClosed ─────────► Closed
///    │
///    │ peer CLOSE
///    └──────────────────► RemoteClosed   (confirmation already sent)
/// ```
///
/// `RemoteClosed` and `Closed` are both terminal for the handle; they
/// differ only in which side initiated the close. Multiplexer teardown
/// jumps any non-terminal channel straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    /// Fully open; sends and receives flow
    Open = 0,
    /// We sent a close and await the peer's confirmation
    LocalClosed = 1,
    /// The peer closed the channel; our confirmation has been sent
    RemoteClosed = 2,
    /// Close handshake complete (or multiplexer torn down)
    Closed = 3,
}

impl ChannelState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::LocalClosed,
            2 => Self::RemoteClosed,
            _ => Self::Closed,
        }
    }
}

/// State cell shared between a channel handle and the multiplexer's entry.
///
/// Written only from the dispatch context; the atomic lets the handle read
/// it without taking the multiplexer lock.
#[derive(Debug)]
pub(crate) struct SharedState(AtomicU8);

impl SharedState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ChannelState::Open as u8))
    }

    pub(crate) fn set(&self, state: ChannelState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    pub(crate) fn get(&self) -> ChannelState {
        ChannelState::from_u8(self.0.load(Ordering::SeqCst))
    }
}

/// Owning handle for one logical stream multiplexed over the connection.
///
/// Dropping the handle does *not* close the channel on the wire; call
/// [`Channel::close`] for that. A dropped handle merely discards payloads
/// as they arrive.
#[derive(Debug)]
pub struct Channel {
    id: u64,
    mux: Weak<MuxShared>,
    state: Arc<SharedState>,
    inbound: UnboundedReceiver<Bytes>,
}

impl Channel {
    pub(crate) fn new(
        id: u64,
        mux: Weak<MuxShared>,
        state: Arc<SharedState>,
        inbound: UnboundedReceiver<Bytes>,
    ) -> Self {
        Self { id, mux, state, inbound }
    }

    /// The channel's 48-bit id
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ChannelState {
        if self.mux.strong_count() == 0 {
            return ChannelState::Closed;
        }
        self.state.get()
    }

    /// Send one payload as one data frame on this channel.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::ChannelClosed`] if the channel is not open or
    /// the multiplexer has been torn down. The handle never reaches a
    /// detached transport.
    pub fn send(&self, payload: impl Into<Bytes>) -> Result<(), MuxError> {
        let Some(shared) = self.mux.upgrade() else {
            return Err(MuxError::ChannelClosed { channel_id: self.id });
        };
        shared.channel_send(self.id, payload.into())
    }

    /// Receive the next inbound payload.
    ///
    /// This is the channel's lazy, finite, non-restartable inbound
    /// sequence: payloads arrive in the order the transport delivered
    /// them, and the sequence yields `None` forever once the channel is
    /// remote-closed or the multiplexer tears down (queued payloads are
    /// still drained first).
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.inbound.recv().await
    }

    /// Request a local close.
    ///
    /// Idempotent: the first call moves the channel into the closing state
    /// and emits one close frame; the peer's confirmation completes the
    /// handshake. Calls in any other state are silent no-ops.
    pub fn close(&self) {
        if let Some(shared) = self.mux.upgrade() {
            shared.channel_close(self.id);
        }
    }
}
