//! In-memory paired message transport.
//!
//! Two endpoints bridged by in-process unbounded queues. Messages keep
//! their boundaries, arrive in order, and are never lost - the same
//! guarantees the multiplexer assumes of a WebSocket - while every
//! delivery stays under test control.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use weft_core::MessageTransport;

/// Read-side observer for the heartbeat interval a multiplexer programs.
///
/// Obtained from [`MemoryTransport::heartbeat_probe`] *before* handing the
/// transport to the multiplexer, so tests can keep watching afterwards.
#[derive(Clone)]
pub struct HeartbeatProbe(Arc<Mutex<Option<Duration>>>);

impl HeartbeatProbe {
    pub(crate) fn from_cell(cell: Arc<Mutex<Option<Duration>>>) -> Self {
        Self(cell)
    }

    /// The currently programmed heartbeat interval, if any
    #[must_use]
    pub fn get(&self) -> Option<Duration> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One endpoint of an in-memory transport pair.
pub struct MemoryTransport {
    outbound: Mutex<Option<UnboundedSender<Bytes>>>,
    inbound: Mutex<Option<UnboundedReceiver<Bytes>>>,
    heartbeat: Arc<Mutex<Option<Duration>>>,
}

impl MemoryTransport {
    /// Create two connected endpoints.
    ///
    /// Everything the first sends arrives on the second's inbound queue
    /// and vice versa.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_to_b, b_from_a) = mpsc::unbounded_channel();
        let (b_to_a, a_from_b) = mpsc::unbounded_channel();
        (Self::from_halves(a_to_b, a_from_b), Self::from_halves(b_to_a, b_from_a))
    }

    fn from_halves(outbound: UnboundedSender<Bytes>, inbound: UnboundedReceiver<Bytes>) -> Self {
        Self {
            outbound: Mutex::new(Some(outbound)),
            inbound: Mutex::new(Some(inbound)),
            heartbeat: Arc::new(Mutex::new(None)),
        }
    }

    /// Take this endpoint's inbound stream, to be pumped into a
    /// multiplexer. Returns `None` if it was already taken.
    pub fn take_inbound(&self) -> Option<UnboundedReceiver<Bytes>> {
        self.inbound.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Observer for the heartbeat interval programmed on this endpoint
    #[must_use]
    pub fn heartbeat_probe(&self) -> HeartbeatProbe {
        HeartbeatProbe(self.heartbeat.clone())
    }
}

#[async_trait]
impl MessageTransport for MemoryTransport {
    fn send(&self, message: Bytes) {
        if let Some(outbound) = &*self.outbound.lock().unwrap_or_else(PoisonError::into_inner) {
            // The peer may already be gone; a reliable transport that has
            // ended simply stops delivering.
            let _ = outbound.send(message);
        }
    }

    async fn close(&self) {
        // Dropping the sender ends the peer's inbound stream; closing
        // twice is a no-op.
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn set_heartbeat(&self, interval: Option<Duration>) {
        *self.heartbeat.lock().unwrap_or_else(PoisonError::into_inner) = interval;
    }
}
