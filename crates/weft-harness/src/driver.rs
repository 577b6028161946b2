//! Dispatch drivers: the glue between a transport's inbound stream and a
//! multiplexer's dispatch entry points.
//!
//! The core never spawns tasks or reads sockets, so somebody has to pump
//! it. Production embedders write this loop around their WebSocket
//! library; tests use [`drive`] for free-running peers or [`pump_queued`]
//! when they want frame-level control over interleaving.

use bytes::Bytes;
use tokio::sync::mpsc::{UnboundedReceiver, error::TryRecvError};
use weft_core::Multiplexer;

/// Spawn a task that feeds every inbound message into the multiplexer.
///
/// The task ends when the multiplexer reports a fatal error (it has
/// already torn itself down) or when the inbound stream ends, which is
/// reported as a disconnect.
pub fn drive(mux: Multiplexer, mut inbound: UnboundedReceiver<Bytes>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            if mux.handle_message(message).await.is_err() {
                return;
            }
        }
        mux.handle_disconnect().await;
    })
}

/// Dispatch every message already sitting in the queue, then return.
///
/// Gives tests frame-level control: interleave sends and pumps to
/// construct exact race windows. Returns the number of messages
/// dispatched; a fatal dispatch stops the pump early (the multiplexer is
/// already closed at that point).
pub async fn pump_queued(mux: &Multiplexer, inbound: &mut UnboundedReceiver<Bytes>) -> usize {
    let mut dispatched = 0;
    loop {
        match inbound.try_recv() {
            Ok(message) => {
                dispatched += 1;
                if mux.handle_message(message).await.is_err() {
                    return dispatched;
                }
            },
            Err(TryRecvError::Empty) => return dispatched,
            Err(TryRecvError::Disconnected) => {
                mux.handle_disconnect().await;
                return dispatched;
            },
        }
    }
}
