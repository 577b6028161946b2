//! Pre-wired multiplexer peers for integration tests.
//!
//! Builds two multiplexers over a [`MemoryTransport`] pair with
//! everything a test wants to observe already captured: delivered
//! channels, close-callback count, heartbeat programming, and the raw
//! transport inbound queue so tests can pump frames one at a time.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use bytes::Bytes;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use weft_core::{Channel, Multiplexer, MuxConfig};

use crate::{
    driver::pump_queued,
    mem_transport::{HeartbeatProbe, MemoryTransport},
};

/// One side of a wired multiplexer pair.
pub struct TestPeer {
    /// The multiplexer under test
    pub mux: Multiplexer,
    /// Raw transport inbound; pump it into the mux via [`TestPeer::pump`]
    pub transport_inbound: UnboundedReceiver<Bytes>,
    /// Channels the peer opened, as delivered to the inbound-channel
    /// callback
    pub channels: UnboundedReceiver<(Channel, Bytes)>,
    /// Heartbeat interval observer for this side's transport
    pub heartbeat: HeartbeatProbe,
    close_count: Arc<AtomicUsize>,
}

impl TestPeer {
    /// Dispatch every transport message queued so far; returns how many.
    pub async fn pump(&mut self) -> usize {
        pump_queued(&self.mux, &mut self.transport_inbound).await
    }

    /// Next remotely opened channel, if one has been delivered.
    pub fn try_next_channel(&mut self) -> Option<(Channel, Bytes)> {
        self.channels.try_recv().ok()
    }

    /// How many times the close callback has fired (0 or 1).
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

fn wire(transport: MemoryTransport, config: MuxConfig) -> TestPeer {
    let transport_inbound =
        transport.take_inbound().expect("fresh transport endpoint was already drained");
    let heartbeat = transport.heartbeat_probe();
    let (channel_tx, channels) = mpsc::unbounded_channel();
    let close_count = Arc::new(AtomicUsize::new(0));
    let close_count_cb = close_count.clone();

    let mux = Multiplexer::new(
        transport,
        config,
        move |channel, payload| {
            let _ = channel_tx.send((channel, payload));
        },
        move || {
            close_count_cb.fetch_add(1, Ordering::SeqCst);
        },
    );

    TestPeer { mux, transport_inbound, channels, heartbeat, close_count }
}

/// Two multiplexers over an in-memory transport pair: a client and a
/// server, with matching keep-alive settings.
#[must_use]
pub fn memory_peer_pair(keep_alive: bool) -> (TestPeer, TestPeer) {
    let (client_transport, server_transport) = MemoryTransport::pair();
    let client = wire(
        client_transport,
        MuxConfig { client: true, keep_alive, ..MuxConfig::default() },
    );
    let server = wire(
        server_transport,
        MuxConfig { client: false, keep_alive, ..MuxConfig::default() },
    );
    (client, server)
}
