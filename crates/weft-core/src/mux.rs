//! Multiplexer: the connection-scoped coordinator.
//!
//! The multiplexer owns the transport, owns every open and closing channel,
//! allocates channel ids, dispatches inbound frames, drives the two-phase
//! close handshake, and gates the transport keep-alive on channel
//! population.
//!
//! # Id Allocation
//!
//! Both peers open channels unilaterally without coordination. Collisions
//! are impossible because allocations are parity-split: the *client* role
//! allocates even ids starting at 2, the *server* role odd ids starting
//! at 3. Ids advance by 2 and are capped at 2^48; past the cap,
//! [`Multiplexer::open_channel`] refuses (the only non-fatal refusal in
//! the protocol).
//!
//! # Close Handshake
//!
//! Closing is two-phase with remote confirmation:
//!
//! ```text
//! local side                              remote side
//! ----------                              -----------
//! close(): open -> closing, send CLOSE
//!                                         CLOSE arrives for an open id:
//!                                         terminate inbound, reply CLOSE
//! CLOSE arrives for a closing id:
//! remove entry, handshake complete
//! ```
//!
//! A channel in `closing` still accepts in-flight data frames until the
//! confirmation arrives; data for an id in *neither* map is a fatal
//! protocol violation.
//!
//! # Failure Semantics
//!
//! Every protocol violation is connection-fatal. There is no per-channel
//! recovery: the multiplexer tears down, every inbound sequence
//! terminates, and the close callback fires exactly once.

use std::{
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use tokio::sync::mpsc;
use weft_proto::{Frame, SysCommand};

use crate::{
    channel::{Channel, ChannelState, SharedState},
    error::MuxError,
    transport::MessageTransport,
};

/// Heartbeat interval programmed on the transport while channels exist
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Grace period reserved for closing an idle connection after its last
/// channel goes away. Carried by the protocol; no timer arms it currently.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Multiplexer configuration
///
/// All configuration is per-instance at construction; there is no CLI,
/// environment, or persisted state.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Role of this endpoint. The client allocates even channel ids
    /// starting at 2, the server odd ids starting at 3, so simultaneous
    /// unilateral opens never collide.
    pub client: bool,

    /// Gate the transport heartbeat on channel population: programmed to
    /// [`KEEP_ALIVE_INTERVAL`] while at least one channel exists, cleared
    /// when the last one closes.
    pub keep_alive: bool,

    /// Close the connection once it has been without channels for
    /// [`CLOSE_TIMEOUT`]. Accepted and stored; the timer is not armed.
    pub auto_close_when_empty: bool,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self { client: true, keep_alive: false, auto_close_when_empty: false }
    }
}

type ChannelCallback = Box<dyn FnMut(Channel, Bytes) + Send>;
type CloseCallback = Box<dyn FnOnce() + Send>;

struct ChannelEntry {
    /// Send side of the channel's inbound queue; dropping it terminates
    /// the handle's sequence
    inbound: mpsc::UnboundedSender<Bytes>,
    /// State cell shared with the handle
    state: Arc<SharedState>,
}

struct MuxState {
    /// Held while live, `None` after teardown
    transport: Option<Arc<dyn MessageTransport>>,
    /// Fully open channels
    open: HashMap<u64, ChannelEntry>,
    /// Locally closed channels awaiting the peer's confirmation
    closing: HashMap<u64, ChannelEntry>,
    /// Next local channel id; parity encodes the role
    next_id: u64,
    /// True while the transport heartbeat is programmed
    heartbeat_armed: bool,
    config: MuxConfig,
}

impl MuxState {
    fn both_maps_empty(&self) -> bool {
        self.open.is_empty() && self.closing.is_empty()
    }

    /// Returns true if the heartbeat should be cleared now (and marks it
    /// cleared). Called after a removal from either map.
    fn disarm_heartbeat_if_idle(&mut self) -> bool {
        if self.config.keep_alive && self.heartbeat_armed && self.both_maps_empty() {
            self.heartbeat_armed = false;
            return true;
        }
        false
    }
}

/// Connection-scoped shared state; `pub(crate)` so channel handles can
/// route their sends and closes through it.
pub(crate) struct MuxShared {
    state: Mutex<MuxState>,
    /// Invoked from the dispatch context for every remotely opened channel
    on_channel: Mutex<ChannelCallback>,
    /// Invoked exactly once when the connection closes
    on_close: Mutex<Option<CloseCallback>>,
}

impl MuxShared {
    fn lock(&self) -> MutexGuard<'_, MuxState> {
        // A panicking callback must not wedge the connection; resume with
        // the inner state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn channel_send(&self, channel_id: u64, payload: Bytes) -> Result<(), MuxError> {
        let transport = {
            let state = self.lock();
            if !state.open.contains_key(&channel_id) {
                return Err(MuxError::ChannelClosed { channel_id });
            }
            let Some(transport) = state.transport.clone() else {
                return Err(MuxError::ChannelClosed { channel_id });
            };
            transport
        };
        send_frame(&transport, &Frame::data(channel_id, payload));
        Ok(())
    }

    pub(crate) fn channel_close(&self, channel_id: u64) {
        let transport = {
            let mut state = self.lock();
            let Some(entry) = state.open.remove(&channel_id) else {
                // Already closing, closed, or torn down: idempotent no-op.
                return;
            };
            entry.state.set(ChannelState::LocalClosed);
            state.closing.insert(channel_id, entry);
            state.transport.clone()
        };
        if let Some(transport) = transport {
            send_frame(&transport, &Frame::close_channel(channel_id));
        }
        tracing::debug!(channel_id, "channel close requested");
    }
}

/// The multiplexer.
///
/// Cheap to clone; clones share the same connection. Constructed around a
/// transport it takes ownership of, and driven by the embedder pushing
/// inbound transport events into [`Multiplexer::handle_message`] and
/// [`Multiplexer::handle_disconnect`].
#[derive(Clone)]
pub struct Multiplexer {
    shared: Arc<MuxShared>,
}

/// Encode and enqueue one frame; encode failures are logged, not
/// propagated (the only encode failure is an out-of-range id, which the
/// allocator makes unreachable).
fn send_frame(transport: &Arc<dyn MessageTransport>, frame: &Frame) {
    match frame.to_bytes() {
        Ok(bytes) => transport.send(bytes),
        Err(err) => {
            tracing::error!(error = %err, channel_id = frame.channel_id, "failed to encode outbound frame");
        },
    }
}

impl Multiplexer {
    /// Create a multiplexer over a transport.
    ///
    /// `on_channel` is invoked from the dispatch context with every
    /// remotely opened channel and its initial payload. `on_close` is
    /// invoked exactly once when the connection closes, whether locally,
    /// by transport end, or by a protocol violation.
    pub fn new<T, OnChannel, OnClose>(
        transport: T,
        config: MuxConfig,
        on_channel: OnChannel,
        on_close: OnClose,
    ) -> Self
    where
        T: MessageTransport,
        OnChannel: FnMut(Channel, Bytes) + Send + 'static,
        OnClose: FnOnce() + Send + 'static,
    {
        let next_id = if config.client { 2 } else { 3 };
        Self {
            shared: Arc::new(MuxShared {
                state: Mutex::new(MuxState {
                    transport: Some(Arc::new(transport)),
                    open: HashMap::new(),
                    closing: HashMap::new(),
                    next_id,
                    heartbeat_armed: false,
                    config,
                }),
                on_channel: Mutex::new(Box::new(on_channel)),
                on_close: Mutex::new(Some(Box::new(on_close))),
            }),
        }
    }

    /// True while the transport is still held (the connection is live)
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared.lock().transport.is_some()
    }

    /// True while local channel ids remain allocatable
    #[must_use]
    pub fn channels_available(&self) -> bool {
        self.shared.lock().next_id < Frame::CHANNEL_ID_LIMIT
    }

    /// Open a new locally allocated channel.
    ///
    /// Allocates the next local id, registers the channel, and sends an
    /// open frame carrying `initial_payload` (which may be empty). Returns
    /// `None` when the 48-bit id space is exhausted or the multiplexer has
    /// been torn down.
    pub fn open_channel(&self, initial_payload: impl Into<Bytes>) -> Option<Channel> {
        let payload = initial_payload.into();

        let mut state = self.shared.lock();
        let transport = state.transport.clone()?;
        if state.next_id >= Frame::CHANNEL_ID_LIMIT {
            return None;
        }
        let id = state.next_id;
        state.next_id += 2;

        let (tx, rx) = mpsc::unbounded_channel();
        let cell = Arc::new(SharedState::new());
        state.open.insert(id, ChannelEntry { inbound: tx, state: cell.clone() });
        if state.config.keep_alive {
            transport.set_heartbeat(Some(KEEP_ALIVE_INTERVAL));
            state.heartbeat_armed = true;
        }
        drop(state);

        send_frame(&transport, &Frame::open(id, payload));
        tracing::debug!(channel_id = id, "opened local channel");
        Some(Channel::new(id, Arc::downgrade(&self.shared), cell, rx))
    }

    /// Dispatch one inbound transport message.
    ///
    /// On a protocol violation the multiplexer tears itself down (the
    /// close callback fires) and the violation is returned so the driving
    /// loop can stop. Messages arriving after teardown are no-ops.
    ///
    /// # Errors
    ///
    /// Any [`MuxError`] returned here is connection-fatal and the
    /// connection is already closed when it is returned.
    pub async fn handle_message(&self, message: Bytes) -> Result<(), MuxError> {
        match self.dispatch(message) {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!(error = %err, "protocol violation, closing connection");
                self.close().await;
                Err(err)
            },
        }
    }

    /// Handle the transport ending (clean EOF or error): tear down.
    pub async fn handle_disconnect(&self) {
        tracing::debug!("transport disconnected");
        self.close().await;
    }

    /// Close the connection.
    ///
    /// Idempotent. Detaches the transport, terminates every channel's
    /// inbound sequence, awaits the transport close, then invokes the
    /// close callback exactly once.
    pub async fn close(&self) {
        let transport = {
            let mut state = self.shared.lock();
            let state = &mut *state;
            let transport = state.transport.take();
            for (_, entry) in state.open.drain().chain(state.closing.drain()) {
                entry.state.set(ChannelState::Closed);
            }
            transport
        };
        let Some(transport) = transport else {
            return;
        };

        transport.close().await;

        let callback = self.shared.on_close.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(callback) = callback {
            if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                tracing::error!("close callback panicked");
            }
        }
    }

    fn dispatch(&self, message: Bytes) -> Result<(), MuxError> {
        if !self.is_open() {
            // Torn down: all further events are no-ops.
            return Ok(());
        }

        let frame = Frame::decode(message)?;
        if frame.extension {
            tracing::warn!(
                channel_id = frame.channel_id,
                "non-breaking extension bit set on inbound frame"
            );
        }

        match frame.command {
            SysCommand::Data => self.dispatch_data(&frame),
            SysCommand::OpenChannel => self.dispatch_open(&frame),
            SysCommand::CloseChannel => self.dispatch_close(frame.channel_id),
        }
    }

    fn dispatch_data(&self, frame: &Frame) -> Result<(), MuxError> {
        let state = self.shared.lock();
        // A locally closed channel still receives in-flight data until the
        // peer confirms, hence the fallback to `closing`.
        let entry = state
            .open
            .get(&frame.channel_id)
            .or_else(|| state.closing.get(&frame.channel_id))
            .ok_or(MuxError::UnknownChannel { channel_id: frame.channel_id })?;

        // The handle may already be dropped; discarding is its business.
        let _ = entry.inbound.send(frame.payload.clone());
        Ok(())
    }

    fn dispatch_open(&self, frame: &Frame) -> Result<(), MuxError> {
        let id = frame.channel_id;
        let channel = {
            let mut state = self.shared.lock();
            let Some(transport) = state.transport.clone() else {
                return Ok(());
            };
            if state.open.contains_key(&id) || state.closing.contains_key(&id) {
                return Err(MuxError::DuplicateOpen { channel_id: id });
            }
            if id % 2 == state.next_id % 2 {
                return Err(MuxError::ParityMismatch { channel_id: id });
            }

            let (tx, rx) = mpsc::unbounded_channel();
            let cell = Arc::new(SharedState::new());
            state.open.insert(id, ChannelEntry { inbound: tx, state: cell.clone() });
            if state.config.keep_alive {
                transport.set_heartbeat(Some(KEEP_ALIVE_INTERVAL));
                state.heartbeat_armed = true;
            }
            Channel::new(id, Arc::downgrade(&self.shared), cell, rx)
        };

        tracing::debug!(channel_id = id, "peer opened channel");
        self.deliver_channel(channel, frame.payload.clone());
        Ok(())
    }

    fn dispatch_close(&self, id: u64) -> Result<(), MuxError> {
        let mut state = self.shared.lock();
        let transport = state.transport.clone();

        if let Some(entry) = state.open.remove(&id) {
            // Peer-initiated close: terminate the inbound sequence and
            // confirm on the same id.
            entry.state.set(ChannelState::RemoteClosed);
            drop(entry);
            let clear = state.disarm_heartbeat_if_idle();
            drop(state);
            if let Some(transport) = transport {
                send_frame(&transport, &Frame::close_channel(id));
                if clear {
                    transport.set_heartbeat(None);
                }
            }
            tracing::debug!(channel_id = id, "peer closed channel");
            return Ok(());
        }

        if let Some(entry) = state.closing.remove(&id) {
            // The confirmation our own close was waiting for.
            entry.state.set(ChannelState::Closed);
            drop(entry);
            let clear = state.disarm_heartbeat_if_idle();
            drop(state);
            if clear {
                if let Some(transport) = transport {
                    transport.set_heartbeat(None);
                }
            }
            tracing::debug!(channel_id = id, "close confirmed by peer");
            return Ok(());
        }

        // Close for an id in neither map: unknown channel or double close.
        Err(MuxError::UnknownChannel { channel_id: id })
    }

    fn deliver_channel(&self, channel: Channel, payload: Bytes) {
        let mut callback = self.shared.on_channel.lock().unwrap_or_else(PoisonError::into_inner);
        if catch_unwind(AssertUnwindSafe(|| (*callback)(channel, payload))).is_err() {
            tracing::error!("inbound-channel callback panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct RecordingInner {
        sent: Mutex<Vec<Bytes>>,
        heartbeat: Mutex<Option<Duration>>,
        closed: AtomicBool,
    }

    /// Transport that records everything for assertions
    #[derive(Clone, Default)]
    struct RecordingTransport(Arc<RecordingInner>);

    impl RecordingTransport {
        fn sent_frames(&self) -> Vec<Frame> {
            self.0
                .sent
                .lock()
                .unwrap()
                .iter()
                .map(|bytes| Frame::decode(bytes.clone()).expect("recorded frame must decode"))
                .collect()
        }

        fn heartbeat(&self) -> Option<Duration> {
            *self.0.heartbeat.lock().unwrap()
        }

        fn is_closed(&self) -> bool {
            self.0.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl MessageTransport for RecordingTransport {
        fn send(&self, message: Bytes) {
            self.0.sent.lock().unwrap().push(message);
        }

        async fn close(&self) {
            self.0.closed.store(true, Ordering::SeqCst);
        }

        fn set_heartbeat(&self, interval: Option<Duration>) {
            *self.0.heartbeat.lock().unwrap() = interval;
        }
    }

    fn mux_over(config: MuxConfig) -> (Multiplexer, RecordingTransport, Arc<AtomicUsize>) {
        let transport = RecordingTransport::default();
        let closes = Arc::new(AtomicUsize::new(0));
        let closes_cb = closes.clone();
        let mux = Multiplexer::new(
            transport.clone(),
            config,
            |_channel, _payload| {},
            move || {
                closes_cb.fetch_add(1, Ordering::SeqCst);
            },
        );
        (mux, transport, closes)
    }

    #[tokio::test]
    async fn client_allocates_even_ids_from_two() {
        let (mux, transport, _) = mux_over(MuxConfig::default());

        let a = mux.open_channel(Bytes::new()).unwrap();
        let b = mux.open_channel(Bytes::new()).unwrap();
        assert_eq!(a.id(), 2);
        assert_eq!(b.id(), 4);

        let frames = transport.sent_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, SysCommand::OpenChannel);
        assert_eq!(frames[0].channel_id, 2);
    }

    #[tokio::test]
    async fn server_allocates_odd_ids_from_three() {
        let (mux, _, _) = mux_over(MuxConfig { client: false, ..MuxConfig::default() });

        let a = mux.open_channel(Bytes::new()).unwrap();
        let b = mux.open_channel(Bytes::new()).unwrap();
        assert_eq!(a.id(), 3);
        assert_eq!(b.id(), 5);
    }

    #[tokio::test]
    async fn send_emits_exactly_one_data_frame() {
        let (mux, transport, _) = mux_over(MuxConfig::default());

        let channel = mux.open_channel(Bytes::new()).unwrap();
        channel.send(Bytes::from_static(&[0xDE, 0xAD])).unwrap();

        let frames = transport.sent_frames();
        assert_eq!(frames.len(), 2); // open + data
        assert_eq!(frames[1].command, SysCommand::Data);
        assert_eq!(frames[1].channel_id, channel.id());
        assert_eq!(frames[1].payload.as_ref(), &[0xDE, 0xAD]);
    }

    #[tokio::test]
    async fn close_is_two_phase_and_idempotent() {
        let (mux, transport, _) = mux_over(MuxConfig::default());

        let channel = mux.open_channel(Bytes::new()).unwrap();
        channel.close();
        assert_eq!(channel.state(), ChannelState::LocalClosed);

        // Second close is a silent no-op
        channel.close();
        let frames = transport.sent_frames();
        assert_eq!(frames.len(), 2); // open + one close
        assert_eq!(frames[1].command, SysCommand::CloseChannel);

        // Sending while closing is refused
        assert_eq!(
            channel.send(Bytes::new()),
            Err(MuxError::ChannelClosed { channel_id: channel.id() })
        );

        // Peer confirmation completes the handshake
        let confirmation = Frame::close_channel(channel.id()).to_bytes().unwrap();
        mux.handle_message(confirmation).await.unwrap();
        assert_eq!(channel.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn data_still_delivered_while_closing() {
        let (mux, _, _) = mux_over(MuxConfig::default());

        let mut channel = mux.open_channel(Bytes::new()).unwrap();
        channel.close();

        let data = Frame::data(channel.id(), Bytes::from_static(&[7])).to_bytes().unwrap();
        mux.handle_message(data).await.unwrap();
        assert_eq!(channel.recv().await.unwrap().as_ref(), &[7]);
    }

    #[tokio::test]
    async fn remote_open_delivers_channel_via_callback() {
        let transport = RecordingTransport::default();
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let delivered_cb = delivered.clone();
        let mux = Multiplexer::new(
            transport.clone(),
            MuxConfig::default(),
            move |channel, payload| {
                delivered_cb.lock().unwrap().push((channel.id(), payload));
            },
            || {},
        );

        let open = Frame::open(3, Bytes::from_static(&[1, 2])).to_bytes().unwrap();
        mux.handle_message(open).await.unwrap();

        let delivered = delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, 3);
        assert_eq!(delivered[0].1.as_ref(), &[1, 2]);
    }

    #[tokio::test]
    async fn remote_open_with_local_parity_is_fatal() {
        let (mux, _, closes) = mux_over(MuxConfig::default());

        // Client owns even ids; a remote open for 4 is a violation.
        let open = Frame::open(4, Bytes::new()).to_bytes().unwrap();
        let err = mux.handle_message(open).await.unwrap_err();
        assert_eq!(err, MuxError::ParityMismatch { channel_id: 4 });
        assert!(!mux.is_open());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_open_is_fatal() {
        let (mux, _, _) = mux_over(MuxConfig::default());

        mux.handle_message(Frame::open(3, Bytes::new()).to_bytes().unwrap()).await.unwrap();
        let err =
            mux.handle_message(Frame::open(3, Bytes::new()).to_bytes().unwrap()).await.unwrap_err();
        assert_eq!(err, MuxError::DuplicateOpen { channel_id: 3 });
    }

    #[tokio::test]
    async fn data_for_unknown_channel_is_fatal() {
        let (mux, _, closes) = mux_over(MuxConfig::default());

        let data = Frame::data(8, Bytes::from_static(&[0])).to_bytes().unwrap();
        let err = mux.handle_message(data).await.unwrap_err();
        assert_eq!(err, MuxError::UnknownChannel { channel_id: 8 });
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_for_unknown_channel_is_fatal() {
        let (mux, _, _) = mux_over(MuxConfig::default());

        let close = Frame::close_channel(8).to_bytes().unwrap();
        assert!(mux.handle_message(close).await.is_err());
    }

    #[tokio::test]
    async fn peer_close_terminates_sequence_and_confirms() {
        let (mux, transport, _) = mux_over(MuxConfig::default());

        let mut channel = mux.open_channel(Bytes::new()).unwrap();
        mux.handle_message(Frame::data(channel.id(), Bytes::from_static(&[9])).to_bytes().unwrap())
            .await
            .unwrap();
        mux.handle_message(Frame::close_channel(channel.id()).to_bytes().unwrap()).await.unwrap();

        assert_eq!(channel.state(), ChannelState::RemoteClosed);
        // Queued payload drains, then the sequence terminates
        assert_eq!(channel.recv().await.unwrap().as_ref(), &[9]);
        assert_eq!(channel.recv().await, None);

        // Confirmation went out on the same id
        let frames = transport.sent_frames();
        let last = frames.last().unwrap();
        assert_eq!(last.command, SysCommand::CloseChannel);
        assert_eq!(last.channel_id, channel.id());
    }

    #[tokio::test]
    async fn teardown_terminates_channels_and_fires_on_close_once() {
        let (mux, transport, closes) = mux_over(MuxConfig::default());

        let mut channel = mux.open_channel(Bytes::new()).unwrap();
        mux.close().await;
        mux.close().await;

        assert!(!mux.is_open());
        assert!(transport.is_closed());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(channel.recv().await, None);
        assert!(mux.open_channel(Bytes::new()).is_none());
        assert_eq!(
            channel.send(Bytes::new()),
            Err(MuxError::ChannelClosed { channel_id: channel.id() })
        );
    }

    #[tokio::test]
    async fn messages_after_teardown_are_no_ops() {
        let (mux, _, closes) = mux_over(MuxConfig::default());
        mux.close().await;

        // Would all be violations on a live connection
        mux.handle_message(Frame::data(8, Bytes::new()).to_bytes().unwrap()).await.unwrap();
        mux.handle_message(Bytes::from_static(&[0x01])).await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn id_exhaustion_refuses_without_closing() {
        let (mux, _, closes) = mux_over(MuxConfig::default());
        mux.shared.lock().next_id = Frame::CHANNEL_ID_LIMIT - 2;

        assert!(mux.channels_available());
        let last = mux.open_channel(Bytes::new()).expect("last id must allocate");
        assert_eq!(last.id(), Frame::CHANNEL_ID_LIMIT - 2);

        assert!(!mux.channels_available());
        assert!(mux.open_channel(Bytes::new()).is_none());
        assert!(mux.is_open());
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn keep_alive_gated_on_channel_population() {
        let (mux, transport, _) =
            mux_over(MuxConfig { keep_alive: true, ..MuxConfig::default() });
        assert_eq!(transport.heartbeat(), None);

        let channel = mux.open_channel(Bytes::new()).unwrap();
        assert_eq!(transport.heartbeat(), Some(KEEP_ALIVE_INTERVAL));

        channel.close();
        // Still armed: the closing map is non-empty
        assert_eq!(transport.heartbeat(), Some(KEEP_ALIVE_INTERVAL));

        mux.handle_message(Frame::close_channel(channel.id()).to_bytes().unwrap()).await.unwrap();
        assert_eq!(transport.heartbeat(), None);
    }

    #[tokio::test]
    async fn keep_alive_refreshed_by_remote_open() {
        let (mux, transport, _) =
            mux_over(MuxConfig { keep_alive: true, ..MuxConfig::default() });

        mux.handle_message(Frame::open(3, Bytes::new()).to_bytes().unwrap()).await.unwrap();
        assert_eq!(transport.heartbeat(), Some(KEEP_ALIVE_INTERVAL));

        mux.handle_message(Frame::close_channel(3).to_bytes().unwrap()).await.unwrap();
        assert_eq!(transport.heartbeat(), None);
    }

    #[tokio::test]
    async fn keep_alive_disabled_never_touches_heartbeat() {
        let (mux, transport, _) = mux_over(MuxConfig::default());
        let channel = mux.open_channel(Bytes::new()).unwrap();
        assert_eq!(transport.heartbeat(), None);
        drop(channel);
    }

    #[tokio::test]
    async fn panicking_channel_callback_does_not_kill_connection() {
        let transport = RecordingTransport::default();
        let mux = Multiplexer::new(
            transport.clone(),
            MuxConfig::default(),
            |_channel, _payload| panic!("application bug"),
            || {},
        );

        mux.handle_message(Frame::open(3, Bytes::new()).to_bytes().unwrap()).await.unwrap();
        assert!(mux.is_open());
        // Channel was still registered despite the panic
        let err =
            mux.handle_message(Frame::open(3, Bytes::new()).to_bytes().unwrap()).await.unwrap_err();
        assert_eq!(err, MuxError::DuplicateOpen { channel_id: 3 });
    }
}
