//! Turmoil-based transport with message framing.
//!
//! Turmoil's TCP gives us a deterministic, fault-injectable byte stream;
//! the multiplexer needs message boundaries on top of it. This transport
//! adds a u32 little-endian length prefix per message - standing in for
//! the WebSocket message framing of the canonical deployment - and runs a
//! writer and a reader task per connection.
//!
//! # Why TCP Instead of a Real WebSocket?
//!
//! The multiplexer's logic lives *above* the transport's message
//! boundary. We test the multiplexer's correctness, not the WebSocket's
//! handshake; length-prefixed turmoil TCP provides identical
//! reliable-ordered-message semantics deterministically.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf},
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use turmoil::net::{TcpListener, TcpStream};
use weft_core::MessageTransport;

use crate::mem_transport::HeartbeatProbe;

/// Refuse length prefixes beyond this; a corrupted prefix must not cause
/// a giant allocation.
const MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

enum WriterCommand {
    Message(Bytes),
    Shutdown,
}

/// Message transport over a turmoil TCP stream.
pub struct SimSocketTransport {
    outbound: UnboundedSender<WriterCommand>,
    heartbeat: Arc<Mutex<Option<Duration>>>,
}

impl SimSocketTransport {
    /// Wrap an established stream; returns the transport and its inbound
    /// message stream for the driver.
    #[must_use]
    pub fn new(stream: TcpStream) -> (Self, UnboundedReceiver<Bytes>) {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound, writer_rx) = mpsc::unbounded_channel();
        let (reader_tx, inbound) = mpsc::unbounded_channel();

        tokio::spawn(write_loop(write_half, writer_rx));
        tokio::spawn(read_loop(read_half, reader_tx));

        (Self { outbound, heartbeat: Arc::new(Mutex::new(None)) }, inbound)
    }

    /// Connect to a simulated host (e.g. `"server:443"`).
    ///
    /// # Errors
    ///
    /// Returns the connection error from turmoil's TCP.
    pub async fn connect(addr: &str) -> std::io::Result<(Self, UnboundedReceiver<Bytes>)> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    /// Accept one connection from a simulated listener.
    ///
    /// # Errors
    ///
    /// Returns the accept error from turmoil's TCP.
    pub async fn accept(listener: &TcpListener) -> std::io::Result<(Self, UnboundedReceiver<Bytes>)> {
        let (stream, _addr) = listener.accept().await?;
        Ok(Self::new(stream))
    }

    /// Observer for the heartbeat interval programmed on this transport
    #[must_use]
    pub fn heartbeat_probe(&self) -> HeartbeatProbe {
        HeartbeatProbe::from_cell(self.heartbeat.clone())
    }
}

#[async_trait]
impl MessageTransport for SimSocketTransport {
    fn send(&self, message: Bytes) {
        // Writer gone means the connection already ended; a reliable
        // transport that has ended simply stops delivering.
        let _ = self.outbound.send(WriterCommand::Message(message));
    }

    async fn close(&self) {
        let _ = self.outbound.send(WriterCommand::Shutdown);
    }

    fn set_heartbeat(&self, interval: Option<Duration>) {
        *self.heartbeat.lock().unwrap_or_else(PoisonError::into_inner) = interval;
    }
}

async fn write_loop(
    mut write: WriteHalf<TcpStream>,
    mut commands: UnboundedReceiver<WriterCommand>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            WriterCommand::Message(message) => {
                #[allow(clippy::cast_possible_truncation)]
                let len = (message.len() as u32).to_le_bytes();
                if write.write_all(&len).await.is_err()
                    || write.write_all(&message).await.is_err()
                {
                    return;
                }
            },
            WriterCommand::Shutdown => {
                let _ = write.shutdown().await;
                return;
            },
        }
    }
    let _ = write.shutdown().await;
}

async fn read_loop(mut read: ReadHalf<TcpStream>, inbound: UnboundedSender<Bytes>) {
    loop {
        let mut len_buf = [0u8; 4];
        if read.read_exact(&mut len_buf).await.is_err() {
            // EOF or error: dropping the sender ends the driver's stream
            return;
        }
        let len = u32::from_le_bytes(len_buf);
        if len > MAX_MESSAGE_SIZE {
            tracing::error!(len, "oversized message prefix, dropping connection");
            return;
        }
        let mut message = vec![0u8; len as usize];
        if read.read_exact(&mut message).await.is_err() {
            return;
        }
        if inbound.send(Bytes::from(message)).is_err() {
            return;
        }
    }
}
