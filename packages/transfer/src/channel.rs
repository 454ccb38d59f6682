//! Peer channel abstraction.
//!
//! The transfer protocol runs over whatever ordered reliable channel the
//! call negotiation established. This module defines the minimal surface
//! the sender and receiver need: text frames, binary frames, and the
//! outstanding-byte count used for flow control.
//!
//! `MemoryChannel` is an in-process implementation whose
//! `buffered_amount` counts bytes enqueued but not yet consumed by the
//! remote end. It backs the crate's own tests and local loopback use.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

/// Channel failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("peer channel closed")]
    Closed,
}

/// One frame on the wire: a JSON control message or a raw payload chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered reliable message channel with a bounded send buffer.
#[async_trait]
pub trait PeerChannel: Send + Sync {
    /// Queue a text (control) frame
    async fn send_text(&self, frame: String) -> Result<(), ChannelError>;

    /// Queue a binary (chunk) frame
    async fn send_binary(&self, chunk: Vec<u8>) -> Result<(), ChannelError>;

    /// Bytes queued for sending that the remote end has not consumed yet
    async fn buffered_amount(&self) -> usize;
}

/// In-process channel endpoint.
///
/// Created in pairs; frames sent on one endpoint are received on the
/// other in order. The sender-side byte counter is decremented when the
/// remote endpoint consumes a frame, which makes `buffered_amount`
/// behave like a real send buffer under a slow reader.
pub struct MemoryChannel {
    tx: std::sync::Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Frame>>,
    /// Bytes this endpoint queued that the remote has not consumed
    outbound_bytes: Arc<AtomicUsize>,
    /// Bytes the remote queued that this endpoint has not consumed
    inbound_bytes: Arc<AtomicUsize>,
}

impl MemoryChannel {
    /// Create a connected pair of endpoints.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let a_outstanding = Arc::new(AtomicUsize::new(0));
        let b_outstanding = Arc::new(AtomicUsize::new(0));

        let a = Self {
            tx: std::sync::Mutex::new(Some(a_tx)),
            rx: Mutex::new(b_rx),
            outbound_bytes: a_outstanding.clone(),
            inbound_bytes: b_outstanding.clone(),
        };
        let b = Self {
            tx: std::sync::Mutex::new(Some(b_tx)),
            rx: Mutex::new(a_rx),
            outbound_bytes: b_outstanding,
            inbound_bytes: a_outstanding,
        };
        (a, b)
    }

    /// Receive the next frame from the remote endpoint.
    ///
    /// Returns `None` once the remote endpoint is closed and drained.
    pub async fn recv(&self) -> Option<Frame> {
        let frame = self.rx.lock().await.recv().await?;
        self.inbound_bytes.fetch_sub(frame.len(), Ordering::SeqCst);
        Some(frame)
    }

    /// Close this endpoint's sending side.
    pub fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }

    fn send_frame(&self, frame: Frame) -> Result<(), ChannelError> {
        let len = frame.len();
        let tx = self.tx.lock().map_err(|_| ChannelError::Closed)?;
        let sender = tx.as_ref().ok_or(ChannelError::Closed)?;
        self.outbound_bytes.fetch_add(len, Ordering::SeqCst);
        sender.send(frame).map_err(|_| {
            self.outbound_bytes.fetch_sub(len, Ordering::SeqCst);
            ChannelError::Closed
        })
    }
}

#[async_trait]
impl PeerChannel for MemoryChannel {
    async fn send_text(&self, frame: String) -> Result<(), ChannelError> {
        self.send_frame(Frame::Text(frame))
    }

    async fn send_binary(&self, chunk: Vec<u8>) -> Result<(), ChannelError> {
        self.send_frame(Frame::Binary(chunk))
    }

    async fn buffered_amount(&self) -> usize {
        self.outbound_bytes.load(Ordering::SeqCst)
    }
}
