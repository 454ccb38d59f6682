//! Direct peer channel for chat images and file transfers.
//!
//! Once a call is accepted, the initiator opens a WebSocket listener on
//! an ephemeral port and ships its address to the responder inside the
//! opaque `offer` payload; the responder dials it and confirms with an
//! `answer`. The resulting socket is wrapped as a
//! [`kakehashi_transfer::PeerChannel`]: outbound frames go through a
//! queue whose byte counter backs `buffered_amount`, so the transfer
//! sender's flow control sees real occupancy.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, accept_async, connect_async, tungstenite::protocol::Message,
};

use kakehashi_shared::time::get_unix_timestamp;
use kakehashi_transfer::{
    ChannelError, CompletedTransfer, Frame, PeerChannel, TransferConfig, TransferDescriptor,
    TransferEvent, TransferReceiver, TransferSender,
};

use crate::domain::guess_mime_type;
use crate::error::ClientError;

/// Events the peer link surfaces to the session loop.
#[derive(Debug)]
pub enum PeerLinkEvent {
    /// Progress / completion / failure of an outbound or inbound transfer
    Transfer(TransferEvent),
    /// A finalized inbound transfer
    Received(CompletedTransfer),
    /// The peer channel closed (both directions are gone)
    Closed,
}

/// A WebSocket stream from either side of the handshake.
pub enum PeerStream {
    Accepted(WebSocketStream<TcpStream>),
    Dialed(WebSocketStream<MaybeTlsStream<TcpStream>>),
}

/// Outbound half of the peer channel.
///
/// `buffered_amount` counts bytes queued or in flight toward the socket;
/// the writer task decrements the counter only after a frame has been
/// written out.
pub struct WsPeerChannel {
    tx: std::sync::Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    queued_bytes: Arc<AtomicUsize>,
}

impl WsPeerChannel {
    fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }

    fn send_frame(&self, frame: Frame) -> Result<(), ChannelError> {
        let len = frame.len();
        let tx = self.tx.lock().map_err(|_| ChannelError::Closed)?;
        let sender = tx.as_ref().ok_or(ChannelError::Closed)?;
        self.queued_bytes.fetch_add(len, Ordering::SeqCst);
        sender.send(frame).map_err(|_| {
            self.queued_bytes.fetch_sub(len, Ordering::SeqCst);
            ChannelError::Closed
        })
    }
}

#[async_trait]
impl PeerChannel for WsPeerChannel {
    async fn send_text(&self, frame: String) -> Result<(), ChannelError> {
        self.send_frame(Frame::Text(frame))
    }

    async fn send_binary(&self, chunk: Vec<u8>) -> Result<(), ChannelError> {
        self.send_frame(Frame::Binary(chunk))
    }

    async fn buffered_amount(&self) -> usize {
        self.queued_bytes.load(Ordering::SeqCst)
    }
}

/// One established peer connection: writer task, reader task, and the
/// channel handle used by transfer senders.
pub struct PeerLink {
    channel: Arc<WsPeerChannel>,
    /// Serializes outbound transfers (one in flight per channel)
    send_lock: Arc<Mutex<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl PeerLink {
    pub fn from_stream(stream: PeerStream, events: mpsc::UnboundedSender<PeerLinkEvent>) -> Self {
        match stream {
            PeerStream::Accepted(ws) => Self::new(ws, events),
            PeerStream::Dialed(ws) => Self::new(ws, events),
        }
    }

    fn new<S>(ws: WebSocketStream<S>, events: mpsc::UnboundedSender<PeerLinkEvent>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sink, mut stream) = ws.split();
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Frame>();
        let queued_bytes = Arc::new(AtomicUsize::new(0));

        let channel = Arc::new(WsPeerChannel {
            tx: std::sync::Mutex::new(Some(writer_tx)),
            queued_bytes: queued_bytes.clone(),
        });

        // Writer: drain queued frames into the socket, decrementing the
        // byte counter once each frame has been written
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = writer_rx.recv().await {
                let len = frame.len();
                let message = match frame {
                    Frame::Text(text) => Message::Text(text.into()),
                    Frame::Binary(bytes) => Message::Binary(bytes.into()),
                };
                let outcome = sink.send(message).await;
                queued_bytes.fetch_sub(len, Ordering::SeqCst);
                if outcome.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Reader: feed inbound frames to the transfer receiver and
        // forward its progress events to the session loop
        let (recv_events_tx, mut recv_events_rx) = mpsc::unbounded_channel();
        let forward_events = events.clone();
        let forwarder_task = tokio::spawn(async move {
            while let Some(event) = recv_events_rx.recv().await {
                if forward_events.send(PeerLinkEvent::Transfer(event)).is_err() {
                    break;
                }
            }
        });

        let reader_task = tokio::spawn(async move {
            let mut receiver = TransferReceiver::new().with_events(recv_events_tx);
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => match receiver.on_text(text.as_str()) {
                        Ok(Some(completed)) => {
                            if events.send(PeerLinkEvent::Received(completed)).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!("Dropping peer control frame: {}", e);
                        }
                    },
                    Ok(Message::Binary(bytes)) => receiver.on_binary(&bytes),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Peer channel read error: {}", e);
                        break;
                    }
                }
            }
            receiver.reset();
            let _ = events.send(PeerLinkEvent::Closed);
        });

        Self {
            channel,
            send_lock: Arc::new(Mutex::new(())),
            tasks: vec![writer_task, forwarder_task, reader_task],
        }
    }

    /// Send one file over the peer channel.
    ///
    /// Spawns the transfer so the session loop stays responsive; progress
    /// and failures come back through the event channel.
    pub async fn send_file(
        &self,
        path: PathBuf,
        inline: bool,
        events: mpsc::UnboundedSender<PeerLinkEvent>,
    ) -> Result<(), ClientError> {
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ClientError::PeerChannel(format!("cannot read '{}': {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(ClientError::PeerChannel(format!(
                "'{}' is not a file",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("payload.bin")
            .to_string();
        let descriptor = TransferDescriptor {
            // Sender-chosen opaque id; unique enough per channel
            transfer_id: get_unix_timestamp().to_string(),
            name,
            total_size: metadata.len(),
            mime_type: guess_mime_type(&path).to_string(),
            inline,
        };

        let channel = self.channel.clone();
        let send_lock = self.send_lock.clone();
        let (sender_events_tx, mut sender_events_rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = sender_events_rx.recv().await {
                if events.send(PeerLinkEvent::Transfer(event)).is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            // One transfer in flight per channel at a time
            let _guard = send_lock.lock().await;
            let file = match tokio::fs::File::open(&path).await {
                Ok(file) => file,
                Err(e) => {
                    tracing::error!("Failed to open '{}': {}", path.display(), e);
                    return;
                }
            };
            let mut sender = TransferSender::new(channel, TransferConfig::default())
                .with_events(sender_events_tx);
            if let Err(e) = sender.send(&descriptor, file).await {
                tracing::error!("Transfer failed: {}", e);
            }
            drop(forwarder);
        });

        Ok(())
    }

    /// Tear the link down; aborts both directions.
    pub fn shutdown(&mut self) {
        self.channel.close();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for PeerLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bind a listener for the peer channel on an ephemeral port.
///
/// Returns the listener and the address to advertise in the offer.
pub async fn bind_peer_listener(advertise_host: &str) -> Result<(TcpListener, String), ClientError> {
    let listener = TcpListener::bind(("0.0.0.0", 0))
        .await
        .map_err(|e| ClientError::PeerChannel(format!("failed to bind listener: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| ClientError::PeerChannel(e.to_string()))?
        .port();
    Ok((listener, format!("{}:{}", advertise_host, port)))
}

/// Accept one inbound peer connection and upgrade it to WebSocket.
pub async fn accept_peer(listener: TcpListener) -> Result<PeerStream, ClientError> {
    let (stream, addr) = listener
        .accept()
        .await
        .map_err(|e| ClientError::PeerChannel(format!("accept failed: {}", e)))?;
    tracing::info!("Peer connected from {}", addr);
    let ws = accept_async(stream)
        .await
        .map_err(|e| ClientError::PeerChannel(format!("websocket upgrade failed: {}", e)))?;
    Ok(PeerStream::Accepted(ws))
}

/// Dial the address a peer advertised in its offer.
pub async fn dial_peer(addr: &str) -> Result<PeerStream, ClientError> {
    let url = format!("ws://{}", addr);
    let (ws, _) = connect_async(&url)
        .await
        .map_err(|e| ClientError::PeerChannel(format!("failed to dial '{}': {}", url, e)))?;
    tracing::info!("Peer channel established to {}", addr);
    Ok(PeerStream::Dialed(ws))
}
