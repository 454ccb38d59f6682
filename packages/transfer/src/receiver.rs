//! Receiver side of the chunked transfer protocol.
//!
//! Holds one active transfer session per channel direction. Binary chunk
//! frames carry no transfer id on the wire, so chunks are attributed to
//! the session opened by the last `file-info`; a `file-info` arriving
//! while a session is still open is refused with an explicit error
//! instead of silently discarding the in-flight transfer's state.
//!
//! No checksum or length verification is performed against the declared
//! total size; correctness relies on the channel's own ordering and
//! delivery guarantees.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::protocol::{TransferControl, TransferDescriptor, TransferEvent};

/// Transfer receive failure
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// Overlapping start: the active transfer is kept, the new one refused
    #[error("transfer '{active}' is still in flight; refusing overlapping start '{rejected}'")]
    TransferInFlight { active: String, rejected: String },
    /// Control frame that does not parse as a known message
    #[error("malformed control frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// file-end naming a transfer that is not the active one
    #[error("file-end for unknown transfer '{0}'")]
    UnknownTransfer(String),
}

/// One in-flight inbound transfer.
#[derive(Debug)]
struct TransferSession {
    descriptor: TransferDescriptor,
    chunks: Vec<Vec<u8>>,
    received: u64,
}

/// A finalized inbound transfer: declared metadata plus the reassembled payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTransfer {
    pub descriptor: TransferDescriptor,
    pub payload: Vec<u8>,
}

/// Receiver for one logical channel direction.
pub struct TransferReceiver {
    session: Option<TransferSession>,
    events: Option<mpsc::UnboundedSender<TransferEvent>>,
}

impl TransferReceiver {
    pub fn new() -> Self {
        Self {
            session: None,
            events: None,
        }
    }

    /// Report progress events to the given channel.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<TransferEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Handle a text (control) frame.
    ///
    /// Returns the completed transfer when the frame was a matching
    /// `file-end`.
    pub fn on_text(&mut self, frame: &str) -> Result<Option<CompletedTransfer>, ReceiveError> {
        let control: TransferControl = serde_json::from_str(frame)?;
        match control {
            TransferControl::FileInfo {
                transfer_id,
                name,
                total_size,
                mime_type,
                inline_flag,
            } => {
                if let Some(active) = &self.session {
                    return Err(ReceiveError::TransferInFlight {
                        active: active.descriptor.transfer_id.clone(),
                        rejected: transfer_id,
                    });
                }
                tracing::info!(
                    "Transfer '{}' incoming: '{}' ({} bytes)",
                    transfer_id,
                    name,
                    total_size
                );
                self.session = Some(TransferSession {
                    descriptor: TransferDescriptor {
                        transfer_id,
                        name,
                        total_size,
                        mime_type,
                        inline: inline_flag,
                    },
                    chunks: Vec::new(),
                    received: 0,
                });
                Ok(None)
            }
            TransferControl::FileEnd { transfer_id, .. } => match self.session.take() {
                Some(session) if session.descriptor.transfer_id == transfer_id => {
                    let payload = session.chunks.concat();
                    tracing::info!(
                        "Transfer '{}' finalized ({} bytes reassembled)",
                        session.descriptor.transfer_id,
                        payload.len()
                    );
                    Ok(Some(CompletedTransfer {
                        descriptor: session.descriptor,
                        payload,
                    }))
                }
                other => {
                    self.session = other;
                    Err(ReceiveError::UnknownTransfer(transfer_id))
                }
            },
        }
    }

    /// Handle a binary (chunk) frame.
    ///
    /// A chunk with no open session is logged and dropped; the connection
    /// is not affected.
    pub fn on_binary(&mut self, chunk: &[u8]) {
        let Some(session) = &mut self.session else {
            tracing::warn!(
                "Dropping {} byte chunk with no transfer in progress",
                chunk.len()
            );
            return;
        };

        session.received += chunk.len() as u64;
        session.chunks.push(chunk.to_vec());

        if session.received > session.descriptor.total_size {
            tracing::warn!(
                "Transfer '{}' exceeded its declared size: {} > {}",
                session.descriptor.transfer_id,
                session.received,
                session.descriptor.total_size
            );
        }

        if !session.descriptor.inline {
            let event = TransferEvent::Progress {
                transfer_id: session.descriptor.transfer_id.clone(),
                transferred: session.received,
                total: session.descriptor.total_size,
            };
            if let Some(events) = &self.events {
                let _ = events.send(event);
            }
        }
    }

    /// Whether a transfer is currently in flight.
    pub fn is_receiving(&self) -> bool {
        self.session.is_some()
    }

    /// Drop any in-flight session (channel teardown).
    pub fn reset(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::warn!(
                "Discarding incomplete transfer '{}' ({} of {} bytes)",
                session.descriptor.transfer_id,
                session.received,
                session.descriptor.total_size
            );
        }
    }
}

impl Default for TransferReceiver {
    fn default() -> Self {
        Self::new()
    }
}
