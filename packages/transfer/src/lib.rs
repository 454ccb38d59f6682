//! Chunked transfer protocol with flow control.
//!
//! Moves arbitrarily large payloads over a message-oriented channel of
//! bounded send-buffer capacity without overrunning that buffer or losing
//! ordering. The channel itself is abstract (`PeerChannel`); the crate
//! ships an in-process implementation for tests and local use.
//!
//! Protocol: a `file-info` control frame announces the transfer, binary
//! chunks carry the payload, and a `file-end` control frame finalizes it.
//! The sender paces itself against the channel's outstanding-byte count
//! with a fixed-delay cooperative poll.

pub mod channel;
pub mod config;
pub mod protocol;
pub mod receiver;
pub mod sender;

pub use channel::{ChannelError, Frame, MemoryChannel, PeerChannel};
pub use config::TransferConfig;
pub use protocol::{TransferControl, TransferDescriptor, TransferEvent};
pub use receiver::{CompletedTransfer, ReceiveError, TransferReceiver};
pub use sender::{SendError, TransferSender};
