//! Error types for the CLI client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Broker connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Direct peer channel error
    #[error("Peer channel error: {0}")]
    PeerChannel(String),
}
