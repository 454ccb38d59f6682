//! Centralized configuration constants for the transfer protocol.
//!
//! All tunable parameters live here so they can be reviewed and adjusted
//! in a single place.

use std::time::Duration;

/// Chunk size in bytes (16 KiB).
///
/// Every binary frame carries at most this many payload bytes; the last
/// chunk of a transfer may be smaller.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Send-buffer threshold in bytes (64 KiB).
///
/// The sender pauses while the channel's outstanding unsent-byte count
/// plus the next chunk would exceed this bound, so outstanding bytes
/// never go above the threshold.
pub const BUFFER_THRESHOLD: usize = 64 * 1024;

/// Fixed delay between buffer-occupancy re-checks while paused (50 ms).
///
/// Deliberately a flat retry cadence, not exponential backoff: the wait
/// is a cooperative suspension point, and a receiver that never drains
/// keeps the sender retrying indefinitely.
pub const BACKPRESSURE_DELAY: Duration = Duration::from_millis(50);

/// Flow-control parameters for one transfer channel.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub chunk_size: usize,
    pub buffer_threshold: usize,
    pub backpressure_delay: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            buffer_threshold: BUFFER_THRESHOLD,
            backpressure_delay: BACKPRESSURE_DELAY,
        }
    }
}
