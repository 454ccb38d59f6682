//! Transfer control frames and progress events.

use serde::{Deserialize, Serialize};

/// Control messages interleaved with binary chunks on the data channel.
///
/// Closed tagged enum: an unknown `type` fails to parse and is dropped
/// by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransferControl {
    /// Announces a transfer before its first chunk
    FileInfo {
        transfer_id: String,
        name: String,
        total_size: u64,
        mime_type: String,
        inline_flag: bool,
    },
    /// Marks a transfer complete
    FileEnd {
        transfer_id: String,
        inline_flag: bool,
    },
}

/// Everything the sender declares about one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDescriptor {
    /// Sender-chosen opaque id
    pub transfer_id: String,
    pub name: String,
    pub total_size: u64,
    pub mime_type: String,
    /// Inline payloads (chat-embedded images) skip progress reporting
    pub inline: bool,
}

impl TransferDescriptor {
    /// Build the start-of-transfer control frame
    pub fn announce(&self) -> TransferControl {
        TransferControl::FileInfo {
            transfer_id: self.transfer_id.clone(),
            name: self.name.clone(),
            total_size: self.total_size,
            mime_type: self.mime_type.clone(),
            inline_flag: self.inline,
        }
    }

    /// Build the end-of-transfer control frame
    pub fn finish(&self) -> TransferControl {
        TransferControl::FileEnd {
            transfer_id: self.transfer_id.clone(),
            inline_flag: self.inline,
        }
    }
}

/// Progress and lifecycle events reported to the local operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Progress {
        transfer_id: String,
        transferred: u64,
        total: u64,
    },
    Completed {
        transfer_id: String,
    },
    Failed {
        transfer_id: String,
        reason: String,
    },
}
