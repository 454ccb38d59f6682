//! Sender side of the chunked transfer protocol.
//!
//! Announces the transfer, streams fixed-size chunks from the source,
//! and paces sends against the channel's outstanding-byte count: before
//! each chunk the sender re-checks buffer occupancy on a fixed delay
//! until the chunk fits under the threshold. The wait is cooperative
//! polling, so it never blocks a thread. There is no timeout: a receiver
//! that never drains keeps the sender retrying indefinitely.
//!
//! A channel failure mid-transfer aborts without retry; the failure is
//! surfaced to the operator through the event channel and the returned
//! error. No partial resume is attempted.

use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::channel::{ChannelError, PeerChannel};
use crate::config::TransferConfig;
use crate::protocol::{TransferDescriptor, TransferEvent};

/// Transfer send failure
#[derive(Debug, Error)]
pub enum SendError {
    #[error("peer channel failed: {0}")]
    Channel(#[from] ChannelError),
    #[error("failed to read source payload: {0}")]
    Source(#[from] std::io::Error),
    #[error("failed to encode control frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sender for one logical channel.
///
/// Sends hold `&mut self`, so strictly one transfer is in flight per
/// channel at a time.
pub struct TransferSender<C: PeerChannel> {
    channel: Arc<C>,
    config: TransferConfig,
    events: Option<mpsc::UnboundedSender<TransferEvent>>,
}

impl<C: PeerChannel> TransferSender<C> {
    pub fn new(channel: Arc<C>, config: TransferConfig) -> Self {
        Self {
            channel,
            config,
            events: None,
        }
    }

    /// Report progress and lifecycle events to the given channel.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<TransferEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Send one complete payload read from `source`.
    pub async fn send<R>(
        &mut self,
        descriptor: &TransferDescriptor,
        mut source: R,
    ) -> Result<(), SendError>
    where
        R: AsyncRead + Unpin,
    {
        let announce = serde_json::to_string(&descriptor.announce())?;
        if let Err(e) = self.channel.send_text(announce).await {
            return Err(self.abort(descriptor, e.into()));
        }

        tracing::info!(
            "Transfer '{}' started: '{}' ({} bytes)",
            descriptor.transfer_id,
            descriptor.name,
            descriptor.total_size
        );

        let mut buf = vec![0u8; self.config.chunk_size];
        let mut offset: u64 = 0;
        loop {
            let n = match read_chunk(&mut source, &mut buf).await {
                Ok(n) => n,
                Err(e) => return Err(self.abort(descriptor, e.into())),
            };
            if n == 0 {
                break;
            }

            if let Err(e) = self.wait_for_buffer_space(n).await {
                return Err(self.abort(descriptor, e.into()));
            }
            if let Err(e) = self.channel.send_binary(buf[..n].to_vec()).await {
                return Err(self.abort(descriptor, e.into()));
            }

            offset += n as u64;
            self.report_progress(descriptor, offset);
        }

        let end = serde_json::to_string(&descriptor.finish())?;
        if let Err(e) = self.channel.send_text(end).await {
            return Err(self.abort(descriptor, e.into()));
        }

        tracing::info!(
            "Transfer '{}' completed ({} bytes sent)",
            descriptor.transfer_id,
            offset
        );
        self.emit(TransferEvent::Completed {
            transfer_id: descriptor.transfer_id.clone(),
        });
        Ok(())
    }

    /// Convenience wrapper for in-memory payloads.
    pub async fn send_bytes(
        &mut self,
        descriptor: &TransferDescriptor,
        payload: &[u8],
    ) -> Result<(), SendError> {
        self.send(descriptor, payload).await
    }

    /// Poll until the next chunk fits under the buffer threshold.
    async fn wait_for_buffer_space(&self, next_chunk_len: usize) -> Result<(), ChannelError> {
        loop {
            let buffered = self.channel.buffered_amount().await;
            if buffered + next_chunk_len <= self.config.buffer_threshold {
                return Ok(());
            }
            tracing::trace!(
                "Backpressure: {} bytes buffered (threshold {}), retrying in {:?}",
                buffered,
                self.config.buffer_threshold,
                self.config.backpressure_delay
            );
            tokio::time::sleep(self.config.backpressure_delay).await;
        }
    }

    fn report_progress(&self, descriptor: &TransferDescriptor, transferred: u64) {
        if descriptor.inline {
            return;
        }
        self.emit(TransferEvent::Progress {
            transfer_id: descriptor.transfer_id.clone(),
            transferred,
            total: descriptor.total_size,
        });
    }

    fn abort(&self, descriptor: &TransferDescriptor, error: SendError) -> SendError {
        tracing::error!(
            "Transfer '{}' aborted: {} (no retry)",
            descriptor.transfer_id,
            error
        );
        self.emit(TransferEvent::Failed {
            transfer_id: descriptor.transfer_id.clone(),
            reason: error.to_string(),
        });
        error
    }

    fn emit(&self, event: TransferEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// Fill `buf` from `source`, stopping early only at end of input.
///
/// Returns 0 exactly once the source is exhausted.
async fn read_chunk<R: AsyncRead + Unpin>(
    source: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Frame, MemoryChannel};
    use crate::config::CHUNK_SIZE;

    fn descriptor(total_size: u64) -> TransferDescriptor {
        TransferDescriptor {
            transfer_id: "t-1".to_string(),
            name: "payload.bin".to_string(),
            total_size,
            mime_type: "application/octet-stream".to_string(),
            inline: false,
        }
    }

    /// 受信側を並行で排出しながら送信し、届いたフレームを返す
    async fn send_and_collect(payload: Vec<u8>) -> Vec<Frame> {
        let (local, remote) = MemoryChannel::pair();
        let local = Arc::new(local);

        let drain = tokio::spawn(async move {
            let mut frames = Vec::new();
            while let Some(frame) = remote.recv().await {
                frames.push(frame);
            }
            frames
        });

        let mut sender = TransferSender::new(local.clone(), TransferConfig::default());
        sender
            .send_bytes(&descriptor(payload.len() as u64), &payload)
            .await
            .unwrap();
        local.close();

        drain.await.unwrap()
    }

    #[tokio::test]
    async fn test_chunks_never_exceed_chunk_size() {
        // テスト項目: 全てのバイナリフレームが 16 KiB 以下である
        // given (前提条件):
        let payload = vec![0x5Au8; CHUNK_SIZE * 3 + 777];

        // when (操作):
        let frames = send_and_collect(payload).await;

        // then (期待する結果):
        for frame in &frames {
            if let Frame::Binary(chunk) = frame {
                assert!(chunk.len() <= CHUNK_SIZE);
            }
        }
        // 端数が最後のチャンクになる
        let binary_sizes: Vec<usize> = frames
            .iter()
            .filter_map(|f| match f {
                Frame::Binary(c) => Some(c.len()),
                _ => None,
            })
            .collect();
        assert_eq!(binary_sizes.last(), Some(&777));
    }

    #[tokio::test]
    async fn test_control_frames_bracket_the_chunks() {
        // テスト項目: file-info が先頭、file-end が末尾に送られる
        // given (前提条件):
        let payload = vec![1u8; 100];

        // when (操作):
        let frames = send_and_collect(payload).await;

        // then (期待する結果):
        match frames.first() {
            Some(Frame::Text(text)) => assert!(text.contains(r#""type":"file-info""#)),
            other => panic!("expected file-info first, got {:?}", other),
        }
        match frames.last() {
            Some(Frame::Text(text)) => assert!(text.contains(r#""type":"file-end""#)),
            other => panic!("expected file-end last, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_payload_sends_no_chunks() {
        // テスト項目: 空ペイロードで file-info と file-end のみが送られる
        // given (前提条件):
        let payload = Vec::new();

        // when (操作):
        let frames = send_and_collect(payload).await;

        // then (期待する結果):
        assert_eq!(frames.len(), 2);
        assert!(matches!(&frames[0], Frame::Text(_)));
        assert!(matches!(&frames[1], Frame::Text(_)));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_exact() {
        // テスト項目: 進捗が単調非減少で、最後にちょうど総量に達する
        // given (前提条件):
        let payload = vec![9u8; CHUNK_SIZE * 2 + 10];
        let total = payload.len() as u64;
        let (local, remote) = MemoryChannel::pair();
        let local = Arc::new(local);
        let drain = tokio::spawn(async move { while remote.recv().await.is_some() {} });
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        // when (操作):
        let mut sender =
            TransferSender::new(local.clone(), TransferConfig::default()).with_events(events_tx);
        sender
            .send_bytes(&descriptor(total), &payload)
            .await
            .unwrap();
        local.close();
        drain.await.unwrap();

        // then (期待する結果):
        // sender はイベント送信端を保持しているため、排出前に drop する
        drop(sender);
        let mut last = 0u64;
        let mut completed = false;
        while let Some(event) = events_rx.recv().await {
            match event {
                TransferEvent::Progress {
                    transferred,
                    total: reported_total,
                    ..
                } => {
                    assert!(transferred >= last);
                    assert!(transferred <= total);
                    assert_eq!(reported_total, total);
                    // 100% に達するのは完了時のみ
                    assert!(!completed);
                    last = transferred;
                }
                TransferEvent::Completed { .. } => {
                    completed = true;
                }
                TransferEvent::Failed { reason, .. } => panic!("unexpected failure: {}", reason),
            }
        }
        assert!(completed);
        assert_eq!(last, total);
    }

    #[tokio::test]
    async fn test_inline_transfer_suppresses_progress() {
        // テスト項目: inline 転送では進捗イベントが出ない
        // given (前提条件):
        let payload = vec![3u8; CHUNK_SIZE + 5];
        let (local, remote) = MemoryChannel::pair();
        let local = Arc::new(local);
        let drain = tokio::spawn(async move { while remote.recv().await.is_some() {} });
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut inline_descriptor = descriptor(payload.len() as u64);
        inline_descriptor.inline = true;

        // when (操作):
        let mut sender =
            TransferSender::new(local.clone(), TransferConfig::default()).with_events(events_tx);
        sender
            .send_bytes(&inline_descriptor, &payload)
            .await
            .unwrap();
        local.close();
        drain.await.unwrap();

        // then (期待する結果): Completed のみ
        // sender はイベント送信端を保持しているため、排出前に drop する
        drop(sender);
        let mut events = Vec::new();
        while let Some(event) = events_rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![TransferEvent::Completed {
                transfer_id: "t-1".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_channel_failure_aborts_without_retry() {
        // テスト項目: チャンネル断で転送が中断し Failed イベントが出る
        // given (前提条件):
        let (local, remote) = MemoryChannel::pair();
        let local = Arc::new(local);
        drop(remote);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        // when (操作):
        let mut sender =
            TransferSender::new(local.clone(), TransferConfig::default()).with_events(events_tx);
        let result = sender.send_bytes(&descriptor(10), &[0u8; 10]).await;

        // then (期待する結果):
        assert!(matches!(result, Err(SendError::Channel(_))));
        let event = events_rx.recv().await.unwrap();
        assert!(matches!(event, TransferEvent::Failed { .. }));
    }
}
