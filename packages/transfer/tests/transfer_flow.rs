//! End-to-end tests for the chunked transfer protocol over an in-process
//! channel pair.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use kakehashi_transfer::{
    CompletedTransfer, Frame, MemoryChannel, PeerChannel, TransferConfig, TransferDescriptor,
    TransferReceiver, TransferSender,
};

fn descriptor(id: &str, total_size: u64) -> TransferDescriptor {
    TransferDescriptor {
        transfer_id: id.to_string(),
        name: format!("{}.bin", id),
        total_size,
        mime_type: "application/octet-stream".to_string(),
        inline: false,
    }
}

/// 位置依存のパターンで埋めたペイロードを作る（並び替え事故を検出できる）
fn patterned_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// 受信側タスク: フレームを TransferReceiver に流し、完了した転送を返す
fn spawn_receiver(
    remote: MemoryChannel,
    drain_delay: Duration,
) -> tokio::task::JoinHandle<Option<CompletedTransfer>> {
    tokio::spawn(async move {
        let mut receiver = TransferReceiver::new();
        let mut completed = None;
        while let Some(frame) = remote.recv().await {
            if !drain_delay.is_zero() {
                tokio::time::sleep(drain_delay).await;
            }
            match frame {
                Frame::Text(text) => {
                    if let Ok(Some(done)) = receiver.on_text(&text) {
                        completed = Some(done);
                    }
                }
                Frame::Binary(chunk) => receiver.on_binary(&chunk),
            }
        }
        completed
    })
}

#[tokio::test]
async fn round_trip_reconstructs_payload_byte_for_byte() {
    // テスト項目: 任意サイズのペイロードがバイト単位で完全に復元される
    // given (前提条件):
    for size in [0usize, 1, 16 * 1024, 16 * 1024 + 1, 100_000] {
        let payload = patterned_payload(size);
        let (local, remote) = MemoryChannel::pair();
        let local = Arc::new(local);
        let receiver_task = spawn_receiver(remote, Duration::ZERO);

        // when (操作):
        let mut sender = TransferSender::new(local.clone(), TransferConfig::default());
        sender
            .send_bytes(&descriptor("rt", size as u64), &payload)
            .await
            .unwrap();
        local.close();
        let completed = receiver_task.await.unwrap();

        // then (期待する結果):
        let completed = completed.unwrap_or_else(|| panic!("transfer of {} bytes not finalized", size));
        assert_eq!(completed.payload, payload, "size {} mismatch", size);
        assert_eq!(completed.descriptor.total_size, size as u64);
    }
}

#[tokio::test]
async fn one_mebibyte_transfer_never_exceeds_buffer_threshold() {
    // テスト項目: 1 MiB 転送でバッファ滞留が常に 64 KiB 以下に保たれる
    // given (前提条件): ゆっくり排出する受信側と、滞留量を監視するサンプラ
    let payload = patterned_payload(1024 * 1024);
    let config = TransferConfig {
        backpressure_delay: Duration::from_millis(2),
        ..TransferConfig::default()
    };
    let threshold = config.buffer_threshold;

    let (local, remote) = MemoryChannel::pair();
    let local = Arc::new(local);
    let receiver_task = spawn_receiver(remote, Duration::from_micros(200));

    let stop = Arc::new(AtomicBool::new(false));
    let peak = Arc::new(AtomicUsize::new(0));
    let sampler = {
        let channel = local.clone();
        let stop = stop.clone();
        let peak = peak.clone();
        tokio::spawn(async move {
            while !stop.load(Ordering::SeqCst) {
                let buffered = channel.buffered_amount().await;
                peak.fetch_max(buffered, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_micros(50)).await;
            }
        })
    };

    // when (操作):
    let mut sender = TransferSender::new(local.clone(), config);
    sender
        .send_bytes(&descriptor("big", payload.len() as u64), &payload)
        .await
        .unwrap();
    stop.store(true, Ordering::SeqCst);
    sampler.await.unwrap();
    local.close();
    let completed = receiver_task.await.unwrap().unwrap();

    // then (期待する結果):
    assert!(
        peak.load(Ordering::SeqCst) <= threshold,
        "outstanding bytes peaked at {} (threshold {})",
        peak.load(Ordering::SeqCst),
        threshold
    );
    assert_eq!(completed.payload, payload);
}

#[tokio::test]
async fn progress_events_flow_on_both_sides() {
    // テスト項目: 送信側・受信側の両方で進捗が単調に総量まで届く
    // given (前提条件):
    let payload = patterned_payload(200_000);
    let total = payload.len() as u64;
    let (local, remote) = MemoryChannel::pair();
    let local = Arc::new(local);

    let (recv_events_tx, mut recv_events_rx) = mpsc::unbounded_channel();
    let receiver_task = tokio::spawn(async move {
        let mut receiver = TransferReceiver::new().with_events(recv_events_tx);
        let mut completed = None;
        while let Some(frame) = remote.recv().await {
            match frame {
                Frame::Text(text) => {
                    if let Ok(Some(done)) = receiver.on_text(&text) {
                        completed = Some(done);
                    }
                }
                Frame::Binary(chunk) => receiver.on_binary(&chunk),
            }
        }
        completed
    });

    let (send_events_tx, mut send_events_rx) = mpsc::unbounded_channel();

    // when (操作):
    let mut sender =
        TransferSender::new(local.clone(), TransferConfig::default()).with_events(send_events_tx);
    sender
        .send_bytes(&descriptor("prog", total), &payload)
        .await
        .unwrap();
    local.close();
    receiver_task.await.unwrap().unwrap();

    // then (期待する結果):
    let mut last_sent = 0u64;
    while let Ok(event) = send_events_rx.try_recv() {
        if let kakehashi_transfer::TransferEvent::Progress { transferred, .. } = event {
            assert!(transferred >= last_sent);
            last_sent = transferred;
        }
    }
    assert_eq!(last_sent, total);

    let mut last_received = 0u64;
    while let Ok(event) = recv_events_rx.try_recv() {
        if let kakehashi_transfer::TransferEvent::Progress { transferred, .. } = event {
            assert!(transferred >= last_received);
            last_received = transferred;
        }
    }
    assert_eq!(last_received, total);
}

#[tokio::test]
async fn sequential_transfers_reuse_the_channel() {
    // テスト項目: 1 つのチャンネルで順番に複数の転送を完了できる
    // given (前提条件):
    let first = patterned_payload(40_000);
    let second = patterned_payload(70_000);
    let (local, remote) = MemoryChannel::pair();
    let local = Arc::new(local);

    let receiver_task = tokio::spawn(async move {
        let mut receiver = TransferReceiver::new();
        let mut completed = Vec::new();
        while let Some(frame) = remote.recv().await {
            match frame {
                Frame::Text(text) => {
                    if let Ok(Some(done)) = receiver.on_text(&text) {
                        completed.push(done);
                    }
                }
                Frame::Binary(chunk) => receiver.on_binary(&chunk),
            }
        }
        completed
    });

    // when (操作):
    let mut sender = TransferSender::new(local.clone(), TransferConfig::default());
    sender
        .send_bytes(&descriptor("t-1", first.len() as u64), &first)
        .await
        .unwrap();
    sender
        .send_bytes(&descriptor("t-2", second.len() as u64), &second)
        .await
        .unwrap();
    local.close();
    let completed = receiver_task.await.unwrap();

    // then (期待する結果):
    assert_eq!(completed.len(), 2);
    assert_eq!(completed[0].descriptor.transfer_id, "t-1");
    assert_eq!(completed[0].payload, first);
    assert_eq!(completed[1].descriptor.transfer_id, "t-2");
    assert_eq!(completed[1].payload, second);
}
