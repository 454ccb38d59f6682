//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - WebSocket の `UnboundedSender` を管理
//! - クライアントへのフレーム送信（push_to, broadcast, ping, close）
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`src/ui/handler/websocket.rs`）で行われます。
//! この実装は生成された sender を受け取り、フレーム送信に使用します。
//! ルーティングの決定（unicast の宛先解決やブロードキャスト対象選定）は
//! UseCase 層の仕事で、この層は配送だけを行います。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{MessagePushError, MessagePusher, OutboundFrame, PeerId, PusherChannel};

/// WebSocket を使った MessagePusher 実装
pub struct WebSocketMessagePusher {
    /// 接続中のクライアントの送信チャンネル
    ///
    /// Key: peer_id (String)
    /// Value: PusherChannel
    clients: Mutex<HashMap<String, PusherChannel>>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn send_frame(
        &self,
        peer_id: &PeerId,
        frame: OutboundFrame,
    ) -> Result<(), MessagePushError> {
        let clients = self.clients.lock().await;
        let sender = clients
            .get(peer_id.as_str())
            .ok_or_else(|| MessagePushError::ClientNotFound(peer_id.as_str().to_string()))?;
        sender
            .send(frame)
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))
    }
}

impl Default for WebSocketMessagePusher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_client(&self, peer_id: PeerId, sender: PusherChannel) {
        let mut clients = self.clients.lock().await;
        clients.insert(peer_id.as_str().to_string(), sender);
        tracing::debug!("Client '{}' registered to MessagePusher", peer_id.as_str());
    }

    async fn unregister_client(&self, peer_id: &PeerId) {
        let mut clients = self.clients.lock().await;
        clients.remove(peer_id.as_str());
        tracing::debug!(
            "Client '{}' unregistered from MessagePusher",
            peer_id.as_str()
        );
    }

    async fn push_to(&self, peer_id: &PeerId, content: &str) -> Result<(), MessagePushError> {
        self.send_frame(peer_id, OutboundFrame::Text(content.to_string()))
            .await?;
        tracing::debug!("Pushed message to client '{}'", peer_id.as_str());
        Ok(())
    }

    async fn broadcast(
        &self,
        targets: Vec<PeerId>,
        content: &str,
    ) -> Result<(), MessagePushError> {
        let clients = self.clients.lock().await;

        for target in targets {
            if let Some(sender) = clients.get(target.as_str()) {
                // ブロードキャストでは一部の送信失敗を許容
                if let Err(e) = sender.send(OutboundFrame::Text(content.to_string())) {
                    tracing::warn!(
                        "Failed to push message to client '{}': {}",
                        target.as_str(),
                        e
                    );
                } else {
                    tracing::debug!("Broadcasted message to client '{}'", target.as_str());
                }
            } else {
                tracing::warn!(
                    "Client '{}' not found during broadcast, skipping",
                    target.as_str()
                );
            }
        }

        Ok(())
    }

    async fn ping(&self, peer_id: &PeerId) -> Result<(), MessagePushError> {
        self.send_frame(peer_id, OutboundFrame::Ping).await
    }

    async fn close(&self, peer_id: &PeerId) -> Result<(), MessagePushError> {
        self.send_frame(peer_id, OutboundFrame::Close).await
    }
}
