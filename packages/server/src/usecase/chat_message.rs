//! UseCase: チャット送信処理
//!
//! ルーム内ブロードキャスト。表示名とタイムスタンプはサーバー側で
//! スタンプする（クライアント申告の表示名は使わない）。

use std::sync::Arc;

use crate::domain::{BrokerRepository, MessagePusher, PeerId, RepositoryError, Username};

use super::error::ChatMessageError;

/// チャット送信に必要なコンテキスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatContext {
    /// 送信者の表示名（レジストリから解決）
    pub username: Username,
    /// ブロードキャスト対象（送信者以外のルームメンバー）
    pub targets: Vec<PeerId>,
}

/// チャット送信のユースケース
pub struct ChatMessageUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn BrokerRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
}

impl ChatMessageUseCase {
    pub fn new(
        repository: Arc<dyn BrokerRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
        }
    }

    /// 送信コンテキスト（表示名とブロードキャスト対象）を解決
    pub async fn execute(&self, from: &PeerId) -> Result<ChatContext, ChatMessageError> {
        let peer = self.repository.lookup_peer(from).await.map_err(|e| match e {
            RepositoryError::PeerNotFound(id) => ChatMessageError::PeerNotFound(id),
            other => ChatMessageError::PeerNotFound(other.to_string()),
        })?;

        let room = peer
            .room
            .ok_or_else(|| ChatMessageError::NotInRoom(from.as_str().to_string()))?;

        let targets: Vec<PeerId> = self
            .repository
            .members_of(&room)
            .await
            .into_iter()
            .map(|m| m.peer_id)
            .filter(|id| id != from)
            .collect();

        Ok(ChatContext {
            username: peer.username,
            targets,
        })
    }

    /// チャットメッセージをブロードキャスト
    pub async fn broadcast(&self, targets: Vec<PeerId>, message: &str) -> Result<(), String> {
        self.message_pusher
            .broadcast(targets, message)
            .await
            .map_err(|e| e.to_string())
    }
}
