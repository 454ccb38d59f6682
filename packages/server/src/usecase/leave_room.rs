//! UseCase: ルーム退出処理
//!
//! 明示的な leave-room メッセージの処理。接続は維持されるため、
//! ピアは退出後も新しいルームを作成・参加できる。

use std::sync::Arc;

use crate::domain::{BrokerRepository, Departure, MessagePusher, PeerId};

/// ルーム退出のユースケース
pub struct LeaveRoomUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn BrokerRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
}

impl LeaveRoomUseCase {
    pub fn new(
        repository: Arc<dyn BrokerRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
        }
    }

    /// ルーム退出を実行
    ///
    /// # Returns
    ///
    /// * `Some(Departure)` - 退出情報（残留メンバーへの通知に使う）
    /// * `None` - ピアがルームに参加していなかった（no-op）
    pub async fn execute(&self, peer_id: &PeerId) -> Option<Departure> {
        self.repository.leave_room(peer_id).await
    }

    /// 残留メンバーへ退出通知をブロードキャスト
    pub async fn broadcast_peer_left(
        &self,
        departure: &Departure,
        message: &str,
    ) -> Result<(), String> {
        self.message_pusher
            .broadcast(departure.remaining.clone(), message)
            .await
            .map_err(|e| e.to_string())
    }
}
