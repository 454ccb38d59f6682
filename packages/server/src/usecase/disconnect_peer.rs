//! UseCase: ピア切断処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectPeerUseCase::execute() メソッド
//! - 切断時のルーム退出連鎖と接続レコードの破棄
//!
//! ### なぜこのテストが必要か
//! - ビジネスロジックの検証：切断がルーム退出を連鎖させる
//! - 残留メンバーへの通知対象が正しく返ることを保証
//! - WebSocket クローズ・liveness 追放のどちらの経路でも同じ後始末に
//!   なることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：ルーム参加中のピアの切断
//! - エッジケース：ルーム未参加のピアの切断（退出通知なし）

use std::sync::Arc;

use crate::domain::{BrokerRepository, Departure, MessagePusher, PeerId};

/// ピア切断のユースケース
pub struct DisconnectPeerUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn BrokerRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
}

impl DisconnectPeerUseCase {
    pub fn new(
        repository: Arc<dyn BrokerRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
        }
    }

    /// ピア切断を実行
    ///
    /// ルーム退出（残留メンバーの把握）→ 接続レコード削除 →
    /// 送信チャンネル登録解除の順に後始末する。
    ///
    /// # Returns
    ///
    /// * `Some(Departure)` - 退出通知に必要な情報
    /// * `None` - ピアがルームに参加していなかった
    pub async fn execute(&self, peer_id: &PeerId) -> Option<Departure> {
        let departure = self.repository.leave_room(peer_id).await;
        self.repository.remove_peer(peer_id).await;
        self.message_pusher.unregister_client(peer_id).await;
        departure
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
