//! UseCase: シグナリング転送処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - RelaySignalUseCase::execute() メソッド
//! - 宛先指定の unicast 転送と通話状態機械の更新
//!
//! ### なぜこのテストが必要か
//! - ビジネスロジックの検証：宛先がルームメンバーのときだけ配送される
//! - 切断済みピア宛のシグナリングが静かに破棄されることを保証
//!   （ベストエフォート転送であり、配達保証ではない）
//! - 通話状態の遷移が転送の可否に影響しないことを確認（寛容な挙動）
//!
//! ### どのような状況を想定しているか
//! - 正常系：call-request から Active までの一連の転送
//! - 異常系：ルーム外のピア宛、ルーム未参加の送信者
//! - エッジケース：状態に合致しないイベントの転送

use std::sync::Arc;

use crate::domain::{
    BrokerRepository, CallEvent, CallTransition, MessagePusher, PeerId, RoomCode,
};

use super::error::RelayError;

/// 転送の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    /// 宛先に届いたか。届かなかった場合も再送・エラー通知は行わない
    pub delivered: bool,
    /// 通話状態機械の遷移（通話系イベントのみ）
    pub transition: Option<CallTransition>,
}

/// シグナリング転送のユースケース
pub struct RelaySignalUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn BrokerRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
}

impl RelaySignalUseCase {
    pub fn new(
        repository: Arc<dyn BrokerRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
        }
    }

    /// シグナリング転送を実行
    ///
    /// # Arguments
    ///
    /// * `from` - 送信者の peer id（接続識別子由来。申告値ではない）
    /// * `target` - 宛先の peer id
    /// * `call_event` - 通話系メッセージの場合の状態機械イベント
    /// * `json_message` - 転送する JSON（from_peer_id スタンプ済み）
    ///
    /// # Returns
    ///
    /// * `Ok(RelayOutcome)` - delivered=false は宛先不在（静かに破棄）
    /// * `Err(RelayError::NotInRoom)` - 送信者がルーム未参加
    pub async fn execute(
        &self,
        from: &PeerId,
        target: &PeerId,
        call_event: Option<CallEvent>,
        json_message: &str,
    ) -> Result<RelayOutcome, RelayError> {
        let room = self
            .repository
            .room_of(from)
            .await
            .ok_or_else(|| RelayError::NotInRoom(from.as_str().to_string()))?;

        let transition = match call_event {
            Some(event) => self.apply_call_event(&room, event).await,
            None => None,
        };

        // 宛先がルームメンバーである場合のみ配送する
        let members = self.repository.members_of(&room).await;
        let is_member = members.iter().any(|m| &m.peer_id == target);
        if !is_member {
            tracing::debug!(
                "Dropping signal from '{}' to non-member '{}' in room '{}'",
                from.as_str(),
                target.as_str(),
                room.as_str()
            );
            return Ok(RelayOutcome {
                delivered: false,
                transition,
            });
        }

        let delivered = match self.message_pusher.push_to(target, json_message).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(
                    "Failed to relay signal to '{}': {} (dropping)",
                    target.as_str(),
                    e
                );
                false
            }
        };

        Ok(RelayOutcome {
            delivered,
            transition,
        })
    }

    async fn apply_call_event(&self, room: &RoomCode, event: CallEvent) -> Option<CallTransition> {
        match self.repository.apply_call_event(room, event).await {
            Ok(transition) => {
                match transition {
                    CallTransition::Applied { from, to } => {
                        tracing::info!(
                            "Call state in room '{}': {:?} -> {:?}",
                            room.as_str(),
                            from,
                            to
                        );
                    }
                    CallTransition::Ignored { state } => {
                        // 状態に合致しないイベントも転送自体は行う（寛容な挙動）
                        tracing::debug!(
                            "Call event ignored in room '{}' (state: {:?})",
                            room.as_str(),
                            state
                        );
                    }
                }
                Some(transition)
            }
            Err(e) => {
                tracing::warn!("Failed to apply call event: {}", e);
                None
            }
        }
    }
}
