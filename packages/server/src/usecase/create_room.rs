//! UseCase: ルーム作成処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - CreateRoomUseCase::execute() メソッド
//! - ルームコードの払い出しとオーナーの登録
//!
//! ### なぜこのテストが必要か
//! - ビジネスロジックの検証：作成者が唯一のメンバーとして登録される
//! - 既存ルームに参加中の作成者が前のルームから退出することを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：新規ルームの作成
//! - エッジケース：別ルーム参加中の再作成（前ルームからの退出通知）

use std::sync::Arc;

use kakehashi_shared::time::get_unix_timestamp;

use crate::domain::{
    BrokerRepository, Departure, MessagePusher, PeerId, RepositoryError, RoomCode,
    RoomCodeFactory, Timestamp, Username,
};

use super::error::CreateRoomError;

/// ルームコード割り当ての最大試行回数
const MAX_CODE_ATTEMPTS: usize = 4;

/// ルーム作成の結果
#[derive(Debug, Clone)]
pub struct CreatedRoom {
    pub room_code: RoomCode,
    /// 作成者が直前まで参加していたルームからの退出情報
    /// （残留メンバーへの peer-left 通知に使う）
    pub previous_departure: Option<Departure>,
}

/// ルーム作成のユースケース
pub struct CreateRoomUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn BrokerRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
}

impl CreateRoomUseCase {
    pub fn new(
        repository: Arc<dyn BrokerRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
        }
    }

    /// ルーム作成を実行
    ///
    /// # Arguments
    ///
    /// * `owner` - 作成者の peer id（Domain Model）
    /// * `username` - 作成者の表示名（Domain Model）
    ///
    /// # Returns
    ///
    /// * `Ok(CreatedRoom)` - 払い出されたルームコードと前ルームからの退出情報
    /// * `Err(CreateRoomError)` - コード割り当て失敗
    pub async fn execute(
        &self,
        owner: &PeerId,
        username: Username,
    ) -> Result<CreatedRoom, CreateRoomError> {
        // 既にルームに参加していれば先に退出させ、レジストリの整合を保つ
        let previous_departure = self.repository.leave_room(owner).await;

        let created_at = Timestamp::new(get_unix_timestamp());
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = RoomCodeFactory::generate();
            match self
                .repository
                .create_room(code.clone(), owner.clone(), username.clone(), created_at)
                .await
            {
                Ok(()) => {
                    return Ok(CreatedRoom {
                        room_code: code,
                        previous_departure,
                    });
                }
                Err(RepositoryError::RoomCodeTaken(taken)) => {
                    tracing::warn!("Room code '{}' collided, regenerating", taken);
                }
                Err(e) => {
                    tracing::error!("Unexpected repository error on create_room: {}", e);
                    return Err(CreateRoomError::CodeAllocation);
                }
            }
        }
        Err(CreateRoomError::CodeAllocation)
    }

    /// 前ルームの残留メンバーへ退出通知をブロードキャスト
    pub async fn broadcast_previous_departure(
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
