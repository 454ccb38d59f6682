//! UseCase: ルーム参加処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinRoomUseCase::execute() メソッド
//! - join-or-create 則と定員制限、参加通知のブロードキャスト対象
//!
//! ### なぜこのテストが必要か
//! - ビジネスロジックの検証：未知のコードへの参加がルームを作成する
//! - 満室のルームへの参加が RoomFull として拒否されることを保証
//! - 参加者リストがクライアント UI 初期化に足る形で返ることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：既存ルームへの 2 人目の参加
//! - 異常系：満室のルームへの参加
//! - エッジケース：未知のコードへの参加（暗黙の作成）

use std::sync::Arc;

use kakehashi_shared::time::get_unix_timestamp;

use crate::domain::{
    BrokerRepository, Departure, MessagePusher, PeerId, RepositoryError, RoomCode, RoomMember,
    Timestamp, Username,
};

use super::error::JoinRoomError;

/// ルーム参加の結果
#[derive(Debug, Clone)]
pub struct JoinedRoom {
    pub room_code: RoomCode,
    /// 参加後の全メンバー（参加者自身を含む）
    pub members: Vec<RoomMember>,
    /// 参加者が直前まで参加していたルームからの退出情報
    pub previous_departure: Option<Departure>,
}

/// ルーム参加の拒否
///
/// 参加前に前のルームからの退出は済んでいるため、拒否時も退出通知の
/// 情報を持ち帰る。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRoomRejection {
    pub error: JoinRoomError,
    pub previous_departure: Option<Departure>,
}

/// ルーム参加のユースケース
pub struct JoinRoomUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn BrokerRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
}

impl JoinRoomUseCase {
    pub fn new(
        repository: Arc<dyn BrokerRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
        }
    }

    /// ルーム参加を実行
    ///
    /// # Arguments
    ///
    /// * `joiner` - 参加者の peer id（Domain Model）
    /// * `code` - 正規化済みのルームコード（Domain Model）
    /// * `username` - 参加者の表示名（Domain Model）
    ///
    /// # Returns
    ///
    /// * `Ok(JoinedRoom)` - 参加後のメンバーリスト
    /// * `Err(JoinRoomRejection)` - 定員超過（前ルームからの退出情報つき）
    pub async fn execute(
        &self,
        joiner: &PeerId,
        code: RoomCode,
        username: Username,
    ) -> Result<JoinedRoom, JoinRoomRejection> {
        // 既にルームに参加していれば先に退出させ、レジストリの整合を保つ
        let previous_departure = self.repository.leave_room(joiner).await;

        let now = Timestamp::new(get_unix_timestamp());
        match self
            .repository
            .join_room(code.clone(), joiner.clone(), username, now)
            .await
        {
            Ok(members) => Ok(JoinedRoom {
                room_code: code,
                members,
                previous_departure,
            }),
            Err(e) => {
                let error = match e {
                    RepositoryError::RoomFull(code) => JoinRoomError::RoomFull(code),
                    other => {
                        // join-or-create のため RoomFull 以外は起こらない
                        tracing::error!("Unexpected repository error on join_room: {}", other);
                        JoinRoomError::RoomFull(code.as_str().to_string())
                    }
                };
                Err(JoinRoomRejection {
                    error,
                    previous_departure,
                })
            }
        }
    }

    /// 参加通知を既存メンバーへブロードキャスト
    ///
    /// # Arguments
    ///
    /// * `joined` - 参加結果
    /// * `joiner` - 参加者の peer id（通知から除外する）
    /// * `message` - ブロードキャストするメッセージ（JSON）
    pub async fn broadcast_peer_joined(
        &self,
        joined: &JoinedRoom,
        joiner: &PeerId,
        message: &str,
    ) -> Result<(), String> {
        let targets: Vec<PeerId> = joined
            .members
            .iter()
            .map(|m| m.peer_id.clone())
            .filter(|id| id != joiner)
            .collect();

        self.message_pusher
            .broadcast(targets, message)
            .await
            .map_err(|e| e.to_string())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Peer;
    use crate::infrastructure::{
        message_pusher::WebSocketMessagePusher, repository::InMemoryBrokerRepository,
    };

    fn peer_id(id: &str) -> PeerId {
        PeerId::new(id.to_string()).unwrap()
    }

    fn username(name: &str) -> Username {
        Username::new(name.to_string()).unwrap()
    }

    fn room_code(code: &str) -> RoomCode {
        RoomCode::new(code.to_string()).unwrap()
    }

    async fn setup() -> (Arc<InMemoryBrokerRepository>, JoinRoomUseCase) {
        let repository = Arc::new(InMemoryBrokerRepository::new());
        let message_pusher = Arc::new(WebSocketMessagePusher::new());
        let usecase = JoinRoomUseCase::new(repository.clone(), message_pusher);
        (repository, usecase)
    }

    async fn register(repository: &InMemoryBrokerRepository, id: &str) {
        repository
            .register_peer(Peer::new(peer_id(id), Timestamp::new(1000)))
            .await;
    }

    #[tokio::test]
    async fn test_join_existing_room_returns_full_member_list() {
        // テスト項目: 2 人目の参加で両メンバーのリストが返る
        // given (前提条件):
        let (repository, usecase) = setup().await;
        register(&repository, "p1").await;
        register(&repository, "p2").await;
        repository
            .create_room(
                room_code("AB12CD"),
                peer_id("p1"),
                username("Alice"),
                Timestamp::new(1000),
            )
            .await
            .unwrap();

        // when (操作):
        let joined = usecase
            .execute(&peer_id("p2"), room_code("AB12CD"), username("Bob"))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(joined.room_code, room_code("AB12CD"));
        assert_eq!(joined.members.len(), 2);
        let names: Vec<&str> = joined.members.iter().map(|m| m.username.as_str()).collect();
        assert!(names.contains(&"Alice"));
        assert!(names.contains(&"Bob"));
    }

    #[tokio::test]
    async fn test_join_unknown_code_creates_room() {
        // テスト項目: 存在しないコードへの参加が成功しルームが作られる
        // given (前提条件):
        let (repository, usecase) = setup().await;
        register(&repository, "p1").await;

        // when (操作):
        let joined = usecase
            .execute(&peer_id("p1"), room_code("GHOST9"), username("alice"))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(joined.members.len(), 1);
        assert_eq!(
            repository.room_of(&peer_id("p1")).await,
            Some(room_code("GHOST9"))
        );
    }

    #[tokio::test]
    async fn test_join_full_room_is_rejected() {
        // テスト項目: 満室のルームへの参加が RoomFull になり、メンバーに追加されない
        // given (前提条件):
        let (repository, usecase) = setup().await;
        register(&repository, "p1").await;
        register(&repository, "p2").await;
        register(&repository, "p3").await;
        usecase
            .execute(&peer_id("p1"), room_code("AB12CD"), username("alice"))
            .await
            .unwrap();
        usecase
            .execute(&peer_id("p2"), room_code("AB12CD"), username("bob"))
            .await
            .unwrap();

        // when (操作):
        let result = usecase
            .execute(&peer_id("p3"), room_code("AB12CD"), username("carol"))
            .await;

        // then (期待する結果):
        let rejection = result.unwrap_err();
        assert_eq!(
            rejection.error,
            JoinRoomError::RoomFull("AB12CD".to_string())
        );
        assert_eq!(rejection.previous_departure, None);
        assert_eq!(repository.members_of(&room_code("AB12CD")).await.len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_join_still_reports_previous_departure() {
        // テスト項目: 満室で拒否されても前ルームからの退出情報が返る
        // given (前提条件):
        let (repository, usecase) = setup().await;
        register(&repository, "p1").await;
        register(&repository, "p2").await;
        register(&repository, "p3").await;
        register(&repository, "p4").await;
        usecase
            .execute(&peer_id("p1"), room_code("AB12CD"), username("alice"))
            .await
            .unwrap();
        usecase
            .execute(&peer_id("p2"), room_code("AB12CD"), username("bob"))
            .await
            .unwrap();
        // p3 と p4 は別のルームにいる
        usecase
            .execute(&peer_id("p3"), room_code("OTHER1"), username("carol"))
            .await
            .unwrap();
        usecase
            .execute(&peer_id("p4"), room_code("OTHER1"), username("dave"))
            .await
            .unwrap();

        // when (操作): carol が満室のルームへ移ろうとする
        let result = usecase
            .execute(&peer_id("p3"), room_code("AB12CD"), username("carol"))
            .await;

        // then (期待する結果): 拒否されるが、OTHER1 からの退出は起きている
        let rejection = result.unwrap_err();
        let departure = rejection.previous_departure.unwrap();
        assert_eq!(departure.room_code, room_code("OTHER1"));
        assert_eq!(departure.remaining, vec![peer_id("p4")]);
        assert_eq!(repository.room_of(&peer_id("p3")).await, None);
    }

    #[tokio::test]
    async fn test_room_code_is_case_insensitive() {
        // テスト項目: 小文字で入力されたコードが同じルームに解決される
        // given (前提条件):
        let (repository, usecase) = setup().await;
        register(&repository, "p1").await;
        register(&repository, "p2").await;
        usecase
            .execute(&peer_id("p1"), room_code("AB12CD"), username("alice"))
            .await
            .unwrap();

        // when (操作):
        let joined = usecase
            .execute(
                &peer_id("p2"),
                RoomCode::new("ab12cd".to_string()).unwrap(),
                username("bob"),
            )
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(joined.members.len(), 2);
        assert_eq!(repository.list_rooms().await.len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_targets_exclude_joiner() {
        // テスト項目: 参加通知のブロードキャスト対象に参加者自身が含まれない
        // given (前提条件):
        let (repository, usecase) = setup().await;
        register(&repository, "p1").await;
        register(&repository, "p2").await;
        usecase
            .execute(&peer_id("p1"), room_code("AB12CD"), username("alice"))
            .await
            .unwrap();
        let joined = usecase
            .execute(&peer_id("p2"), room_code("AB12CD"), username("bob"))
            .await
            .unwrap();

        // when (操作):
        let result = usecase
            .broadcast_peer_joined(&joined, &peer_id("p2"), r#"{"type":"peer-joined"}"#)
            .await;

        // then (期待する結果): 送信先が存在しなくてもブロードキャストは成功扱い
        assert!(result.is_ok());
    }
}
