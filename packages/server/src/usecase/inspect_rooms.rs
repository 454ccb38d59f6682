//! UseCase: ルーム照会処理（HTTP API 用）

use std::sync::Arc;

use crate::domain::{BrokerRepository, Room, RoomCode, RoomMember};

use super::error::InspectRoomsError;

/// ルーム照会のユースケース
pub struct InspectRoomsUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn BrokerRepository>,
}

impl InspectRoomsUseCase {
    pub fn new(repository: Arc<dyn BrokerRepository>) -> Self {
        Self { repository }
    }

    /// 全ルームのスナップショットを取得
    pub async fn list_rooms(&self) -> Vec<Room> {
        self.repository.list_rooms().await
    }

    /// ルーム詳細（メンバーの表示名込み）を取得
    pub async fn room_detail(
        &self,
        code: &RoomCode,
    ) -> Result<(Room, Vec<RoomMember>), InspectRoomsError> {
        let rooms = self.repository.list_rooms().await;
        let room = rooms
            .into_iter()
            .find(|r| &r.code == code)
            .ok_or_else(|| InspectRoomsError::RoomNotFound(code.as_str().to_string()))?;
        let members = self.repository.members_of(code).await;
        Ok((room, members))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Peer, PeerId, Timestamp, Username};
    use crate::infrastructure::repository::InMemoryBrokerRepository;

    fn peer_id(id: &str) -> PeerId {
        PeerId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_room_detail_resolves_member_names() {
        // テスト項目: ルーム詳細がメンバーの表示名を含む
        // given (前提条件):
        let repository = Arc::new(InMemoryBrokerRepository::new());
        let usecase = InspectRoomsUseCase::new(repository.clone());
        let code = RoomCode::new("AB12CD".to_string()).unwrap();
        repository
            .register_peer(Peer::new(peer_id("p1"), Timestamp::new(1000)))
            .await;
        repository
            .create_room(
                code.clone(),
                peer_id("p1"),
                Username::new("alice".to_string()).unwrap(),
                Timestamp::new(1000),
            )
            .await
            .unwrap();

        // when (操作):
        let (room, members) = usecase.room_detail(&code).await.unwrap();

        // then (期待する結果):
        assert_eq!(room.code, code);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].username.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_unknown_room_detail_is_not_found() {
        // テスト項目: 未知のコードの詳細照会が RoomNotFound になる
        // given (前提条件):
        let repository = Arc::new(InMemoryBrokerRepository::new());
        let usecase = InspectRoomsUseCase::new(repository);
        let code = RoomCode::new("GHOST9".to_string()).unwrap();

        // when (操作):
        let result = usecase.room_detail(&code).await;

        // then (期待する結果):
        assert!(matches!(result, Err(InspectRoomsError::RoomNotFound(_))));
    }
}
