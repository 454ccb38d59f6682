//! ドメイン層のエンティティ定義
//!
//! Peer（接続）と Room（2 者ルーム）。Room の定員不変条件
//! `members.len() <= CAPACITY` はエンティティ自身が守ります。

use serde::Serialize;

use super::call::CallSession;
use super::error::RoomError;
use super::value_object::{PeerId, RoomCode, Timestamp, Username};

/// 接続中のピア
///
/// 接続時に生成され、切断または liveness 監視による追放で破棄される。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Peer {
    pub id: PeerId,
    pub username: Username,
    /// 参加中のルーム（未参加なら None）
    pub room: Option<RoomCode>,
    /// liveness フラグ。probe 応答で true に戻る
    pub alive: bool,
    pub connected_at: Timestamp,
}

impl Peer {
    pub fn new(id: PeerId, connected_at: Timestamp) -> Self {
        Self {
            id,
            username: Username::default(),
            room: None,
            alive: true,
            connected_at,
        }
    }
}

/// ルームメンバーのスナップショット（peer id と表示名のペア）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomMember {
    pub peer_id: PeerId,
    pub username: Username,
}

/// 2 者ルーム
#[derive(Debug, Clone, Serialize)]
pub struct Room {
    pub code: RoomCode,
    /// メンバーの peer id（参加順）
    pub members: Vec<PeerId>,
    pub created_at: Timestamp,
    /// ルームごとに高々 1 つの通話セッション
    pub call: CallSession,
}

impl Room {
    /// ルームの定員
    pub const CAPACITY: usize = 2;

    pub fn new(code: RoomCode, created_at: Timestamp) -> Self {
        Self {
            code,
            members: Vec::new(),
            created_at,
            call: CallSession::new(),
        }
    }

    /// メンバーを追加する。定員超過なら `RoomError::Full`
    pub fn add_member(&mut self, peer_id: PeerId) -> Result<(), RoomError> {
        if self.members.len() >= Self::CAPACITY {
            return Err(RoomError::Full);
        }
        self.members.push(peer_id);
        Ok(())
    }

    /// メンバーを取り除く。取り除けたら true
    pub fn remove_member(&mut self, peer_id: &PeerId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != peer_id);
        self.members.len() != before
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.members.contains(peer_id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer_id(id: &str) -> PeerId {
        PeerId::new(id.to_string()).unwrap()
    }

    fn test_room() -> Room {
        Room::new(
            RoomCode::new("ABC123".to_string()).unwrap(),
            Timestamp::new(1000),
        )
    }

    #[test]
    fn test_room_accepts_up_to_two_members() {
        // テスト項目: 定員 2 名までメンバーを追加できる
        // given (前提条件):
        let mut room = test_room();

        // when (操作):
        let first = room.add_member(peer_id("p1"));
        let second = room.add_member(peer_id("p2"));

        // then (期待する結果):
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(room.members.len(), 2);
    }

    #[test]
    fn test_room_rejects_third_member() {
        // テスト項目: 3 人目の追加が RoomError::Full になる
        // given (前提条件):
        let mut room = test_room();
        room.add_member(peer_id("p1")).unwrap();
        room.add_member(peer_id("p2")).unwrap();

        // when (操作):
        let result = room.add_member(peer_id("p3"));

        // then (期待する結果):
        assert_eq!(result, Err(RoomError::Full));
        assert_eq!(room.members.len(), 2);
    }

    #[test]
    fn test_remove_member_returns_true_for_member() {
        // テスト項目: 在室メンバーの削除が true を返す
        // given (前提条件):
        let mut room = test_room();
        room.add_member(peer_id("p1")).unwrap();

        // when (操作):
        let removed = room.remove_member(&peer_id("p1"));

        // then (期待する結果):
        assert!(removed);
        assert!(room.is_empty());
    }

    #[test]
    fn test_remove_member_is_noop_for_stranger() {
        // テスト項目: 非メンバーの削除は何もせず false を返す（冪等性）
        // given (前提条件):
        let mut room = test_room();
        room.add_member(peer_id("p1")).unwrap();

        // when (操作):
        let removed = room.remove_member(&peer_id("p9"));

        // then (期待する結果):
        assert!(!removed);
        assert_eq!(room.members.len(), 1);
    }

    #[test]
    fn test_new_peer_is_alive_without_room() {
        // テスト項目: 新規ピアは alive で、ルーム未参加である
        // given (前提条件):

        // when (操作):
        let peer = Peer::new(peer_id("p1"), Timestamp::new(42));

        // then (期待する結果):
        assert!(peer.alive);
        assert_eq!(peer.room, None);
        assert_eq!(peer.username.as_str(), Username::DEFAULT);
    }
}
