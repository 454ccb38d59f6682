//! InMemory Broker Repository 実装
//!
//! ドメイン層が定義する BrokerRepository trait の具体的な実装。
//! 接続マップとルームマップを単一の Mutex で保護します。全ての状態変更が
//! このロックの下で直列化されるため、ハンドラタスクが並行しても
//! レジストリから見た逐次実行の保証が保たれます。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    BrokerRepository, CallEvent, CallTransition, Departure, Peer, PeerId, RepositoryError, Room,
    RoomCode, RoomError, RoomMember, Timestamp, Username,
};

#[derive(Default)]
struct BrokerState {
    /// peer_id -> Peer
    peers: HashMap<String, Peer>,
    /// room_code -> Room
    rooms: HashMap<String, Room>,
}

impl BrokerState {
    /// ルームのメンバーリストを peer レコードと突き合わせて組み立てる
    fn collect_members(&self, room: &Room) -> Vec<RoomMember> {
        room.members
            .iter()
            .filter_map(|id| self.peers.get(id.as_str()))
            .map(|peer| RoomMember {
                peer_id: peer.id.clone(),
                username: peer.username.clone(),
            })
            .collect()
    }
}

/// インメモリ Broker Repository 実装
pub struct InMemoryBrokerRepository {
    state: Mutex<BrokerState>,
}

impl InMemoryBrokerRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BrokerState::default()),
        }
    }
}

impl Default for InMemoryBrokerRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerRepository for InMemoryBrokerRepository {
    async fn register_peer(&self, peer: Peer) {
        let mut state = self.state.lock().await;
        state.peers.insert(peer.id.as_str().to_string(), peer);
    }

    async fn lookup_peer(&self, peer_id: &PeerId) -> Result<Peer, RepositoryError> {
        let state = self.state.lock().await;
        state
            .peers
            .get(peer_id.as_str())
            .cloned()
            .ok_or_else(|| RepositoryError::PeerNotFound(peer_id.as_str().to_string()))
    }

    async fn remove_peer(&self, peer_id: &PeerId) {
        let mut state = self.state.lock().await;
        state.peers.remove(peer_id.as_str());
    }

    async fn create_room(
        &self,
        code: RoomCode,
        owner: PeerId,
        username: Username,
        created_at: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if state.rooms.contains_key(code.as_str()) {
            return Err(RepositoryError::RoomCodeTaken(code.as_str().to_string()));
        }

        let mut room = Room::new(code.clone(), created_at);
        room.add_member(owner.clone())
            .map_err(|_| RepositoryError::RoomFull(code.as_str().to_string()))?;
        state.rooms.insert(code.as_str().to_string(), room);

        if let Some(peer) = state.peers.get_mut(owner.as_str()) {
            peer.room = Some(code);
            peer.username = username;
        }
        Ok(())
    }

    async fn join_room(
        &self,
        code: RoomCode,
        joiner: PeerId,
        username: Username,
        now: Timestamp,
    ) -> Result<Vec<RoomMember>, RepositoryError> {
        let mut state = self.state.lock().await;

        // join-or-create: 未知のコードはルームを新規作成する
        let room = state
            .rooms
            .entry(code.as_str().to_string())
            .or_insert_with(|| Room::new(code.clone(), now));

        room.add_member(joiner.clone()).map_err(|e| match e {
            RoomError::Full => RepositoryError::RoomFull(code.as_str().to_string()),
        })?;

        if let Some(peer) = state.peers.get_mut(joiner.as_str()) {
            peer.room = Some(code.clone());
            peer.username = username;
        }

        let room = state
            .rooms
            .get(code.as_str())
            .ok_or_else(|| RepositoryError::RoomNotFound(code.as_str().to_string()))?;
        Ok(state.collect_members(room))
    }

    async fn leave_room(&self, peer_id: &PeerId) -> Option<Departure> {
        let mut state = self.state.lock().await;

        let (room_code, username) = {
            let peer = state.peers.get_mut(peer_id.as_str())?;
            let code = peer.room.take()?;
            (code, peer.username.clone())
        };

        let room = state.rooms.get_mut(room_code.as_str())?;
        room.remove_member(peer_id);

        // Ringing / Active の通話は退出で強制終了
        room.call.apply(CallEvent::MemberDeparted {
            peer: peer_id.clone(),
        });

        let remaining = room.members.clone();
        let room_deleted = room.is_empty();
        if room_deleted {
            state.rooms.remove(room_code.as_str());
        }

        Some(Departure {
            room_code,
            username,
            remaining,
            room_deleted,
        })
    }

    async fn members_of(&self, code: &RoomCode) -> Vec<RoomMember> {
        let state = self.state.lock().await;
        match state.rooms.get(code.as_str()) {
            Some(room) => state.collect_members(room),
            None => Vec::new(),
        }
    }

    async fn room_of(&self, peer_id: &PeerId) -> Option<RoomCode> {
        let state = self.state.lock().await;
        state.peers.get(peer_id.as_str())?.room.clone()
    }

    async fn list_rooms(&self) -> Vec<Room> {
        let state = self.state.lock().await;
        state.rooms.values().cloned().collect()
    }

    async fn count_peers(&self) -> usize {
        let state = self.state.lock().await;
        state.peers.len()
    }

    async fn set_alive(&self, peer_id: &PeerId, alive: bool) {
        let mut state = self.state.lock().await;
        if let Some(peer) = state.peers.get_mut(peer_id.as_str()) {
            peer.alive = alive;
        }
    }

    async fn liveness_snapshot(&self) -> Vec<(PeerId, bool)> {
        let state = self.state.lock().await;
        state
            .peers
            .values()
            .map(|peer| (peer.id.clone(), peer.alive))
            .collect()
    }

    async fn apply_call_event(
        &self,
        code: &RoomCode,
        event: CallEvent,
    ) -> Result<CallTransition, RepositoryError> {
        let mut state = self.state.lock().await;
        let room = state
            .rooms
            .get_mut(code.as_str())
            .ok_or_else(|| RepositoryError::RoomNotFound(code.as_str().to_string()))?;
        Ok(room.call.apply(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CallState;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - InMemoryBrokerRepository の接続・ルーム操作
    // - join-or-create、定員制限、空ルームの削除
    // - 退出時の通話強制終了と liveness フラグの管理
    //
    // 【なぜこのテストが必要か】
    // - Repository は UseCase から呼ばれるデータアクセス層の中核
    // - ルームの不変条件（定員 2 名）と GC を保証する必要がある
    //
    // 【どのようなシナリオをテストするか】
    // 1. join-or-create 則
    // 2. 定員超過の拒否
    // 3. 退出によるルーム削除と残留メンバー通知情報
    // 4. liveness フラグの設定とスナップショット
    // ========================================

    fn peer_id(id: &str) -> PeerId {
        PeerId::new(id.to_string()).unwrap()
    }

    fn username(name: &str) -> Username {
        Username::new(name.to_string()).unwrap()
    }

    fn room_code(code: &str) -> RoomCode {
        RoomCode::new(code.to_string()).unwrap()
    }

    async fn register(repo: &InMemoryBrokerRepository, id: &str) {
        repo.register_peer(Peer::new(peer_id(id), Timestamp::new(1000)))
            .await;
    }

    #[tokio::test]
    async fn test_join_unknown_room_creates_it() {
        // テスト項目: 未知のコードへの参加がルームを新規作成する（join-or-create 則）
        // given (前提条件):
        let repo = InMemoryBrokerRepository::new();
        register(&repo, "p1").await;

        // when (操作):
        let members = repo
            .join_room(
                room_code("NEWONE"),
                peer_id("p1"),
                username("alice"),
                Timestamp::new(2000),
            )
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].peer_id, peer_id("p1"));
        assert_eq!(repo.room_of(&peer_id("p1")).await, Some(room_code("NEWONE")));
    }

    #[tokio::test]
    async fn test_third_member_is_rejected_with_room_full() {
        // テスト項目: 2 名のルームへの 3 人目の参加が RoomFull になる
        // given (前提条件):
        let repo = InMemoryBrokerRepository::new();
        register(&repo, "p1").await;
        register(&repo, "p2").await;
        register(&repo, "p3").await;
        let code = room_code("AB12CD");
        repo.create_room(
            code.clone(),
            peer_id("p1"),
            username("alice"),
            Timestamp::new(1000),
        )
        .await
        .unwrap();
        repo.join_room(
            code.clone(),
            peer_id("p2"),
            username("bob"),
            Timestamp::new(1001),
        )
        .await
        .unwrap();

        // when (操作):
        let result = repo
            .join_room(
                code.clone(),
                peer_id("p3"),
                username("carol"),
                Timestamp::new(1002),
            )
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RepositoryError::RoomFull("AB12CD".to_string()))
        );
        assert_eq!(repo.members_of(&code).await.len(), 2);
        // 拒否されたピアはルームに関連付けられない
        assert_eq!(repo.room_of(&peer_id("p3")).await, None);
    }

    #[tokio::test]
    async fn test_membership_never_exceeds_two() {
        // テスト項目: どの参加列でもメンバー数が 2 を超えない
        // given (前提条件):
        let repo = InMemoryBrokerRepository::new();
        let code = room_code("CROWD1");
        for i in 0..10 {
            let id = format!("p{}", i);
            register(&repo, &id).await;

            // when (操作):
            let _ = repo
                .join_room(
                    code.clone(),
                    peer_id(&id),
                    username(&id),
                    Timestamp::new(1000 + i),
                )
                .await;

            // then (期待する結果):
            assert!(repo.members_of(&code).await.len() <= 2);
        }
        assert_eq!(repo.members_of(&code).await.len(), 2);
    }

    #[tokio::test]
    async fn test_create_room_rejects_taken_code() {
        // テスト項目: 使用中のコードでの create_room が RoomCodeTaken になる
        // given (前提条件):
        let repo = InMemoryBrokerRepository::new();
        register(&repo, "p1").await;
        register(&repo, "p2").await;
        let code = room_code("AB12CD");
        repo.create_room(
            code.clone(),
            peer_id("p1"),
            username("alice"),
            Timestamp::new(1000),
        )
        .await
        .unwrap();

        // when (操作):
        let result = repo
            .create_room(
                code.clone(),
                peer_id("p2"),
                username("bob"),
                Timestamp::new(1001),
            )
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RepositoryError::RoomCodeTaken("AB12CD".to_string()))
        );
    }

    #[tokio::test]
    async fn test_leave_room_deletes_empty_room() {
        // テスト項目: 最後のメンバーの退出でルームが削除される
        // given (前提条件):
        let repo = InMemoryBrokerRepository::new();
        register(&repo, "p1").await;
        let code = room_code("AB12CD");
        repo.create_room(
            code.clone(),
            peer_id("p1"),
            username("alice"),
            Timestamp::new(1000),
        )
        .await
        .unwrap();

        // when (操作):
        let departure = repo.leave_room(&peer_id("p1")).await.unwrap();

        // then (期待する結果):
        assert!(departure.room_deleted);
        assert!(departure.remaining.is_empty());
        assert!(repo.list_rooms().await.is_empty());
        // 再参加すると新しいルームが作られる（join-or-create）
        let members = repo
            .join_room(
                code.clone(),
                peer_id("p1"),
                username("alice"),
                Timestamp::new(2000),
            )
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
    }

    #[tokio::test]
    async fn test_leave_room_reports_remaining_member() {
        // テスト項目: 退出時に残留メンバーと表示名が返される
        // given (前提条件):
        let repo = InMemoryBrokerRepository::new();
        register(&repo, "p1").await;
        register(&repo, "p2").await;
        let code = room_code("AB12CD");
        repo.create_room(
            code.clone(),
            peer_id("p1"),
            username("alice"),
            Timestamp::new(1000),
        )
        .await
        .unwrap();
        repo.join_room(
            code.clone(),
            peer_id("p2"),
            username("bob"),
            Timestamp::new(1001),
        )
        .await
        .unwrap();

        // when (操作):
        let departure = repo.leave_room(&peer_id("p1")).await.unwrap();

        // then (期待する結果):
        assert_eq!(departure.room_code, code);
        assert_eq!(departure.username, username("alice"));
        assert_eq!(departure.remaining, vec![peer_id("p2")]);
        assert!(!departure.room_deleted);
    }

    #[tokio::test]
    async fn test_leave_room_without_room_is_noop() {
        // テスト項目: ルーム未参加のピアの退出が None を返す（no-op）
        // given (前提条件):
        let repo = InMemoryBrokerRepository::new();
        register(&repo, "p1").await;

        // when (操作):
        let departure = repo.leave_room(&peer_id("p1")).await;

        // then (期待する結果):
        assert_eq!(departure, None);
    }

    #[tokio::test]
    async fn test_departure_terminates_ringing_call() {
        // テスト項目: Ringing 中の退出で通話が Idle に戻る
        // given (前提条件):
        let repo = InMemoryBrokerRepository::new();
        register(&repo, "p1").await;
        register(&repo, "p2").await;
        let code = room_code("AB12CD");
        repo.create_room(
            code.clone(),
            peer_id("p1"),
            username("alice"),
            Timestamp::new(1000),
        )
        .await
        .unwrap();
        repo.join_room(
            code.clone(),
            peer_id("p2"),
            username("bob"),
            Timestamp::new(1001),
        )
        .await
        .unwrap();
        repo.apply_call_event(
            &code,
            CallEvent::Requested {
                initiator: peer_id("p1"),
                target: peer_id("p2"),
            },
        )
        .await
        .unwrap();

        // when (操作):
        repo.leave_room(&peer_id("p2")).await.unwrap();

        // then (期待する結果):
        let rooms = repo.list_rooms().await;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].call.state, CallState::Idle);
    }

    #[tokio::test]
    async fn test_liveness_flag_round_trip() {
        // テスト項目: liveness フラグの設定がスナップショットに反映される
        // given (前提条件):
        let repo = InMemoryBrokerRepository::new();
        register(&repo, "p1").await;
        register(&repo, "p2").await;

        // when (操作):
        repo.set_alive(&peer_id("p1"), false).await;
        let snapshot = repo.liveness_snapshot().await;

        // then (期待する結果):
        let mut flags: Vec<(String, bool)> = snapshot
            .into_iter()
            .map(|(id, alive)| (id.into_string(), alive))
            .collect();
        flags.sort();
        assert_eq!(
            flags,
            vec![("p1".to_string(), false), ("p2".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_lookup_unknown_peer_returns_not_found() {
        // テスト項目: 未登録の peer の検索が PeerNotFound になる
        // given (前提条件):
        let repo = InMemoryBrokerRepository::new();

        // when (操作):
        let result = repo.lookup_peer(&peer_id("ghost")).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RepositoryError::PeerNotFound("ghost".to_string()))
        );
    }
}
