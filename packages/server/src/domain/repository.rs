//! Repository trait 定義
//!
//! ドメイン層が必要とするデータアクセスのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! 接続レジストリとルーム管理は削除時に連鎖する（切断はルーム退出を伴う）
//! ため、単一の trait として提供します。実装は全ての状態変更を直列化する
//! こと（単一ロックまたはアクター）。

use async_trait::async_trait;

use super::call::{CallEvent, CallTransition};
use super::entity::{Peer, Room, RoomMember};
use super::error::RepositoryError;
use super::value_object::{PeerId, RoomCode, Timestamp, Username};

/// ルーム退出の結果
///
/// 退出通知のブロードキャストに必要な情報一式。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_code: RoomCode,
    /// 退出したピアの表示名
    pub username: Username,
    /// 残留メンバー（通知対象）
    pub remaining: Vec<PeerId>,
    /// 空になったルームが削除されたか
    pub room_deleted: bool,
}

/// Broker Repository trait
///
/// UseCase 層はこの trait に依存し、Infrastructure 層の具体的な実装には
/// 依存しない。
#[async_trait]
pub trait BrokerRepository: Send + Sync {
    /// 接続を登録
    async fn register_peer(&self, peer: Peer);

    /// 接続を取得
    async fn lookup_peer(&self, peer_id: &PeerId) -> Result<Peer, RepositoryError>;

    /// 接続を削除（存在しなくてもエラーにしない）
    async fn remove_peer(&self, peer_id: &PeerId);

    /// ルームを新規作成し、owner を唯一のメンバーとして登録
    ///
    /// コードが既に使われていれば `RoomCodeTaken`。
    async fn create_room(
        &self,
        code: RoomCode,
        owner: PeerId,
        username: Username,
        created_at: Timestamp,
    ) -> Result<(), RepositoryError>;

    /// ルームに参加する（join-or-create）
    ///
    /// 未知のコードはルームを新規作成する。定員超過は `RoomFull`。
    /// 成功時は参加後の全メンバーリストを返す。
    async fn join_room(
        &self,
        code: RoomCode,
        joiner: PeerId,
        username: Username,
        now: Timestamp,
    ) -> Result<Vec<RoomMember>, RepositoryError>;

    /// ピアを所属ルームから退出させる
    ///
    /// ルーム未参加なら None。空になったルームは削除される。
    /// Ringing / Active の通話は強制終了される。
    async fn leave_room(&self, peer_id: &PeerId) -> Option<Departure>;

    /// ルームのメンバーリストを取得（未知のコードなら空）
    async fn members_of(&self, code: &RoomCode) -> Vec<RoomMember>;

    /// ピアの所属ルームを取得
    async fn room_of(&self, peer_id: &PeerId) -> Option<RoomCode>;

    /// 全ルームのスナップショットを取得（HTTP API 用）
    async fn list_rooms(&self) -> Vec<Room>;

    /// 接続中のピア数を取得
    async fn count_peers(&self) -> usize;

    /// liveness フラグを設定
    async fn set_alive(&self, peer_id: &PeerId, alive: bool);

    /// 全接続の liveness フラグのスナップショットを取得
    async fn liveness_snapshot(&self) -> Vec<(PeerId, bool)>;

    /// ルームの通話状態機械にイベントを適用
    async fn apply_call_event(
        &self,
        code: &RoomCode,
        event: CallEvent,
    ) -> Result<CallTransition, RepositoryError>;
}
