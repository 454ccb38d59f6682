//! UseCase 層のエラー定義

use thiserror::Error;

/// ルーム作成のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateRoomError {
    /// 衝突しないルームコードを割り当てられなかった
    ///
    /// 36^6 の空間で連続衝突する確率は実用上無視できるが、
    /// 念のため試行回数に上限を設けている。
    #[error("failed to allocate a unique room code")]
    CodeAllocation,
}

/// ルーム参加のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinRoomError {
    /// 定員（2 名）に達したルームへの参加
    #[error("room '{0}' is full")]
    RoomFull(String),
}

/// シグナリング転送のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// 送信者がどのルームにも参加していない
    #[error("peer '{0}' is not in a room")]
    NotInRoom(String),
}

/// チャット送信のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatMessageError {
    /// 送信者がどのルームにも参加していない
    #[error("peer '{0}' is not in a room")]
    NotInRoom(String),
    /// 送信者の接続レコードが見つからない
    #[error("peer '{0}' not found")]
    PeerNotFound(String),
}

/// ルーム照会のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InspectRoomsError {
    #[error("room '{0}' not found")]
    RoomNotFound(String),
}
