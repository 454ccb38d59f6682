//! ドメイン層のエラー定義

use thiserror::Error;

/// Room エンティティの不変条件違反
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// 定員（2 名）を超える参加
    #[error("room is full")]
    Full,
}

/// Repository 操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("peer '{0}' not found")]
    PeerNotFound(String),
    #[error("room '{0}' not found")]
    RoomNotFound(String),
    #[error("room '{0}' is full")]
    RoomFull(String),
    #[error("room code '{0}' is already taken")]
    RoomCodeTaken(String),
}

/// MessagePusher 操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("client '{0}' not found")]
    ClientNotFound(String),
    #[error("failed to push message: {0}")]
    PushFailed(String),
}
