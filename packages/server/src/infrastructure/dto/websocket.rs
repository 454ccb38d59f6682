//! WebSocket 制御メッセージの DTO
//!
//! インバウンド（`ClientMessage`）とアウトバウンド（`ServerMessage`）を
//! 閉じたタグ付き enum としてモデル化します。未知の `type` はデシリアライズ
//! に失敗し、ハンドラでログの上、破棄されます（暗黙の default 分岐なし）。
//!
//! offer / answer / candidate のペイロードはブローカーにとって不透明な
//! JSON 値であり、構造の検証は行いません。

use serde::{Deserialize, Serialize};

/// クライアント → ブローカーの制御メッセージ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    CreateRoom {
        username: String,
    },
    JoinRoom {
        room_code: String,
        username: String,
    },
    LeaveRoom,
    CallRequest {
        target_peer_id: String,
    },
    CallAccepted {
        target_peer_id: String,
    },
    CallRejected {
        target_peer_id: String,
    },
    HangUp {
        target_peer_id: String,
    },
    Offer {
        target_peer_id: String,
        offer: serde_json::Value,
    },
    Answer {
        target_peer_id: String,
        answer: serde_json::Value,
    },
    Candidate {
        target_peer_id: String,
        candidate: serde_json::Value,
    },
    ChatMessage {
        content: String,
    },
}

/// ルームメンバー情報（room-joined で返すリストの要素）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub peer_id: String,
    pub username: String,
}

/// ブローカー → クライアントの制御メッセージ
///
/// 転送系メッセージの `from_peer_id` はブローカーが送信元の接続識別子から
/// スタンプする。クライアントの申告は使わない（なりすまし防止）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Welcome {
        peer_id: String,
    },
    RoomCreated {
        room_code: String,
        peer_id: String,
    },
    RoomJoined {
        room_code: String,
        peer_id: String,
        members: Vec<MemberInfo>,
    },
    PeerJoined {
        peer_id: String,
        username: String,
    },
    PeerLeft {
        peer_id: String,
        username: String,
    },
    CallRequest {
        from_peer_id: String,
    },
    CallAccepted {
        from_peer_id: String,
    },
    CallRejected {
        from_peer_id: String,
    },
    HangUp {
        from_peer_id: String,
    },
    Offer {
        from_peer_id: String,
        offer: serde_json::Value,
    },
    Answer {
        from_peer_id: String,
        answer: serde_json::Value,
    },
    Candidate {
        from_peer_id: String,
        candidate: serde_json::Value,
    },
    ChatMessage {
        username: String,
        content: String,
        timestamp: i64,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// JSON 文字列にシリアライズする
    ///
    /// DTO は常にシリアライズ可能なのでエラーは発生しない。
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize ServerMessage: {}", e);
            r#"{"type":"error","message":"internal serialization error"}"#.to_string()
        })
    }
}
