//! HTTP API レスポンスの DTO

use serde::Serialize;

/// ルーム一覧の要素
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummaryDto {
    pub room_code: String,
    pub members: Vec<String>,
    pub created_at: String,
}

/// ルーム詳細
#[derive(Debug, Clone, Serialize)]
pub struct RoomDetailDto {
    pub room_code: String,
    pub members: Vec<MemberDetailDto>,
    pub call_state: String,
    pub created_at: String,
}

/// ルーム詳細のメンバー情報
#[derive(Debug, Clone, Serialize)]
pub struct MemberDetailDto {
    pub peer_id: String,
    pub username: String,
}
