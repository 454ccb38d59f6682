//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    domain::{CallState, Room, RoomCode},
    infrastructure::dto::http::{MemberDetailDto, RoomDetailDto, RoomSummaryDto},
    ui::state::AppState,
};
use kakehashi_shared::time::timestamp_to_rfc3339;

/// Debug endpoint to get the raw room state (for testing purposes)
pub async fn debug_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<Room>> {
    Json(state.inspect_rooms_usecase.list_rooms().await)
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of rooms
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    let rooms = state.inspect_rooms_usecase.list_rooms().await;

    // Domain Model から DTO への変換
    let room_summaries: Vec<RoomSummaryDto> = rooms
        .into_iter()
        .map(|room| RoomSummaryDto {
            room_code: room.code.as_str().to_string(),
            members: room
                .members
                .iter()
                .map(|id| id.as_str().to_string())
                .collect(),
            created_at: timestamp_to_rfc3339(room.created_at.value()),
        })
        .collect();

    Json(room_summaries)
}

/// Get room detail by code
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_code): Path<String>,
) -> Result<Json<RoomDetailDto>, StatusCode> {
    let code = RoomCode::new(room_code).map_err(|_| StatusCode::BAD_REQUEST)?;

    match state.inspect_rooms_usecase.room_detail(&code).await {
        Ok((room, members)) => {
            // Domain Model から DTO への変換
            let call_state = match room.call.state {
                CallState::Idle => "idle",
                CallState::Ringing => "ringing",
                CallState::Active => "active",
            };
            let room_detail = RoomDetailDto {
                room_code: room.code.as_str().to_string(),
                members: members
                    .into_iter()
                    .map(|m| MemberDetailDto {
                        peer_id: m.peer_id.into_string(),
                        username: m.username.into_string(),
                    })
                    .collect(),
                call_state: call_state.to_string(),
                created_at: timestamp_to_rfc3339(room.created_at.value()),
            };
            Ok(Json(room_detail))
        }
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}
