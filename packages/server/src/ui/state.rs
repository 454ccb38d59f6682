//! Server state shared across handlers.

use std::sync::Arc;

use crate::domain::MessagePusher;
use crate::usecase::{
    ChatMessageUseCase, CreateRoomUseCase, DisconnectPeerUseCase, InspectRoomsUseCase,
    JoinRoomUseCase, LeaveRoomUseCase, ProbeLivenessUseCase, RegisterPeerUseCase,
    RelaySignalUseCase,
};

/// Shared application state
pub struct AppState {
    pub register_peer_usecase: Arc<RegisterPeerUseCase>,
    pub create_room_usecase: Arc<CreateRoomUseCase>,
    pub join_room_usecase: Arc<JoinRoomUseCase>,
    pub leave_room_usecase: Arc<LeaveRoomUseCase>,
    pub relay_signal_usecase: Arc<RelaySignalUseCase>,
    pub chat_message_usecase: Arc<ChatMessageUseCase>,
    pub disconnect_peer_usecase: Arc<DisconnectPeerUseCase>,
    pub probe_liveness_usecase: Arc<ProbeLivenessUseCase>,
    pub inspect_rooms_usecase: Arc<InspectRoomsUseCase>,
    /// 自接続宛ての応答（room-created / room-joined / error）の送信に使う
    pub message_pusher: Arc<dyn MessagePusher>,
}
