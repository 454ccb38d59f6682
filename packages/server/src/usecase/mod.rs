//! UseCase 層
//!
//! ドメイン層の trait（Repository / MessagePusher）にのみ依存し、
//! ブローカーの各操作を調停します。

pub mod chat_message;
pub mod create_room;
pub mod disconnect_peer;
pub mod error;
pub mod inspect_rooms;
pub mod join_room;
pub mod leave_room;
pub mod probe_liveness;
pub mod register_peer;
pub mod relay_signal;

pub use chat_message::{ChatContext, ChatMessageUseCase};
pub use create_room::{CreateRoomUseCase, CreatedRoom};
pub use disconnect_peer::DisconnectPeerUseCase;
pub use error::{
    ChatMessageError, CreateRoomError, InspectRoomsError, JoinRoomError, RelayError,
};
pub use inspect_rooms::InspectRoomsUseCase;
pub use join_room::{JoinRoomRejection, JoinRoomUseCase, JoinedRoom};
pub use leave_room::LeaveRoomUseCase;
pub use probe_liveness::{LivenessSweep, ProbeLivenessUseCase};
pub use register_peer::RegisterPeerUseCase;
pub use relay_signal::{RelayOutcome, RelaySignalUseCase};
