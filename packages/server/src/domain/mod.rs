//! ドメイン層
//!
//! エンティティ、Value Object、通話状態機械、および Infrastructure 層が
//! 実装すべき trait（Repository / MessagePusher）を定義します。

pub mod call;
pub mod entity;
pub mod error;
pub mod message_pusher;
pub mod repository;
pub mod value_object;

pub use call::{CallEvent, CallSession, CallState, CallTransition};
pub use entity::{Peer, Room, RoomMember};
pub use error::{MessagePushError, RepositoryError, RoomError};
pub use message_pusher::{MessagePusher, OutboundFrame, PusherChannel};
pub use repository::{BrokerRepository, Departure};
pub use value_object::{
    PeerId, PeerIdFactory, RoomCode, RoomCodeFactory, Timestamp, Username, ValidationError,
};
