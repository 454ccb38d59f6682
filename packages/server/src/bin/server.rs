//! Signaling broker binary.
//!
//! Assigns peer identities, pairs peers into two-party rooms, relays
//! call signaling and negotiation messages, and evicts unresponsive
//! connections.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kakehashi-server
//! cargo run --bin kakehashi-server -- --host 0.0.0.0 --port 3000
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use kakehashi_server::{
    infrastructure::{
        message_pusher::WebSocketMessagePusher, repository::InMemoryBrokerRepository,
    },
    ui::Server,
    usecase::{
        ChatMessageUseCase, CreateRoomUseCase, DisconnectPeerUseCase, InspectRoomsUseCase,
        JoinRoomUseCase, LeaveRoomUseCase, ProbeLivenessUseCase, RegisterPeerUseCase,
        RelaySignalUseCase,
    },
};
use kakehashi_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "kakehashi-server")]
#[command(about = "Signaling broker for two-party calls and transfers", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Liveness probe interval in seconds
    #[arg(long, default_value = "30")]
    probe_interval_secs: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. Repository
    // 2. MessagePusher
    // 3. UseCases
    // 4. Server

    // 1. Create Repository (in-memory registry for rooms and connections)
    let repository = Arc::new(InMemoryBrokerRepository::new());

    // 2. Create MessagePusher (WebSocket implementation)
    let message_pusher = Arc::new(WebSocketMessagePusher::new());

    // 3. Create UseCases
    let register_peer_usecase = Arc::new(RegisterPeerUseCase::new(
        repository.clone(),
        message_pusher.clone(),
    ));
    let create_room_usecase = Arc::new(CreateRoomUseCase::new(
        repository.clone(),
        message_pusher.clone(),
    ));
    let join_room_usecase = Arc::new(JoinRoomUseCase::new(
        repository.clone(),
        message_pusher.clone(),
    ));
    let leave_room_usecase = Arc::new(LeaveRoomUseCase::new(
        repository.clone(),
        message_pusher.clone(),
    ));
    let relay_signal_usecase = Arc::new(RelaySignalUseCase::new(
        repository.clone(),
        message_pusher.clone(),
    ));
    let chat_message_usecase = Arc::new(ChatMessageUseCase::new(
        repository.clone(),
        message_pusher.clone(),
    ));
    let disconnect_peer_usecase = Arc::new(DisconnectPeerUseCase::new(
        repository.clone(),
        message_pusher.clone(),
    ));
    let probe_liveness_usecase = Arc::new(ProbeLivenessUseCase::new(
        repository.clone(),
        message_pusher.clone(),
    ));
    let inspect_rooms_usecase = Arc::new(InspectRoomsUseCase::new(repository.clone()));

    // 4. Create and run the server
    let server = Server::new(
        register_peer_usecase,
        create_room_usecase,
        join_room_usecase,
        leave_room_usecase,
        relay_signal_usecase,
        chat_message_usecase,
        disconnect_peer_usecase,
        probe_liveness_usecase,
        inspect_rooms_usecase,
        message_pusher,
        Duration::from_secs(args.probe_interval_secs),
    );
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
