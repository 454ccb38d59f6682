//! Server execution logic.

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::domain::MessagePusher;
use crate::usecase::{
    ChatMessageUseCase, CreateRoomUseCase, DisconnectPeerUseCase, InspectRoomsUseCase,
    JoinRoomUseCase, LeaveRoomUseCase, ProbeLivenessUseCase, RegisterPeerUseCase,
    RelaySignalUseCase,
};

use super::{
    handler::http::{debug_rooms, get_room_detail, get_rooms, health_check},
    handler::websocket::websocket_handler,
    liveness::spawn_liveness_monitor,
    signal::shutdown_signal,
    state::AppState,
};

/// Signaling broker server
///
/// Encapsulates the usecases and runs the axum router together with the
/// liveness monitor task.
pub struct Server {
    register_peer_usecase: Arc<RegisterPeerUseCase>,
    create_room_usecase: Arc<CreateRoomUseCase>,
    join_room_usecase: Arc<JoinRoomUseCase>,
    leave_room_usecase: Arc<LeaveRoomUseCase>,
    relay_signal_usecase: Arc<RelaySignalUseCase>,
    chat_message_usecase: Arc<ChatMessageUseCase>,
    disconnect_peer_usecase: Arc<DisconnectPeerUseCase>,
    probe_liveness_usecase: Arc<ProbeLivenessUseCase>,
    inspect_rooms_usecase: Arc<InspectRoomsUseCase>,
    message_pusher: Arc<dyn MessagePusher>,
    probe_interval: Duration,
}

impl Server {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        register_peer_usecase: Arc<RegisterPeerUseCase>,
        create_room_usecase: Arc<CreateRoomUseCase>,
        join_room_usecase: Arc<JoinRoomUseCase>,
        leave_room_usecase: Arc<LeaveRoomUseCase>,
        relay_signal_usecase: Arc<RelaySignalUseCase>,
        chat_message_usecase: Arc<ChatMessageUseCase>,
        disconnect_peer_usecase: Arc<DisconnectPeerUseCase>,
        probe_liveness_usecase: Arc<ProbeLivenessUseCase>,
        inspect_rooms_usecase: Arc<InspectRoomsUseCase>,
        message_pusher: Arc<dyn MessagePusher>,
        probe_interval: Duration,
    ) -> Self {
        Self {
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
            probe_interval,
        }
    }

    /// Run the signaling broker
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address
    /// or if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let app_state = Arc::new(AppState {
            register_peer_usecase: self.register_peer_usecase,
            create_room_usecase: self.create_room_usecase,
            join_room_usecase: self.join_room_usecase,
            leave_room_usecase: self.leave_room_usecase,
            relay_signal_usecase: self.relay_signal_usecase,
            chat_message_usecase: self.chat_message_usecase,
            disconnect_peer_usecase: self.disconnect_peer_usecase,
            probe_liveness_usecase: self.probe_liveness_usecase.clone(),
            inspect_rooms_usecase: self.inspect_rooms_usecase,
            message_pusher: self.message_pusher,
        });

        // Define handlers
        let app = Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/debug/rooms", get(debug_rooms))
            .route("/api/health", get(health_check))
            .route("/api/rooms", get(get_rooms))
            .route("/api/rooms/{room_code}", get(get_room_detail))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state);

        // Bind the server to the host and port
        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        // Periodic liveness sweep (30s by default)
        let liveness_task =
            spawn_liveness_monitor(self.probe_liveness_usecase, self.probe_interval);

        tracing::info!(
            "Signaling broker listening on {}",
            listener.local_addr()?
        );
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        // Set up graceful shutdown signal handler
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        liveness_task.abort();
        result?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
