//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use kakehashi_shared::time::get_unix_timestamp;

use crate::{
    domain::{CallEvent, OutboundFrame, PeerId, RoomCode, Username},
    infrastructure::dto::websocket::{ClientMessage, MemberInfo, ServerMessage},
    usecase::JoinRoomError,
    ui::state::AppState,
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that receives frames from the rx channel and pushes them to the WebSocket sender.
///
/// This function handles the outbound flow: control messages and liveness
/// frames queued by the usecases are written to this client's WebSocket
/// connection. A `Close` frame is written and then the loop stops, which
/// drives the connection into the normal disconnect path.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<OutboundFrame>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let outcome = match frame {
                OutboundFrame::Text(text) => sender.send(Message::Text(text.into())).await,
                OutboundFrame::Ping => sender.send(Message::Ping(Vec::new().into())).await,
                OutboundFrame::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if outcome.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Register the connection and assign a fresh peer id
    let (tx, rx) = mpsc::unbounded_channel();
    let peer_id = state.register_peer_usecase.execute(tx).await;

    // Send welcome with the assigned peer id
    {
        let welcome = ServerMessage::Welcome {
            peer_id: peer_id.as_str().to_string(),
        }
        .to_json();
        if let Err(e) = sender.send(Message::Text(welcome.into())).await {
            tracing::error!("Failed to send welcome to '{}': {}", peer_id.as_str(), e);
            state.disconnect_peer_usecase.execute(&peer_id).await;
            return;
        }
        tracing::info!("Peer '{}' connected and registered", peer_id.as_str());
    }

    let mut send_task = pusher_loop(rx, sender);

    let peer_id_clone = peer_id.clone();
    let state_clone = state.clone();

    // Receive messages from this client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        handle_client_message(&state_clone, &peer_id_clone, client_msg).await;
                    }
                    Err(e) => {
                        // Malformed control messages are logged and dropped;
                        // the connection stays open and no reply is sent
                        tracing::warn!(
                            "Dropping malformed control message from '{}': {}",
                            peer_id_clone.as_str(),
                            e
                        );
                    }
                },
                Message::Pong(_) => {
                    state_clone
                        .probe_liveness_usecase
                        .mark_alive(&peer_id_clone)
                        .await;
                }
                Message::Ping(_) => {
                    // Pong replies are handled automatically by the WebSocket layer
                    tracing::debug!("Received ping from '{}'", peer_id_clone.as_str());
                }
                Message::Close(_) => {
                    tracing::info!("Peer '{}' requested close", peer_id_clone.as_str());
                    break;
                }
                _ => {}
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    // Disconnect cleanup: leave the room, notify the remaining member,
    // drop the connection record
    if let Some(departure) = state.disconnect_peer_usecase.execute(&peer_id).await {
        let left_json = ServerMessage::PeerLeft {
            peer_id: peer_id.as_str().to_string(),
            username: departure.username.as_str().to_string(),
        }
        .to_json();
        if let Err(e) = state
            .disconnect_peer_usecase
            .broadcast_peer_left(&departure, &left_json)
            .await
        {
            tracing::warn!("Failed to broadcast peer-left: {}", e);
        }
    }
    tracing::info!(
        "Peer '{}' disconnected and removed from registry",
        peer_id.as_str()
    );
}

/// Dispatch one parsed control message to the matching usecase.
async fn handle_client_message(state: &Arc<AppState>, from: &PeerId, msg: ClientMessage) {
    match msg {
        ClientMessage::CreateRoom { username } => {
            handle_create_room(state, from, username).await;
        }
        ClientMessage::JoinRoom {
            room_code,
            username,
        } => {
            handle_join_room(state, from, room_code, username).await;
        }
        ClientMessage::LeaveRoom => {
            handle_leave_room(state, from).await;
        }
        ClientMessage::CallRequest { target_peer_id } => {
            let Some(target) = parse_target(from, &target_peer_id) else {
                return;
            };
            let event = CallEvent::Requested {
                initiator: from.clone(),
                target: target.clone(),
            };
            let out = ServerMessage::CallRequest {
                from_peer_id: from.as_str().to_string(),
            };
            relay(state, from, &target, Some(event), out).await;
        }
        ClientMessage::CallAccepted { target_peer_id } => {
            let Some(target) = parse_target(from, &target_peer_id) else {
                return;
            };
            let event = CallEvent::Accepted { by: from.clone() };
            let out = ServerMessage::CallAccepted {
                from_peer_id: from.as_str().to_string(),
            };
            relay(state, from, &target, Some(event), out).await;
        }
        ClientMessage::CallRejected { target_peer_id } => {
            let Some(target) = parse_target(from, &target_peer_id) else {
                return;
            };
            let event = CallEvent::Rejected { by: from.clone() };
            let out = ServerMessage::CallRejected {
                from_peer_id: from.as_str().to_string(),
            };
            relay(state, from, &target, Some(event), out).await;
        }
        ClientMessage::HangUp { target_peer_id } => {
            let Some(target) = parse_target(from, &target_peer_id) else {
                return;
            };
            let event = CallEvent::HungUp { by: from.clone() };
            let out = ServerMessage::HangUp {
                from_peer_id: from.as_str().to_string(),
            };
            relay(state, from, &target, Some(event), out).await;
        }
        ClientMessage::Offer {
            target_peer_id,
            offer,
        } => {
            let Some(target) = parse_target(from, &target_peer_id) else {
                return;
            };
            let out = ServerMessage::Offer {
                from_peer_id: from.as_str().to_string(),
                offer,
            };
            relay(state, from, &target, None, out).await;
        }
        ClientMessage::Answer {
            target_peer_id,
            answer,
        } => {
            let Some(target) = parse_target(from, &target_peer_id) else {
                return;
            };
            let out = ServerMessage::Answer {
                from_peer_id: from.as_str().to_string(),
                answer,
            };
            relay(state, from, &target, None, out).await;
        }
        ClientMessage::Candidate {
            target_peer_id,
            candidate,
        } => {
            let Some(target) = parse_target(from, &target_peer_id) else {
                return;
            };
            let out = ServerMessage::Candidate {
                from_peer_id: from.as_str().to_string(),
                candidate,
            };
            relay(state, from, &target, None, out).await;
        }
        ClientMessage::ChatMessage { content } => {
            handle_chat_message(state, from, content).await;
        }
    }
}

fn parse_target(from: &PeerId, target_peer_id: &str) -> Option<PeerId> {
    match PeerId::new(target_peer_id.to_string()) {
        Ok(target) => Some(target),
        Err(e) => {
            tracing::warn!(
                "Dropping signal from '{}' with invalid target: {}",
                from.as_str(),
                e
            );
            None
        }
    }
}

/// Relay a signaling message to one targeted peer, stamping the true sender.
///
/// Undeliverable signals are dropped silently (best-effort relay).
async fn relay(
    state: &Arc<AppState>,
    from: &PeerId,
    target: &PeerId,
    event: Option<CallEvent>,
    out: ServerMessage,
) {
    match state
        .relay_signal_usecase
        .execute(from, target, event, &out.to_json())
        .await
    {
        Ok(outcome) if !outcome.delivered => {
            tracing::debug!(
                "Signal from '{}' to '{}' was not delivered",
                from.as_str(),
                target.as_str()
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::debug!("Dropping signal from '{}': {}", from.as_str(), e);
        }
    }
}

async fn handle_create_room(state: &Arc<AppState>, from: &PeerId, username: String) {
    let username = match Username::new(username) {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!("Dropping create-room from '{}': {}", from.as_str(), e);
            return;
        }
    };

    match state.create_room_usecase.execute(from, username).await {
        Ok(created) => {
            if let Some(departure) = &created.previous_departure {
                let left_json = ServerMessage::PeerLeft {
                    peer_id: from.as_str().to_string(),
                    username: departure.username.as_str().to_string(),
                }
                .to_json();
                if let Err(e) = state
                    .create_room_usecase
                    .broadcast_previous_departure(departure, &left_json)
                    .await
                {
                    tracing::warn!("Failed to broadcast peer-left: {}", e);
                }
            }

            let created_json = ServerMessage::RoomCreated {
                room_code: created.room_code.as_str().to_string(),
                peer_id: from.as_str().to_string(),
            }
            .to_json();
            push_to_self(state, from, &created_json).await;
            tracing::info!(
                "Peer '{}' created room '{}'",
                from.as_str(),
                created.room_code.as_str()
            );
        }
        Err(e) => {
            tracing::error!("Failed to create room for '{}': {}", from.as_str(), e);
            push_to_self(
                state,
                from,
                &ServerMessage::Error {
                    message: "failed to create room".to_string(),
                }
                .to_json(),
            )
            .await;
        }
    }
}

async fn handle_join_room(
    state: &Arc<AppState>,
    from: &PeerId,
    room_code: String,
    username: String,
) {
    let code = match RoomCode::new(room_code) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Dropping join-room from '{}': {}", from.as_str(), e);
            return;
        }
    };
    let username = match Username::new(username) {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!("Dropping join-room from '{}': {}", from.as_str(), e);
            return;
        }
    };

    match state
        .join_room_usecase
        .execute(from, code, username.clone())
        .await
    {
        Ok(joined) => {
            if let Some(departure) = &joined.previous_departure {
                let left_json = ServerMessage::PeerLeft {
                    peer_id: from.as_str().to_string(),
                    username: departure.username.as_str().to_string(),
                }
                .to_json();
                if let Err(e) = state
                    .join_room_usecase
                    .broadcast_previous_departure(departure, &left_json)
                    .await
                {
                    tracing::warn!("Failed to broadcast peer-left: {}", e);
                }
            }

            let members: Vec<MemberInfo> = joined
                .members
                .iter()
                .map(|m| MemberInfo {
                    peer_id: m.peer_id.as_str().to_string(),
                    username: m.username.as_str().to_string(),
                })
                .collect();
            let joined_json = ServerMessage::RoomJoined {
                room_code: joined.room_code.as_str().to_string(),
                peer_id: from.as_str().to_string(),
                members,
            }
            .to_json();
            push_to_self(state, from, &joined_json).await;

            let peer_joined_json = ServerMessage::PeerJoined {
                peer_id: from.as_str().to_string(),
                username: username.as_str().to_string(),
            }
            .to_json();
            if let Err(e) = state
                .join_room_usecase
                .broadcast_peer_joined(&joined, from, &peer_joined_json)
                .await
            {
                tracing::warn!("Failed to broadcast peer-joined: {}", e);
            }
            tracing::info!(
                "Peer '{}' joined room '{}'",
                from.as_str(),
                joined.room_code.as_str()
            );
        }
        Err(rejection) => {
            if let Some(departure) = &rejection.previous_departure {
                let left_json = ServerMessage::PeerLeft {
                    peer_id: from.as_str().to_string(),
                    username: departure.username.as_str().to_string(),
                }
                .to_json();
                if let Err(e) = state
                    .join_room_usecase
                    .broadcast_previous_departure(departure, &left_json)
                    .await
                {
                    tracing::warn!("Failed to broadcast peer-left: {}", e);
                }
            }
            let JoinRoomError::RoomFull(code) = &rejection.error;
            tracing::info!("Peer '{}' rejected from full room '{}'", from.as_str(), code);
            push_to_self(
                state,
                from,
                &ServerMessage::Error {
                    message: "room full".to_string(),
                }
                .to_json(),
            )
            .await;
        }
    }
}

async fn handle_leave_room(state: &Arc<AppState>, from: &PeerId) {
    if let Some(departure) = state.leave_room_usecase.execute(from).await {
        let left_json = ServerMessage::PeerLeft {
            peer_id: from.as_str().to_string(),
            username: departure.username.as_str().to_string(),
        }
        .to_json();
        if let Err(e) = state
            .leave_room_usecase
            .broadcast_peer_left(&departure, &left_json)
            .await
        {
            tracing::warn!("Failed to broadcast peer-left: {}", e);
        }
        tracing::info!(
            "Peer '{}' left room '{}'",
            from.as_str(),
            departure.room_code.as_str()
        );
    }
}

async fn handle_chat_message(state: &Arc<AppState>, from: &PeerId, content: String) {
    match state.chat_message_usecase.execute(from).await {
        Ok(context) => {
            let chat_json = ServerMessage::ChatMessage {
                username: context.username.as_str().to_string(),
                content,
                timestamp: get_unix_timestamp(),
            }
            .to_json();
            if let Err(e) = state
                .chat_message_usecase
                .broadcast(context.targets, &chat_json)
                .await
            {
                tracing::warn!("Failed to broadcast chat message: {}", e);
            }
        }
        Err(e) => {
            tracing::debug!("Dropping chat message from '{}': {}", from.as_str(), e);
        }
    }
}

async fn push_to_self(state: &Arc<AppState>, peer_id: &PeerId, json: &str) {
    if let Err(e) = state.message_pusher.push_to(peer_id, json).await {
        tracing::warn!("Failed to push reply to '{}': {}", peer_id.as_str(), e);
    }
}
