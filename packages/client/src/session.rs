//! Broker session management.
//!
//! One task owns the broker socket and all session state; operator input
//! (rustyline on a blocking thread), broker messages, and peer-channel
//! events are funneled into a single select loop, so no state needs
//! locking.

use std::path::{Path, PathBuf};

use futures_util::{SinkExt, StreamExt};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message};

use kakehashi_server::infrastructure::dto::websocket::{ClientMessage, MemberInfo, ServerMessage};

use crate::{
    domain::{CallState, Command, find_remote_member, parse_command, sanitize_file_name},
    error::ClientError,
    formatter::MessageFormatter,
    peer::{PeerLink, PeerLinkEvent, PeerStream, accept_peer, bind_peer_listener, dial_peer},
    ui::redisplay_prompt,
};

use kakehashi_transfer::TransferEvent;

type BrokerSink =
    futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

struct Session {
    write: BrokerSink,
    username: String,
    my_peer_id: Option<String>,
    room_code: Option<String>,
    remote: Option<MemberInfo>,
    call: CallState,
    link: Option<PeerLink>,
    download_dir: PathBuf,
    peer_host: String,
    peer_events_tx: mpsc::UnboundedSender<PeerLinkEvent>,
    incoming_peer_tx: mpsc::UnboundedSender<PeerStream>,
}

impl Session {
    async fn send_broker(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        let json = serde_json::to_string(msg)
            .map_err(|e| ClientError::ConnectionError(e.to_string()))?;
        self.write
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| ClientError::ConnectionError(e.to_string()))
    }

    fn print(&self, text: &str) {
        print!("{}", text);
        redisplay_prompt(&self.username);
    }

    fn attach_link(&mut self, stream: PeerStream) {
        self.teardown_link();
        self.link = Some(PeerLink::from_stream(stream, self.peer_events_tx.clone()));
        self.call = CallState::Active;
        self.print("\n*** Peer channel ready -- /send and /img are available\n");
    }

    fn teardown_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.shutdown();
        }
    }

    async fn on_server_message(&mut self, msg: ServerMessage) -> Result<(), ClientError> {
        match msg {
            ServerMessage::Welcome { peer_id } => {
                tracing::info!("Assigned peer id '{}'", peer_id);
                self.my_peer_id = Some(peer_id);
            }
            ServerMessage::RoomCreated { room_code, .. } => {
                self.room_code = Some(room_code.clone());
                self.remote = None;
                self.print(&format!(
                    "\n*** Room created: {} (share this code with your peer)\n",
                    room_code
                ));
            }
            ServerMessage::RoomJoined {
                room_code,
                peer_id,
                members,
            } => {
                let me = self.my_peer_id.clone().unwrap_or_else(|| peer_id.clone());
                self.room_code = Some(room_code.clone());
                self.remote = find_remote_member(&members, &me);
                self.print(&MessageFormatter::format_room_entered(
                    &room_code, &members, &me,
                ));
            }
            ServerMessage::PeerJoined { peer_id, username } => {
                self.print(&MessageFormatter::format_peer_joined(&username, &peer_id));
                self.remote = Some(MemberInfo { peer_id, username });
            }
            ServerMessage::PeerLeft { peer_id, username } => {
                self.print(&MessageFormatter::format_peer_left(&username, &peer_id));
                if self
                    .remote
                    .as_ref()
                    .is_some_and(|remote| remote.peer_id == peer_id)
                {
                    self.remote = None;
                }
                // Departure forces call termination
                self.teardown_link();
                self.call = CallState::Idle;
            }
            ServerMessage::CallRequest { from_peer_id } => {
                if self.remote.is_none() {
                    self.remote = Some(MemberInfo {
                        peer_id: from_peer_id.clone(),
                        username: "peer".to_string(),
                    });
                }
                self.call = CallState::Ringing;
                self.print(&MessageFormatter::format_incoming_call(&from_peer_id));
            }
            ServerMessage::CallAccepted { from_peer_id } => {
                self.print("\n*** Call accepted, opening peer channel...\n");
                self.open_peer_listener(&from_peer_id).await?;
            }
            ServerMessage::CallRejected { .. } => {
                self.call = CallState::Idle;
                self.print("\n*** Call rejected\n");
            }
            ServerMessage::HangUp { .. } => {
                self.teardown_link();
                self.call = CallState::Idle;
                self.print("\n*** Peer hung up\n");
            }
            ServerMessage::Offer {
                from_peer_id,
                offer,
            } => {
                self.on_offer(&from_peer_id, &offer).await?;
            }
            ServerMessage::Answer { .. } => {
                // The channel comes up when the accept task yields a stream
                tracing::debug!("Negotiation answer received");
            }
            ServerMessage::Candidate { .. } => {
                tracing::debug!("Ignoring negotiation candidate (direct peer channel)");
            }
            ServerMessage::ChatMessage {
                username,
                content,
                timestamp,
            } => {
                self.print(&MessageFormatter::format_chat_message(
                    &username, &content, timestamp,
                ));
            }
            ServerMessage::Error { message } => {
                self.print(&MessageFormatter::format_error(&message));
            }
        }
        Ok(())
    }

    /// Initiator side: listen for the peer and ship the address as the
    /// opaque offer payload.
    async fn open_peer_listener(&mut self, responder: &str) -> Result<(), ClientError> {
        match bind_peer_listener(&self.peer_host).await {
            Ok((listener, addr)) => {
                let incoming = self.incoming_peer_tx.clone();
                tokio::spawn(async move {
                    match accept_peer(listener).await {
                        Ok(stream) => {
                            let _ = incoming.send(stream);
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept peer connection: {}", e);
                        }
                    }
                });
                self.call = CallState::Connecting;
                self.send_broker(&ClientMessage::Offer {
                    target_peer_id: responder.to_string(),
                    offer: json!({ "transport": "ws", "addr": addr }),
                })
                .await
            }
            Err(e) => {
                self.call = CallState::Idle;
                self.print(&MessageFormatter::format_error(&e.to_string()));
                Ok(())
            }
        }
    }

    /// Responder side: dial the advertised address and confirm.
    async fn on_offer(
        &mut self,
        from_peer_id: &str,
        offer: &serde_json::Value,
    ) -> Result<(), ClientError> {
        let Some(addr) = offer.get("addr").and_then(serde_json::Value::as_str) else {
            tracing::warn!("Offer without a peer address, ignoring");
            return Ok(());
        };

        match dial_peer(addr).await {
            Ok(stream) => {
                self.send_broker(&ClientMessage::Answer {
                    target_peer_id: from_peer_id.to_string(),
                    answer: json!({ "ok": true }),
                })
                .await?;
                self.attach_link(stream);
            }
            Err(e) => {
                self.call = CallState::Idle;
                self.print(&MessageFormatter::format_error(&e.to_string()));
            }
        }
        Ok(())
    }

    /// Handle one operator command. Returns true on /quit.
    async fn on_command(&mut self, command: Command) -> Result<bool, ClientError> {
        match command {
            Command::Create => {
                self.send_broker(&ClientMessage::CreateRoom {
                    username: self.username.clone(),
                })
                .await?;
            }
            Command::Join(code) => {
                self.send_broker(&ClientMessage::JoinRoom {
                    room_code: code,
                    username: self.username.clone(),
                })
                .await?;
            }
            Command::Leave => {
                self.send_broker(&ClientMessage::LeaveRoom).await?;
                self.remote = None;
                self.teardown_link();
                self.call = CallState::Idle;
                match self.room_code.take() {
                    Some(code) => self.print(&format!("\n*** Left room {}\n", code)),
                    None => self.print("\n*** Left the room\n"),
                }
            }
            Command::Call => match &self.remote {
                Some(remote) => {
                    let target = remote.peer_id.clone();
                    self.call = CallState::Calling;
                    self.send_broker(&ClientMessage::CallRequest {
                        target_peer_id: target,
                    })
                    .await?;
                    self.print("\n*** Calling...\n");
                }
                None => self.print(&MessageFormatter::format_error("no peer in the room")),
            },
            Command::Accept => match (&self.remote, self.call) {
                (Some(remote), CallState::Ringing) => {
                    let target = remote.peer_id.clone();
                    self.call = CallState::Connecting;
                    self.send_broker(&ClientMessage::CallAccepted {
                        target_peer_id: target,
                    })
                    .await?;
                    self.print("\n*** Call accepted, waiting for the peer channel...\n");
                }
                _ => self.print(&MessageFormatter::format_error("no incoming call")),
            },
            Command::Reject => match (&self.remote, self.call) {
                (Some(remote), CallState::Ringing) => {
                    let target = remote.peer_id.clone();
                    self.call = CallState::Idle;
                    self.send_broker(&ClientMessage::CallRejected {
                        target_peer_id: target,
                    })
                    .await?;
                }
                _ => self.print(&MessageFormatter::format_error("no incoming call")),
            },
            Command::HangUp => {
                if let Some(remote) = &self.remote {
                    let target = remote.peer_id.clone();
                    self.send_broker(&ClientMessage::HangUp {
                        target_peer_id: target,
                    })
                    .await?;
                }
                self.teardown_link();
                self.call = CallState::Idle;
                self.print("\n*** Call ended\n");
            }
            Command::SendFile(path) => self.send_file(path, false).await,
            Command::SendImage(path) => self.send_file(path, true).await,
            Command::Chat(content) => {
                self.send_broker(&ClientMessage::ChatMessage {
                    content: content.clone(),
                })
                .await?;
            }
            Command::Quit => return Ok(true),
            Command::Unknown(line) => {
                tracing::debug!("Unknown command: {}", line);
                self.print(&MessageFormatter::format_help());
            }
        }
        Ok(false)
    }

    async fn send_file(&mut self, path: PathBuf, inline: bool) {
        let Some(link) = &self.link else {
            self.print(&MessageFormatter::format_error(
                "peer channel not ready, start a call first",
            ));
            return;
        };
        if let Err(e) = link
            .send_file(path, inline, self.peer_events_tx.clone())
            .await
        {
            self.print(&MessageFormatter::format_error(&e.to_string()));
        }
    }

    async fn on_peer_event(&mut self, event: PeerLinkEvent) {
        match event {
            PeerLinkEvent::Transfer(TransferEvent::Progress {
                transfer_id,
                transferred,
                total,
            }) => {
                self.print(&MessageFormatter::format_transfer_progress(
                    &transfer_id,
                    transferred,
                    total,
                ));
            }
            PeerLinkEvent::Transfer(TransferEvent::Completed { transfer_id }) => {
                self.print(&format!("\n[transfer] {} complete\n", transfer_id));
            }
            PeerLinkEvent::Transfer(TransferEvent::Failed {
                transfer_id,
                reason,
            }) => {
                self.print(&MessageFormatter::format_error(&format!(
                    "transfer {} failed: {}",
                    transfer_id, reason
                )));
            }
            PeerLinkEvent::Received(completed) => {
                if completed.descriptor.inline {
                    self.print(&format!(
                        "\n[image] {} ({} bytes, {})\n",
                        completed.descriptor.name,
                        completed.payload.len(),
                        completed.descriptor.mime_type
                    ));
                    return;
                }
                let name = sanitize_file_name(&completed.descriptor.name);
                let path = self.download_dir.join(name);
                match tokio::fs::write(&path, &completed.payload).await {
                    Ok(()) => self.print(&format!(
                        "\n[transfer] received {} -> {}\n",
                        completed.descriptor.name,
                        path.display()
                    )),
                    Err(e) => self.print(&MessageFormatter::format_error(&format!(
                        "failed to save '{}': {}",
                        path.display(),
                        e
                    ))),
                }
            }
            PeerLinkEvent::Closed => {
                self.teardown_link();
                if self.call != CallState::Idle {
                    self.call = CallState::Idle;
                    self.print("\n*** Peer channel closed\n");
                }
            }
        }
    }
}

/// Run one broker session until /quit or connection loss.
pub async fn run_client_session(
    url: &str,
    username: &str,
    download_dir: &Path,
    peer_host: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ws_stream, _response) = connect_async(url)
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;

    tracing::info!("Connected to signaling broker");
    println!(
        "\nConnected as '{}'. Type /create or /join CODE to get started, /quit to exit.\n",
        username
    );

    let (write, mut read) = ws_stream.split();

    let (peer_events_tx, mut peer_events_rx) = mpsc::unbounded_channel();
    let (incoming_peer_tx, mut incoming_peer_rx) = mpsc::unbounded_channel();

    let mut session = Session {
        write,
        username: username.to_string(),
        my_peer_id: None,
        room_code: None,
        remote: None,
        call: CallState::Idle,
        link: None,
        download_dir: download_dir.to_path_buf(),
        peer_host: peer_host.to_string(),
        peer_events_tx,
        incoming_peer_tx,
    };

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let prompt_name = username.to_string();
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = format!("{}> ", prompt_name);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            message = read.next() => {
                let msg = match message {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket read error: {}", e);
                        return Err(Box::new(ClientError::ConnectionError(e.to_string())));
                    }
                    None => {
                        return Err(Box::new(ClientError::ConnectionError(
                            "Connection lost".to_string(),
                        )));
                    }
                };
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ServerMessage>(text.as_str()) {
                        Ok(server_msg) => session.on_server_message(server_msg).await?,
                        Err(e) => {
                            tracing::warn!("Dropping unrecognized broker message: {}", e);
                        }
                    },
                    Message::Close(_) => {
                        tracing::info!("Broker closed the connection");
                        return Err(Box::new(ClientError::ConnectionError(
                            "Connection closed by broker".to_string(),
                        )));
                    }
                    _ => {}
                }
            }
            line = input_rx.recv() => {
                let Some(line) = line else {
                    // Readline thread ended (Ctrl+C / Ctrl+D)
                    break;
                };
                if let Some(command) = parse_command(&line)
                    && session.on_command(command).await?
                {
                    break;
                }
            }
            event = peer_events_rx.recv() => {
                if let Some(event) = event {
                    session.on_peer_event(event).await;
                }
            }
            stream = incoming_peer_rx.recv() => {
                if let Some(stream) = stream {
                    session.attach_link(stream);
                }
            }
        }
    }

    session.teardown_link();
    Ok(())
}
