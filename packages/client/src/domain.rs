//! Domain logic for client-side operations.
//!
//! This module contains pure functions that implement business logic
//! without side effects, making them easy to test.

use std::path::PathBuf;

use kakehashi_server::infrastructure::dto::websocket::MemberInfo;

use crate::error::ClientError;

/// Client-side view of the call workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// No call
    Idle,
    /// We sent a call-request and wait for the answer
    Calling,
    /// An incoming call-request waits for /accept or /reject
    Ringing,
    /// Handshake done, peer channel being established
    Connecting,
    /// Peer channel is up
    Active,
}

/// One line of operator input, parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create,
    Join(String),
    Leave,
    Call,
    Accept,
    Reject,
    HangUp,
    SendFile(PathBuf),
    SendImage(PathBuf),
    Quit,
    Chat(String),
    Unknown(String),
}

/// Parse one input line into a command.
///
/// Lines starting with `/` are commands; everything else is chat.
/// Returns `None` for blank input.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Command::Chat(line.to_string()));
    }

    let mut parts = line.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or_default();
    let rest = parts.next().map(str::trim).unwrap_or_default();

    let command = match head {
        "/create" => Command::Create,
        "/join" if !rest.is_empty() => Command::Join(rest.to_string()),
        "/leave" => Command::Leave,
        "/call" => Command::Call,
        "/accept" => Command::Accept,
        "/reject" => Command::Reject,
        "/hangup" => Command::HangUp,
        "/send" if !rest.is_empty() => Command::SendFile(PathBuf::from(rest)),
        "/img" if !rest.is_empty() => Command::SendImage(PathBuf::from(rest)),
        "/quit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    };
    Some(command)
}

/// Pick the other member from a room-joined member list.
pub fn find_remote_member(members: &[MemberInfo], my_peer_id: &str) -> Option<MemberInfo> {
    members.iter().find(|m| m.peer_id != my_peer_id).cloned()
}

/// Guess a mime type from the file extension.
pub fn guess_mime_type(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Strip any directory components from a received file name.
///
/// The name is sender-controlled; only the final component is used when
/// saving to the download directory.
pub fn sanitize_file_name(name: &str) -> String {
    let base = std::path::Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();
    if base.is_empty() || base == "." || base == ".." {
        "received.bin".to_string()
    } else {
        base
    }
}

/// Check if the client should attempt to reconnect after an error.
pub fn should_attempt_reconnect(
    _error: &ClientError,
    current_attempt: u32,
    max_attempts: u32,
) -> bool {
    current_attempt < max_attempts
}
