//! Message formatting utilities for client display.

use kakehashi_server::infrastructure::dto::websocket::MemberInfo;
use kakehashi_shared::time::timestamp_to_rfc3339;

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the room summary shown after create/join
    pub fn format_room_entered(room_code: &str, members: &[MemberInfo], my_peer_id: &str) -> String {
        let mut output = String::new();
        output.push_str("\n============================================================\n");
        output.push_str(&format!("Room {}\n", room_code));
        if members.is_empty() {
            output.push_str("(waiting for a peer to join)\n");
        } else {
            for member in members {
                let me_suffix = if member.peer_id == my_peer_id {
                    " (me)"
                } else {
                    ""
                };
                output.push_str(&format!(
                    "  {} [{}]{}\n",
                    member.username, member.peer_id, me_suffix
                ));
            }
        }
        output.push_str("============================================================\n");
        output
    }

    pub fn format_peer_joined(username: &str, peer_id: &str) -> String {
        format!("\n*** {} [{}] joined the room\n", username, peer_id)
    }

    pub fn format_peer_left(username: &str, peer_id: &str) -> String {
        format!("\n*** {} [{}] left the room\n", username, peer_id)
    }

    pub fn format_chat_message(username: &str, content: &str, timestamp: i64) -> String {
        format!(
            "\n[{}] {}: {}\n",
            timestamp_to_rfc3339(timestamp),
            username,
            content
        )
    }

    pub fn format_incoming_call(from_peer_id: &str) -> String {
        format!(
            "\n*** Incoming call from [{}] -- /accept or /reject\n",
            from_peer_id
        )
    }

    pub fn format_transfer_progress(name: &str, transferred: u64, total: u64) -> String {
        let percent = if total == 0 {
            100.0
        } else {
            transferred as f64 / total as f64 * 100.0
        };
        format!("\n[transfer] {}: {:.0}%\n", name, percent)
    }

    pub fn format_error(message: &str) -> String {
        format!("\n!!! {}\n", message)
    }

    pub fn format_help() -> String {
        concat!(
            "\nCommands:\n",
            "  /create            create a new room\n",
            "  /join CODE         join (or create) a room\n",
            "  /leave             leave the current room\n",
            "  /call              call the other room member\n",
            "  /accept, /reject   answer an incoming call\n",
            "  /hangup            end the active call\n",
            "  /send PATH         send a file over the peer channel\n",
            "  /img PATH          send an inline image\n",
            "  /quit              exit\n",
            "Anything else is sent as a chat message.\n"
        )
        .to_string()
    }
}
