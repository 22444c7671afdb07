//! WebSocket Protocol Types
//!
//! JSON envelopes exchanged with the message-exchange server over the
//! persistent connection.

use chat_store::Message;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Messages sent FROM the client TO the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request the full authoritative message set. Issued once per
    /// successful connect so state is synced after any gap.
    GetMessages,

    /// Submit a new conversation turn carrying the raw text.
    SendMessage { content: String },
}

/// Messages sent FROM the server TO the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A full or incremental batch. Always authoritative and fully
    /// mergeable; matching ids override local state.
    MessageUpdate { messages: Vec<Message> },
}

/// Parse an inbound text frame into an envelope.
///
/// Malformed or unrecognized frames are logged and dropped; they never
/// affect connection state.
pub fn parse_frame(text: &str) -> Option<ServerMessage> {
    match serde_json::from_str(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            warn!(error = %e, "dropping malformed frame");
            None
        }
    }
}
