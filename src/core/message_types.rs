//! Message types for room-based communication

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client-to-server envelopes, keyed by `type`.
///
/// Fields are optional on the wire; each handler checks the ones it needs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Identify the connection
    Handshake {
        user_id: Option<String>,
        room_id: Option<String>,
        device: Option<String>,
    },

    /// Create a room and join it
    CreateRoom { nickname: Option<String> },

    /// Join an existing room
    JoinRoom {
        room_id: Option<String>,
        nickname: Option<String>,
    },

    /// Pick the game for a room
    SelectGame {
        room_id: Option<String>,
        game_type: Option<String>,
    },

    /// Start the selected game in the current room
    StartGame,

    /// Forward a game move
    Action {
        room_id: Option<String>,
        action: Option<Value>,
    },

    /// Leave the room; from the admin this deletes it
    LeaveRoom { user_id: Option<String> },
}

impl ClientMessage {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Discriminant, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Handshake { .. } => "handshake",
            ClientMessage::CreateRoom { .. } => "create_room",
            ClientMessage::JoinRoom { .. } => "join_room",
            ClientMessage::SelectGame { .. } => "select_game",
            ClientMessage::StartGame => "start_game",
            ClientMessage::Action { .. } => "action",
            ClientMessage::LeaveRoom { .. } => "leave_room",
        }
    }
}

/// Server-to-client envelopes
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomCreated { room_id: String },

    RoomJoined { room_id: String, is_admin: bool },

    /// Another player entered the room
    PlayerJoined { nickname: String },

    /// The room list changed; clients refetch it
    RoomsUpdated,

    GameSelected { game_type: String, game_name: String },

    GameStarted { redirect: String },

    RoomDeleted,

    /// Rendered view for standard clients
    ViewUpdate { html: Value },

    Error { message: String },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        // Derived impls with string keys only; serialization does not fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Treat empty strings as absent
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
