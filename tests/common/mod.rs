// Shared helpers for integration tests
#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use room_relay::core::{Client, ClientId, ClientKind, HubHandle};
use room_relay::error::{Result, RoomRelayError};
use room_relay::game_service::{
    ActionReply, CreateRoomReply, DeleteRoomReply, GameService, JoinRoomReply, SetGameReply,
    StartGameReply,
};

/// In-memory stand-in for the game service
pub struct MockGameService {
    pub room_id: String,
    pub admit: bool,
    pub is_admin: bool,
    pub unreachable: bool,
    /// Answer every call with a logical rejection
    pub reject: bool,
    pub action_reply: Value,
    pub calls: Mutex<Vec<String>>,
}

impl Default for MockGameService {
    fn default() -> Self {
        Self {
            room_id: "R1".to_string(),
            admit: true,
            is_admin: false,
            unreachable: false,
            reject: false,
            action_reply: json!({"html": "<p>your hand</p>", "json": {"phase": "vote"}}),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockGameService {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.unreachable {
            return Err(RoomRelayError::ServiceUnavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl GameService for MockGameService {
    async fn create_room(&self, user_id: &str, nickname: &str) -> Result<CreateRoomReply> {
        self.record(format!("create_room {} {}", user_id, nickname))?;
        if self.reject {
            return Ok(CreateRoomReply::Rejected);
        }
        Ok(CreateRoomReply::Created {
            room_id: self.room_id.clone(),
        })
    }

    async fn join_room(
        &self,
        room_id: &str,
        user_id: &str,
        nickname: &str,
    ) -> Result<JoinRoomReply> {
        self.record(format!("join_room {} {} {}", room_id, user_id, nickname))?;
        if self.admit && !self.reject {
            Ok(JoinRoomReply::Joined {
                is_admin: self.is_admin,
            })
        } else {
            Ok(JoinRoomReply::Rejected)
        }
    }

    async fn set_game(&self, room_id: &str, game_type: &str) -> Result<SetGameReply> {
        self.record(format!("set_game {} {}", room_id, game_type))?;
        if self.reject {
            return Ok(SetGameReply::Rejected);
        }
        Ok(SetGameReply::GameSet {
            game: "Secret Hitler".to_string(),
        })
    }

    async fn start_game(&self, room_id: &str) -> Result<StartGameReply> {
        self.record(format!("start_game {}", room_id))?;
        if self.reject {
            return Ok(StartGameReply::Rejected);
        }
        Ok(StartGameReply::Started {
            redirect: format!("/game/{}", room_id),
        })
    }

    async fn apply_action(
        &self,
        room_id: &str,
        user_id: &str,
        action: &Value,
    ) -> Result<ActionReply> {
        self.record(format!("action {} {} {}", room_id, user_id, action))?;
        Ok(serde_json::from_value(self.action_reply.clone())?)
    }

    async fn delete_room(&self, room_id: &str, user_id: &str) -> Result<DeleteRoomReply> {
        self.record(format!("delete_room {} {}", room_id, user_id))?;
        if self.reject {
            return Ok(DeleteRoomReply::Rejected);
        }
        Ok(DeleteRoomReply::Deleted)
    }
}

/// Register a fresh client and return its id and outbound queue
pub fn connect(hub: &HubHandle, kind: ClientKind) -> (ClientId, mpsc::Receiver<String>) {
    let (client, rx) = Client::new(kind, 32);
    let id = client.id;
    hub.register(client);
    (id, rx)
}

/// Everything queued so far, decoded as JSON
pub fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
    let mut messages = Vec::new();
    while let Ok(text) = rx.try_recv() {
        messages.push(serde_json::from_str(&text).unwrap_or(Value::String(text)));
    }
    messages
}

/// Message `type` tags, in order
pub fn types(messages: &[Value]) -> Vec<String> {
    messages
        .iter()
        .map(|m| m["type"].as_str().unwrap_or("<untyped>").to_string())
        .collect()
}
