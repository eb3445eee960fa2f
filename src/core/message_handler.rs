//! Per-connection session protocol
//!
//! Decodes inbound envelopes, checks them against the session state, makes
//! at most one game-service call and turns the outcome into hub operations.
//! The service call runs on the connection's own task; the hub only ever
//! sees the resulting commands.

use std::sync::Arc;

use serde_json::Value;

use crate::constants::RELOAD_SENTINEL;
use crate::core::client::{ClientId, ClientKind, RoomId};
use crate::core::dispatcher::BroadcastPayload;
use crate::core::hub::HubHandle;
use crate::core::message_types::{non_empty, ClientMessage, ServerMessage};
use crate::error::{Result, RoomRelayError};
use crate::game_service::{
    CreateRoomReply, DeleteRoomReply, GameService, JoinRoomReply, SetGameReply, StartGameReply,
};

/// Protocol state of one connection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unidentified,
    Identified { user_id: String },
    InRoom { user_id: String, room_id: RoomId },
}

impl SessionState {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            SessionState::Unidentified => None,
            SessionState::Identified { user_id } | SessionState::InRoom { user_id, .. } => {
                Some(user_id)
            }
        }
    }

    pub fn room_id(&self) -> Option<&str> {
        match self {
            SessionState::InRoom { room_id, .. } => Some(room_id),
            _ => None,
        }
    }

    fn enter_room(&mut self, room_id: RoomId) {
        if let Some(user_id) = self.user_id().map(str::to_string) {
            *self = SessionState::InRoom { user_id, room_id };
        }
    }

    fn leave_room(&mut self) {
        if let SessionState::InRoom { user_id, .. } = self {
            *self = SessionState::Identified {
                user_id: std::mem::take(user_id),
            };
        }
    }
}

/// Handles the envelopes of a single connection
pub struct MessageHandler {
    client_id: ClientId,
    kind: ClientKind,
    state: SessionState,
    hub: HubHandle,
    service: Arc<dyn GameService>,
}

impl MessageHandler {
    pub fn new(client_id: ClientId, hub: HubHandle, service: Arc<dyn GameService>) -> Self {
        Self {
            client_id,
            kind: ClientKind::Standard,
            state: SessionState::Unidentified,
            hub,
            service,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn kind(&self) -> ClientKind {
        self.kind
    }

    /// Handle one text frame. Undecodable frames are logged and dropped.
    pub async fn handle_text(&mut self, text: &str) {
        let message = match ClientMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Dropping malformed message from {}: {}", self.client_id, e);
                return;
            }
        };

        let kind = message.kind();
        if let Err(e) = self.handle_message(message).await {
            log::warn!("{} from {} not applied: {}", kind, self.client_id, e);
        }
    }

    /// Dispatch a decoded envelope
    pub async fn handle_message(&mut self, message: ClientMessage) -> Result<()> {
        log::debug!("Handling {} from {}", message.kind(), self.client_id);

        if let ClientMessage::Handshake {
            user_id,
            room_id,
            device,
        } = message
        {
            return self.handle_handshake(user_id, room_id, device);
        }

        let user_id = self
            .state
            .user_id()
            .map(str::to_string)
            .ok_or_else(|| RoomRelayError::InvalidState("no handshake yet".to_string()))?;

        match message {
            ClientMessage::Handshake { .. } => Ok(()),
            ClientMessage::CreateRoom { nickname } => {
                let nickname = require(nickname, "nickname")?;
                self.handle_create_room(&user_id, &nickname).await
            }
            ClientMessage::JoinRoom { room_id, nickname } => {
                let room_id = require(room_id, "room_id")?;
                let nickname = require(nickname, "nickname")?;
                self.handle_join_room(&user_id, room_id, nickname).await
            }
            ClientMessage::SelectGame { room_id, game_type } => {
                let room_id = self.target_room(room_id)?;
                let game_type = require(game_type, "game_type")?;
                self.handle_select_game(room_id, game_type).await
            }
            ClientMessage::StartGame => {
                let room_id = self.target_room(None)?;
                self.handle_start_game(room_id).await
            }
            ClientMessage::Action { room_id, action } => {
                let room_id = self.target_room(room_id)?;
                let action = action.ok_or(RoomRelayError::MissingField("action"))?;
                self.handle_action(&user_id, room_id, &action).await
            }
            ClientMessage::LeaveRoom { user_id: claimed } => {
                self.handle_leave_room(&user_id, non_empty(claimed).is_some())
                    .await
            }
        }
    }

    /// Current room, falling back to the one named in the message
    fn target_room(&self, requested: Option<String>) -> Result<RoomId> {
        self.state
            .room_id()
            .map(str::to_string)
            .or_else(|| non_empty(requested))
            .ok_or(RoomRelayError::MissingField("room_id"))
    }

    fn reply(&self, message: ServerMessage) {
        self.hub.send_to(self.client_id, message.to_json());
    }

    fn rooms_updated(&self) {
        self.hub.broadcast_all(ServerMessage::RoomsUpdated.to_json());
    }

    fn handle_handshake(
        &mut self,
        user_id: Option<String>,
        room_id: Option<String>,
        device: Option<String>,
    ) -> Result<()> {
        let user_id = require(user_id, "user_id")?;

        self.kind = ClientKind::from_device(device.as_deref());
        self.hub.set_kind(self.client_id, self.kind);

        let room_id = non_empty(room_id).or_else(|| self.state.room_id().map(str::to_string));
        match room_id {
            Some(room_id) => {
                self.hub.join_room(self.client_id, room_id.clone());
                self.state = SessionState::InRoom { user_id, room_id };
            }
            None => self.state = SessionState::Identified { user_id },
        }

        log::info!(
            "Client {} identified as {:?} ({:?})",
            self.client_id,
            self.state.user_id(),
            self.kind
        );
        Ok(())
    }

    async fn handle_create_room(&mut self, user_id: &str, nickname: &str) -> Result<()> {
        match self.service.create_room(user_id, nickname).await? {
            CreateRoomReply::Created { room_id } => {
                log::info!("Room {} created by {}", room_id, user_id);
                self.hub.join_room(self.client_id, room_id.clone());
                self.state.enter_room(room_id.clone());
                self.reply(ServerMessage::RoomCreated { room_id });
                self.rooms_updated();
            }
            CreateRoomReply::Rejected => {
                log::info!("Game service refused to create a room for {}", user_id);
            }
        }
        Ok(())
    }

    async fn handle_join_room(
        &mut self,
        user_id: &str,
        room_id: RoomId,
        nickname: String,
    ) -> Result<()> {
        match self.service.join_room(&room_id, user_id, &nickname).await? {
            JoinRoomReply::Joined { is_admin } => {
                self.hub.join_room(self.client_id, room_id.clone());
                self.state.enter_room(room_id.clone());
                self.reply(ServerMessage::RoomJoined {
                    room_id: room_id.clone(),
                    is_admin,
                });
                self.hub.broadcast_room_except(
                    room_id,
                    self.client_id,
                    ServerMessage::PlayerJoined { nickname },
                );
                self.rooms_updated();
            }
            JoinRoomReply::Rejected => {
                log::info!("{} was not admitted to room {}", user_id, room_id);
            }
        }
        Ok(())
    }

    async fn handle_select_game(&mut self, room_id: RoomId, game_type: String) -> Result<()> {
        let reply = match self.service.set_game(&room_id, &game_type).await {
            Ok(reply) => reply,
            Err(e) => {
                self.reply(ServerMessage::Error {
                    message: format!("Failed to set game: {}", e),
                });
                return Err(e);
            }
        };

        match reply {
            SetGameReply::GameSet { game } => {
                self.hub.broadcast_room(
                    room_id,
                    ServerMessage::GameSelected {
                        game_type,
                        game_name: game,
                    },
                );
                self.rooms_updated();
            }
            SetGameReply::Rejected => {
                log::info!("Game {} not set for room {}", game_type, room_id);
            }
        }
        Ok(())
    }

    async fn handle_start_game(&mut self, room_id: RoomId) -> Result<()> {
        let reply = match self.service.start_game(&room_id).await {
            Ok(reply) => reply,
            Err(e) => {
                self.reply(ServerMessage::Error {
                    message: format!("Failed to start game: {}", e),
                });
                return Err(e);
            }
        };

        match reply {
            StartGameReply::Started { redirect } => {
                log::info!("Game started in room {}", room_id);
                self.hub
                    .broadcast_room(room_id, ServerMessage::GameStarted { redirect });
            }
            StartGameReply::Rejected => {
                log::info!("Game in room {} did not start", room_id);
            }
        }
        Ok(())
    }

    async fn handle_action(
        &mut self,
        user_id: &str,
        room_id: RoomId,
        action: &Value,
    ) -> Result<()> {
        let reply = self.service.apply_action(&room_id, user_id, action).await?;

        // The rendered view belongs to the acting player only; everyone else
        // is told to reload theirs.
        let payload = BroadcastPayload::Hybrid {
            json: reply.json,
            html: Some(Value::String(RELOAD_SENTINEL.to_string())),
        };
        self.hub.broadcast_room(room_id, payload);
        Ok(())
    }

    async fn handle_leave_room(&mut self, user_id: &str, privileged: bool) -> Result<()> {
        let Some(room_id) = self.state.room_id().map(str::to_string) else {
            return Err(RoomRelayError::InvalidState("not in a room".to_string()));
        };

        // Whether the caller really is the admin is for the game service to decide
        if privileged {
            match self.service.delete_room(&room_id, user_id).await? {
                DeleteRoomReply::Deleted => {
                    log::info!("Room {} deleted by {}", room_id, user_id);
                    self.hub
                        .broadcast_room(room_id.clone(), ServerMessage::RoomDeleted);
                    self.rooms_updated();
                }
                DeleteRoomReply::Rejected => {
                    log::info!("Game service refused to delete room {}", room_id);
                    return Ok(());
                }
            }
        }

        self.hub.leave_room(self.client_id, room_id);
        self.state.leave_room();
        Ok(())
    }
}

fn require(value: Option<String>, field: &'static str) -> Result<String> {
    non_empty(value).ok_or(RoomRelayError::MissingField(field))
}
