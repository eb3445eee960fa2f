//! Client for the external game/room service
//!
//! The service owns room creation, membership and game rules. Every call is
//! a JSON POST under `<base>/api`; replies carry a `status` field that is
//! mapped onto a typed outcome per call. Non-2xx answers and transport
//! failures surface as errors, any unexpected `status` as a rejection.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{Result, RoomRelayError};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CreateRoomReply {
    #[serde(rename = "ok")]
    Created { room_id: String },
    #[serde(other)]
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JoinRoomReply {
    Joined {
        #[serde(default)]
        is_admin: bool,
    },
    #[serde(other)]
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SetGameReply {
    GameSet {
        /// Display name of the game
        game: String,
    },
    #[serde(other)]
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartGameReply {
    Started { redirect: String },
    #[serde(other)]
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeleteRoomReply {
    Deleted,
    #[serde(other)]
    Rejected,
}

/// Result of a game action. Only the structured view is relayed; the
/// rendered `html` view belongs to the acting player and is not kept.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ActionReply {
    #[serde(default)]
    pub json: Option<Value>,
}

/// Operations offered by the game/room service
#[async_trait]
pub trait GameService: Send + Sync {
    async fn create_room(&self, user_id: &str, nickname: &str) -> Result<CreateRoomReply>;

    async fn join_room(&self, room_id: &str, user_id: &str, nickname: &str)
        -> Result<JoinRoomReply>;

    async fn set_game(&self, room_id: &str, game_type: &str) -> Result<SetGameReply>;

    async fn start_game(&self, room_id: &str) -> Result<StartGameReply>;

    async fn apply_action(&self, room_id: &str, user_id: &str, action: &Value)
        -> Result<ActionReply>;

    async fn delete_room(&self, room_id: &str, user_id: &str) -> Result<DeleteRoomReply>;
}

/// HTTP implementation of [`GameService`]
#[derive(Debug, Clone)]
pub struct HttpGameService {
    http: reqwest::Client,
    api_base: Url,
}

impl HttpGameService {
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RoomRelayError::ConfigError(format!("HTTP client: {}", e)))?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: &Url) -> Self {
        let mut api_base = base_url.clone();
        let path = format!("{}/api/", base_url.path().trim_end_matches('/'));
        api_base.set_path(&path);
        Self { http, api_base }
    }

    /// Full URL for an API endpoint; room ids are path-escaped
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| RoomRelayError::ConfigError("service URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post<T: DeserializeOwned>(&self, segments: &[&str], body: Value) -> Result<T> {
        let url = self.endpoint(segments)?;
        log::debug!("Calling game service: {} with {}", url, body);

        let response = self.http.post(url.clone()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            log::warn!("Game service {} answered {}", url, status);
            return Err(RoomRelayError::ServiceStatus(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            log::error!(
                "Failed to decode response from {}: {}. Body: {}",
                url,
                e,
                String::from_utf8_lossy(&bytes)
            );
            RoomRelayError::ServiceResponse(e.to_string())
        })
    }
}

#[async_trait]
impl GameService for HttpGameService {
    async fn create_room(&self, user_id: &str, nickname: &str) -> Result<CreateRoomReply> {
        self.post(
            &["room", "create"],
            serde_json::json!({ "user_id": user_id, "nickname": nickname }),
        )
        .await
    }

    async fn join_room(
        &self,
        room_id: &str,
        user_id: &str,
        nickname: &str,
    ) -> Result<JoinRoomReply> {
        self.post(
            &["room", room_id, "join"],
            serde_json::json!({ "user_id": user_id, "nickname": nickname }),
        )
        .await
    }

    async fn set_game(&self, room_id: &str, game_type: &str) -> Result<SetGameReply> {
        self.post(
            &["room", "set_game"],
            serde_json::json!({ "room_id": room_id, "game_type": game_type }),
        )
        .await
    }

    async fn start_game(&self, room_id: &str) -> Result<StartGameReply> {
        self.post(&["game", "start"], serde_json::json!({ "room_id": room_id }))
            .await
    }

    async fn apply_action(
        &self,
        room_id: &str,
        user_id: &str,
        action: &Value,
    ) -> Result<ActionReply> {
        self.post(
            &["action"],
            serde_json::json!({ "room_id": room_id, "user_id": user_id, "action": action }),
        )
        .await
    }

    async fn delete_room(&self, room_id: &str, user_id: &str) -> Result<DeleteRoomReply> {
        self.post(
            &["room", room_id, "delete"],
            serde_json::json!({ "user_id": user_id }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service(base: &str) -> HttpGameService {
        HttpGameService::new(&Url::parse(base).unwrap(), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_endpoint_building() {
        let svc = service("http://localhost:5001");
        assert_eq!(
            svc.endpoint(&["room", "create"]).unwrap().as_str(),
            "http://localhost:5001/api/room/create"
        );

        let prefixed = service("http://games.local/backend/");
        assert_eq!(
            prefixed.endpoint(&["room", "R 1", "join"]).unwrap().as_str(),
            "http://games.local/backend/api/room/R%201/join"
        );
    }

    #[test]
    fn test_reply_decoding() {
        let created: CreateRoomReply =
            serde_json::from_value(json!({"status": "ok", "room_id": "ABCD"})).unwrap();
        assert_eq!(created, CreateRoomReply::Created { room_id: "ABCD".to_string() });

        let joined: JoinRoomReply =
            serde_json::from_value(json!({"status": "joined", "is_admin": true})).unwrap();
        assert_eq!(joined, JoinRoomReply::Joined { is_admin: true });

        let rejected: JoinRoomReply =
            serde_json::from_value(json!({"status": "error", "message": "Room not found"}))
                .unwrap();
        assert_eq!(rejected, JoinRoomReply::Rejected);

        let set: SetGameReply = serde_json::from_value(
            json!({"status": "game_set", "game": "Spia", "game_type": "spia"}),
        )
        .unwrap();
        assert_eq!(set, SetGameReply::GameSet { game: "Spia".to_string() });

        let deleted: DeleteRoomReply =
            serde_json::from_value(json!({"status": "deleted"})).unwrap();
        assert_eq!(deleted, DeleteRoomReply::Deleted);
    }

    #[test]
    fn test_action_reply_keeps_structured_view() {
        let reply: ActionReply = serde_json::from_value(
            json!({"html": "<div/>", "json": {"phase": "vote"}, "status": "ok"}),
        )
        .unwrap();
        assert_eq!(reply.json, Some(json!({"phase": "vote"})));

        let html_only: ActionReply =
            serde_json::from_value(json!({"html": "<div/>", "status": "ok"})).unwrap();
        assert_eq!(html_only, ActionReply::default());
    }
}
