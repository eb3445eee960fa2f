//! Per-connection client state
//! Identity, capability kind and the bounded outbound queue

use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::constants::DISPLAY_DEVICE;

/// Identifier for a room, as issued by the game service
pub type RoomId = String;

/// Opaque identity of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a client is able to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientKind {
    /// Interactive player client, renders HTML views
    #[default]
    Standard,
    /// Thin display client, consumes structured JSON only
    DisplayView,
}

impl ClientKind {
    /// Map the handshake `device` field to a kind
    pub fn from_device(device: Option<&str>) -> Self {
        match device {
            Some(DISPLAY_DEVICE) => ClientKind::DisplayView,
            _ => ClientKind::Standard,
        }
    }
}

/// Outcome of a non-blocking enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue full or write side gone; the client must be dropped
    Unresponsive,
}

/// Hub-side record of a connected client
#[derive(Debug)]
pub struct Client {
    pub id: ClientId,
    pub kind: ClientKind,
    pub room: Option<RoomId>,
    outbound: mpsc::Sender<String>,
}

impl Client {
    /// Create a client with a bounded queue; the receiver goes to the write pump
    pub fn new(kind: ClientKind, capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let client = Self {
            id: ClientId::new(),
            kind,
            room: None,
            outbound,
        };
        (client, rx)
    }

    /// Pre-assign a room, joined on registration
    pub fn with_room(mut self, room: impl Into<RoomId>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Push a message without waiting
    pub fn enqueue(&self, message: String) -> Delivery {
        match self.outbound.try_send(message) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("Outbound queue full for client {}", self.id);
                Delivery::Unresponsive
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("Outbound queue closed for client {}", self.id);
                Delivery::Unresponsive
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_device() {
        assert_eq!(
            ClientKind::from_device(Some("display_client")),
            ClientKind::DisplayView
        );
        assert_eq!(ClientKind::from_device(Some("phone")), ClientKind::Standard);
        assert_eq!(ClientKind::from_device(None), ClientKind::Standard);
    }

    #[tokio::test]
    async fn test_enqueue_reports_full_queue() {
        let (client, mut rx) = Client::new(ClientKind::Standard, 1);
        assert_eq!(client.enqueue("one".to_string()), Delivery::Queued);
        assert_eq!(client.enqueue("two".to_string()), Delivery::Unresponsive);
        assert_eq!(rx.recv().await.as_deref(), Some("one"));
    }

    #[test]
    fn test_enqueue_reports_closed_queue() {
        let (client, rx) = Client::new(ClientKind::Standard, 4);
        drop(rx);
        assert_eq!(client.enqueue("lost".to_string()), Delivery::Unresponsive);
    }
}
