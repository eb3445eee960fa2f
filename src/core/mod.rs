//! Core functionality for the relay: clients, rooms, the hub and the session protocol

pub mod client;
pub mod dispatcher;
pub mod hub;
pub mod message_handler;
pub mod message_types;
pub mod room;

// Re-export main components for convenience
pub use client::{Client, ClientId, ClientKind, RoomId};
pub use dispatcher::BroadcastPayload;
pub use hub::{Hub, HubHandle, RegistrySnapshot};
pub use message_handler::{MessageHandler, SessionState};
pub use message_types::{ClientMessage, ServerMessage};
pub use room::{Room, RoomRegistry};
