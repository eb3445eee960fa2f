//! Hub actor that owns the client set and the room registry
//!
//! Every registry read or write goes through a single task consuming
//! [`HubCommand`]s, so mutations are totally ordered and each broadcast sees
//! the membership as of the moment it is processed. Connection tasks only
//! ever hold a [`HubHandle`].

use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, oneshot};

use crate::core::client::{Client, ClientId, ClientKind, Delivery, RoomId};
use crate::core::dispatcher::{BroadcastPayload, Dispatch};
use crate::core::room::RoomRegistry;
use crate::error::{Result, RoomRelayError};

/// Requests processed by the hub task
#[derive(Debug)]
pub enum HubCommand {
    Register(Client),
    Unregister(ClientId),
    SetKind(ClientId, ClientKind),
    JoinRoom(ClientId, RoomId),
    LeaveRoom(ClientId, RoomId),
    SendTo(ClientId, String),
    BroadcastAll(String),
    BroadcastRoom(RoomId, BroadcastPayload),
    BroadcastRoomExcept(RoomId, ClientId, BroadcastPayload),
    Snapshot(oneshot::Sender<RegistrySnapshot>),
}

/// Point-in-time copy of the registry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    /// Every connected client and the room it is in
    pub clients: HashMap<ClientId, Option<RoomId>>,
    /// Every room and its members
    pub rooms: HashMap<RoomId, HashSet<ClientId>>,
}

impl RegistrySnapshot {
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn members(&self, room_id: &str) -> Option<&HashSet<ClientId>> {
        self.rooms.get(room_id)
    }

    /// Check the bidirectional client/room invariant
    pub fn is_consistent(&self) -> bool {
        let members_known = self.rooms.iter().all(|(room_id, members)| {
            !members.is_empty()
                && members
                    .iter()
                    .all(|id| self.clients.get(id) == Some(&Some(room_id.clone())))
        });
        let rooms_known = self.clients.iter().all(|(id, room)| match room {
            Some(room_id) => self
                .rooms
                .get(room_id)
                .is_some_and(|members| members.contains(id)),
            None => true,
        });
        members_known && rooms_known
    }
}

/// Registry state. Only the hub task touches it.
#[derive(Debug, Default)]
pub struct Hub {
    clients: HashMap<ClientId, Client>,
    rooms: RoomRegistry,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the hub task and return a handle to it
    pub fn spawn() -> HubHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Hub::new().run(rx));
        HubHandle { commands: tx }
    }

    /// Process commands until every handle is dropped
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<HubCommand>) {
        log::debug!("Hub started");
        while let Some(command) = commands.recv().await {
            self.apply(command);
        }
        log::debug!(
            "Hub stopped with {} clients in {} rooms",
            self.clients.len(),
            self.rooms.len()
        );
    }

    pub fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(client) => self.register(client),
            HubCommand::Unregister(id) => self.unregister(&id),
            HubCommand::SetKind(id, kind) => self.set_kind(&id, kind),
            HubCommand::JoinRoom(id, room_id) => self.join_room(&id, &room_id),
            HubCommand::LeaveRoom(id, room_id) => self.leave_room(&id, &room_id),
            HubCommand::SendTo(id, message) => self.send_to(&id, message),
            HubCommand::BroadcastAll(message) => self.broadcast_all(&message),
            HubCommand::BroadcastRoom(room_id, payload) => {
                self.broadcast_room(&room_id, &payload)
            }
            HubCommand::BroadcastRoomExcept(room_id, excluded, payload) => {
                self.broadcast_room_except(&room_id, &excluded, &payload)
            }
            HubCommand::Snapshot(reply) => {
                // The requester may have given up waiting
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Add a client; joins its pre-assigned room if it has one
    pub fn register(&mut self, mut client: Client) {
        let id = client.id;
        if self.clients.contains_key(&id) {
            log::debug!("Client {} already registered", id);
            return;
        }
        let room = client.room.take();
        self.clients.insert(id, client);
        log::info!("Client connected: {} ({} total)", id, self.clients.len());

        if let Some(room_id) = room {
            self.join_room(&id, &room_id);
        }
    }

    /// Remove a client, closing its queue. No-op for unknown clients.
    pub fn unregister(&mut self, id: &ClientId) {
        let Some(client) = self.clients.remove(id) else {
            return;
        };
        if let Some(room_id) = &client.room {
            if self.rooms.leave(id, room_id) {
                log::debug!("Room {} removed, last member left", room_id);
            }
        }
        // Dropping the client drops the only sender, which ends its write pump
        drop(client);
        log::info!("Client disconnected: {} ({} total)", id, self.clients.len());
    }

    pub fn set_kind(&mut self, id: &ClientId, kind: ClientKind) {
        if let Some(client) = self.clients.get_mut(id) {
            client.kind = kind;
        }
    }

    /// Put a client in a room, moving it out of any previous room
    pub fn join_room(&mut self, id: &ClientId, room_id: &str) {
        let Some(client) = self.clients.get_mut(id) else {
            log::debug!("Ignoring join of unknown client {} to room {}", id, room_id);
            return;
        };

        match client.room.replace(room_id.to_string()) {
            Some(previous) if previous == room_id => return,
            Some(previous) => {
                if self.rooms.leave(id, &previous) {
                    log::debug!("Room {} removed, last member left", previous);
                }
            }
            None => {}
        }

        if self.rooms.join(*id, room_id) {
            log::debug!("Room {} created", room_id);
        }
        log::debug!("Client {} joined room {}", id, room_id);
    }

    pub fn leave_room(&mut self, id: &ClientId, room_id: &str) {
        if let Some(client) = self.clients.get_mut(id) {
            if client.room.as_deref() == Some(room_id) {
                client.room = None;
            }
        }
        if self.rooms.leave(id, room_id) {
            log::debug!("Room {} removed, last member left", room_id);
        }
    }

    /// Deliver to a single client
    pub fn send_to(&mut self, id: &ClientId, message: String) {
        let delivery = match self.clients.get(id) {
            Some(client) => client.enqueue(message),
            None => return,
        };
        if delivery == Delivery::Unresponsive {
            self.evict(vec![*id]);
        }
    }

    /// Deliver the same message to every connected client
    pub fn broadcast_all(&mut self, message: &str) {
        let unresponsive: Vec<ClientId> = self
            .clients
            .values()
            .filter(|client| client.enqueue(message.to_string()) == Delivery::Unresponsive)
            .map(|client| client.id)
            .collect();
        self.evict(unresponsive);
    }

    /// Deliver to every member of a room through the dispatch policy
    pub fn broadcast_room(&mut self, room_id: &str, payload: &BroadcastPayload) {
        self.dispatch_to_room(room_id, None, payload);
    }

    /// As [`Hub::broadcast_room`] but never to `excluded`
    pub fn broadcast_room_except(
        &mut self,
        room_id: &str,
        excluded: &ClientId,
        payload: &BroadcastPayload,
    ) {
        self.dispatch_to_room(room_id, Some(excluded), payload);
    }

    fn dispatch_to_room(
        &mut self,
        room_id: &str,
        excluded: Option<&ClientId>,
        payload: &BroadcastPayload,
    ) {
        let Some(room) = self.rooms.get(room_id) else {
            log::trace!("Broadcast to missing room {} dropped", room_id);
            return;
        };

        let mut dispatch = Dispatch::new(payload);
        let mut sent = 0;
        let mut unresponsive = Vec::new();
        for member in room.members.iter().filter(|m| Some(*m) != excluded) {
            let Some(client) = self.clients.get(member) else {
                continue;
            };
            let Some(message) = dispatch.message_for(client.kind) else {
                continue;
            };
            match client.enqueue(message) {
                Delivery::Queued => sent += 1,
                Delivery::Unresponsive => unresponsive.push(*member),
            }
        }
        log::trace!("Broadcast to {} members of room {}", sent, room_id);
        self.evict(unresponsive);
    }

    /// Drop clients that could not take a message, same as a disconnect
    fn evict(&mut self, ids: Vec<ClientId>) {
        for id in ids {
            log::warn!("Dropping unresponsive client {}", id);
            self.unregister(&id);
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            clients: self
                .clients
                .iter()
                .map(|(id, client)| (*id, client.room.clone()))
                .collect(),
            rooms: self
                .rooms
                .iter()
                .map(|room| (room.id.clone(), room.members.clone()))
                .collect(),
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// Cloneable entry point to the hub task
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    fn submit(&self, command: HubCommand) {
        if self.commands.send(command).is_err() {
            log::error!("Hub is not running, command dropped");
        }
    }

    pub fn register(&self, client: Client) {
        self.submit(HubCommand::Register(client));
    }

    pub fn unregister(&self, id: ClientId) {
        self.submit(HubCommand::Unregister(id));
    }

    pub fn set_kind(&self, id: ClientId, kind: ClientKind) {
        self.submit(HubCommand::SetKind(id, kind));
    }

    pub fn join_room(&self, id: ClientId, room_id: impl Into<RoomId>) {
        self.submit(HubCommand::JoinRoom(id, room_id.into()));
    }

    pub fn leave_room(&self, id: ClientId, room_id: impl Into<RoomId>) {
        self.submit(HubCommand::LeaveRoom(id, room_id.into()));
    }

    pub fn send_to(&self, id: ClientId, message: impl Into<String>) {
        self.submit(HubCommand::SendTo(id, message.into()));
    }

    pub fn broadcast_all(&self, message: impl Into<String>) {
        self.submit(HubCommand::BroadcastAll(message.into()));
    }

    pub fn broadcast_room(&self, room_id: impl Into<RoomId>, payload: impl Into<BroadcastPayload>) {
        self.submit(HubCommand::BroadcastRoom(room_id.into(), payload.into()));
    }

    pub fn broadcast_room_except(
        &self,
        room_id: impl Into<RoomId>,
        excluded: ClientId,
        payload: impl Into<BroadcastPayload>,
    ) {
        self.submit(HubCommand::BroadcastRoomExcept(
            room_id.into(),
            excluded,
            payload.into(),
        ));
    }

    /// Consistent view of the registry, ordered after every earlier command
    pub async fn snapshot(&self) -> Result<RegistrySnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(HubCommand::Snapshot(tx))
            .map_err(|_| RoomRelayError::HubUnavailable)?;
        rx.await.map_err(|_| RoomRelayError::HubUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(hub: &mut Hub, kind: ClientKind) -> (ClientId, mpsc::Receiver<String>) {
        let (client, rx) = Client::new(kind, 8);
        let id = client.id;
        hub.register(client);
        (id, rx)
    }

    #[test]
    fn test_register_with_room_joins() {
        let mut hub = Hub::new();
        let (client, _rx) = Client::new(ClientKind::Standard, 8);
        let id = client.id;
        hub.register(client.with_room("R1"));

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.clients.get(&id), Some(&Some("R1".to_string())));
        assert!(snapshot.members("R1").unwrap().contains(&id));
        assert!(snapshot.is_consistent());
    }

    #[test]
    fn test_unregister_twice_is_noop() {
        let mut hub = Hub::new();
        let (id, mut rx) = client(&mut hub, ClientKind::Standard);
        hub.join_room(&id, "R1");

        hub.unregister(&id);
        hub.unregister(&id);

        assert_eq!(hub.client_count(), 0);
        assert_eq!(hub.room_count(), 0);
        // Queue is closed once the hub lets go of the client
        assert!(rx.try_recv().is_err());
        assert!(rx.is_closed());
    }

    #[test]
    fn test_join_moves_between_rooms() {
        let mut hub = Hub::new();
        let (id, _rx) = client(&mut hub, ClientKind::Standard);
        hub.join_room(&id, "R1");
        hub.join_room(&id, "R2");

        let snapshot = hub.snapshot();
        assert!(snapshot.members("R1").is_none());
        assert!(snapshot.members("R2").unwrap().contains(&id));
        assert!(snapshot.is_consistent());
    }

    #[test]
    fn test_join_unknown_client_ignored() {
        let mut hub = Hub::new();
        hub.join_room(&ClientId::new(), "R1");
        assert_eq!(hub.room_count(), 0);
    }

    #[test]
    fn test_send_to_single_client() {
        let mut hub = Hub::new();
        let (a, mut rx_a) = client(&mut hub, ClientKind::Standard);
        let (_b, mut rx_b) = client(&mut hub, ClientKind::Standard);

        hub.send_to(&a, "hello".to_string());
        assert_eq!(rx_a.try_recv().unwrap(), "hello");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_room_hybrid_payload() {
        let mut hub = Hub::new();
        let (player, mut rx_player) = client(&mut hub, ClientKind::Standard);
        let (display, mut rx_display) = client(&mut hub, ClientKind::DisplayView);
        hub.join_room(&player, "R1");
        hub.join_room(&display, "R1");

        let raw = json!({"html": "RELOAD", "json": {"round": 1}}).to_string();
        let payload = BroadcastPayload::from_raw(raw);
        hub.broadcast_room("R1", &payload);

        let to_player: serde_json::Value =
            serde_json::from_str(&rx_player.try_recv().unwrap()).unwrap();
        assert_eq!(to_player, json!({"type": "view_update", "html": "RELOAD"}));
        assert_eq!(rx_display.try_recv().unwrap(), r#"{"round":1}"#);
    }

    #[test]
    fn test_overflow_evicts_client() {
        let mut hub = Hub::new();
        let (slow, _rx_slow) = {
            let (client, rx) = Client::new(ClientKind::Standard, 1);
            let id = client.id;
            hub.register(client);
            (id, rx)
        };
        let (fast, mut rx_fast) = client(&mut hub, ClientKind::Standard);
        hub.join_room(&slow, "R1");
        hub.join_room(&fast, "R1");

        hub.broadcast_room("R1", &BroadcastPayload::from_raw("one"));
        hub.broadcast_room("R1", &BroadcastPayload::from_raw("two"));

        let snapshot = hub.snapshot();
        assert!(!snapshot.clients.contains_key(&slow));
        assert_eq!(snapshot.members("R1").unwrap().len(), 1);
        assert!(snapshot.is_consistent());
        assert_eq!(rx_fast.try_recv().unwrap(), "one");
        assert_eq!(rx_fast.try_recv().unwrap(), "two");
    }

    #[tokio::test]
    async fn test_handle_orders_snapshot_after_commands() {
        let hub = Hub::spawn();
        let (client, _rx) = Client::new(ClientKind::Standard, 8);
        let id = client.id;
        hub.register(client);
        hub.join_room(id, "R1");

        let snapshot = hub.snapshot().await.unwrap();
        assert_eq!(snapshot.client_count(), 1);
        assert_eq!(snapshot.room_count(), 1);

        hub.leave_room(id, "R1");
        let snapshot = hub.snapshot().await.unwrap();
        assert_eq!(snapshot.room_count(), 0);
        assert_eq!(snapshot.clients.get(&id), Some(&None));
    }
}
