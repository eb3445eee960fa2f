use std::collections::{HashMap, HashSet};

use crate::core::client::{ClientId, RoomId};

/// A named group of clients that receive the same broadcasts
#[derive(Debug, Clone)]
pub struct Room {
    /// Identifier issued by the game service
    pub id: RoomId,
    /// Clients currently in the room
    pub members: HashSet<ClientId>,
}

impl Room {
    /// Creates an empty room
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            members: HashSet::new(),
        }
    }

    /// Adds a member, returns false if it was already present
    pub fn add_member(&mut self, client_id: ClientId) -> bool {
        self.members.insert(client_id)
    }

    /// Removes a member
    pub fn remove_member(&mut self, client_id: &ClientId) -> bool {
        self.members.remove(client_id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Room id to room mapping. Rooms exist only while they have members.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client to a room, creating the room on first join.
    /// Returns true if the room was created by this call.
    pub fn join(&mut self, client_id: ClientId, room_id: &str) -> bool {
        let created = !self.rooms.contains_key(room_id);
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(room_id.to_string()))
            .add_member(client_id);
        created
    }

    /// Removes a client from a room, deleting the room once empty.
    /// Returns true if the room was deleted by this call.
    pub fn leave(&mut self, client_id: &ClientId, room_id: &str) -> bool {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return false;
        };
        room.remove_member(client_id);
        if room.is_empty() {
            self.rooms.remove(room_id);
            true
        } else {
            false
        }
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }
}
