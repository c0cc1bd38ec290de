//! Room table: pairs two connections under a shared code.
//!
//! First joiner becomes the sender, second the receiver, anyone else is
//! turned away without touching the room.

use crate::registry::ConnectionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Role granted by join order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sender,
    Receiver,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Room {
    pub sender: Option<ConnectionId>,
    pub receiver: Option<ConnectionId>,
}

impl Room {
    pub fn role_of(&self, id: &str) -> Option<Role> {
        if self.sender.as_deref() == Some(id) {
            Some(Role::Sender)
        } else if self.receiver.as_deref() == Some(id) {
            Some(Role::Receiver)
        } else {
            None
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.role_of(id).is_some()
    }

    /// The other occupant, if any
    pub fn peer_of(&self, id: &str) -> Option<&ConnectionId> {
        match self.role_of(id)? {
            Role::Sender => self.receiver.as_ref(),
            Role::Receiver => self.sender.as_ref(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.sender.is_some() && self.receiver.is_some()
    }
}

/// Result of a join attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined {
        role: Role,
        /// Sender to notify when this join completed the pair
        paired_with: Option<ConnectionId>,
    },
    Full,
}

/// Room removed by a teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedRoom {
    pub room_code: String,
    /// Occupant left behind by the departing connection
    pub survivor: Option<ConnectionId>,
}

#[derive(Debug, Default)]
pub struct RoomTable {
    rooms: RwLock<HashMap<String, Room>>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Assign a role in `room_code`, creating the room on first use
    pub async fn join(&self, connection_id: &str, room_code: &str) -> JoinOutcome {
        // One write lock for the whole read-modify-write so two racing
        // joins to a fresh code cannot both become sender
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_code.to_string()).or_default();

        if let Some(role) = room.role_of(connection_id) {
            return JoinOutcome::Joined {
                role,
                paired_with: None,
            };
        }

        if room.sender.is_none() {
            room.sender = Some(connection_id.to_string());
            JoinOutcome::Joined {
                role: Role::Sender,
                paired_with: None,
            }
        } else if room.receiver.is_none() {
            room.receiver = Some(connection_id.to_string());
            JoinOutcome::Joined {
                role: Role::Receiver,
                paired_with: room.sender.clone(),
            }
        } else {
            JoinOutcome::Full
        }
    }

    /// Remove the room holding `connection_id`. No-op for unknown connections.
    pub async fn teardown(&self, connection_id: &str) -> Option<RemovedRoom> {
        let mut rooms = self.rooms.write().await;
        let room_code = rooms
            .iter()
            .find(|(_, room)| room.contains(connection_id))
            .map(|(code, _)| code.clone())?;

        let room = rooms.remove(&room_code)?;
        Some(RemovedRoom {
            survivor: room.peer_of(connection_id).cloned(),
            room_code,
        })
    }

    pub async fn get(&self, room_code: &str) -> Option<Room> {
        self.rooms.read().await.get(room_code).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_join_order_assigns_roles() {
        let table = RoomTable::new();

        assert_eq!(
            table.join("a", "ABC123").await,
            JoinOutcome::Joined {
                role: Role::Sender,
                paired_with: None
            }
        );
        assert_eq!(
            table.join("b", "ABC123").await,
            JoinOutcome::Joined {
                role: Role::Receiver,
                paired_with: Some("a".to_string())
            }
        );

        let before = table.get("ABC123").await;
        assert_eq!(table.join("c", "ABC123").await, JoinOutcome::Full);
        assert_eq!(table.get("ABC123").await, before);
    }

    #[tokio::test]
    async fn test_rejoin_keeps_role() {
        let table = RoomTable::new();
        table.join("a", "room").await;

        // A second join from the sender must not make it its own receiver
        assert_eq!(
            table.join("a", "room").await,
            JoinOutcome::Joined {
                role: Role::Sender,
                paired_with: None
            }
        );
        let room = table.get("room").await.unwrap();
        assert_eq!(room.receiver, None);
    }

    #[tokio::test]
    async fn test_rooms_are_independent() {
        let table = RoomTable::new();
        table.join("a", "one").await;
        let outcome = table.join("b", "two").await;
        assert!(matches!(
            outcome,
            JoinOutcome::Joined {
                role: Role::Sender,
                ..
            }
        ));
        assert_eq!(table.len().await, 2);
    }

    #[tokio::test]
    async fn test_teardown_removes_whole_room() {
        let table = RoomTable::new();
        table.join("a", "room").await;
        table.join("b", "room").await;

        let removed = table.teardown("b").await.unwrap();
        assert_eq!(removed.room_code, "room");
        assert_eq!(removed.survivor, Some("a".to_string()));
        assert!(table.get("room").await.is_none());

        // The room is gone, so the code starts fresh
        assert!(matches!(
            table.join("c", "room").await,
            JoinOutcome::Joined {
                role: Role::Sender,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_teardown_lone_sender() {
        let table = RoomTable::new();
        table.join("a", "room").await;

        let removed = table.teardown("a").await.unwrap();
        assert_eq!(removed.survivor, None);
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_teardown_unknown_is_noop() {
        let table = RoomTable::new();
        table.join("a", "room").await;

        assert_eq!(table.teardown("stranger").await, None);
        assert_eq!(table.teardown("stranger").await, None);
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_joins_single_sender() {
        let table = Arc::new(RoomTable::new());
        let mut handles = vec![];

        for i in 0..16 {
            let t = table.clone();
            handles.push(tokio::spawn(async move {
                t.join(&format!("conn_{}", i), "race").await
            }));
        }

        let mut senders = 0;
        let mut receivers = 0;
        let mut rejected = 0;
        for h in handles {
            match h.await.unwrap() {
                JoinOutcome::Joined {
                    role: Role::Sender, ..
                } => senders += 1,
                JoinOutcome::Joined {
                    role: Role::Receiver,
                    ..
                } => receivers += 1,
                JoinOutcome::Full => rejected += 1,
            }
        }

        assert_eq!(senders, 1);
        assert_eq!(receivers, 1);
        assert_eq!(rejected, 14);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Sender).unwrap(), "\"sender\"");
        assert_eq!(
            serde_json::to_string(&Role::Receiver).unwrap(),
            "\"receiver\""
        );
    }
}
