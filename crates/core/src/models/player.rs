//! Player model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Game roles and their alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Narrator,
    Werewolf,
    Seer,
    Necromancer,
    Villager,
    Guard,
}

impl Role {
    /// Whether the role is on the village side
    pub fn is_good(self) -> bool {
        !matches!(self, Role::Werewolf)
    }
}

/// A seated player in a room
///
/// The `id` is the stable client identifier, not the transport connection id,
/// so it survives reconnection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub host: bool,
    pub role: Option<Role>,
    pub alive: bool,
    pub votes: u32,
    pub score: u32,
}

impl Player {
    pub fn new(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            host: false,
            role: None,
            alive: true,
            votes: 0,
            score: 0,
        }
    }

    /// Mark this player as the room's host. Used only on the create path.
    pub fn as_host(mut self) -> Self {
        self.host = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_defaults() {
        let p = Player::new(Uuid::new_v4(), "Mario".to_string());
        assert!(!p.host);
        assert!(p.alive);
        assert!(p.role.is_none());
        assert_eq!(p.votes, 0);
        assert_eq!(p.score, 0);
    }

    #[test]
    fn test_role_alignment() {
        assert!(Role::Seer.is_good());
        assert!(Role::Narrator.is_good());
        assert!(!Role::Werewolf.is_good());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Werewolf).unwrap();
        assert_eq!(json, "\"werewolf\"");
    }
}
