//! Room registry - the server-owned collection of live rooms
//!
//! One registry instance is constructed at startup and handed to the
//! coordinator; it is never reachable through ambient state, so tests get a
//! fresh instance each.

use std::collections::HashMap;

use uuid::Uuid;

use crate::code::RoomCode;
use crate::error::{Error, Result};
use crate::models::Room;

/// Collision retries before code generation gives up. With a 36^6 code space
/// this is never hit in practice; exceeding it is an operational alarm.
const MAX_CODE_RETRIES: usize = 50;

/// Registry of live rooms keyed by code
#[derive(Debug, Default)]
pub struct Registry {
    rooms: HashMap<RoomCode, Room>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Create an empty room under a freshly generated unique code.
    pub fn create_room(&mut self, max_players: usize) -> Result<RoomCode> {
        let mut code = RoomCode::generate();
        let mut retries = 0;
        while self.rooms.contains_key(&code) {
            retries += 1;
            if retries > MAX_CODE_RETRIES {
                return Err(Error::CodeSpaceExhausted(MAX_CODE_RETRIES));
            }
            code = RoomCode::generate();
        }

        tracing::info!(room = %code, "Room created");
        self.rooms
            .insert(code.clone(), Room::new(code.clone(), max_players));
        Ok(code)
    }

    /// Lookup. Absence is not an error; callers branch on it.
    pub fn get(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn get_mut(&mut self, code: &RoomCode) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    pub fn contains(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Delete the room iff its roster is empty. Called after every
    /// membership removal.
    pub fn remove_if_empty(&mut self, code: &RoomCode) {
        if self.rooms.get(code).is_some_and(|r| r.is_empty()) {
            tracing::info!(room = %code, "Reaping empty room");
            self.rooms.remove(code);
        }
    }

    /// Eager removal on disconnect: drop the client from every room it sits
    /// in and reap any room that emptied. Returns the codes whose roster
    /// changed, paired with the remaining roster, so the caller can
    /// broadcast.
    pub fn remove_player_everywhere(
        &mut self,
        client_id: Uuid,
    ) -> Vec<(RoomCode, Vec<crate::models::Player>)> {
        let mut affected = Vec::new();
        for (code, room) in self.rooms.iter_mut() {
            if room.remove_player(client_id) {
                tracing::info!(room = %code, client_id = %client_id, "Player removed on disconnect");
                affected.push((code.clone(), room.players().to_vec()));
            }
        }
        for (code, _) in &affected {
            self.remove_if_empty(code);
        }
        affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Player, DEFAULT_MAX_PLAYERS};

    fn seat(registry: &mut Registry, code: &RoomCode, name: &str) -> Player {
        let player = Player::new(Uuid::new_v4(), name.to_string());
        registry
            .get_mut(code)
            .unwrap()
            .add_player(player)
            .unwrap()
    }

    #[test]
    fn test_create_room_unique_codes() {
        let mut registry = Registry::new();
        let mut codes = std::collections::HashSet::new();
        for _ in 0..100 {
            let code = registry.create_room(DEFAULT_MAX_PLAYERS).unwrap();
            assert!(codes.insert(code));
        }
        assert_eq!(registry.len(), 100);
    }

    #[test]
    fn test_get_missing_room() {
        let registry = Registry::new();
        let code: RoomCode = "A1B2C3".parse().unwrap();
        assert!(registry.get(&code).is_none());
    }

    #[test]
    fn test_remove_if_empty_only_reaps_empty() {
        let mut registry = Registry::new();
        let code = registry.create_room(DEFAULT_MAX_PLAYERS).unwrap();
        seat(&mut registry, &code, "Mario");

        registry.remove_if_empty(&code);
        assert!(registry.contains(&code));

        let id = registry.get(&code).unwrap().players()[0].id;
        registry.get_mut(&code).unwrap().remove_player(id);
        registry.remove_if_empty(&code);
        assert!(!registry.contains(&code));
    }

    #[test]
    fn test_remove_player_everywhere_reaps() {
        let mut registry = Registry::new();
        let code = registry.create_room(DEFAULT_MAX_PLAYERS).unwrap();
        let player = seat(&mut registry, &code, "Mario");

        let affected = registry.remove_player_everywhere(player.id);
        assert_eq!(affected.len(), 1);
        assert_eq!(affected[0].0, code);
        assert!(affected[0].1.is_empty());
        assert!(!registry.contains(&code));
    }

    #[test]
    fn test_duplicate_disconnect_is_noop() {
        let mut registry = Registry::new();
        let code = registry.create_room(DEFAULT_MAX_PLAYERS).unwrap();
        seat(&mut registry, &code, "Mario");
        let player = seat(&mut registry, &code, "Luigi");

        let first = registry.remove_player_everywhere(player.id);
        assert_eq!(first.len(), 1);
        assert_eq!(registry.get(&code).unwrap().players().len(), 1);

        // Second delivery of the same disconnect changes nothing
        let second = registry.remove_player_everywhere(player.id);
        assert!(second.is_empty());
        assert_eq!(registry.get(&code).unwrap().players().len(), 1);
    }
}
