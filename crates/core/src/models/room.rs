//! Room model - one lobby identified by a short code

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::code::RoomCode;
use crate::error::{Error, Result};

use super::player::Player;
use super::settings::RoomSettings;

/// Hard cap on seated players per room
pub const DEFAULT_MAX_PLAYERS: usize = 19;

/// Suggested lobby size shown to hosts; never enforced server-side
pub const RECOMMENDED_PLAYERS: usize = 8;

/// A lobby room: ordered roster, settings, and narrator assignment.
///
/// All mutation goes through the coordinator's single event stream, so the
/// room itself carries no locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    players: Vec<Player>,
    pub day_count: u32,
    pub settings: Option<RoomSettings>,
    narrator: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    max_players: usize,
}

impl Room {
    pub fn new(code: RoomCode, max_players: usize) -> Self {
        Self {
            code,
            players: Vec::new(),
            day_count: 0,
            settings: None,
            narrator: None,
            created_at: Utc::now(),
            max_players,
        }
    }

    /// Roster in join order
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.players.iter().any(|p| p.id == id)
    }

    pub fn player(&self, id: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// The host seat, if the host is currently a member
    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.host)
    }

    /// The elected narrator, if any and still a member
    pub fn narrator(&self) -> Option<&Player> {
        self.narrator.and_then(|id| self.player(id))
    }

    pub fn narrator_id(&self) -> Option<Uuid> {
        self.narrator
    }

    /// Seat a player. Fails if the room is full or the name is taken
    /// (case-sensitive, room-local).
    pub fn add_player(&mut self, player: Player) -> Result<Player> {
        if self.players.len() >= self.max_players {
            return Err(Error::RoomFull(self.max_players));
        }
        if self.players.iter().any(|p| p.name == player.name) {
            return Err(Error::DuplicateName(player.name));
        }
        self.players.push(player.clone());
        Ok(player)
    }

    /// Remove the player with the given id. Absent ids are a no-op, not an
    /// error: leave and disconnect events may race and arrive twice.
    /// Returns whether the roster changed.
    pub fn remove_player(&mut self, id: Uuid) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        self.players.len() != before
    }

    /// Idempotent upsert for a returning client. An existing seat with the
    /// same id is left untouched; the client snapshot is only appended when
    /// the seat was already reaped. Never duplicates an id, and a snapshot
    /// whose name was meanwhile taken by another seat is rejected like any
    /// other join.
    pub fn rejoin(&mut self, snapshot: Player) -> Result<Player> {
        if let Some(existing) = self.player(snapshot.id) {
            return Ok(existing.clone());
        }
        if self.players.len() >= self.max_players {
            return Err(Error::RoomFull(self.max_players));
        }
        if self.players.iter().any(|p| p.name == snapshot.name) {
            return Err(Error::DuplicateName(snapshot.name));
        }
        self.players.push(snapshot.clone());
        Ok(snapshot)
    }

    /// Replace settings wholesale. Host-only, enforced by the coordinator.
    pub fn set_settings(&mut self, settings: RoomSettings) {
        self.settings = Some(settings);
    }

    /// Record the host-nominated narrator. The candidate may have
    /// disconnected mid-election, in which case the nomination fails and the
    /// narrator stays unset.
    pub fn elect_narrator(&mut self, candidate_id: Uuid) -> Result<Player> {
        let player = self
            .player(candidate_id)
            .cloned()
            .ok_or(Error::PlayerNotFound)?;
        self.narrator = Some(candidate_id);
        Ok(player)
    }

    /// Store the final settings and return the roster for broadcast.
    pub fn start_game(&mut self, settings: RoomSettings) -> Result<Vec<Player>> {
        if self.players.is_empty() {
            return Err(Error::EmptyRoom);
        }
        self.settings = Some(settings);
        Ok(self.players.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::player::Role;

    fn room() -> Room {
        Room::new("A1B2C3".parse().unwrap(), DEFAULT_MAX_PLAYERS)
    }

    fn player(name: &str) -> Player {
        Player::new(Uuid::new_v4(), name.to_string())
    }

    #[test]
    fn test_add_rejects_duplicate_name() {
        let mut room = room();
        room.add_player(player("Mario")).unwrap();
        let err = room.add_player(player("Mario")).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_)));
        assert_eq!(room.players().len(), 1);
    }

    #[test]
    fn test_add_rejects_when_full() {
        let mut room = Room::new("A1B2C3".parse().unwrap(), 2);
        room.add_player(player("a")).unwrap();
        room.add_player(player("b")).unwrap();
        let err = room.add_player(player("c")).unwrap_err();
        assert!(matches!(err, Error::RoomFull(2)));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut room = room();
        let p = player("Mario");
        room.add_player(p.clone()).unwrap();

        assert!(room.remove_player(p.id));
        // Duplicate delivery of the same disconnect
        assert!(!room.remove_player(p.id));
        assert!(room.is_empty());
    }

    #[test]
    fn test_rejoin_is_idempotent() {
        let mut room = room();
        let p = room.add_player(player("Mario")).unwrap();

        room.rejoin(p.clone()).unwrap();
        room.rejoin(p.clone()).unwrap();
        assert_eq!(room.players().len(), 1);
    }

    #[test]
    fn test_rejoin_keeps_existing_seat_untouched() {
        let mut room = room();
        let p = room.add_player(player("Mario")).unwrap();

        let mut forged = p.clone();
        forged.host = true;
        forged.score = 99;
        room.rejoin(forged).unwrap();

        let seated = room.player(p.id).unwrap();
        assert!(!seated.host);
        assert_eq!(seated.score, 0);
    }

    #[test]
    fn test_rejoin_rejects_name_taken_by_new_seat() {
        let mut room = room();
        let original = room.add_player(player("Mario")).unwrap();
        room.remove_player(original.id);

        // While the original client was away, a fresh client took the name
        room.add_player(player("Mario")).unwrap();

        let err = room.rejoin(original.clone()).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_)));
        assert_eq!(room.players().len(), 1);
        assert!(!room.contains(original.id));
    }

    #[test]
    fn test_names_stay_unique_across_leave_rejoin_sequences() {
        let mut room = room();
        let mario = room.add_player(player("Mario")).unwrap();
        room.add_player(player("Luigi")).unwrap();

        room.remove_player(mario.id);
        let usurper = room.add_player(player("Mario")).unwrap();
        let _ = room.rejoin(mario.clone());
        room.remove_player(usurper.id);
        room.rejoin(mario).unwrap();

        let mut names = std::collections::HashSet::new();
        assert!(room.players().iter().all(|p| names.insert(p.name.as_str())));
        let mut ids = std::collections::HashSet::new();
        assert!(room.players().iter().all(|p| ids.insert(p.id)));
    }

    #[test]
    fn test_rejoin_readmits_after_removal() {
        let mut room = room();
        let p = room.add_player(player("Mario")).unwrap();
        room.remove_player(p.id);

        room.rejoin(p.clone()).unwrap();
        assert!(room.contains(p.id));
        assert_eq!(room.players().len(), 1);
    }

    #[test]
    fn test_set_settings_replaces_wholesale() {
        let mut room = room();
        room.set_settings(RoomSettings {
            wolf_count: 2,
            day_secs: 120,
            night_secs: 60,
            roles: vec![],
        });
        room.set_settings(RoomSettings::default());
        assert_eq!(room.settings, Some(RoomSettings::default()));
    }

    #[test]
    fn test_start_game_empty_room() {
        let mut room = room();
        let err = room.start_game(RoomSettings::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyRoom));
        assert!(room.settings.is_none());
        assert_eq!(room.day_count, 0);
    }

    #[test]
    fn test_start_game_returns_roster() {
        let mut room = room();
        room.add_player(player("Mario")).unwrap();
        room.add_player(player("Luigi")).unwrap();

        let roster = room.start_game(RoomSettings::default()).unwrap();
        assert_eq!(roster.len(), 2);
        assert!(room.settings.is_some());
    }

    #[test]
    fn test_elect_narrator_requires_membership() {
        let mut room = room();
        room.add_player(player("Mario")).unwrap();

        let err = room.elect_narrator(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, Error::PlayerNotFound));
        assert!(room.narrator().is_none());
    }

    #[test]
    fn test_elect_narrator_records_member() {
        let mut room = room();
        let p = room.add_player(player("Mario")).unwrap();

        let chosen = room.elect_narrator(p.id).unwrap();
        assert_eq!(chosen.id, p.id);
        assert_eq!(room.narrator().unwrap().id, p.id);
        // Election records the nomination; the role itself is assigned later
        assert_ne!(room.narrator().unwrap().role, Some(Role::Narrator));
    }
}
