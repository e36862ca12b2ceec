//! Client-persisted session blob
//!
//! The embedder stores this opaquely (a cookie, a file, local storage) and
//! hands it back on the next connect; the server only ever sees the fields
//! the client resends as explicit request arguments.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lupine_core::{Player, RoomCode};

/// Everything a client needs to reclaim its seat after a reconnect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBlob {
    pub client_id: Uuid,
    pub room_code: Option<RoomCode>,
    pub player: Option<Player>,
    pub room_players: Vec<Player>,
    pub narrator: Option<Player>,
}

impl SessionBlob {
    /// A session with an identity but no room membership
    pub fn fresh(client_id: Uuid) -> Self {
        Self {
            client_id,
            room_code: None,
            player: None,
            room_players: Vec::new(),
            narrator: None,
        }
    }

    /// Whether this session names a seat worth replaying on reconnect
    pub fn has_seat(&self) -> bool {
        self.room_code.is_some() && self.player.is_some()
    }

    /// Drop room membership, keeping the stable identity
    pub fn leave_room(&mut self) {
        self.room_code = None;
        self.player = None;
        self.room_players.clear();
        self.narrator = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_has_no_seat() {
        let blob = SessionBlob::fresh(Uuid::new_v4());
        assert!(!blob.has_seat());
    }

    #[test]
    fn test_blob_roundtrip() {
        let mut blob = SessionBlob::fresh(Uuid::new_v4());
        blob.room_code = Some("A1B2C3".parse().unwrap());
        blob.player = Some(Player::new(blob.client_id, "Mario".to_string()));

        let json = serde_json::to_string(&blob).unwrap();
        let back: SessionBlob = serde_json::from_str(&json).unwrap();
        assert_eq!(back.client_id, blob.client_id);
        assert!(back.has_seat());
    }

    #[test]
    fn test_leave_room_keeps_identity() {
        let mut blob = SessionBlob::fresh(Uuid::new_v4());
        let id = blob.client_id;
        blob.room_code = Some("A1B2C3".parse().unwrap());
        blob.player = Some(Player::new(id, "Mario".to_string()));

        blob.leave_room();
        assert_eq!(blob.client_id, id);
        assert!(!blob.has_seat());
        assert!(blob.room_players.is_empty());
    }
}
