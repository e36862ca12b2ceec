//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible room states during development.
//! These checks are compiled out in release builds.

use std::collections::HashSet;

use crate::models::Room;
use crate::registry::Registry;

/// Validate that a room's roster is internally consistent
pub fn assert_room_invariants(room: &Room) {
    let host_count = room.players().iter().filter(|p| p.host).count();
    debug_assert!(
        host_count <= 1,
        "Room {} has {} hosts, expected 0 or 1",
        room.code,
        host_count
    );

    let mut ids = HashSet::new();
    debug_assert!(
        room.players().iter().all(|p| ids.insert(p.id)),
        "Room {} has duplicate player ids",
        room.code
    );

    let mut names = HashSet::new();
    debug_assert!(
        room.players().iter().all(|p| names.insert(p.name.as_str())),
        "Room {} has duplicate player names",
        room.code
    );

    if let Some(narrator_id) = room.narrator_id() {
        debug_assert!(
            room.contains(narrator_id),
            "Room {} narrator {} is not a member",
            room.code,
            narrator_id
        );
    }
}

/// Validate that the registry holds no empty rooms
pub fn assert_registry_invariants(registry: &Registry) {
    debug_assert!(
        registry.len() < 10_000,
        "Registry holds {} rooms, likely a reap leak",
        registry.len()
    );
}
