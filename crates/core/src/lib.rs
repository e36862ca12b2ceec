//! Lupine Core Library
//!
//! Domain model for the lobby coordination layer: rooms, players, settings,
//! join codes, and the registry of live rooms. This crate is synchronous and
//! I/O-free; all mutation ordering guarantees come from the coordinator in
//! `lupine-net`.

pub mod code;
pub mod error;
pub mod invariants;
pub mod models;
pub mod registry;

pub use code::{RoomCode, CODE_LEN};
pub use error::{Error, Result};
pub use models::{Player, RoleChoice, Role, Room, RoomSettings, DEFAULT_MAX_PLAYERS, RECOMMENDED_PLAYERS};
pub use registry::Registry;
