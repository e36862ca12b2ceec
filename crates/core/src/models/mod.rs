//! Core data models

pub mod player;
pub mod room;
pub mod settings;

pub use player::{Player, Role};
pub use room::{Room, DEFAULT_MAX_PLAYERS, RECOMMENDED_PLAYERS};
pub use settings::{RoleChoice, RoomSettings};
