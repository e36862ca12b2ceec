//! Error types for Lupine Core

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Player {0} is already in the room")]
    DuplicateName(String),

    #[error("Room is full ({0} players max)")]
    RoomFull(usize),

    #[error("Player not found in room")]
    PlayerNotFound,

    #[error("Cannot start a game with no players")]
    EmptyRoom,

    #[error("Room code space exhausted after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error("Invalid room code: {0}")]
    InvalidCode(String),
}

pub type Result<T> = std::result::Result<T, Error>;
