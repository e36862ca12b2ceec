//! Wire protocol message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire. Every
//! request carries a client-chosen `seq` echoed in its ack, so acks can be
//! correlated even though broadcasts interleave on the same connection.
//! Broadcasts always carry the authoritative full roster, never a diff.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lupine_core::{Player, RoomCode, RoomSettings};

/// Wire messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// First frame from every connection. A missing id means a fresh client;
    /// a present id is the stable identity from a previous session.
    Hello { client_id: Option<Uuid> },

    /// Handshake response binding the connection to a stable client id
    Welcome { client_id: Uuid },

    /// Client request awaiting an ack
    Request { seq: u64, request: Request },

    /// Acknowledgement for the request with the same `seq`
    Ack { seq: u64, reply: Reply },

    /// Room-wide notification, no ack
    Broadcast(Broadcast),
}

/// Client-initiated operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Request {
    CreateLobby {
        player_name: String,
    },
    JoinLobby {
        room_code: RoomCode,
        player_name: String,
    },
    RejoinPlayer {
        room_code: RoomCode,
        player: Player,
    },
    ExitRoom {
        room_code: RoomCode,
    },
    GetPlayers {
        room_code: RoomCode,
    },
    GameStart {
        room_code: RoomCode,
        settings: RoomSettings,
    },
    ChooseNarrator {
        room_code: RoomCode,
        player_id: Uuid,
    },
}

/// Ack payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result")]
pub enum Reply {
    Created { player: Player, room_code: RoomCode },
    Joined { player: Player },
    Rejoined { players: Vec<Player> },
    Exited { players: Vec<Player> },
    Players { players: Vec<Player> },
    Started { players: Vec<Player> },
    NarratorChosen,
    Error { message: String },
}

/// Server-to-room notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Broadcast {
    PlayerJoined { players: Vec<Player> },
    PlayerLeft { players: Vec<Player> },
    GameStarted { players: Vec<Player> },
    NarratorChosen { player: Player },
}

impl Message {
    /// Serialize message to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize message from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
