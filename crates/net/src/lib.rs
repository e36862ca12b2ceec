//! Lupine Network Library
//!
//! TCP transport for the lobby coordination layer.
//!
//! # Architecture
//!
//! - **Server**: one coordinator task owns the room registry; connection
//!   tasks only parse frames and forward events, so every room mutation is
//!   applied on a single ordered stream
//! - **Client**: session manager with request/ack correlation and automatic
//!   rejoin replay on reconnect
//! - **Protocol**: length-prefixed JSON messages
//!
//! # Usage
//!
//! ```ignore
//! // Operator starts a server
//! let server = Server::start(3070, ServerConfig::default()).await?;
//!
//! // Client connects (pass a stored session blob to reconnect)
//! let mut client = Client::connect(addr, None).await?;
//!
//! // Process events
//! while let Some(event) = client.next_event().await {
//!     match event {
//!         ClientEvent::RosterUpdated { players } => { /* re-render */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod server;
pub mod session;

pub use client::{Client, ClientEvent, ConnectionState};
pub use error::{Error, Result};
pub use protocol::{Broadcast, Message, Reply, Request};
pub use server::{Server, ServerConfig};
pub use session::SessionBlob;

/// Default port for Lupine servers
pub const DEFAULT_PORT: u16 = 3070;
