//! Network error types

use std::io;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Local guard: the link is down, the request never left this process
    #[error("Not connected")]
    NotConnected,

    /// The server acknowledged the request with a failure
    #[error("{0}")]
    Rejected(String),
}
