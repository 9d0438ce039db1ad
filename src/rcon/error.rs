//! RCON error types.

use std::io;
use std::time::Duration;

/// Errors returned by RCON operations.
///
/// Every remote call resolves to one of these instead of unwinding, so a
/// single failed probe never ends the daemon loop.
#[derive(thiserror::Error, Debug)]
pub enum RconError {
    /// The TCP connection could not be established.
    #[error("Server at {addr} is unreachable: {source}")]
    Unreachable {
        /// Address that was dialled.
        addr: String,
        /// Underlying connect error.
        source: io::Error,
    },

    /// Connect or command exchange exceeded the configured timeout.
    #[error("RCON exchange timed out after {0:?}")]
    Timeout(Duration),

    /// The server refused the shared secret.
    #[error("RCON authentication rejected")]
    AuthRejected,

    /// The server closed the connection mid-exchange.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// The server sent something that is not a valid RCON packet.
    #[error("Protocol fault: {0}")]
    Protocol(String),

    /// Any other I/O error.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl RconError {
    /// Build the error for a failed connect attempt.
    #[must_use]
    pub fn unreachable(addr: impl Into<String>, source: io::Error) -> Self {
        Self::Unreachable {
            addr: addr.into(),
            source,
        }
    }

    /// True for faults that mean "the server cannot be reached right now".
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::Timeout(_) | Self::ConnectionClosed
        )
    }
}

impl From<io::Error> for RconError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::ConnectionClosed,
            _ => Self::Io(err),
        }
    }
}
