//! Repwire Error Types
//!
//! Only protocol-sequence violations and use-after-close reach the
//! application from `RepSocket`; the remaining variants are raised on the
//! transport side of a pipe.

use std::io;
use thiserror::Error;

/// Main error type for repwire operations
#[derive(Error, Debug)]
pub enum RepError {
    /// The strict receive/send alternation was violated.
    #[error("Protocol sequence error: cannot {operation} while {state}")]
    ProtocolSequence {
        /// State the socket was in when the call was made
        state: &'static str,
        /// Operation that was attempted (`send` or `recv`)
        operation: &'static str,
    },

    /// Socket closed
    #[error("Socket closed")]
    SocketClosed,

    /// Invalid or unavailable endpoint
    #[error("Endpoint error: {0}")]
    Endpoint(String),

    /// Pipe queue is at its high water mark
    #[error("Pipe is full (high water mark reached)")]
    Backpressure,

    /// The other end of the pipe is gone
    #[error("Pipe disconnected")]
    Disconnected,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for repwire operations
pub type Result<T> = std::result::Result<T, RepError>;

impl RepError {
    /// Create a protocol-sequence error
    pub const fn sequence(state: &'static str, operation: &'static str) -> Self {
        Self::ProtocolSequence { state, operation }
    }

    /// Create an endpoint error with a message
    pub fn endpoint(msg: impl Into<String>) -> Self {
        Self::Endpoint(msg.into())
    }

    /// Check if this error is recoverable
    ///
    /// A protocol-sequence error is cleared by calling the other operation;
    /// backpressure clears once the peer drains its queue.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ProtocolSequence { .. } | Self::Backpressure => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Check if this is a connection error
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::SocketClosed | Self::Disconnected)
    }
}

impl From<RepError> for io::Error {
    fn from(err: RepError) -> Self {
        match err {
            RepError::Io(e) => e,
            RepError::ProtocolSequence { .. } => io::Error::new(io::ErrorKind::InvalidInput, err),
            RepError::SocketClosed | RepError::Disconnected => {
                io::Error::new(io::ErrorKind::NotConnected, err)
            }
            RepError::Backpressure => io::Error::new(io::ErrorKind::WouldBlock, err),
            RepError::Endpoint(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
        }
    }
}
