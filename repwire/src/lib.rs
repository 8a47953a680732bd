//! # Repwire
//!
//! The responder half of a ZeroMQ-style request-reply pattern: a REP socket
//! that accepts many requester peers, fair-queues their requests and routes
//! every reply back to the peer that asked.
//!
//! ## Architecture
//!
//! - **`repwire-core`**: pipes, the shared pipe registry, the fair-queue
//!   rotation, message model, options, monitoring, inproc transport
//! - **`repwire`**: envelope codec, reply state machine, output router and
//!   the public [`RepSocket`] (this crate)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use repwire::{Message, RepSocket};
//!
//! # async fn example() -> repwire::Result<()> {
//! let mut socket = RepSocket::bind("inproc://echo")?;
//!
//! // Echo server
//! while let Some(request) = socket.recv().await? {
//!     socket.send(request)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - Strict alternation: `recv`, `send`, `recv`, ... per socket
//! - Exactly one reply per accepted request, to the originating pipe only
//! - Replies to disconnected peers vanish silently
//! - Per-pipe order is preserved; no order is promised across pipes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dev_tracing;
pub mod envelope;
pub mod rep;
pub mod router;
pub mod state;

// Re-export core types
pub use bytes::Bytes;
pub use rep::RepSocket;
pub use repwire_core::error::{RepError, Result};
pub use repwire_core::message::{Frame, Message};
pub use repwire_core::options::SocketOptions;
pub use state::RepState;

/// Convenient imports.
///
/// ```rust
/// use repwire::prelude::*;
///
/// let socket = RepSocket::new();
/// assert_eq!(socket.state(), RepState::Idle);
/// ```
pub mod prelude {
    pub use super::{Bytes, Message, RepError, RepSocket, RepState, SocketOptions};
    pub use repwire_core::inproc::connect_inproc;
    pub use repwire_core::monitor::{DropReason, SocketEvent};
    pub use repwire_core::pipe::{PeerEnd, Pipe, PipeId};
}
