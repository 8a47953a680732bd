//! REP reply state machine.
//!
//! ```text
//!            recv (request accepted)
//!   Idle ──────────────────────────────▶ ReplyOwed(envelope, pipe)
//!     ▲                                        │
//!     └────────────── send (reply routed) ─────┘
//! ```
//!
//! `send` while `Idle` and `recv` while `ReplyOwed` fail with a
//! protocol-sequence error and leave the state untouched. At most one
//! envelope/pipe pair is held at a time; the pipe is referenced by id only.

use crate::envelope::Envelope;
use repwire_core::error::{RepError, Result};
use repwire_core::pipe::PipeId;
use std::fmt;

/// Public view of the REP state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepState {
    /// No reply owed; the next call must be `recv`.
    Idle,
    /// A request was delivered; the next call must be `send`.
    ReplyOwed,
}

impl RepState {
    const fn describe(self) -> &'static str {
        match self {
            Self::Idle => "idle (no request received)",
            Self::ReplyOwed => "a reply is owed",
        }
    }
}

impl fmt::Display for RepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "Idle",
            Self::ReplyOwed => "ReplyOwed",
        })
    }
}

/// Routing state held by one REP socket.
#[derive(Debug, Default)]
pub enum ReplyState {
    /// No reply owed.
    #[default]
    Idle,
    /// A reply must go to `pipe`, prefixed by `envelope`.
    ReplyOwed {
        /// Envelope captured from the request
        envelope: Envelope,
        /// Pipe the request arrived on
        pipe: PipeId,
    },
}

impl ReplyState {
    /// Public view of the current state.
    pub const fn kind(&self) -> RepState {
        match self {
            Self::Idle => RepState::Idle,
            Self::ReplyOwed { .. } => RepState::ReplyOwed,
        }
    }

    /// Pipe currently owed a reply.
    pub const fn owed_pipe(&self) -> Option<PipeId> {
        match self {
            Self::Idle => None,
            Self::ReplyOwed { pipe, .. } => Some(*pipe),
        }
    }

    /// Fails unless a request may be accepted now.
    pub fn check_recv(&self) -> Result<()> {
        match self {
            Self::Idle => Ok(()),
            Self::ReplyOwed { .. } => Err(RepError::sequence(RepState::ReplyOwed.describe(), "recv")),
        }
    }

    /// `Idle -> ReplyOwed`: remember where the reply must go.
    pub fn accept(&mut self, envelope: Envelope, pipe: PipeId) -> Result<()> {
        self.check_recv()?;
        *self = Self::ReplyOwed { envelope, pipe };
        Ok(())
    }

    /// `ReplyOwed -> Idle`: hand back the stored envelope and pipe.
    pub fn take_reply(&mut self) -> Result<(Envelope, PipeId)> {
        match std::mem::take(self) {
            Self::ReplyOwed { envelope, pipe } => Ok((envelope, pipe)),
            Self::Idle => Err(RepError::sequence(RepState::Idle.describe(), "send")),
        }
    }

    /// Drop any pending obligation (socket close). Returns the pipe that
    /// would have received the reply.
    pub fn reset(&mut self) -> Option<PipeId> {
        std::mem::take(self).owed_pipe()
    }
}
