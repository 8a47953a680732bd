//! Socket event monitoring.
//!
//! Provides event streams for tracking pipe lifecycle and the messages the
//! REP core absorbs instead of surfacing as errors.

use crate::pipe::PipeId;
use std::fmt;

/// Why a message was discarded by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Request carried no empty delimiter frame.
    MissingDelimiter,
    /// Request exceeded the configured maximum message size.
    TooLarge,
    /// Request carried more frames than the configured maximum.
    TooManyFrames,
    /// Reply target pipe was no longer registered.
    PeerGone,
    /// Reply target pipe was at its send high water mark.
    PipeFull,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingDelimiter => "missing delimiter",
            Self::TooLarge => "too large",
            Self::TooManyFrames => "too many frames",
            Self::PeerGone => "peer gone",
            Self::PipeFull => "pipe full",
        };
        f.write_str(s)
    }
}

/// Socket lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// A pipe joined the fair-queue rotation.
    PipeAttached(PipeId),

    /// A pipe left the rotation (peer disconnect or local close).
    PipeDetached(PipeId),

    /// An inbound request was dropped before reaching the application.
    RequestDropped { pipe: PipeId, reason: DropReason },

    /// A reply was discarded instead of being queued.
    ReplyDropped { pipe: PipeId, reason: DropReason },

    /// Socket bound to an endpoint.
    Bound(String),

    /// Socket closed.
    Closed,
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PipeAttached(id) => write!(f, "Pipe {id} attached"),
            Self::PipeDetached(id) => write!(f, "Pipe {id} detached"),
            Self::RequestDropped { pipe, reason } => {
                write!(f, "Request from pipe {pipe} dropped: {reason}")
            }
            Self::ReplyDropped { pipe, reason } => {
                write!(f, "Reply to pipe {pipe} dropped: {reason}")
            }
            Self::Bound(ep) => write!(f, "Bound to {ep}"),
            Self::Closed => f.write_str("Closed"),
        }
    }
}

/// Handle for receiving socket events.
pub type SocketMonitor = flume::Receiver<SocketEvent>;

/// Internal sender for socket events.
pub type SocketEventSender = flume::Sender<SocketEvent>;

/// Creates a new monitoring channel pair.
#[must_use]
pub fn create_monitor() -> (SocketEventSender, SocketMonitor) {
    flume::unbounded()
}

/// Best-effort emit: a dropped monitor never affects the socket.
#[inline]
pub fn emit(sender: Option<&SocketEventSender>, event: SocketEvent) {
    if let Some(tx) = sender {
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_event_display() {
        let event = SocketEvent::ReplyDropped {
            pipe: PipeId::from_raw(7),
            reason: DropReason::PeerGone,
        };
        assert_eq!(event.to_string(), "Reply to pipe #7 dropped: peer gone");
    }

    #[test]
    fn test_monitor_channel() {
        let (sender, receiver) = create_monitor();
        emit(Some(&sender), SocketEvent::PipeAttached(PipeId::from_raw(1)));
        emit(None, SocketEvent::Closed);

        let event = receiver.try_recv().unwrap();
        assert!(matches!(event, SocketEvent::PipeAttached(_)));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_emit_after_monitor_dropped() {
        let (sender, receiver) = create_monitor();
        drop(receiver);
        emit(Some(&sender), SocketEvent::Closed);
    }
}
