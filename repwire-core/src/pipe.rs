//! Pipes: one active logical link to a peer.
//!
//! A pipe is a pair of single-producer/single-consumer queues. The socket
//! side ([`Pipe`]) is owned by the [`PipeRegistry`](crate::registry::PipeRegistry);
//! the transport side ([`PeerEnd`]) is held by whatever moves frames on and
//! off the wire (or, in-process, by the requester itself).
//!
//! ```text
//!   PeerEnd::send ──inbound──▶ Pipe::try_dequeue   (requests)
//!   PeerEnd::recv ◀─outbound── Pipe::try_enqueue   (replies)
//! ```
//!
//! Dropping the `PeerEnd` disconnects both queues and unregisters the pipe.

use crate::error::{RepError, Result};
use crate::message::Message;
use crate::registry::PipeRegistry;
use flume::{Receiver, Sender, TryRecvError, TrySendError};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::trace;

static NEXT_PIPE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable pipe identity, used only for attribution and equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipeId(u64);

impl PipeId {
    fn next() -> Self {
        Self(NEXT_PIPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Build an id from a raw value (tests and diagnostics).
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registry attachment shared by both ends, filled in on `register`.
struct Link {
    registry: Weak<PipeRegistry>,
    wake: Sender<()>,
}

type SharedLink = Arc<OnceCell<Link>>;

fn channel(hwm: usize) -> (Sender<Message>, Receiver<Message>) {
    if hwm == 0 {
        flume::unbounded()
    } else {
        flume::bounded(hwm)
    }
}

/// Socket side of a pipe.
pub struct Pipe {
    id: PipeId,
    inbound: Receiver<Message>,
    outbound: Sender<Message>,
    link: SharedLink,
}

impl Pipe {
    /// Create a connected pipe pair.
    ///
    /// `recv_hwm` bounds requests queued toward the socket, `send_hwm`
    /// bounds replies queued toward the peer. `0` means unbounded.
    pub fn pair(recv_hwm: usize, send_hwm: usize) -> (Pipe, PeerEnd) {
        let id = PipeId::next();
        let (in_tx, in_rx) = channel(recv_hwm);
        let (out_tx, out_rx) = channel(send_hwm);
        let link: SharedLink = Arc::new(OnceCell::new());

        let pipe = Pipe {
            id,
            inbound: in_rx,
            outbound: out_tx,
            link: Arc::clone(&link),
        };
        let peer = PeerEnd {
            id,
            tx: in_tx,
            rx: out_rx,
            link,
        };
        (pipe, peer)
    }

    /// Pipe identity.
    #[inline]
    pub fn id(&self) -> PipeId {
        self.id
    }

    /// A request is waiting on the inbound queue.
    #[inline]
    pub fn is_readable(&self) -> bool {
        !self.is_closed() && !self.inbound.is_empty()
    }

    /// The outbound queue can take another reply.
    #[inline]
    pub fn is_writable(&self) -> bool {
        !self.is_closed() && !self.outbound.is_full()
    }

    /// The peer end has been dropped or closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inbound.is_disconnected() || self.outbound.is_disconnected()
    }

    /// Number of requests queued on the inbound side.
    #[inline]
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    /// Take the next inbound message, if any.
    pub fn try_dequeue(&self) -> Option<Message> {
        self.inbound.try_recv().ok()
    }

    /// Queue an outbound message without waiting.
    ///
    /// # Errors
    ///
    /// `Backpressure` when the send high water mark is reached,
    /// `Disconnected` when the peer end is gone.
    pub fn try_enqueue(&self, msg: Message) -> Result<()> {
        self.offer(msg).map_err(|e| match e {
            TrySendError::Full(_) => RepError::Backpressure,
            TrySendError::Disconnected(_) => RepError::Disconnected,
        })
    }

    /// Like `try_enqueue`, but hands the message back on failure.
    pub(crate) fn offer(&self, msg: Message) -> std::result::Result<(), TrySendError<Message>> {
        self.outbound.try_send(msg)
    }

    pub(crate) fn link(&self, registry: Weak<PipeRegistry>, wake: Sender<()>) {
        // A pipe is registered at most once; a second link is ignored.
        let _ = self.link.set(Link { registry, wake });
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipe")
            .field("id", &self.id)
            .field("pending", &self.inbound.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Transport / requester side of a pipe.
pub struct PeerEnd {
    id: PipeId,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    link: SharedLink,
}

impl PeerEnd {
    /// Pipe identity.
    #[inline]
    pub fn id(&self) -> PipeId {
        self.id
    }

    /// Queue a request toward the socket.
    ///
    /// # Errors
    ///
    /// `Backpressure` when the receive high water mark is reached,
    /// `Disconnected` once the socket has detached the pipe.
    pub fn send(&self, msg: impl Into<Message>) -> Result<()> {
        let msg = msg.into();
        trace!(pipe = %self.id, frames = msg.len(), "[PIPE] Peer enqueue");
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => RepError::Backpressure,
            TrySendError::Disconnected(_) => RepError::Disconnected,
        })?;
        if let Some(link) = self.link.get() {
            let _ = link.wake.try_send(());
        }
        Ok(())
    }

    /// Take the next reply, if one is queued.
    ///
    /// Returns `Ok(None)` when nothing is queued.
    ///
    /// # Errors
    ///
    /// `Disconnected` once the socket has detached the pipe and every
    /// queued reply has been drained.
    pub fn try_recv(&self) -> Result<Option<Message>> {
        match self.rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RepError::Disconnected),
        }
    }

    /// Wait for the next reply, blocking the current thread.
    ///
    /// Returns `Ok(None)` if nothing arrived within `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Message>> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Ok(Some(msg)),
            Err(flume::RecvTimeoutError::Timeout) => Ok(None),
            Err(flume::RecvTimeoutError::Disconnected) => Err(RepError::Disconnected),
        }
    }

    /// Wait for the next reply asynchronously.
    pub async fn recv(&self) -> Result<Message> {
        self.rx
            .recv_async()
            .await
            .map_err(|_| RepError::Disconnected)
    }

    /// Number of replies waiting to be drained.
    #[inline]
    pub fn pending_replies(&self) -> usize {
        self.rx.len()
    }

    /// The socket side has detached this pipe.
    #[inline]
    pub fn is_detached(&self) -> bool {
        self.tx.is_disconnected()
    }

    /// Disconnect from the socket.
    pub fn close(self) {}
}

impl fmt::Debug for PeerEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerEnd")
            .field("id", &self.id)
            .field("pending_replies", &self.rx.len())
            .finish()
    }
}

impl Drop for PeerEnd {
    fn drop(&mut self) {
        if let Some(registry) = self.link.get().and_then(|link| link.registry.upgrade()) {
            registry.unregister(self.id);
        }
    }
}
