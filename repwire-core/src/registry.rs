//! Pipe registry.
//!
//! Owns every attached [`Pipe`] and the [`FairQueue`] rotation over them.
//! It is the only structure touched by more than one actor: the socket reads
//! and writes through it while transports register and unregister pipes
//! from their own threads. One mutex covers the table and the rotation, so
//! a pipe is either fully attached or fully gone for every caller:
//!
//! - `unregister` removes the pipe before it is dropped; no read can start
//!   on a pipe after teardown begins
//! - `try_enqueue` on a removed id resolves to "gone" instead of touching a
//!   dangling pipe
//!
//! A bounded(1) readiness channel wakes a receiver waiting for input.

use crate::fair_queue::FairQueue;
use crate::message::Message;
use crate::monitor::{emit, SocketEvent, SocketEventSender};
use crate::pipe::{Pipe, PipeId};
use flume::{Receiver, Sender, TrySendError};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Default)]
struct Inner {
    pipes: HashMap<PipeId, Pipe>,
    fair_queue: FairQueue,
    monitor: Option<SocketEventSender>,
}

impl Inner {
    fn remove(&mut self, id: PipeId) -> Option<Pipe> {
        let pipe = self.pipes.remove(&id)?;
        self.fair_queue.detach(id);
        emit(self.monitor.as_ref(), SocketEvent::PipeDetached(id));
        Some(pipe)
    }

    fn reap_closed(&mut self) -> Vec<Pipe> {
        let closed: Vec<PipeId> = self
            .pipes
            .iter()
            .filter(|(_, pipe)| pipe.is_closed())
            .map(|(id, _)| *id)
            .collect();
        closed.into_iter().filter_map(|id| self.remove(id)).collect()
    }
}

/// Outcome of [`PipeRegistry::try_enqueue`].
#[derive(Debug)]
pub enum Enqueue {
    /// Message is on the pipe's outbound queue.
    Queued,
    /// Pipe is at its send high water mark; message returned.
    Full(Message),
    /// Pipe is not registered (or its peer is gone); message returned.
    Gone(Message),
}

/// The set of live pipes feeding one socket.
pub struct PipeRegistry {
    inner: Mutex<Inner>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl PipeRegistry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        let (wake_tx, wake_rx) = flume::bounded(1);
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            wake_tx,
            wake_rx,
        })
    }

    /// Route lifecycle events to a monitor.
    pub fn set_monitor(&self, monitor: SocketEventSender) {
        self.inner.lock().monitor = Some(monitor);
    }

    /// Add a pipe at the tail of the fair-queue rotation.
    pub fn register(self: &Arc<Self>, pipe: Pipe) {
        let id = pipe.id();
        pipe.link(Arc::downgrade(self), self.wake_tx.clone());
        let readable = pipe.is_readable();

        {
            let mut inner = self.inner.lock();
            inner.fair_queue.attach(id);
            inner.pipes.insert(id, pipe);
            emit(inner.monitor.as_ref(), SocketEvent::PipeAttached(id));
        }
        debug!(pipe = %id, "[REGISTRY] Pipe attached");

        // Requests queued before registration never signalled readiness.
        if readable {
            self.wake();
        }
    }

    /// Remove a pipe. Returns false if it was not registered.
    ///
    /// Any message queued on the pipe but not yet dequeued is discarded.
    pub fn unregister(&self, id: PipeId) -> bool {
        // Drop the pipe outside the lock.
        let removed = self.inner.lock().remove(id);
        match removed {
            Some(pipe) => {
                debug!(pipe = %id, discarded = pipe.pending(), "[REGISTRY] Pipe detached");
                true
            }
            None => false,
        }
    }

    /// Remove every pipe.
    pub fn clear(&self) -> usize {
        let drained: Vec<Pipe> = {
            let mut inner = self.inner.lock();
            let ids: Vec<PipeId> = inner.fair_queue.iter_from_cursor().collect();
            ids.into_iter().filter_map(|id| inner.remove(id)).collect()
        };
        debug!(count = drained.len(), "[REGISTRY] All pipes detached");
        drained.len()
    }

    /// Returns true if the pipe is registered and its peer is still there.
    pub fn is_alive(&self, id: PipeId) -> bool {
        self.inner
            .lock()
            .pipes
            .get(&id)
            .is_some_and(|pipe| !pipe.is_closed())
    }

    /// Ids of pipes with queued input, in rotation order from the cursor.
    pub fn list_readable(&self) -> Vec<PipeId> {
        let inner = self.inner.lock();
        inner
            .fair_queue
            .iter_from_cursor()
            .filter(|id| inner.pipes.get(id).is_some_and(Pipe::is_readable))
            .collect()
    }

    /// Pick the next readable pipe (round-robin) without dequeuing.
    pub fn next_readable(&self) -> Option<PipeId> {
        let mut inner = self.inner.lock();
        let Inner {
            pipes, fair_queue, ..
        } = &mut *inner;
        fair_queue.next_readable(|id| pipes.get(&id).is_some_and(Pipe::is_readable))
    }

    /// Pick the next readable pipe and take one message from it.
    ///
    /// Selection and dequeue happen under one lock, so the pipe cannot be
    /// torn down between the two. Pipes whose peer has gone are reaped first.
    pub fn next_message(&self) -> Option<(PipeId, Message)> {
        let (picked, reaped) = {
            let mut inner = self.inner.lock();
            let reaped = inner.reap_closed();
            let Inner {
                pipes, fair_queue, ..
            } = &mut *inner;
            let picked = fair_queue
                .next_readable(|id| pipes.get(&id).is_some_and(Pipe::is_readable))
                .and_then(|id| pipes.get(&id).and_then(Pipe::try_dequeue).map(|msg| (id, msg)));
            (picked, reaped)
        };

        for pipe in &reaped {
            debug!(pipe = %pipe.id(), "[REGISTRY] Reaped disconnected pipe");
        }
        if let Some((id, msg)) = &picked {
            trace!(pipe = %id, frames = msg.len(), "[FQ] Dequeued");
        }
        picked
    }

    /// Queue a message on a pipe's outbound side.
    pub fn try_enqueue(&self, id: PipeId, msg: Message) -> Enqueue {
        let inner = self.inner.lock();
        let Some(pipe) = inner.pipes.get(&id) else {
            return Enqueue::Gone(msg);
        };
        match pipe.offer(msg) {
            Ok(()) => Enqueue::Queued,
            Err(TrySendError::Full(msg)) => Enqueue::Full(msg),
            Err(TrySendError::Disconnected(msg)) => Enqueue::Gone(msg),
        }
    }

    /// Number of registered pipes whose peer is still there.
    pub fn len(&self) -> usize {
        let mut inner = self.inner.lock();
        let _reaped = inner.reap_closed();
        inner.pipes.len()
    }

    /// Returns true if no pipes are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Readiness signal: yields after a registered pipe receives input.
    ///
    /// Signals may be spurious; callers rescan with [`next_message`](Self::next_message).
    pub fn readiness(&self) -> &Receiver<()> {
        &self.wake_rx
    }

    /// Wake a waiting receiver.
    pub fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }
}
