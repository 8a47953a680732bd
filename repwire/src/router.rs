//! Output router: delivers a reply to the one pipe it belongs to.
//!
//! A reply whose pipe has vanished is discarded (libzmq behavior); so is a
//! reply that finds its pipe at the send high water mark. Neither is an
//! application-visible error.

use repwire_core::message::Message;
use repwire_core::monitor::DropReason;
use repwire_core::pipe::PipeId;
use repwire_core::registry::{Enqueue, PipeRegistry};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Result of a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Reply is on the pipe's outbound queue.
    Queued,
    /// Reply was discarded.
    Dropped(DropReason),
}

/// Routes replies through the pipe registry.
#[derive(Clone)]
pub struct OutputRouter {
    registry: Arc<PipeRegistry>,
}

impl OutputRouter {
    /// Create a router over `registry`.
    pub fn new(registry: Arc<PipeRegistry>) -> Self {
        Self { registry }
    }

    /// Enqueue `msg` on `pipe`, or discard it if the pipe cannot take it.
    pub fn deliver(&self, pipe: PipeId, msg: Message) -> Delivery {
        let frames = msg.len();
        match self.registry.try_enqueue(pipe, msg) {
            Enqueue::Queued => {
                trace!(pipe = %pipe, frames, "[ROUTER] Reply queued");
                Delivery::Queued
            }
            Enqueue::Gone(_) => {
                debug!(pipe = %pipe, frames, "[ROUTER] Peer gone, reply dropped");
                // Reap it now if the peer vanished without unregistering.
                self.registry.unregister(pipe);
                Delivery::Dropped(DropReason::PeerGone)
            }
            Enqueue::Full(_) => {
                warn!(pipe = %pipe, frames, "[ROUTER] Pipe full, reply dropped");
                Delivery::Dropped(DropReason::PipeFull)
            }
        }
    }
}
