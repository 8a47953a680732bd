//! Repwire Core
//!
//! This crate contains the runtime-agnostic building blocks under the REP
//! socket:
//! - Frame and multipart message model (`message`)
//! - Pipes: per-peer SPSC queue pairs (`pipe`)
//! - Round-robin fair-queue rotation (`fair_queue`)
//! - The shared pipe registry (`registry`)
//! - In-process transport (`inproc`)
//! - Socket options, lifecycle monitoring and error types

#![deny(unsafe_code)]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::new_ret_no_self)]

pub mod error;
pub mod fair_queue;
pub mod inproc;
pub mod message;
pub mod monitor;
pub mod options;
pub mod pipe;
pub mod registry;

// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::error::{RepError, Result};
    pub use crate::fair_queue::FairQueue;
    pub use crate::message::{Frame, Message, MessageAssembler};
    pub use crate::monitor::{DropReason, SocketEvent, SocketMonitor};
    pub use crate::options::SocketOptions;
    pub use crate::pipe::{PeerEnd, Pipe, PipeId};
    pub use crate::registry::{Enqueue, PipeRegistry};
}
