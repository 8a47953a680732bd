//! Socket configuration options
//!
//! The subset of libzmq-style socket options (zmq_setsockopt) that the
//! REP core consults when it makes decisions.

use std::time::Duration;

/// Socket configuration options.
///
/// # Examples
///
/// ```
/// use repwire_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let opts = SocketOptions::default()
///     .with_recv_timeout(Duration::from_millis(100))
///     .with_recv_hwm(16);
/// assert_eq!(opts.recv_hwm, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOptions {
    /// Receive timeout (ZMQ_RCVTIMEO)
    ///
    /// Maximum time to wait for a receive operation.
    /// - `None`: Block indefinitely (default)
    /// - `Some(Duration::ZERO)`: Non-blocking (return immediately if nothing is queued)
    /// - `Some(duration)`: Wait up to duration before reporting "no message"
    pub recv_timeout: Option<Duration>,

    /// High water mark for receiving (ZMQ_RCVHWM)
    ///
    /// Capacity of each pipe's inbound queue. `0` means unbounded.
    /// - Default: 1000 messages
    pub recv_hwm: usize,

    /// High water mark for sending (ZMQ_SNDHWM)
    ///
    /// Capacity of each pipe's outbound queue. `0` means unbounded.
    /// A reply that finds its pipe full is dropped.
    /// - Default: 1000 messages
    pub send_hwm: usize,

    /// Maximum message size (ZMQ_MAXMSGSIZE)
    ///
    /// - `None`: No limit (default)
    /// - `Some(size)`: Requests with more payload bytes are dropped
    pub max_msg_size: Option<usize>,

    /// Maximum number of frames per message
    ///
    /// Requests with more frames are dropped by the socket; a
    /// `MessageAssembler` built from these options rejects them too.
    /// - Default: 128
    pub max_frames: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            recv_timeout: None, // Block indefinitely
            recv_hwm: 1000,
            send_hwm: 1000,
            max_msg_size: None, // No limit
            max_frames: 128,
        }
    }
}

impl SocketOptions {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the receive timeout.
    #[must_use]
    pub const fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }

    /// Make receives block until a request arrives.
    #[must_use]
    pub const fn with_blocking_recv(mut self) -> Self {
        self.recv_timeout = None;
        self
    }

    /// Make receives return immediately when nothing is queued.
    #[must_use]
    pub const fn with_nonblocking_recv(mut self) -> Self {
        self.recv_timeout = Some(Duration::ZERO);
        self
    }

    /// Set the receive high water mark.
    #[must_use]
    pub const fn with_recv_hwm(mut self, hwm: usize) -> Self {
        self.recv_hwm = hwm;
        self
    }

    /// Set the send high water mark.
    #[must_use]
    pub const fn with_send_hwm(mut self, hwm: usize) -> Self {
        self.send_hwm = hwm;
        self
    }

    /// Set the maximum accepted request size in bytes.
    #[must_use]
    pub const fn with_max_msg_size(mut self, size: usize) -> Self {
        self.max_msg_size = Some(size);
        self
    }

    /// Set the maximum number of frames per message.
    #[must_use]
    pub const fn with_max_frames(mut self, frames: usize) -> Self {
        self.max_frames = frames;
        self
    }

    /// Returns true if `bytes` exceeds the configured maximum message size.
    #[inline]
    pub fn exceeds_max_size(&self, bytes: usize) -> bool {
        self.max_msg_size.is_some_and(|max| bytes > max)
    }
}
