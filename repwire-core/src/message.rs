//! Frame and message model.
//!
//! A [`Frame`] is one immutable payload plus the "more frames follow" flag
//! the transport decoded it with. A [`Message`] is an ordered sequence of
//! frames forming one logical unit; its more-flags are implied by position
//! (every frame but the last carries `more = true`).
//!
//! [`MessageAssembler`] turns a stream of decoded frames back into messages.

use crate::options::SocketOptions;
use bytes::Bytes;
use smallvec::SmallVec;
use std::fmt;

/// A single decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame payload
    pub payload: Bytes,
    /// More frames follow in the same message
    pub more: bool,
}

impl Frame {
    /// Create a frame.
    pub fn new(payload: impl Into<Bytes>, more: bool) -> Self {
        Self {
            payload: payload.into(),
            more,
        }
    }

    /// Returns true if this frame carries more frames after it.
    #[inline]
    pub const fn more(&self) -> bool {
        self.more
    }

    /// Returns true if the payload is empty (a delimiter candidate).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// A multipart message.
///
/// # Examples
///
/// ```
/// use repwire_core::message::Message;
///
/// let msg = Message::new()
///     .push_str("X")
///     .push_empty()
///     .push_str("A");
/// assert_eq!(msg.len(), 3);
///
/// let flags: Vec<bool> = msg.frames().map(|f| f.more).collect();
/// assert_eq!(flags, vec![true, true, false]);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Message {
    parts: SmallVec<[Bytes; 4]>,
}

impl Message {
    /// Create a new empty message.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parts: SmallVec::new(),
        }
    }

    /// Create a message from existing frame payloads.
    #[must_use]
    pub fn from_parts(parts: impl IntoIterator<Item = Bytes>) -> Self {
        Self {
            parts: parts.into_iter().collect(),
        }
    }

    /// Add a frame from any type that can be converted to `Bytes`.
    #[must_use]
    pub fn push(mut self, frame: impl Into<Bytes>) -> Self {
        self.parts.push(frame.into());
        self
    }

    /// Add a string frame (UTF-8 encoded).
    #[must_use]
    pub fn push_str(mut self, s: &str) -> Self {
        self.parts.push(Bytes::copy_from_slice(s.as_bytes()));
        self
    }

    /// Add an empty frame (envelope delimiter).
    #[must_use]
    pub fn push_empty(mut self) -> Self {
        self.parts.push(Bytes::new());
        self
    }

    /// Get the number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the message has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Total payload size in bytes across all frames.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.parts.iter().map(Bytes::len).sum()
    }

    /// Get a reference to the frame payloads.
    #[must_use]
    pub fn parts(&self) -> &[Bytes] {
        &self.parts
    }

    /// Iterate the message as frames with their more-flags.
    pub fn frames(&self) -> impl Iterator<Item = Frame> + '_ {
        let last = self.parts.len().saturating_sub(1);
        self.parts.iter().enumerate().map(move |(i, p)| Frame {
            payload: p.clone(),
            more: i < last,
        })
    }

    /// Consume the message and return the frame payloads.
    #[must_use]
    pub fn into_parts(self) -> Vec<Bytes> {
        self.parts.into_vec()
    }

    /// Try to read a frame as a UTF-8 string.
    #[must_use]
    pub fn frame_str(&self, index: usize) -> Option<&str> {
        self.parts
            .get(index)
            .and_then(|frame| std::str::from_utf8(frame).ok())
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.parts.iter()).finish()
    }
}

impl From<Vec<Bytes>> for Message {
    fn from(frames: Vec<Bytes>) -> Self {
        Self::from_parts(frames)
    }
}

impl From<Message> for Vec<Bytes> {
    fn from(msg: Message) -> Self {
        msg.into_parts()
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self::new().push_str(s)
    }
}

impl FromIterator<Bytes> for Message {
    fn from_iter<I: IntoIterator<Item = Bytes>>(iter: I) -> Self {
        Self::from_parts(iter)
    }
}

/// Errors produced by [`MessageAssembler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    /// Message exceeded configured frame count
    #[error("message exceeds {0} frames")]
    TooManyFrames(usize),
    /// Message exceeded configured byte size
    #[error("message exceeds {0} bytes")]
    TooLarge(usize),
}

/// Collects decoded frames until a complete message is formed.
///
/// Invariants:
/// - Frames are appended in-order
/// - A message completes when `more == false`
/// - Limits are enforced eagerly; a violating message is discarded whole
///
/// Owned by a single transport read loop, not shared.
#[derive(Debug)]
pub struct MessageAssembler {
    parts: SmallVec<[Bytes; 4]>,
    byte_count: usize,
    // Swallowing the rest of a rejected message.
    discarding: bool,

    max_frames: usize,
    max_bytes: usize,
}

impl MessageAssembler {
    /// Create a new assembler with limits.
    pub fn new(max_frames: usize, max_bytes: usize) -> Self {
        Self {
            parts: SmallVec::new(),
            byte_count: 0,
            discarding: false,
            max_frames,
            max_bytes,
        }
    }

    /// Create an assembler bounded by `options.max_frames` and
    /// `options.max_msg_size` (no byte limit when unset).
    pub fn from_options(options: &SocketOptions) -> Self {
        Self::new(options.max_frames, options.max_msg_size.unwrap_or(usize::MAX))
    }

    /// Push a frame into the assembler.
    ///
    /// Returns:
    /// - `Ok(None)` if the message is not complete
    /// - `Ok(Some(msg))` once the final frame arrives
    /// - `Err(AssemblyError)` on a limit violation
    ///
    /// After a violation the remaining frames of that message, up to and
    /// including its final frame, are swallowed and yield `Ok(None)`.
    pub fn push_frame(&mut self, frame: Frame) -> Result<Option<Message>, AssemblyError> {
        if self.discarding {
            self.discarding = frame.more;
            return Ok(None);
        }

        if self.parts.len() + 1 > self.max_frames {
            return Err(self.reject(&frame, AssemblyError::TooManyFrames(self.max_frames)));
        }

        self.byte_count = self.byte_count.saturating_add(frame.payload.len());
        if self.byte_count > self.max_bytes {
            return Err(self.reject(&frame, AssemblyError::TooLarge(self.max_bytes)));
        }

        self.parts.push(frame.payload);

        if frame.more {
            Ok(None)
        } else {
            let parts = std::mem::take(&mut self.parts);
            self.reset();
            Ok(Some(Message { parts }))
        }
    }

    fn reject(&mut self, frame: &Frame, err: AssemblyError) -> AssemblyError {
        self.reset();
        self.discarding = frame.more;
        err
    }

    /// Returns true if the assembler is in the middle of a message, either
    /// collecting it or swallowing the tail of a rejected one.
    #[inline]
    pub fn in_progress(&self) -> bool {
        !self.parts.is_empty() || self.discarding
    }

    /// Forget any partially assembled or partially discarded message.
    #[inline]
    pub fn reset(&mut self) {
        self.parts.clear();
        self.byte_count = 0;
        self.discarding = false;
    }
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new(128, 8 * 1024 * 1024)
    }
}
