//! Envelope codec.
//!
//! A request arriving at a REP socket looks like
//!
//! ```text
//! [addr_1] ... [addr_n] [""] [body_1] ... [body_m]
//! └──────── envelope ───────┘ └──────── body ───────┘
//! ```
//!
//! The envelope is every frame up to and including the first empty frame.
//! It is stored verbatim and prepended to the reply; its address frames are
//! never inspected. A direct connection (single hop) carries only the
//! delimiter.
//!
//! Both operations are pure.

use bytes::Bytes;
use repwire_core::message::Message;

/// Captured routing envelope: address frames plus the empty delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    frames: Message,
    delimited: bool,
}

impl Envelope {
    /// Envelope of a direct, single-hop peer: just the delimiter.
    pub fn direct() -> Self {
        Self {
            frames: Message::new().push_empty(),
            delimited: true,
        }
    }

    /// Build an envelope from address frames; the delimiter is appended.
    ///
    /// Returns `None` if any address frame is empty: an empty frame would
    /// be read back as the delimiter.
    pub fn with_addresses(addresses: impl IntoIterator<Item = Bytes>) -> Option<Self> {
        let frames: Message = addresses.into_iter().collect();
        if frames.parts().iter().any(Bytes::is_empty) {
            return None;
        }
        Some(Self {
            frames: frames.push_empty(),
            delimited: true,
        })
    }

    /// Returns false if the request ran out of frames before a delimiter.
    ///
    /// Such an envelope is unroutable; the whole request was folded into it.
    #[inline]
    pub fn is_delimited(&self) -> bool {
        self.delimited
    }

    /// All envelope frames, delimiter included.
    #[inline]
    pub fn frames(&self) -> &[Bytes] {
        self.frames.parts()
    }

    /// Address frames only (empty for a direct peer).
    pub fn addresses(&self) -> &[Bytes] {
        let frames = self.frames.parts();
        if self.delimited {
            &frames[..frames.len() - 1]
        } else {
            frames
        }
    }

    /// Number of frames, delimiter included.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if the envelope holds no frames at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Split an inbound message into its envelope and body.
///
/// If no empty frame is found, the whole message becomes the envelope, the
/// body is empty and [`Envelope::is_delimited`] reports false.
///
/// # Examples
///
/// ```
/// use repwire::envelope::split;
/// use repwire::Message;
///
/// let request = Message::new().push_str("X").push_str("Y").push_empty().push_str("A");
/// let (envelope, body) = split(request);
///
/// assert_eq!(envelope.addresses().len(), 2);
/// assert_eq!(body, Message::from("A"));
/// ```
pub fn split(msg: Message) -> (Envelope, Message) {
    let mut parts = msg.into_parts();
    match parts.iter().position(Bytes::is_empty) {
        Some(delimiter) => {
            let body = parts.split_off(delimiter + 1);
            (
                Envelope {
                    frames: Message::from(parts),
                    delimited: true,
                },
                Message::from(body),
            )
        }
        None => (
            Envelope {
                frames: Message::from(parts),
                delimited: false,
            },
            Message::new(),
        ),
    }
}

/// Reassemble an outbound message: the stored envelope followed by `body`.
///
/// More-flags follow position, so the delimiter carries `more` exactly when
/// the body has at least one frame.
pub fn join(envelope: &Envelope, body: Message) -> Message {
    envelope
        .frames()
        .iter()
        .cloned()
        .chain(body.into_parts())
        .collect()
}
