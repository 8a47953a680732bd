//! REP socket.
//!
//! Accepts requests from any number of pipes, fair-queued, and returns each
//! reply to the pipe its request came from. Routing envelopes are stripped
//! on receive and re-attached on send; the application only sees bodies.
//!
//! # REP State Machine
//!
//! - Start in `Idle`: only `recv()` is allowed
//! - A delivered request moves the socket to `ReplyOwed`: only `send()` is allowed
//! - `send()` routes the reply and returns to `Idle`
//!
//! Out-of-turn calls fail with [`RepError::ProtocolSequence`] and change
//! nothing. Requests without an envelope delimiter, or over the configured
//! size, are dropped and the next readable pipe is tried. A reply whose peer
//! has disconnected is dropped silently.

use std::sync::Arc;
use std::time::{Duration, Instant};

use repwire_core::error::{RepError, Result};
use repwire_core::inproc;
use repwire_core::message::Message;
use repwire_core::monitor::{
    create_monitor, emit, DropReason, SocketEvent, SocketEventSender, SocketMonitor,
};
use repwire_core::options::SocketOptions;
use repwire_core::pipe::{Pipe, PipeId};
use repwire_core::registry::PipeRegistry;
use tracing::{debug, trace, warn};

use crate::envelope::{self, Envelope};
use crate::router::{Delivery, OutputRouter};
use crate::state::{RepState, ReplyState};

/// A REP socket for synchronous reply patterns.
///
/// # Example
///
/// ```rust
/// use repwire::{Message, RepSocket};
/// use repwire_core::inproc::connect_inproc;
///
/// # fn example() -> repwire::Result<()> {
/// let mut socket = RepSocket::bind("inproc://doc-echo")?;
/// let requester = connect_inproc("inproc://doc-echo")?;
///
/// // A REQ peer prefixes its request with an empty delimiter.
/// requester.send(Message::new().push_empty().push_str("ping"))?;
///
/// let request = socket.try_recv()?.expect("request queued");
/// assert_eq!(request, Message::from("ping"));
/// socket.send(request)?;
///
/// let reply = requester.try_recv()?.expect("reply queued");
/// assert_eq!(reply, Message::new().push_empty().push_str("ping"));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct RepSocket {
    registry: Arc<PipeRegistry>,
    router: OutputRouter,
    state: ReplyState,
    options: SocketOptions,
    monitor: Option<SocketEventSender>,
    endpoint: Option<String>,
    dropped_requests: u64,
    closed: bool,
}

impl RepSocket {
    /// Create an unbound REP socket with default options.
    ///
    /// Pipes are attached with [`attach`](Self::attach) by a transport.
    pub fn new() -> Self {
        Self::with_options(SocketOptions::default())
    }

    /// Create an unbound REP socket with custom options.
    pub fn with_options(options: SocketOptions) -> Self {
        let registry = PipeRegistry::new();
        debug!("[REP] Creating socket");
        Self {
            router: OutputRouter::new(Arc::clone(&registry)),
            registry,
            state: ReplyState::Idle,
            options,
            monitor: None,
            endpoint: None,
            dropped_requests: 0,
            closed: false,
        }
    }

    /// Create a REP socket bound to an `inproc://` endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is malformed or already bound.
    pub fn bind(endpoint: &str) -> Result<Self> {
        Self::bind_with_options(endpoint, SocketOptions::default())
    }

    /// Create a bound REP socket with custom options.
    ///
    /// Pipes created by connecting peers use the options' high water marks.
    pub fn bind_with_options(endpoint: &str, options: SocketOptions) -> Result<Self> {
        let mut socket = Self::with_options(options);
        socket.bind_to(endpoint)?;
        Ok(socket)
    }

    /// Bind this socket to an `inproc://` endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is closed or already bound, or the
    /// endpoint is malformed or taken.
    pub fn bind_to(&mut self, endpoint: &str) -> Result<()> {
        self.ensure_open()?;
        if let Some(current) = &self.endpoint {
            return Err(RepError::endpoint(format!(
                "socket already bound to '{current}'"
            )));
        }

        inproc::bind_inproc_with_options(endpoint, &self.registry, &self.options)?;
        self.endpoint = Some(endpoint.to_string());
        emit(self.monitor.as_ref(), SocketEvent::Bound(endpoint.to_string()));
        debug!(endpoint, "[REP] Bound");
        Ok(())
    }

    /// Attach a pipe established by a transport.
    pub fn attach(&self, pipe: Pipe) -> Result<()> {
        self.ensure_open()?;
        self.registry.register(pipe);
        Ok(())
    }

    /// Detach a pipe (transport-side disconnect).
    ///
    /// Returns false if the pipe was not attached.
    pub fn detach(&self, pipe: PipeId) -> bool {
        self.registry.unregister(pipe)
    }

    /// Receive a request, honoring `options.recv_timeout`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(body))` - a request body (envelope stripped)
    /// - `Ok(None)` - nothing arrived before the timeout
    ///
    /// # Errors
    ///
    /// Returns an error if a reply is still owed, or the socket is closed.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        let timeout = self.options.recv_timeout;
        self.recv_timeout(timeout).await
    }

    /// Receive a request, waiting at most `timeout` (`None` waits forever).
    pub async fn recv_timeout(&mut self, timeout: Option<Duration>) -> Result<Option<Message>> {
        // A deadline past the end of `Instant` is no deadline.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let readiness = self.registry.readiness().clone();

        loop {
            if let Some(body) = self.try_recv()? {
                return Ok(Some(body));
            }

            match deadline {
                None => {
                    if readiness.recv_async().await.is_err() {
                        return Err(RepError::SocketClosed);
                    }
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        trace!("[REP] Receive timed out");
                        return Ok(None);
                    }
                    match compio::time::timeout(deadline - now, readiness.recv_async()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) => return Err(RepError::SocketClosed),
                        Err(_elapsed) => {
                            trace!("[REP] Receive timed out");
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }

    /// Receive a request without waiting.
    ///
    /// Returns `Ok(None)` when no pipe has a routable request queued.
    pub fn try_recv(&mut self) -> Result<Option<Message>> {
        self.ensure_open()?;
        self.state.check_recv()?;

        while let Some((pipe, msg)) = self.registry.next_message() {
            if msg.len() > self.options.max_frames {
                self.drop_request(pipe, DropReason::TooManyFrames, msg.len());
                continue;
            }
            if self.options.exceeds_max_size(msg.byte_len()) {
                self.drop_request(pipe, DropReason::TooLarge, msg.len());
                continue;
            }

            let (envelope, body) = envelope::split(msg);
            if !envelope.is_delimited() {
                self.drop_request(pipe, DropReason::MissingDelimiter, envelope.len());
                continue;
            }

            trace!(
                pipe = %pipe,
                hops = envelope.addresses().len(),
                frames = body.len(),
                "[REP] Request accepted"
            );
            self.state.accept(envelope, pipe)?;
            return Ok(Some(body));
        }

        Ok(None)
    }

    /// Send the reply to the last received request.
    ///
    /// The stored envelope is prepended and the message is queued on the
    /// originating pipe. If that pipe has gone the reply is discarded and
    /// this still returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns an error if no reply is owed, or the socket is closed.
    pub fn send(&mut self, body: impl Into<Message>) -> Result<()> {
        self.ensure_open()?;
        let (envelope, pipe) = self.state.take_reply()?;
        let reply = envelope::join(&envelope, body.into());

        trace!(pipe = %pipe, frames = reply.len(), "[REP] Sending reply");
        if let Delivery::Dropped(reason) = self.router.deliver(pipe, reply) {
            emit(
                self.monitor.as_ref(),
                SocketEvent::ReplyDropped { pipe, reason },
            );
        }
        Ok(())
    }

    /// Close the socket.
    ///
    /// Unbinds the endpoint, detaches every pipe and discards a pending
    /// reply obligation. Later calls fail with `SocketClosed`.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        trace!("[REP] Closing socket");

        if let Some(endpoint) = self.endpoint.take() {
            let _ = inproc::unbind_inproc(&endpoint);
        }
        if let Some(pipe) = self.state.reset() {
            debug!(pipe = %pipe, "[REP] Closed with reply owed; discarding");
        }
        let detached = self.registry.clear();
        debug!(detached, "[REP] Socket closed");
        emit(self.monitor.as_ref(), SocketEvent::Closed);
    }

    /// Start monitoring socket events.
    ///
    /// A new call replaces the previous monitor.
    pub fn monitor(&mut self) -> SocketMonitor {
        let (tx, rx) = create_monitor();
        self.registry.set_monitor(tx.clone());
        self.monitor = Some(tx);
        rx
    }

    /// Get the current state of the REP socket.
    pub const fn state(&self) -> RepState {
        self.state.kind()
    }

    /// Envelope held for the pending reply, if any.
    pub fn pending_envelope(&self) -> Option<&Envelope> {
        match &self.state {
            ReplyState::ReplyOwed { envelope, .. } => Some(envelope),
            ReplyState::Idle => None,
        }
    }

    /// Number of attached pipes whose peer is still connected.
    pub fn peer_count(&self) -> usize {
        self.registry.len()
    }

    /// Requests dropped as unroutable or oversized since creation.
    pub const fn dropped_requests(&self) -> u64 {
        self.dropped_requests
    }

    /// Shared pipe registry, for transports attaching from other threads.
    pub fn registry(&self) -> &Arc<PipeRegistry> {
        &self.registry
    }

    /// Get the endpoint this socket is bound to, if any.
    ///
    /// Corresponds to `ZMQ_LAST_ENDPOINT`.
    pub fn last_endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Returns true once [`close`](Self::close) has run.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Get the current socket options.
    pub const fn options(&self) -> &SocketOptions {
        &self.options
    }

    /// Get a mutable reference to the socket options.
    ///
    /// High water marks apply to pipes attached afterwards.
    pub fn options_mut(&mut self) -> &mut SocketOptions {
        &mut self.options
    }

    /// Set socket options.
    pub fn set_options(&mut self, options: SocketOptions) {
        self.options = options;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(RepError::SocketClosed)
        } else {
            Ok(())
        }
    }

    fn drop_request(&mut self, pipe: PipeId, reason: DropReason, frames: usize) {
        self.dropped_requests += 1;
        warn!(pipe = %pipe, frames, %reason, "[REP] Dropping unroutable request");
        emit(
            self.monitor.as_ref(),
            SocketEvent::RequestDropped { pipe, reason },
        );
    }
}

impl Default for RepSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RepSocket {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repwire_core::pipe::PeerEnd;

    fn attached(socket: &RepSocket) -> PeerEnd {
        let (pipe, peer) = Pipe::pair(16, 16);
        socket.attach(pipe).unwrap();
        peer
    }

    fn request(body: &str) -> Message {
        Message::new().push_empty().push_str(body)
    }

    #[test]
    fn test_rep_state_machine() {
        let mut rep = RepSocket::new();
        let peer = attached(&rep);
        assert_eq!(rep.state(), RepState::Idle);

        peer.send(request("test")).unwrap();
        let msg = rep.try_recv().unwrap().unwrap();
        assert_eq!(msg, Message::from("test"));
        assert_eq!(rep.state(), RepState::ReplyOwed);
        assert_eq!(rep.pending_envelope(), Some(&Envelope::direct()));

        rep.send(msg).unwrap();
        assert_eq!(rep.state(), RepState::Idle);
        assert_eq!(peer.try_recv().unwrap(), Some(request("test")));
    }

    #[test]
    fn test_try_recv_with_nothing_queued() {
        let mut rep = RepSocket::new();
        let _peer = attached(&rep);
        assert_eq!(rep.try_recv().unwrap(), None);
        assert_eq!(rep.state(), RepState::Idle);
    }

    #[test]
    fn test_malformed_request_is_skipped() {
        let mut rep = RepSocket::new();
        let monitor = rep.monitor();
        let bad = attached(&rep);
        let good = attached(&rep);

        bad.send(Message::from("no-delimiter")).unwrap();
        good.send(request("ok")).unwrap();

        assert_eq!(rep.try_recv().unwrap(), Some(Message::from("ok")));
        assert_eq!(rep.dropped_requests(), 1);

        let dropped: Vec<SocketEvent> = monitor
            .try_iter()
            .filter(|e| matches!(e, SocketEvent::RequestDropped { .. }))
            .collect();
        assert_eq!(
            dropped,
            vec![SocketEvent::RequestDropped {
                pipe: bad.id(),
                reason: DropReason::MissingDelimiter
            }]
        );
    }

    #[test]
    fn test_oversized_request_is_skipped() {
        let mut rep = RepSocket::with_options(SocketOptions::new().with_max_msg_size(4));
        let peer = attached(&rep);

        peer.send(request("too long")).unwrap();
        peer.send(request("ok")).unwrap();

        assert_eq!(rep.try_recv().unwrap(), Some(Message::from("ok")));
        assert_eq!(rep.dropped_requests(), 1);
    }

    #[test]
    fn test_request_over_frame_limit_is_skipped() {
        let mut rep = RepSocket::with_options(SocketOptions::new().with_max_frames(3));
        let monitor = rep.monitor();
        let peer = attached(&rep);

        let wide = (0..10_000).fold(Message::new().push_empty(), |m, i| m.push(i.to_string()));
        peer.send(wide).unwrap();
        peer.send(request("ok")).unwrap();

        assert_eq!(rep.try_recv().unwrap(), Some(Message::from("ok")));
        assert_eq!(rep.dropped_requests(), 1);
        assert!(monitor.try_iter().any(|e| e
            == SocketEvent::RequestDropped {
                pipe: peer.id(),
                reason: DropReason::TooManyFrames,
            }));
    }

    #[compio::test]
    async fn test_unbounded_deadline_does_not_overflow() {
        let mut rep = RepSocket::new();
        let peer = attached(&rep);
        peer.send(request("A")).unwrap();

        let got = rep.recv_timeout(Some(Duration::MAX)).await.unwrap();
        assert_eq!(got, Some(Message::from("A")));
        rep.send("B").unwrap();

        rep.set_options(SocketOptions::new().with_recv_timeout(Duration::MAX));
        peer.send(request("C")).unwrap();
        assert_eq!(rep.recv().await.unwrap(), Some(Message::from("C")));
    }

    #[test]
    fn test_close_discards_pending_reply() {
        let mut rep = RepSocket::new();
        let peer = attached(&rep);
        peer.send(request("A")).unwrap();
        rep.try_recv().unwrap();

        rep.close();
        assert!(rep.is_closed());
        assert!(peer.is_detached());
        assert_eq!(rep.state(), RepState::Idle);
        assert!(matches!(rep.send("A"), Err(RepError::SocketClosed)));
        assert!(matches!(rep.try_recv(), Err(RepError::SocketClosed)));

        let (pipe, _peer) = Pipe::pair(1, 1);
        assert!(matches!(rep.attach(pipe), Err(RepError::SocketClosed)));
    }

    #[test]
    fn test_bind_emits_event_and_rejects_rebind() {
        let mut rep = RepSocket::new();
        let monitor = rep.monitor();
        rep.bind_to("inproc://rep-unit-bind").unwrap();
        assert_eq!(rep.last_endpoint(), Some("inproc://rep-unit-bind"));
        assert_eq!(
            monitor.try_recv().unwrap(),
            SocketEvent::Bound("inproc://rep-unit-bind".to_string())
        );

        assert!(matches!(
            rep.bind_to("inproc://rep-unit-other"),
            Err(RepError::Endpoint(_))
        ));

        rep.close();
        assert_eq!(rep.last_endpoint(), None);
        assert!(inproc::connect_inproc("inproc://rep-unit-bind").is_err());
    }

    #[test]
    fn test_detach_before_reply() {
        let mut rep = RepSocket::new();
        let peer = attached(&rep);
        peer.send(request("A")).unwrap();
        rep.try_recv().unwrap();

        assert!(rep.detach(peer.id()));
        assert!(!rep.detach(peer.id()));
        rep.send("A").unwrap();
        assert_eq!(rep.state(), RepState::Idle);
        assert!(matches!(peer.try_recv(), Err(RepError::Disconnected)));
    }
}
